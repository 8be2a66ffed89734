//! Loaded model trees and the collaborators that produce them.
//!
//! A [`ModelTree`] is what a loader hands to the scene builder: a hierarchy
//! of nodes, each with a local transform and optionally one triangle mesh
//! bound to one material.

mod loader;
mod material;
pub mod normals;
mod placement;
pub mod primitives;

pub use loader::{JsonModelLoader, ModelLoader};
pub use material::{BlendMode, MaterialDesc, TextureSlots, NO_TEXTURE};
pub use placement::{ground_transform, PlacementOptions};

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::util::{Bounds, Result};

/// Triangle mesh attached to a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    /// Per-vertex normals. Computed during extraction when absent.
    #[serde(default)]
    pub normals: Option<Vec<[f32; 3]>>,
    /// Triangle list, three indices per triangle.
    pub indices: Vec<u32>,
    #[serde(default)]
    pub material: MaterialDesc,
}

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// One node of a model hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub name: String,
    /// Column-major local transform relative to the parent.
    #[serde(default = "identity_cols")]
    pub transform: [f32; 16],
    #[serde(default)]
    pub mesh: Option<MeshData>,
    #[serde(default)]
    pub children: Vec<Node>,
}

fn identity_cols() -> [f32; 16] {
    Mat4::IDENTITY.to_cols_array()
}

impl Default for Node {
    fn default() -> Self {
        Self {
            name: String::new(),
            transform: identity_cols(),
            mesh: None,
            children: Vec::new(),
        }
    }
}

impl Node {
    /// Empty group node.
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Node carrying a mesh.
    pub fn with_mesh(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            name: name.into(),
            mesh: Some(mesh),
            ..Default::default()
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform.to_cols_array();
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_cols_array(&self.transform)
    }
}

/// A loaded model: a named node hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelTree {
    #[serde(default)]
    pub name: String,
    pub root: Node,
}

impl ModelTree {
    pub fn new(name: impl Into<String>, root: Node) -> Self {
        Self {
            name: name.into(),
            root,
        }
    }

    /// Validate every material in the tree.
    pub fn validate_materials(&self) -> Result<()> {
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if let Some(mesh) = &node.mesh {
                mesh.material.validate()?;
            }
            stack.extend(node.children.iter());
        }
        Ok(())
    }

    /// Model-space bounds with node transforms applied.
    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::EMPTY;
        let mut stack = vec![(&self.root, Mat4::IDENTITY)];
        while let Some((node, parent)) = stack.pop() {
            let world = parent * node.local_transform();
            if let Some(mesh) = &node.mesh {
                for p in &mesh.positions {
                    bounds.expand(world.transform_point3(Vec3::from(*p)));
                }
            }
            stack.extend(node.children.iter().map(|c| (c, world)));
        }
        bounds
    }

    /// Number of nodes carrying a mesh.
    pub fn mesh_count(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            count += node.mesh.is_some() as usize;
            stack.extend(node.children.iter());
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri_mesh() -> MeshData {
        MeshData {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            normals: None,
            indices: vec![0, 1, 2],
            material: MaterialDesc::default(),
        }
    }

    #[test]
    fn test_bounds_apply_node_transforms() {
        let tree = ModelTree::new(
            "t",
            Node::group("root").with_child(
                Node::with_mesh("m", tri_mesh())
                    .with_transform(Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0))),
            ),
        );
        let b = tree.bounds();
        assert_eq!(b.min, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(b.max, Vec3::new(11.0, 1.0, 0.0));
        assert_eq!(tree.mesh_count(), 1);
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{ "root": { "mesh": { "positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0,1,2] } } }"#;
        let tree: ModelTree = serde_json::from_str(json).unwrap();
        assert_eq!(tree.root.local_transform(), Mat4::IDENTITY);
        let mesh = tree.root.mesh.as_ref().unwrap();
        assert!(mesh.normals.is_none());
        assert_eq!(mesh.triangle_count(), 1);
        assert!(tree.validate_materials().is_ok());
    }
}
