//! Turn a model tree into model-local packed arrays.
//!
//! Preparation touches no shared state, so it can run on a loader thread.
//! Indices in the result are model-local: vertex indices count from the
//! model's first vertex, material indices from its first material, BLAS
//! references from its first node / triangle. [`super::SceneBuilder::commit`]
//! rebases them into the scene arrays.

use super::bindings::{push_mesh_bindings, TriangleMaterialBinding};
use super::build::build_bvh;
use super::bvh::{Aabb, BvhNode};
use super::extract::extract_par;
use super::materials::GpuMaterial;
use crate::model::ModelTree;
use crate::util::{Bounds, Error};

/// A model's geometry, fully assembled and ready to append.
#[derive(Debug, Default)]
pub struct PreparedModel {
    pub name: String,
    /// Model-space positions, w = 1.
    pub positions: Vec<[f32; 4]>,
    /// Model-space unit normals, w = 0.
    pub normals: Vec<[f32; 4]>,
    /// One per triangle, model-local indices.
    pub bindings: Vec<TriangleMaterialBinding>,
    /// One per packed mesh, in traversal order.
    pub materials: Vec<GpuMaterial>,
    /// BLAS over `bindings`, model-local references.
    pub blas: Vec<BvhNode>,
    pub local_bounds: Bounds,
    /// Meshes that were reported and left out.
    pub skipped: Vec<Error>,
}

impl PreparedModel {
    pub fn triangle_count(&self) -> usize {
        self.bindings.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.materials.len()
    }
}

/// Extract every mesh of `tree` and pack it.
#[tracing::instrument(skip_all, fields(model = %tree.name))]
pub fn prepare_model(tree: &ModelTree, smooth_angle: f32) -> PreparedModel {
    let mut out = PreparedModel {
        name: tree.name.clone(),
        local_bounds: Bounds::EMPTY,
        ..Default::default()
    };
    let mut tri_bounds: Vec<Aabb> = Vec::new();

    for record in extract_par(tree, smooth_angle) {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(model = %tree.name, error = %e, "skipping mesh");
                out.skipped.push(e);
                continue;
            }
        };

        // Meshes are concatenated in traversal order; indices shift by the
        // vertices of every mesh packed before this one
        let vertex_base = out.positions.len() as u32;
        let material = out.materials.len() as u32;
        out.materials.push(GpuMaterial::from(record.material));

        for (p, n) in record.positions.iter().zip(&record.normals) {
            out.local_bounds.expand(*p);
            out.positions.push(p.extend(1.0).to_array());
            out.normals.push(n.extend(0.0).to_array());
        }

        for [a, b, c] in record.triangles() {
            tri_bounds.push(Aabb::from_triangle(
                record.positions[a as usize].to_array(),
                record.positions[b as usize].to_array(),
                record.positions[c as usize].to_array(),
            ));
        }
        push_mesh_bindings(record.indices, vertex_base, material, &mut out.bindings);
    }

    out.blas = build_bvh(&tri_bounds);

    tracing::debug!(
        meshes = out.mesh_count(),
        triangles = out.triangle_count(),
        vertices = out.vertex_count(),
        skipped = out.skipped.len(),
        "model prepared"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::primitives::{box_mesh, strip_mesh};
    use crate::model::{MaterialDesc, Node};
    use glam::Vec3;

    #[test]
    fn test_meshes_are_concatenated_with_rebased_indices() {
        let tri = crate::model::MeshData {
            positions: vec![[0.0, 0.0, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            normals: None,
            indices: vec![0, 1, 2],
            material: MaterialDesc::default(),
        };
        let tree = ModelTree::new(
            "two",
            Node::group("root")
                .with_child(Node::with_mesh("a", tri.clone()))
                .with_child(Node::with_mesh("b", tri)),
        );
        let p = prepare_model(&tree, 45.0);
        assert_eq!(p.bindings.len(), 2);
        assert_eq!(p.bindings[0].vertices(), [0, 1, 2]);
        assert_eq!(p.bindings[1].vertices(), [3, 4, 5]);
        assert_eq!(p.bindings[0].material, 0);
        assert_eq!(p.bindings[1].material, 1);
        assert_eq!(p.positions.len(), 6);
        assert_eq!(p.normals.len(), 6);
        assert_eq!(p.positions[3][3], 1.0);
        assert_eq!(p.normals[3][3], 0.0);
    }

    #[test]
    fn test_skipped_mesh_contributes_nothing() {
        let mut bad = strip_mesh(4, MaterialDesc::default());
        bad.indices.truncate(7);
        let tree = ModelTree::new(
            "m",
            Node::group("root")
                .with_child(Node::with_mesh("bad", bad))
                .with_child(Node::with_mesh("box", box_mesh(Vec3::ONE, MaterialDesc::default()))),
        );
        let p = prepare_model(&tree, 45.0);
        assert_eq!(p.skipped.len(), 1);
        assert_eq!(p.mesh_count(), 1);
        assert_eq!(p.triangle_count(), 12);
        assert_eq!(p.vertex_count(), 24);
        assert_eq!(p.blas.len(), 23);
        assert_eq!(p.local_bounds.min, Vec3::NEG_ONE);
    }

    #[test]
    fn test_blas_leaves_reference_local_triangles() {
        let tree = ModelTree::new("s", Node::with_mesh("s", strip_mesh(8, MaterialDesc::default())));
        let p = prepare_model(&tree, 45.0);
        let mut leaves: Vec<u32> = p
            .blas
            .iter()
            .filter(|n| n.is_leaf())
            .map(|n| n.left_or_first)
            .collect();
        leaves.sort();
        assert_eq!(leaves, (0..16).collect::<Vec<_>>());
    }
}
