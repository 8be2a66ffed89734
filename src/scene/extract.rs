//! Geometry extraction: model tree -> ordered mesh records.
//!
//! The order in which meshes come out of [`MeshRecords`] is the order used to
//! rebase vertex indices and to assign triangle ranges to an instance:
//! depth-first pre-order, children in declaration order, one record per node
//! that carries a mesh. The walk is lazy and restartable (clone the iterator
//! or call [`extract`] again).

use glam::{Mat4, Vec3};
use rayon::prelude::*;

use crate::model::normals::smooth_normals;
use crate::model::{MaterialDesc, MeshData, ModelTree, Node};
use crate::util::{normal_matrix, Error, Result};

/// One mesh, in model space, ready for packing.
#[derive(Debug, Clone)]
pub struct MeshRecord<'a> {
    /// Position of the mesh node in traversal order, counting skipped meshes.
    pub ordinal: usize,
    /// Slash separated node names from the root.
    pub path: String,
    /// Positions with node transforms applied.
    pub positions: Vec<Vec3>,
    /// One unit normal per position.
    pub normals: Vec<Vec3>,
    /// Mesh-local triangle list, validated.
    pub indices: &'a [u32],
    pub material: &'a MaterialDesc,
    /// Normals were computed rather than read from the mesh.
    pub normals_generated: bool,
}

impl MeshRecord<'_> {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Triangle index triples in source order.
    pub fn triangles(&self) -> impl Iterator<Item = [u32; 3]> + '_ {
        self.indices.chunks_exact(3).map(|t| [t[0], t[1], t[2]])
    }
}

/// A mesh node found by the walk, before validation and normal generation.
#[derive(Debug, Clone)]
struct MeshSlot<'a> {
    ordinal: usize,
    path: String,
    model_from_node: Mat4,
    mesh: &'a MeshData,
}

/// Depth-first pre-order walk over mesh-carrying nodes.
#[derive(Debug, Clone)]
struct MeshSlots<'a> {
    stack: Vec<(&'a Node, Mat4, String)>,
    ordinal: usize,
}

impl<'a> MeshSlots<'a> {
    fn new(tree: &'a ModelTree) -> Self {
        Self {
            stack: vec![(&tree.root, Mat4::IDENTITY, String::new())],
            ordinal: 0,
        }
    }
}

impl<'a> Iterator for MeshSlots<'a> {
    type Item = MeshSlot<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, parent, parent_path)) = self.stack.pop() {
            let world = parent * node.local_transform();
            let name = if node.name.is_empty() { "_" } else { node.name.as_str() };
            let path = if parent_path.is_empty() {
                name.to_string()
            } else {
                format!("{parent_path}/{name}")
            };

            // Reverse push so the first child is visited first
            for child in node.children.iter().rev() {
                self.stack.push((child, world, path.clone()));
            }

            if let Some(mesh) = &node.mesh {
                let ordinal = self.ordinal;
                self.ordinal += 1;
                return Some(MeshSlot {
                    ordinal,
                    path,
                    model_from_node: world,
                    mesh,
                });
            }
        }
        None
    }
}

impl<'a> MeshSlot<'a> {
    /// Validate the mesh and bring it into model space.
    fn into_record(self, smooth_angle: f32) -> Result<MeshRecord<'a>> {
        let mesh = self.mesh;
        let vertex_count = mesh.positions.len();

        if vertex_count == 0 {
            return Err(Error::missing_geometry(&self.path, "mesh has no positions"));
        }
        if mesh.indices.len() % 3 != 0 {
            return Err(Error::missing_geometry(
                &self.path,
                format!("index count {} is not a multiple of 3", mesh.indices.len()),
            ));
        }
        if mesh.indices.is_empty() {
            return Err(Error::missing_geometry(&self.path, "mesh has no triangles"));
        }
        if let Some(&bad) = mesh.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(Error::missing_geometry(
                &self.path,
                format!("index {bad} out of range for {vertex_count} vertices"),
            ));
        }
        mesh.material.validate()?;

        let positions: Vec<Vec3> = mesh
            .positions
            .iter()
            .map(|p| self.model_from_node.transform_point3(Vec3::from(*p)))
            .collect();

        let (normals, normals_generated) = match &mesh.normals {
            Some(n) if n.len() == vertex_count => {
                let nm = normal_matrix(&self.model_from_node);
                let normals = n.iter().map(|v| (nm * Vec3::from(*v)).normalize_or_zero()).collect();
                (normals, false)
            }
            other => {
                if let Some(n) = other {
                    tracing::warn!(
                        mesh = %self.path,
                        normals = n.len(),
                        vertices = vertex_count,
                        "normal count mismatch, regenerating"
                    );
                }
                (smooth_normals(&positions, &mesh.indices, smooth_angle), true)
            }
        };

        Ok(MeshRecord {
            ordinal: self.ordinal,
            path: self.path,
            positions,
            normals,
            indices: &mesh.indices,
            material: &mesh.material,
            normals_generated,
        })
    }
}

/// Lazy, restartable sequence of mesh records in traversal order.
#[derive(Debug, Clone)]
pub struct MeshRecords<'a> {
    slots: MeshSlots<'a>,
    smooth_angle: f32,
}

impl<'a> Iterator for MeshRecords<'a> {
    type Item = Result<MeshRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.slots.next().map(|slot| slot.into_record(self.smooth_angle))
    }
}

/// Walk `tree` lazily. Malformed meshes come out as `Err` items; the walk
/// continues past them.
pub fn extract(tree: &ModelTree, smooth_angle: f32) -> MeshRecords<'_> {
    MeshRecords {
        slots: MeshSlots::new(tree),
        smooth_angle,
    }
}

/// Same sequence as [`extract`], collected eagerly with normal generation
/// running in parallel.
pub fn extract_par(tree: &ModelTree, smooth_angle: f32) -> Vec<Result<MeshRecord<'_>>> {
    // Phase 1: sequential walk fixes the order
    let slots: Vec<MeshSlot<'_>> = MeshSlots::new(tree).collect();
    // Phase 2: per-mesh work in parallel, indexed collect keeps the order
    slots
        .into_par_iter()
        .map(|slot| slot.into_record(smooth_angle))
        .collect()
}
