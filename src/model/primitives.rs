//! Procedural models for demos and tests.

use glam::Vec3;

use super::{MaterialDesc, MeshData, ModelTree, Node};

/// Axis-aligned box centered on the origin: 24 vertices (flat faces), 12 triangles.
pub fn box_model(half_extents: Vec3, material: MaterialDesc) -> ModelTree {
    ModelTree::new("box", Node::with_mesh("box", box_mesh(half_extents, material)))
}

/// Box mesh with outward counter-clockwise winding and per-face normals.
pub fn box_mesh(half_extents: Vec3, material: MaterialDesc) -> MeshData {
    // (normal, u, v) with u x v = normal
    let faces = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (n, u, v) in faces {
        let base = positions.len() as u32;
        for (su, sv) in [(-1.0, 1.0), (-1.0, -1.0), (1.0, 1.0), (1.0, -1.0)] {
            positions.push(((n + u * su + v * sv) * half_extents).to_array());
            normals.push(n.to_array());
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }

    MeshData {
        positions,
        normals: Some(normals),
        indices,
        material,
    }
}

/// Flat strip of `quads` unit quads along X in the XZ plane, without normals.
/// Yields `2 * quads` triangles over `2 * (quads + 1)` vertices.
pub fn strip_mesh(quads: u32, material: MaterialDesc) -> MeshData {
    let mut positions = Vec::with_capacity(2 * (quads as usize + 1));
    for i in 0..=quads {
        positions.push([i as f32, 0.0, 0.0]);
        positions.push([i as f32, 0.0, 1.0]);
    }
    let mut indices = Vec::with_capacity(6 * quads as usize);
    for i in 0..quads {
        let a = 2 * i;
        indices.extend_from_slice(&[a, a + 1, a + 2, a + 2, a + 1, a + 3]);
    }
    MeshData {
        positions,
        normals: None,
        indices,
        material,
    }
}
