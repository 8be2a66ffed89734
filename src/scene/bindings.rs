//! Per-triangle vertex and material bindings.

use bytemuck::{Pod, Zeroable};

/// Triangle -> material binding for GPU storage (16 bytes, WGSL `vec4<u32>`).
///
/// Position in the binding array is the triangle id used by hit shading.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct TriangleMaterialBinding {
    pub v0: u32,
    pub v1: u32,
    pub v2: u32,
    pub material: u32,
}

impl TriangleMaterialBinding {
    pub fn vertices(&self) -> [u32; 3] {
        [self.v0, self.v1, self.v2]
    }

    /// Shift vertex and material indices into a larger array.
    #[inline]
    pub fn rebased(self, vertex_base: u32, material: u32) -> Self {
        Self {
            v0: self.v0 + vertex_base,
            v1: self.v1 + vertex_base,
            v2: self.v2 + vertex_base,
            material,
        }
    }
}

/// Emit one binding per index triple, in index-buffer order.
///
/// `vertex_base` is the number of vertices already concatenated in front of
/// this mesh in the vertex/normal arrays the indices will address.
pub fn push_mesh_bindings(
    indices: &[u32],
    vertex_base: u32,
    material: u32,
    out: &mut Vec<TriangleMaterialBinding>,
) {
    out.reserve(indices.len() / 3);
    out.extend(indices.chunks_exact(3).map(|t| TriangleMaterialBinding {
        v0: t[0] + vertex_base,
        v1: t[1] + vertex_base,
        v2: t[2] + vertex_base,
        material,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<TriangleMaterialBinding>(), 16);
    }

    #[test]
    fn test_two_meshes_are_rebased() {
        let mut out = Vec::new();
        push_mesh_bindings(&[0, 1, 2], 0, 0, &mut out);
        push_mesh_bindings(&[0, 1, 2], 3, 1, &mut out);
        assert_eq!(out[0].vertices(), [0, 1, 2]);
        assert_eq!(out[1].vertices(), [3, 4, 5]);
        assert_eq!(out[1].material, 1);
    }

    #[test]
    fn test_order_matches_index_buffer() {
        let mut out = Vec::new();
        push_mesh_bindings(&[2, 1, 0, 0, 2, 3], 10, 4, &mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].vertices(), [12, 11, 10]);
        assert_eq!(out[1].vertices(), [10, 12, 13]);
        assert_eq!(out[1].rebased(100, 9).vertices(), [110, 112, 113]);
    }
}
