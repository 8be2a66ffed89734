//! Per-frame uniform block (bind group 0).

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Frame uniforms (160 bytes, matches WGSL `FrameUniforms`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    /// Inverse view matrix (world from view).
    pub inv_view: [[f32; 4]; 4],
    /// Inverse projection matrix (view from clip).
    pub inv_proj: [[f32; 4]; 4],
    /// Camera world position.
    pub position: [f32; 3],
    /// Frame count for progressive accumulation.
    pub frame_count: u32,
    /// Entries in the instance array.
    pub instance_count: u32,
    /// Nodes in the TLAS, 1 for an empty scene.
    pub tlas_node_count: u32,
    pub _pad: [u32; 2],
}

impl FrameUniforms {
    pub fn new(view: Mat4, proj: Mat4, frame_count: u32) -> Self {
        let inv_view = view.inverse();
        Self {
            inv_view: inv_view.to_cols_array_2d(),
            inv_proj: proj.inverse().to_cols_array_2d(),
            position: inv_view.transform_point3(Vec3::ZERO).to_array(),
            frame_count,
            instance_count: 0,
            tlas_node_count: 1,
            _pad: [0; 2],
        }
    }

    /// Fill in scene counts from a published snapshot.
    pub fn with_scene(mut self, snapshot: &crate::scene::SceneSnapshot) -> Self {
        self.instance_count = snapshot.dynamic_data.instances.len() as u32;
        self.tlas_node_count = snapshot.dynamic_data.tlas_nodes.len().max(1) as u32;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 160);
        assert_eq!(std::mem::offset_of!(FrameUniforms, frame_count), 140);
    }

    #[test]
    fn test_camera_position() {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(0.8, 1.5, 0.1, 100.0);
        let u = FrameUniforms::new(view, proj, 3);
        let p = Vec3::from(u.position);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 2.0, 5.0), 1e-4), "{p:?}");
        assert_eq!(u.frame_count, 3);
    }
}
