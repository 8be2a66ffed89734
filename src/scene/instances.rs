//! Instance records: one per placed model.

use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use std::fmt;

use crate::util::{checked_inverse, Bounds, Error, Result};

/// `GpuInstance::flags` bit set when the matrices are usable.
pub const INSTANCE_VALID: u32 = 1;

/// Stable handle of a placed (or pending) model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlacementId(pub u64);

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Instance record for GPU storage (160 bytes, matches WGSL `Instance`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuInstance {
    pub tri_count: u32,
    pub material_count: u32,
    /// First triangle binding of the model.
    pub triangle_offset: u32,
    /// First material of the model.
    pub material_offset: u32,
    /// First vertex/normal of the model.
    pub vertex_offset: u32,
    /// Index of the model's BLAS root node.
    pub blas_root: u32,
    pub blas_node_count: u32,
    pub flags: u32,
    /// Object to world, column-major.
    pub model: [[f32; 4]; 4],
    /// World to object, zero when the instance is invalid.
    pub model_inverse: [[f32; 4]; 4],
}

/// Element ranges a model occupies in the shared scene arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InstanceRanges {
    pub tri_count: u32,
    pub material_count: u32,
    pub triangle_offset: u32,
    pub material_offset: u32,
    pub vertex_offset: u32,
    pub vertex_count: u32,
    pub blas_root: u32,
    pub blas_node_count: u32,
}

/// Host side instance: ranges plus the current world transform and inverse.
///
/// `inverse` is `Some` exactly when `inverse * model == I` holds.
#[derive(Debug, Clone)]
pub struct InstanceRecord {
    pub placement: PlacementId,
    pub ranges: InstanceRanges,
    /// Model-space bounds, used for the TLAS.
    pub local_bounds: Bounds,
    model: Mat4,
    inverse: Option<Mat4>,
}

impl InstanceRecord {
    /// Create a record. A singular transform yields an invalid instance
    /// (no inverse, excluded from the TLAS) instead of an error.
    pub fn new(
        placement: PlacementId,
        ranges: InstanceRanges,
        local_bounds: Bounds,
        model: Mat4,
    ) -> Self {
        let inverse = checked_inverse(&model);
        if inverse.is_none() {
            tracing::warn!(placement = %placement, "placed with a singular transform, instance invalid");
        }
        Self {
            placement,
            ranges,
            local_bounds,
            model,
            inverse,
        }
    }

    /// Replace the transform and recompute its inverse.
    ///
    /// On a singular transform nothing changes and `DegenerateTransform` is returned.
    pub fn set_transform(&mut self, model: Mat4) -> Result<()> {
        let inverse = checked_inverse(&model).ok_or(Error::DegenerateTransform {
            placement: self.placement.0,
        })?;
        self.model = model;
        self.inverse = Some(inverse);
        Ok(())
    }

    pub fn model(&self) -> Mat4 {
        self.model
    }

    pub fn inverse(&self) -> Option<Mat4> {
        self.inverse
    }

    pub fn is_valid(&self) -> bool {
        self.inverse.is_some()
    }

    /// World-space bounds, `None` for invalid or empty instances.
    pub fn world_bounds(&self) -> Option<Bounds> {
        if !self.is_valid() || self.ranges.tri_count == 0 || self.local_bounds.is_empty() {
            return None;
        }
        Some(self.local_bounds.transformed(&self.model))
    }

    /// Pack for GPU upload.
    pub fn to_gpu(&self) -> GpuInstance {
        let r = &self.ranges;
        GpuInstance {
            tri_count: r.tri_count,
            material_count: r.material_count,
            triangle_offset: r.triangle_offset,
            material_offset: r.material_offset,
            vertex_offset: r.vertex_offset,
            blas_root: r.blas_root,
            blas_node_count: r.blas_node_count,
            flags: if self.is_valid() { INSTANCE_VALID } else { 0 },
            model: self.model.to_cols_array_2d(),
            model_inverse: self.inverse.unwrap_or(Mat4::ZERO).to_cols_array_2d(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::is_identity;
    use glam::{Quat, Vec3};

    fn record(model: Mat4) -> InstanceRecord {
        let mut b = Bounds::EMPTY;
        b.expand(Vec3::ZERO);
        b.expand(Vec3::ONE);
        let ranges = InstanceRanges {
            tri_count: 12,
            ..Default::default()
        };
        InstanceRecord::new(PlacementId(7), ranges, b, model)
    }

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<GpuInstance>(), 160);
        assert_eq!(std::mem::offset_of!(GpuInstance, model), 32);
        assert_eq!(std::mem::offset_of!(GpuInstance, model_inverse), 96);
    }

    #[test]
    fn test_inverse_tracks_transform() {
        let mut r = record(Mat4::IDENTITY);
        let moved = Mat4::from_scale_rotation_translation(
            Vec3::splat(0.001),
            Quat::from_rotation_y(0.7),
            Vec3::new(3.0, 0.0, -1.5),
        );
        r.set_transform(moved).unwrap();
        let inv = r.inverse().unwrap();
        assert!(is_identity(&(inv * r.model()), 1e-4));

        let gpu = r.to_gpu();
        assert_eq!(gpu.flags, INSTANCE_VALID);
        let packed = Mat4::from_cols_array_2d(&gpu.model_inverse) * Mat4::from_cols_array_2d(&gpu.model);
        assert!(is_identity(&packed, 1e-4));
    }

    #[test]
    fn test_degenerate_update_keeps_previous() {
        let start = Mat4::from_translation(Vec3::new(1.0, 0.0, 2.0));
        let mut r = record(start);
        let before_inv = r.inverse().unwrap();

        let flat = Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0));
        let err = r.set_transform(flat).unwrap_err();
        assert!(matches!(err, Error::DegenerateTransform { placement: 7 }));
        assert_eq!(r.model(), start);
        assert_eq!(r.inverse(), Some(before_inv));
    }

    #[test]
    fn test_singular_placement_is_invalid_until_moved() {
        let mut r = record(Mat4::ZERO);
        assert!(!r.is_valid());
        assert!(r.world_bounds().is_none());
        let gpu = r.to_gpu();
        assert_eq!(gpu.flags, 0);
        assert_eq!(gpu.model_inverse, [[0.0; 4]; 4]);

        r.set_transform(Mat4::IDENTITY).unwrap();
        assert!(r.is_valid());
        assert!(r.world_bounds().is_some());
    }
}
