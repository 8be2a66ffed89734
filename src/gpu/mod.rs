//! GPU-facing side of the scene: physical buffers, array layout inside them,
//! bind-group descriptors and frame uniforms.
//!
//! Everything here except [`device`] is plain data and does not need a GPU.
//! The `wgpu` feature adds [`device::GpuScene`], which turns a published
//! snapshot into real buffers and bind groups.

mod bind_groups;
mod layout;
mod uniforms;

#[cfg(feature = "wgpu")]
pub mod device;

pub use bind_groups::{
    build_bind_groups, BindGroupDesc, BindingType, BufferBindingDesc, UpdateFrequency,
    DYNAMIC_ARRAYS, GROUP_DYNAMIC, GROUP_FRAME, GROUP_STATIC, STATIC_ARRAYS,
};
pub use layout::{
    align_up, grow_capacity, ArraySizes, ArraySlice, BufferLayout, Capacities, LayoutConfig,
};
pub use uniforms::FrameUniforms;

use std::fmt;

use crate::scene::{BvhNode, GpuInstance, GpuMaterial, TriangleMaterialBinding};

/// WGSL declarations of every record and binding in this module.
pub const SCENE_WGSL: &str = include_str!("shaders/scene.wgsl");

/// Physical GPU buffers the logical arrays are packed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PhysicalBuffer {
    Uniform,
    VertexNormal,
    TriangleMaterial,
    Blas,
    InstanceTlas,
}

impl PhysicalBuffer {
    pub const ALL: [Self; 5] = [
        Self::Uniform,
        Self::VertexNormal,
        Self::TriangleMaterial,
        Self::Blas,
        Self::InstanceTlas,
    ];

    /// Buffers holding storage arrays, in packing order.
    pub const STORAGE: [Self; 4] = [
        Self::VertexNormal,
        Self::TriangleMaterial,
        Self::Blas,
        Self::InstanceTlas,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Uniform => "uniform",
            Self::VertexNormal => "vertex_normal",
            Self::TriangleMaterial => "triangle_material",
            Self::Blas => "blas",
            Self::InstanceTlas => "instance_tlas",
        }
    }

    /// Position in [`Self::STORAGE`], `None` for the uniform buffer.
    pub fn storage_index(self) -> Option<usize> {
        match self {
            Self::Uniform => None,
            Self::VertexNormal => Some(0),
            Self::TriangleMaterial => Some(1),
            Self::Blas => Some(2),
            Self::InstanceTlas => Some(3),
        }
    }

    /// Arrays packed into this buffer, in packing order.
    pub fn arrays(self) -> &'static [ArrayKind] {
        match self {
            Self::Uniform => &[],
            Self::VertexNormal => &[ArrayKind::Vertices, ArrayKind::Normals],
            Self::TriangleMaterial => &[ArrayKind::TriangleBindings, ArrayKind::Materials],
            Self::Blas => &[ArrayKind::BlasNodes],
            Self::InstanceTlas => &[ArrayKind::Instances, ArrayKind::TlasNodes],
        }
    }
}

impl fmt::Display for PhysicalBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical arrays of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ArrayKind {
    Vertices,
    Normals,
    TriangleBindings,
    Materials,
    BlasNodes,
    Instances,
    TlasNodes,
}

impl ArrayKind {
    pub const ALL: [Self; 7] = [
        Self::Vertices,
        Self::Normals,
        Self::TriangleBindings,
        Self::Materials,
        Self::BlasNodes,
        Self::Instances,
        Self::TlasNodes,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Element size in bytes (WGSL array stride).
    pub fn stride(self) -> u64 {
        let size = match self {
            Self::Vertices | Self::Normals => std::mem::size_of::<[f32; 4]>(),
            Self::TriangleBindings => std::mem::size_of::<TriangleMaterialBinding>(),
            Self::Materials => std::mem::size_of::<GpuMaterial>(),
            Self::BlasNodes | Self::TlasNodes => std::mem::size_of::<BvhNode>(),
            Self::Instances => std::mem::size_of::<GpuInstance>(),
        };
        size as u64
    }

    pub fn buffer(self) -> PhysicalBuffer {
        match self {
            Self::Vertices | Self::Normals => PhysicalBuffer::VertexNormal,
            Self::TriangleBindings | Self::Materials => PhysicalBuffer::TriangleMaterial,
            Self::BlasNodes => PhysicalBuffer::Blas,
            Self::Instances | Self::TlasNodes => PhysicalBuffer::InstanceTlas,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Vertices => "vertices",
            Self::Normals => "normals",
            Self::TriangleBindings => "triangle_bindings",
            Self::Materials => "materials",
            Self::BlasNodes => "blas_nodes",
            Self::Instances => "instances",
            Self::TlasNodes => "tlas_nodes",
        }
    }
}

impl fmt::Display for ArrayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
