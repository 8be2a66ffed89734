//! Bind-group descriptors, split by how often their contents change.
//!
//! - group 0: frame uniforms, rewritten every frame
//! - group 1: static scene arrays, rebuilt when a model is added
//! - group 2: instances and TLAS, rebuilt when anything moves
//!
//! Binding slots inside a group follow the order of the arrays below and
//! match `shaders/scene.wgsl`.

use smallvec::SmallVec;

use super::{ArrayKind, BufferLayout, PhysicalBuffer};

pub const GROUP_FRAME: u32 = 0;
pub const GROUP_STATIC: u32 = 1;
pub const GROUP_DYNAMIC: u32 = 2;

/// Arrays bound in group 1, by binding slot.
pub const STATIC_ARRAYS: [ArrayKind; 5] = [
    ArrayKind::Vertices,
    ArrayKind::Normals,
    ArrayKind::TriangleBindings,
    ArrayKind::Materials,
    ArrayKind::BlasNodes,
];

/// Arrays bound in group 2, by binding slot.
pub const DYNAMIC_ARRAYS: [ArrayKind; 2] = [ArrayKind::Instances, ArrayKind::TlasNodes];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFrequency {
    PerFrame,
    PerScene,
    PerMove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingType {
    Uniform,
    ReadOnlyStorage,
}

/// One buffer binding inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBindingDesc {
    pub binding: u32,
    /// Logical array bound, `None` for the uniform block.
    pub array: Option<ArrayKind>,
    pub buffer: PhysicalBuffer,
    pub offset: u64,
    pub size: u64,
    pub ty: BindingType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindGroupDesc {
    pub group: u32,
    pub frequency: UpdateFrequency,
    pub entries: SmallVec<[BufferBindingDesc; 5]>,
}

impl BindGroupDesc {
    pub fn entry(&self, binding: u32) -> Option<&BufferBindingDesc> {
        self.entries.iter().find(|e| e.binding == binding)
    }

    /// Physical buffers referenced by this group.
    pub fn buffers(&self) -> SmallVec<[PhysicalBuffer; 4]> {
        let mut out: SmallVec<[PhysicalBuffer; 4]> = SmallVec::new();
        for e in &self.entries {
            if !out.contains(&e.buffer) {
                out.push(e.buffer);
            }
        }
        out
    }
}

fn storage_group(group: u32, frequency: UpdateFrequency, arrays: &[ArrayKind], layout: &BufferLayout) -> BindGroupDesc {
    let entries = arrays
        .iter()
        .enumerate()
        .map(|(slot, &kind)| {
            let slice = layout.slice(kind);
            BufferBindingDesc {
                binding: slot as u32,
                array: Some(kind),
                buffer: slice.buffer,
                offset: slice.offset,
                size: slice.size,
                ty: BindingType::ReadOnlyStorage,
            }
        })
        .collect();
    BindGroupDesc {
        group,
        frequency,
        entries,
    }
}

/// Descriptors for all three groups of `layout`.
pub fn build_bind_groups(layout: &BufferLayout) -> [BindGroupDesc; 3] {
    let mut frame = SmallVec::new();
    frame.push(BufferBindingDesc {
        binding: 0,
        array: None,
        buffer: PhysicalBuffer::Uniform,
        offset: 0,
        size: layout.required(PhysicalBuffer::Uniform),
        ty: BindingType::Uniform,
    });
    [
        BindGroupDesc {
            group: GROUP_FRAME,
            frequency: UpdateFrequency::PerFrame,
            entries: frame,
        },
        storage_group(GROUP_STATIC, UpdateFrequency::PerScene, &STATIC_ARRAYS, layout),
        storage_group(GROUP_DYNAMIC, UpdateFrequency::PerMove, &DYNAMIC_ARRAYS, layout),
    ]
}
