//! wgpu resources for published scene snapshots.
//!
//! ```ignore
//! let mut gpu = GpuScene::new(&device, &scene.shared().load());
//! // each frame:
//! gpu.sync(&device, &queue, &scene.shared().load());
//! gpu.write_uniforms(&queue, &FrameUniforms::new(view, proj, frame));
//! gpu.bind(&mut compute_pass);
//! ```

use super::bind_groups::{build_bind_groups, BindGroupDesc, BindingType, DYNAMIC_ARRAYS, STATIC_ARRAYS};
use super::{ArrayKind, FrameUniforms, PhysicalBuffer, SCENE_WGSL};
use crate::scene::SceneSnapshot;

/// Storage buffer and the capacity it was created with.
struct StorageBuffer {
    buffer: wgpu::Buffer,
    capacity: u64,
}

/// Physical buffers, bind group layouts and bind groups of one scene.
pub struct GpuScene {
    uniform: wgpu::Buffer,
    storage: [StorageBuffer; 4],
    layouts: [wgpu::BindGroupLayout; 3],
    groups: [Option<wgpu::BindGroup>; 3],
    static_generation: Option<u64>,
    dynamic_generation: Option<u64>,
}

impl GpuScene {
    /// Create buffers sized for `snapshot`. Call [`Self::sync`] to upload it.
    pub fn new(device: &wgpu::Device, snapshot: &SceneSnapshot) -> Self {
        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let storage = PhysicalBuffer::STORAGE
            .map(|b| create_storage(device, b, snapshot.capacities.get(b)));

        let descs = build_bind_groups(&snapshot.layout);
        let layouts = [
            create_layout(device, "scene_frame_bgl", &descs[0]),
            create_layout(device, "scene_static_bgl", &descs[1]),
            create_layout(device, "scene_dynamic_bgl", &descs[2]),
        ];

        let mut scene = Self {
            uniform,
            storage,
            layouts,
            groups: [None, None, None],
            static_generation: None,
            dynamic_generation: None,
        };
        scene.groups[0] = Some(scene.create_group(device, "scene_frame_bg", 0, &descs[0]));
        scene
    }

    /// WGSL declarations to prepend to a shader using these bind groups.
    pub fn shader_prelude() -> &'static str {
        SCENE_WGSL
    }

    pub fn bind_group_layouts(&self) -> [&wgpu::BindGroupLayout; 3] {
        [&self.layouts[0], &self.layouts[1], &self.layouts[2]]
    }

    /// Pipeline layout with groups 0..3 set to the scene layouts.
    pub fn pipeline_layout(&self, device: &wgpu::Device, label: &str) -> wgpu::PipelineLayout {
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &self.bind_group_layouts(),
            push_constant_ranges: &[],
        })
    }

    /// Bring buffers and bind groups up to date with `snapshot`.
    ///
    /// Buffers whose capacity changed are recreated, which invalidates every
    /// group that references them. Otherwise a tier is only rewritten when
    /// its generation moved.
    pub fn sync(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, snapshot: &SceneSnapshot) {
        let mut recreated = [false; 4];
        for (slot, buffer) in PhysicalBuffer::STORAGE.into_iter().enumerate() {
            let capacity = snapshot.capacities.get(buffer);
            if self.storage[slot].capacity != capacity {
                tracing::debug!(buffer = %buffer, capacity, "recreating scene buffer");
                self.storage[slot] = create_storage(device, buffer, capacity);
                recreated[slot] = true;
            }
        }
        let touched = |arrays: &[ArrayKind]| {
            arrays.iter().any(|k| {
                k.buffer()
                    .storage_index()
                    .is_some_and(|slot| recreated[slot])
            })
        };

        let [_, static_desc, dynamic_desc] = build_bind_groups(&snapshot.layout);

        if self.static_generation != Some(snapshot.static_generation) || touched(&STATIC_ARRAYS) {
            self.upload(queue, snapshot, &STATIC_ARRAYS);
            self.groups[1] = Some(self.create_group(device, "scene_static_bg", 1, &static_desc));
            self.static_generation = Some(snapshot.static_generation);
        }
        if self.dynamic_generation != Some(snapshot.dynamic_generation) || touched(&DYNAMIC_ARRAYS) {
            self.upload(queue, snapshot, &DYNAMIC_ARRAYS);
            self.groups[2] = Some(self.create_group(device, "scene_dynamic_bg", 2, &dynamic_desc));
            self.dynamic_generation = Some(snapshot.dynamic_generation);
        }
    }

    pub fn write_uniforms(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.uniform, 0, bytemuck::bytes_of(uniforms));
    }

    /// All groups exist once the first snapshot was synced.
    pub fn is_ready(&self) -> bool {
        self.groups.iter().all(Option::is_some)
    }

    pub fn bind_group(&self, group: u32) -> Option<&wgpu::BindGroup> {
        self.groups.get(group as usize).and_then(Option::as_ref)
    }

    /// Set groups 0..3 on a compute pass.
    pub fn bind(&self, pass: &mut wgpu::ComputePass<'_>) {
        for (i, group) in self.groups.iter().enumerate() {
            if let Some(group) = group {
                pass.set_bind_group(i as u32, group, &[]);
            }
        }
    }

    fn buffer(&self, buffer: PhysicalBuffer) -> &wgpu::Buffer {
        match buffer.storage_index() {
            Some(slot) => &self.storage[slot].buffer,
            None => &self.uniform,
        }
    }

    fn upload(&self, queue: &wgpu::Queue, snapshot: &SceneSnapshot, arrays: &[ArrayKind]) {
        for &kind in arrays {
            let bytes = snapshot.array_bytes(kind);
            if bytes.is_empty() {
                continue;
            }
            let slice = snapshot.layout.slice(kind);
            queue.write_buffer(self.buffer(slice.buffer), slice.offset, bytes);
        }
    }

    fn create_group(
        &self,
        device: &wgpu::Device,
        label: &str,
        index: usize,
        desc: &BindGroupDesc,
    ) -> wgpu::BindGroup {
        let entries: Vec<wgpu::BindGroupEntry<'_>> = desc
            .entries
            .iter()
            .map(|e| wgpu::BindGroupEntry {
                binding: e.binding,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: self.buffer(e.buffer),
                    offset: e.offset,
                    size: wgpu::BufferSize::new(e.size),
                }),
            })
            .collect();
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.layouts[index],
            entries: &entries,
        })
    }
}

fn create_storage(device: &wgpu::Device, buffer: PhysicalBuffer, capacity: u64) -> StorageBuffer {
    let label = format!("scene_{buffer}");
    StorageBuffer {
        buffer: device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label),
            size: capacity,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }),
        capacity,
    }
}

fn create_layout(device: &wgpu::Device, label: &str, desc: &BindGroupDesc) -> wgpu::BindGroupLayout {
    let entries: Vec<wgpu::BindGroupLayoutEntry> = desc
        .entries
        .iter()
        .map(|e| wgpu::BindGroupLayoutEntry {
            binding: e.binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: match e.ty {
                    BindingType::Uniform => wgpu::BufferBindingType::Uniform,
                    BindingType::ReadOnlyStorage => {
                        wgpu::BufferBindingType::Storage { read_only: true }
                    }
                },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        })
        .collect();
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}
