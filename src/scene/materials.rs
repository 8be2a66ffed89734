//! Material table: append-only arena of GPU material records.

use bytemuck::{Pod, Zeroable};

use crate::model::MaterialDesc;
use crate::util::{Error, Result};

/// Material record for GPU storage (80 bytes, matches WGSL `Material`).
///
/// Layout in vec4 groups:
/// - `base_color`: rgba
/// - `emissive` + `emissive_intensity`
/// - `metalness`, `roughness`, `blend_mode`, `opacity_mask`
/// - `normal_scale`, `ior`, pad
/// - four texture indices (`NO_TEXTURE` when unbound)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuMaterial {
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub blend_mode: u32,
    pub opacity_mask: f32,
    pub normal_scale: [f32; 2],
    pub ior: f32,
    pub _pad0: f32,
    /// base color, occlusion-roughness-metalness, emissive, normal
    pub textures: [u32; 4],
}

impl From<&MaterialDesc> for GpuMaterial {
    fn from(desc: &MaterialDesc) -> Self {
        GpuMaterial {
            base_color: desc.base_color,
            emissive: desc.emissive,
            emissive_intensity: desc.emissive_intensity,
            metalness: desc.metalness,
            roughness: desc.roughness,
            blend_mode: desc.blend_mode.as_u32(),
            opacity_mask: desc.opacity_mask,
            normal_scale: desc.normal_scale,
            ior: desc.ior,
            _pad0: 0.0,
            textures: desc.textures.to_gpu(),
        }
    }
}

/// Ordered material records. The index returned by [`append`](Self::append)
/// is the material's identity everywhere else; entries are never modified or
/// removed, and equal materials are not merged.
#[derive(Debug, Clone, Default)]
pub struct MaterialTable {
    materials: Vec<GpuMaterial>,
}

impl MaterialTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a material and return its index.
    pub fn append(&mut self, material: GpuMaterial) -> u32 {
        let index = self.materials.len() as u32;
        self.materials.push(material);
        index
    }

    pub fn get(&self, index: usize) -> Result<&GpuMaterial> {
        self.materials.get(index).ok_or(Error::IndexOutOfRange {
            index,
            len: self.materials.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn as_slice(&self) -> &[GpuMaterial] {
        &self.materials
    }

    /// Material data as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.materials)
    }
}
