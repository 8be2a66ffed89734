//! Material descriptors as they arrive from a model loader.
//!
//! `MaterialDesc` is a closed record: every field has a fixed type and the
//! texture slots are explicit `Option`s. It is validated once at ingestion,
//! packing into the GPU record afterwards cannot fail.

use serde::{Deserialize, Serialize};

use crate::util::{Error, Result};

/// Texture slot value meaning "no texture bound".
pub const NO_TEXTURE: u32 = u32::MAX;

/// How the material's alpha is used by the shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlendMode {
    #[default]
    Opaque,
    Mask,
    Blend,
}

impl BlendMode {
    /// Value written to the GPU record.
    pub fn as_u32(self) -> u32 {
        match self {
            BlendMode::Opaque => 0,
            BlendMode::Mask => 1,
            BlendMode::Blend => 2,
        }
    }
}

/// Indices into the consumer's texture array, one per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextureSlots {
    pub base_color: Option<u32>,
    /// Packed occlusion / roughness / metalness.
    pub orm: Option<u32>,
    pub emissive: Option<u32>,
    pub normal: Option<u32>,
}

impl TextureSlots {
    /// Slots in GPU order with `NO_TEXTURE` for empty ones.
    pub fn to_gpu(&self) -> [u32; 4] {
        [self.base_color, self.orm, self.emissive, self.normal].map(|t| t.unwrap_or(NO_TEXTURE))
    }
}

/// Surface description of one mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    /// Source name, kept for diagnostics only.
    pub name: Option<String>,
    pub base_color: [f32; 4],
    pub emissive: [f32; 3],
    pub emissive_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub blend_mode: BlendMode,
    /// Alpha-test threshold, 0 when unused.
    pub opacity_mask: f32,
    pub normal_scale: [f32; 2],
    pub ior: f32,
    pub textures: TextureSlots,
}

impl Default for MaterialDesc {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [1.0, 1.0, 1.0, 1.0],
            emissive: [0.0; 3],
            emissive_intensity: 1.0,
            metalness: 0.0,
            roughness: 1.0,
            blend_mode: BlendMode::Opaque,
            opacity_mask: 0.0,
            normal_scale: [1.0, 1.0],
            ior: 1.5,
            textures: TextureSlots::default(),
        }
    }
}

impl MaterialDesc {
    /// Plain colored material with the given roughness / metalness.
    pub fn colored(rgba: [f32; 4], roughness: f32, metalness: f32) -> Self {
        Self {
            base_color: rgba,
            roughness,
            metalness,
            ..Default::default()
        }
    }

    /// Display label for logs.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Check every field against the ranges the shader expects.
    pub fn validate(&self) -> Result<()> {
        let label = self.label();
        let unit = |field: &str, v: f32| -> Result<()> {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(Error::InvalidMaterial(format!(
                    "{label}: {field} = {v} is outside [0, 1]"
                )));
            }
            Ok(())
        };
        let finite = |field: &str, v: f32| -> Result<()> {
            if !v.is_finite() {
                return Err(Error::InvalidMaterial(format!("{label}: {field} is not finite")));
            }
            Ok(())
        };

        for c in self.base_color {
            unit("base_color", c)?;
        }
        for c in self.emissive {
            unit("emissive", c)?;
        }
        unit("metalness", self.metalness)?;
        unit("roughness", self.roughness)?;
        unit("opacity_mask", self.opacity_mask)?;
        finite("emissive_intensity", self.emissive_intensity)?;
        if self.emissive_intensity < 0.0 {
            return Err(Error::InvalidMaterial(format!(
                "{label}: negative emissive_intensity"
            )));
        }
        for s in self.normal_scale {
            finite("normal_scale", s)?;
        }
        finite("ior", self.ior)?;
        if self.ior < 1.0 {
            return Err(Error::InvalidMaterial(format!("{label}: ior {} < 1", self.ior)));
        }
        let t = &self.textures;
        if [t.base_color, t.orm, t.emissive, t.normal].contains(&Some(NO_TEXTURE)) {
            return Err(Error::InvalidMaterial(format!(
                "{label}: texture index {NO_TEXTURE} is reserved"
            )));
        }
        Ok(())
    }
}
