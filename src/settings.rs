//! Persistent builder settings

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::gpu::LayoutConfig;
use crate::model::PlacementOptions;
use crate::util::Result;

/// Settings that persist between sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    // Geometry
    pub smooth_angle: f32, // 0-180 degrees

    // Buffer layout (overridden by device limits when a device is present)
    pub storage_offset_alignment: u64,
    pub max_buffer_size: u64,
    pub max_binding_size: u64,
    pub initial_capacity: u64,

    // Placement of freshly loaded models
    pub placement: PlacementOptions,

    // Relative model sources resolve against this directory
    pub model_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let layout = LayoutConfig::default();
        Self {
            smooth_angle: 45.0,
            storage_offset_alignment: layout.storage_offset_alignment,
            max_buffer_size: layout.max_buffer_size,
            max_binding_size: layout.max_binding_size,
            initial_capacity: layout.min_capacity,
            placement: PlacementOptions::default(),
            model_root: None,
        }
    }
}

impl Settings {
    /// Get settings file path
    pub fn path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("roomtrace");
            p.push("settings.json");
            p
        })
    }

    /// Load settings from the config directory, defaults when missing or unreadable
    pub fn load() -> Self {
        match Self::path() {
            Some(p) if p.exists() => Self::load_from(&p).unwrap_or_else(|e| {
                tracing::warn!(path = %p.display(), error = %e, "ignoring unreadable settings");
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Load settings from `path`, reporting I/O and parse errors
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut settings: Self = serde_json::from_str(&text)?;
        settings.sanitize();
        Ok(settings)
    }

    /// Save settings to the config directory
    pub fn save(&self) -> Result<()> {
        match Self::path() {
            Some(p) => self.save_to(&p),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Layout limits described by these settings.
    pub fn layout_config(&self) -> LayoutConfig {
        LayoutConfig {
            storage_offset_alignment: self.storage_offset_alignment,
            max_buffer_size: self.max_buffer_size,
            max_binding_size: self.max_binding_size,
            min_capacity: self.initial_capacity,
        }
    }

    fn sanitize(&mut self) {
        self.smooth_angle = self.smooth_angle.clamp(0.0, 180.0);
        if !self.storage_offset_alignment.is_power_of_two() {
            self.storage_offset_alignment = LayoutConfig::default().storage_offset_alignment;
        }
        self.max_binding_size = self.max_binding_size.min(self.max_buffer_size);
        self.initial_capacity = self.initial_capacity.clamp(4, self.max_buffer_size);
    }
}
