//! # roomtrace
//!
//! Scene-to-GPU acceleration-structure builder for a compute ray tracer.
//!
//! Models placed in a room are walked mesh by mesh, their triangles bound to
//! materials and packed, together with per-instance transforms and BVHs, into
//! a handful of storage buffers laid out for WGSL.
//!
//! ## Modules
//!
//! - [`util`] - Errors, bounds and matrix helpers
//! - [`model`] - Model trees, materials, loading and initial placement
//! - [`scene`] - Extraction, packing, BVHs and the scene builder
//! - [`gpu`] - Buffer layout, bind groups, uniforms and the wgpu consumer
//! - [`settings`] - Persistent settings
//!
//! ## Example
//!
//! ```ignore
//! use roomtrace::prelude::*;
//!
//! let mut scene = SceneBuilder::new(&Settings::load())?;
//! let tree = JsonModelLoader::new().load("chair.json")?;
//! let chair = scene.add_model_on_ground(&tree)?;
//! scene.translate_instance(chair.placement, Vec3::new(1.0, 0.0, 0.0))?;
//! let snapshot = scene.publish_growing()?;
//! ```

pub mod gpu;
pub mod model;
pub mod scene;
pub mod settings;
pub mod util;

// Re-export commonly used types
pub use util::{Error, Result};

/// Build date and time, stamped by the build script.
pub const BUILD_DATE: &str = env!("ROOMTRACE_BUILD_DATE");
pub const BUILD_TIME: &str = env!("ROOMTRACE_BUILD_TIME");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::gpu::{ArrayKind, BufferLayout, FrameUniforms, LayoutConfig, PhysicalBuffer};
    pub use crate::model::{JsonModelLoader, MaterialDesc, ModelLoader, ModelTree, Node};
    pub use crate::scene::{
        LoadWorker, PlacementId, PlacementReport, SceneBuilder, SceneSnapshot, SharedScene,
    };
    pub use crate::settings::Settings;
    pub use crate::util::{Bounds, Error, Mat4, Result, Vec3};
}
