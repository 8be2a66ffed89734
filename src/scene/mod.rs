//! Scene packing: from model trees to the arrays bound on the GPU.
//!
//! Pipeline for one model:
//! 1. [`extract`] walks the tree and yields mesh records in a fixed order
//! 2. [`prepare_model`] packs them with model-local indices and a BLAS
//! 3. [`SceneBuilder::commit`] appends to the scene arenas, rebasing indices
//! 4. [`SceneBuilder::publish`] lays out the buffers and swaps the snapshot

mod bindings;
mod build;
mod builder;
mod bvh;
mod extract;
mod instances;
mod materials;
mod prepare;
mod snapshot;
mod worker;

pub use bindings::{push_mesh_bindings, TriangleMaterialBinding};
pub use build::build_bvh;
pub use builder::{PlacementReport, SceneBuilder};
pub use bvh::{Aabb, BvhNode};
pub use extract::{extract, extract_par, MeshRecord, MeshRecords};
pub use instances::{GpuInstance, InstanceRanges, InstanceRecord, PlacementId, INSTANCE_VALID};
pub use materials::{GpuMaterial, MaterialTable};
pub use prepare::{prepare_model, PreparedModel};
pub use snapshot::{array_sizes, DynamicArrays, SceneSnapshot, SharedScene, StaticArrays};
pub use worker::{LoadCommand, LoadResult, LoadWorker};
