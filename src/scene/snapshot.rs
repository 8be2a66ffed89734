//! Published scene state.
//!
//! A [`SceneSnapshot`] is immutable once published. Static and dynamic
//! arrays sit behind separate `Arc`s so publishing after a move shares the
//! static tier with the previous snapshot instead of copying it.

use std::sync::Arc;

use parking_lot::RwLock;

use super::bindings::TriangleMaterialBinding;
use super::bvh::BvhNode;
use super::instances::GpuInstance;
use super::materials::MaterialTable;
use crate::gpu::{ArrayKind, ArraySizes, BindGroupDesc, BufferLayout, Capacities};

/// Arrays bound in group 1. They only grow, and only on commit.
#[derive(Debug, Clone, Default)]
pub struct StaticArrays {
    pub vertices: Vec<[f32; 4]>,
    pub normals: Vec<[f32; 4]>,
    pub bindings: Vec<TriangleMaterialBinding>,
    pub materials: MaterialTable,
    pub blas_nodes: Vec<BvhNode>,
}

/// Arrays bound in group 2. Rebuilt whenever an instance changes.
#[derive(Debug, Clone)]
pub struct DynamicArrays {
    pub instances: Vec<GpuInstance>,
    pub tlas_nodes: Vec<BvhNode>,
}

impl Default for DynamicArrays {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            tlas_nodes: vec![BvhNode::EMPTY],
        }
    }
}

/// Element counts of both tiers.
pub fn array_sizes(s: &StaticArrays, d: &DynamicArrays) -> ArraySizes {
    ArraySizes::default()
        .with(ArrayKind::Vertices, s.vertices.len() as u64)
        .with(ArrayKind::Normals, s.normals.len() as u64)
        .with(ArrayKind::TriangleBindings, s.bindings.len() as u64)
        .with(ArrayKind::Materials, s.materials.len() as u64)
        .with(ArrayKind::BlasNodes, s.blas_nodes.len() as u64)
        .with(ArrayKind::Instances, d.instances.len() as u64)
        .with(ArrayKind::TlasNodes, d.tlas_nodes.len() as u64)
}

/// One consistent published state of the scene.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    /// Bumped on every publish.
    pub generation: u64,
    /// Bumped when the static tier changed; group 1 is stale when it differs.
    pub static_generation: u64,
    /// Bumped when the dynamic tier changed.
    pub dynamic_generation: u64,
    pub layout: BufferLayout,
    /// Groups 0, 1, 2.
    pub bind_groups: [BindGroupDesc; 3],
    /// Buffer sizes the layout was fitted into.
    pub capacities: Capacities,
    pub static_data: Arc<StaticArrays>,
    pub dynamic_data: Arc<DynamicArrays>,
}

impl SceneSnapshot {
    /// Contents of one logical array, ready to write at
    /// `layout.slice(kind).offset`.
    pub fn array_bytes(&self, kind: ArrayKind) -> &[u8] {
        let s = &*self.static_data;
        let d = &*self.dynamic_data;
        match kind {
            ArrayKind::Vertices => bytemuck::cast_slice(&s.vertices),
            ArrayKind::Normals => bytemuck::cast_slice(&s.normals),
            ArrayKind::TriangleBindings => bytemuck::cast_slice(&s.bindings),
            ArrayKind::Materials => s.materials.as_bytes(),
            ArrayKind::BlasNodes => bytemuck::cast_slice(&s.blas_nodes),
            ArrayKind::Instances => bytemuck::cast_slice(&d.instances),
            ArrayKind::TlasNodes => bytemuck::cast_slice(&d.tlas_nodes),
        }
    }

    pub fn instance_count(&self) -> usize {
        self.dynamic_data.instances.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.static_data.bindings.len()
    }

    /// Both snapshots hold the very same static arrays.
    pub fn shares_static(&self, other: &SceneSnapshot) -> bool {
        self.static_generation == other.static_generation
            && Arc::ptr_eq(&self.static_data, &other.static_data)
    }
}

/// Handle to the latest published snapshot, shared between the builder and
/// readers. Readers clone the `Arc` and keep a consistent view for as long as
/// they hold it.
#[derive(Debug, Clone)]
pub struct SharedScene {
    inner: Arc<RwLock<Arc<SceneSnapshot>>>,
}

impl SharedScene {
    pub fn new(snapshot: SceneSnapshot) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// Current snapshot.
    pub fn load(&self) -> Arc<SceneSnapshot> {
        self.inner.read().clone()
    }

    pub(crate) fn store(&self, snapshot: Arc<SceneSnapshot>) {
        *self.inner.write() = snapshot;
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }
}
