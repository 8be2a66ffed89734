//! Scene builder: owns the scene arenas, commits prepared models and
//! publishes snapshots.
//!
//! Mutation happens here only, on one thread. A model is appended in one step
//! from a fully assembled [`PreparedModel`], so a model either lands in the
//! scene completely or not at all. Readers only ever see published
//! [`SceneSnapshot`]s through [`SharedScene`].

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Mat4, Vec3};

use super::build::build_bvh;
use super::bvh::Aabb;
use super::instances::{InstanceRanges, InstanceRecord, PlacementId};
use super::materials::{GpuMaterial, MaterialTable};
use super::prepare::{prepare_model, PreparedModel};
use super::snapshot::{array_sizes, DynamicArrays, SceneSnapshot, SharedScene, StaticArrays};
use crate::gpu::{
    build_bind_groups, grow_capacity, ArrayKind, BufferLayout, Capacities, LayoutConfig,
    PhysicalBuffer,
};
use crate::model::{ground_transform, ModelTree, PlacementOptions};
use crate::settings::Settings;
use crate::util::{checked_inverse, Error, Result};

/// Outcome of committing one model.
#[derive(Debug)]
pub struct PlacementReport {
    pub placement: PlacementId,
    pub name: String,
    pub ranges: InstanceRanges,
    /// False when placed with a singular transform.
    pub valid: bool,
    /// Meshes left out of the model.
    pub skipped: Vec<Error>,
}

pub struct SceneBuilder {
    config: LayoutConfig,
    smooth_angle: f32,
    placement: PlacementOptions,

    static_data: Arc<StaticArrays>,
    dynamic_data: Arc<DynamicArrays>,
    instances: Vec<InstanceRecord>,
    /// Placements waiting for their model, with the requested transform.
    pending: HashMap<PlacementId, Mat4>,
    next_placement: u64,

    capacities: Capacities,
    static_dirty: bool,
    dynamic_dirty: bool,
    generation: u64,
    static_generation: u64,
    dynamic_generation: u64,
    shared: SharedScene,
}

impl SceneBuilder {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = Self::with_config(settings.layout_config(), settings.smooth_angle)?;
        builder.placement = settings.placement;
        Ok(builder)
    }

    /// Builder with explicit limits, e.g. from [`LayoutConfig::from_limits`].
    pub fn with_config(config: LayoutConfig, smooth_angle: f32) -> Result<Self> {
        let static_data = Arc::new(StaticArrays::default());
        let dynamic_data = Arc::new(DynamicArrays::default());

        let layout = BufferLayout::plan(&array_sizes(&static_data, &dynamic_data), &config)?;
        let mut capacities = Capacities::uniform(config.min_capacity);
        capacities.cover(&layout);

        let shared = SharedScene::new(SceneSnapshot {
            generation: 0,
            static_generation: 0,
            dynamic_generation: 0,
            bind_groups: build_bind_groups(&layout),
            layout,
            capacities,
            static_data: static_data.clone(),
            dynamic_data: dynamic_data.clone(),
        });

        Ok(Self {
            config,
            smooth_angle,
            placement: PlacementOptions::default(),
            static_data,
            dynamic_data,
            instances: Vec::new(),
            pending: HashMap::new(),
            next_placement: 1,
            capacities,
            static_dirty: false,
            dynamic_dirty: false,
            generation: 0,
            static_generation: 0,
            dynamic_generation: 0,
            shared,
        })
    }

    // ------------------------------------------------------------------
    // Placement
    // ------------------------------------------------------------------

    /// Prepare `tree` on this thread and commit it at `transform`.
    pub fn add_model(&mut self, tree: &ModelTree, transform: Mat4) -> Result<PlacementReport> {
        let prepared = prepare_model(tree, self.smooth_angle);
        self.commit(prepared, transform)
    }

    /// Add `tree` resting on the ground plane per the placement settings.
    pub fn add_model_on_ground(&mut self, tree: &ModelTree) -> Result<PlacementReport> {
        let transform = ground_transform(tree, &self.placement);
        self.add_model(tree, transform)
    }

    /// Append a prepared model under a fresh placement id.
    pub fn commit(&mut self, prepared: PreparedModel, transform: Mat4) -> Result<PlacementReport> {
        let id = self.allocate_placement();
        self.commit_as(id, prepared, transform)
    }

    /// Reserve a placement whose model is still loading.
    pub fn begin_placement(&mut self, transform: Mat4) -> PlacementId {
        let id = self.allocate_placement();
        self.pending.insert(id, transform);
        id
    }

    /// Commit the model of a pending placement.
    ///
    /// Returns `Ok(None)` when the placement was removed while loading; the
    /// model is dropped.
    pub fn finish_placement(
        &mut self,
        id: PlacementId,
        prepared: PreparedModel,
    ) -> Result<Option<PlacementReport>> {
        match self.pending.remove(&id) {
            Some(transform) => self.commit_as(id, prepared, transform).map(Some),
            None => {
                tracing::debug!(placement = %id, model = %prepared.name, "discarding load for removed placement");
                Ok(None)
            }
        }
    }

    /// Remove a placed instance or cancel a pending one. Geometry stays in the
    /// static arrays.
    pub fn remove(&mut self, id: PlacementId) -> Result<()> {
        if self.pending.remove(&id).is_some() {
            tracing::debug!(placement = %id, "pending placement cancelled");
            return Ok(());
        }
        let index = self.position(id)?;
        self.instances.remove(index);
        self.dynamic_dirty = true;
        Ok(())
    }

    pub fn is_pending(&self, id: PlacementId) -> bool {
        self.pending.contains_key(&id)
    }

    fn allocate_placement(&mut self) -> PlacementId {
        let id = PlacementId(self.next_placement);
        self.next_placement += 1;
        id
    }

    fn commit_as(
        &mut self,
        id: PlacementId,
        prepared: PreparedModel,
        transform: Mat4,
    ) -> Result<PlacementReport> {
        // Every check runs before the first write
        check_prepared(&prepared)?;
        let s = &*self.static_data;
        let vertex_offset = index_base(PhysicalBuffer::VertexNormal, s.vertices.len(), prepared.positions.len())?;
        let triangle_offset = index_base(PhysicalBuffer::TriangleMaterial, s.bindings.len(), prepared.bindings.len())?;
        let material_offset = index_base(PhysicalBuffer::TriangleMaterial, s.materials.len(), prepared.materials.len())?;
        let blas_root = index_base(PhysicalBuffer::Blas, s.blas_nodes.len(), prepared.blas.len())?;

        let ranges = InstanceRanges {
            tri_count: prepared.bindings.len() as u32,
            material_count: prepared.materials.len() as u32,
            triangle_offset,
            material_offset,
            vertex_offset,
            vertex_count: prepared.positions.len() as u32,
            blas_root,
            blas_node_count: prepared.blas.len() as u32,
        };

        let s = Arc::make_mut(&mut self.static_data);
        let material_ids: Vec<u32> = prepared
            .materials
            .iter()
            .map(|m| s.materials.append(*m))
            .collect();
        s.vertices.extend_from_slice(&prepared.positions);
        s.normals.extend_from_slice(&prepared.normals);
        s.bindings.extend(
            prepared
                .bindings
                .iter()
                .map(|b| b.rebased(vertex_offset, material_ids[b.material as usize])),
        );
        s.blas_nodes.extend(
            prepared
                .blas
                .iter()
                .map(|n| n.rebased(blas_root, triangle_offset)),
        );

        let record = InstanceRecord::new(id, ranges, prepared.local_bounds, transform);
        let valid = record.is_valid();
        self.instances.push(record);
        self.static_dirty = true;
        self.dynamic_dirty = true;

        tracing::info!(
            placement = %id,
            model = %prepared.name,
            triangles = ranges.tri_count,
            materials = ranges.material_count,
            skipped = prepared.skipped.len(),
            "model committed"
        );
        if ranges.tri_count == 0 {
            tracing::warn!(placement = %id, model = %prepared.name, "model has no usable meshes");
        }

        Ok(PlacementReport {
            placement: id,
            name: prepared.name,
            ranges,
            valid,
            skipped: prepared.skipped,
        })
    }

    // ------------------------------------------------------------------
    // Transforms
    // ------------------------------------------------------------------

    /// Set the world transform of a placed or pending instance.
    ///
    /// A singular `transform` fails with `DegenerateTransform` and the
    /// instance keeps its previous transform.
    pub fn move_instance(&mut self, id: PlacementId, transform: Mat4) -> Result<()> {
        if let Some(pending) = self.pending.get_mut(&id) {
            if checked_inverse(&transform).is_none() {
                tracing::warn!(placement = %id, "rejected singular transform for pending placement");
                return Err(Error::DegenerateTransform { placement: id.0 });
            }
            *pending = transform;
            return Ok(());
        }
        let index = self.position(id)?;
        if let Err(e) = self.instances[index].set_transform(transform) {
            tracing::warn!(placement = %id, "rejected singular transform");
            return Err(e);
        }
        self.dynamic_dirty = true;
        Ok(())
    }

    /// Move an instance, placed or pending, by `delta` in world space.
    pub fn translate_instance(&mut self, id: PlacementId, delta: Vec3) -> Result<()> {
        let model = match self.pending.get(&id) {
            Some(pending) => *pending,
            None => self.instance(id)?.model(),
        };
        self.move_instance(id, Mat4::from_translation(delta) * model)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn instance(&self, id: PlacementId) -> Result<&InstanceRecord> {
        let index = self.position(id)?;
        Ok(&self.instances[index])
    }

    /// Placed instances in instance-array order.
    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    pub fn material(&self, index: usize) -> Result<&GpuMaterial> {
        self.static_data.materials.get(index)
    }

    pub fn materials(&self) -> &MaterialTable {
        &self.static_data.materials
    }

    pub fn static_arrays(&self) -> &StaticArrays {
        &self.static_data
    }

    pub fn capacities(&self) -> &Capacities {
        &self.capacities
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn smooth_angle(&self) -> f32 {
        self.smooth_angle
    }

    /// Changes not yet published.
    pub fn is_dirty(&self) -> bool {
        self.static_dirty || self.dynamic_dirty
    }

    /// Handle readers use to get the latest snapshot.
    pub fn shared(&self) -> SharedScene {
        self.shared.clone()
    }

    fn position(&self, id: PlacementId) -> Result<usize> {
        self.instances
            .iter()
            .position(|r| r.placement == id)
            .ok_or(Error::UnknownPlacement(id.0))
    }

    // ------------------------------------------------------------------
    // Publishing
    // ------------------------------------------------------------------

    /// Lay out the current arrays in the current buffers and publish.
    ///
    /// On `BufferCapacityExceeded` nothing is published and the builder is
    /// unchanged; grow with [`Self::grow`] or use [`Self::publish_growing`].
    #[tracing::instrument(skip_all, fields(generation = self.generation + 1))]
    pub fn publish(&mut self) -> Result<Arc<SceneSnapshot>> {
        let dynamic_data = if self.dynamic_dirty {
            Arc::new(self.build_dynamic())
        } else {
            self.dynamic_data.clone()
        };

        let sizes = array_sizes(&self.static_data, &dynamic_data);
        let layout = BufferLayout::fit(&sizes, &self.capacities, &self.config)?;

        if self.static_dirty {
            self.static_generation += 1;
        }
        if self.dynamic_dirty {
            self.dynamic_generation += 1;
        }
        self.generation += 1;
        self.static_dirty = false;
        self.dynamic_dirty = false;
        self.dynamic_data = dynamic_data;

        let snapshot = Arc::new(SceneSnapshot {
            generation: self.generation,
            static_generation: self.static_generation,
            dynamic_generation: self.dynamic_generation,
            bind_groups: build_bind_groups(&layout),
            layout,
            capacities: self.capacities,
            static_data: self.static_data.clone(),
            dynamic_data: self.dynamic_data.clone(),
        });
        self.shared.store(snapshot.clone());

        tracing::debug!(
            instances = sizes.get(ArrayKind::Instances),
            triangles = sizes.get(ArrayKind::TriangleBindings),
            materials = sizes.get(ArrayKind::Materials),
            "scene published"
        );
        Ok(snapshot)
    }

    /// Publish, growing buffers as needed within the device limits.
    pub fn publish_growing(&mut self) -> Result<Arc<SceneSnapshot>> {
        loop {
            match self.publish() {
                Err(Error::BufferCapacityExceeded { buffer, required, .. }) => {
                    self.grow(buffer, required)?;
                }
                other => return other,
            }
        }
    }

    /// Grow `buffer` so it holds at least `required` bytes.
    pub fn grow(&mut self, buffer: PhysicalBuffer, required: u64) -> Result<u64> {
        let from = self.capacities.get(buffer);
        let grown = grow_capacity(buffer, required, &self.config)?;
        if grown > from {
            tracing::info!(buffer = %buffer, from, to = grown, "growing buffer");
            self.capacities.set(buffer, grown);
        }
        Ok(grown)
    }

    /// Instance array and TLAS over the valid, non-empty instances.
    fn build_dynamic(&self) -> DynamicArrays {
        let instances = self.instances.iter().map(InstanceRecord::to_gpu).collect();

        let mut bounds = Vec::with_capacity(self.instances.len());
        let mut owners = Vec::with_capacity(self.instances.len());
        for (i, record) in self.instances.iter().enumerate() {
            if let Some(b) = record.world_bounds() {
                bounds.push(Aabb::from(b));
                owners.push(i as u32);
            }
        }

        let mut tlas_nodes = build_bvh(&bounds);
        for node in tlas_nodes.iter_mut().filter(|n| n.is_leaf()) {
            node.left_or_first = owners[node.left_or_first as usize];
        }

        DynamicArrays {
            instances,
            tlas_nodes,
        }
    }
}

/// Current length of a scene array as the base index of the next model,
/// checking the grown array stays addressable with `u32` indices.
fn index_base(buffer: PhysicalBuffer, current: usize, added: usize) -> Result<u32> {
    let total = current as u64 + added as u64;
    if total > u32::MAX as u64 {
        return Err(Error::SceneTooLarge {
            buffer,
            required: total,
            limit: u32::MAX as u64,
        });
    }
    Ok(current as u32)
}

/// Reject a prepared model whose arrays do not reference each other
/// consistently. Models from [`prepare_model`] always pass.
fn check_prepared(prepared: &PreparedModel) -> Result<()> {
    let vertices = prepared.positions.len();
    if prepared.normals.len() != vertices {
        return Err(Error::missing_geometry(
            prepared.name.as_str(),
            format!("{} normals for {vertices} vertices", prepared.normals.len()),
        ));
    }
    let materials = prepared.materials.len();
    for b in &prepared.bindings {
        if b.material as usize >= materials {
            return Err(Error::IndexOutOfRange {
                index: b.material as usize,
                len: materials,
            });
        }
        if let Some(&v) = b.vertices().iter().find(|&&v| v as usize >= vertices) {
            return Err(Error::IndexOutOfRange {
                index: v as usize,
                len: vertices,
            });
        }
    }
    let nodes = prepared.blas.len();
    let triangles = prepared.bindings.len();
    for n in &prepared.blas {
        let (index, len) = if n.is_leaf() {
            (n.left_or_first as usize + n.count as usize, triangles)
        } else if n.left_or_first == 0 {
            // root of an empty tree
            continue;
        } else {
            // both children
            (n.left_or_first as usize + 2, nodes)
        };
        if index > len {
            return Err(Error::IndexOutOfRange { index: index - 1, len });
        }
    }
    Ok(())
}
