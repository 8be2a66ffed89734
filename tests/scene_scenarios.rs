//! Multi-model scenes built through the public API.

use glam::{Mat4, Quat, Vec3};
use roomtrace::gpu::{ArrayKind, LayoutConfig, PhysicalBuffer};
use roomtrace::model::primitives::{box_model, strip_mesh};
use roomtrace::model::{MaterialDesc, MeshData, ModelTree, Node};
use roomtrace::scene::{SceneBuilder, INSTANCE_VALID};
use roomtrace::util::is_identity;
use roomtrace::Error;

fn material(i: usize) -> MaterialDesc {
    let mut m = MaterialDesc::colored([0.2 * i as f32 % 1.0, 0.5, 0.8, 1.0], 0.5, 0.0);
    m.name = Some(format!("mat{i}"));
    m
}

/// Model whose meshes are strips with the given triangle counts.
fn model(name: &str, triangles: &[u32]) -> ModelTree {
    let mut root = Node::group(name);
    for (i, &t) in triangles.iter().enumerate() {
        root = root.with_child(Node::with_mesh(format!("mesh{i}"), strip_mesh(t / 2, material(i))));
    }
    ModelTree::new(name, root)
}

fn single_triangle(m: MaterialDesc) -> MeshData {
    MeshData {
        positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]],
        normals: None,
        indices: vec![0, 1, 2],
        material: m,
    }
}

fn builder() -> SceneBuilder {
    SceneBuilder::with_config(LayoutConfig::default(), 45.0).unwrap()
}

#[test]
fn test_two_models_accumulate() {
    let mut scene = builder();
    let a = scene.add_model(&model("a", &[1000, 600, 400]), Mat4::IDENTITY).unwrap();
    let b = scene
        .add_model(&model("b", &[500]), Mat4::from_translation(Vec3::X * 10.0))
        .unwrap();

    assert_eq!(scene.materials().len(), 4);
    assert_eq!(scene.static_arrays().bindings.len(), 2500);

    assert_eq!(a.ranges.tri_count, 2000);
    assert_eq!(a.ranges.material_count, 3);
    assert_eq!(b.ranges.tri_count, 500);
    assert_eq!(b.ranges.material_count, 1);
    assert_eq!(b.ranges.triangle_offset, 2000);
    assert_eq!(b.ranges.material_offset, 3);
    // 501 + 301 + 201 vertex pairs
    assert_eq!(b.ranges.vertex_offset, 2006);

    let bindings = &scene.static_arrays().bindings;
    assert!(bindings[..1000].iter().all(|t| t.material == 0));
    assert!(bindings[1000..1600].iter().all(|t| t.material == 1));
    assert!(bindings[1600..2000].iter().all(|t| t.material == 2));
    assert!(bindings[2000..].iter().all(|t| t.material == 3));
    assert!(bindings[2000..]
        .iter()
        .flat_map(|t| t.vertices())
        .all(|v| (2006..2006 + 502).contains(&v)));
    assert_eq!(scene.material(3).unwrap().base_color, material(0).base_color);

    let snap = scene.publish().unwrap();
    let instances = &snap.dynamic_data.instances;
    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].tri_count, 2000);
    assert_eq!(instances[1].tri_count, 500);
    assert_eq!(snap.layout.count(ArrayKind::TriangleBindings), 2500);
    assert_eq!(snap.layout.count(ArrayKind::TlasNodes), 3);
}

#[test]
fn test_malformed_mesh_is_skipped_and_reported() {
    let mut bad = strip_mesh(10, material(0));
    bad.indices.truncate(29);
    let tree = ModelTree::new(
        "partial",
        Node::group("root")
            .with_child(Node::with_mesh("bad", bad))
            .with_child(Node::with_mesh("good", strip_mesh(5, material(1)))),
    );
    let mut scene = builder();
    let report = scene.add_model(&tree, Mat4::IDENTITY).unwrap();
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(&report.skipped[0], Error::MissingGeometry { mesh, .. } if mesh == "root/bad"));
    assert_eq!(report.ranges.tri_count, 10);
    assert_eq!(report.ranges.material_count, 1);
}

#[test]
fn test_degenerate_move_keeps_matrices() {
    let mut scene = builder();
    let start = Mat4::from_scale_rotation_translation(
        Vec3::splat(0.001),
        Quat::from_rotation_x(-std::f32::consts::FRAC_PI_2),
        Vec3::new(1.0, 0.0, 2.0),
    );
    let a = scene.add_model(&model("a", &[1000, 600, 400]), start).unwrap();
    let before = scene.publish().unwrap();

    let flat = Mat4::from_cols(
        glam::Vec4::X,
        glam::Vec4::X,
        glam::Vec4::Z,
        glam::Vec4::W,
    );
    let err = scene.move_instance(a.placement, flat).unwrap_err();
    assert!(matches!(err, Error::DegenerateTransform { .. }));

    let record = scene.instance(a.placement).unwrap();
    assert_eq!(record.model(), start);
    assert!(is_identity(&(record.inverse().unwrap() * start), 1e-4));
    assert!(!scene.is_dirty());
    assert_eq!(scene.shared().load().generation, before.generation);
}

#[test]
fn test_inverse_holds_after_every_move() {
    let mut scene = builder();
    let r = scene.add_model(&box_model(Vec3::ONE, material(0)), Mat4::IDENTITY).unwrap();
    for step in 0..20 {
        let angle = step as f32 * 0.3;
        let m = Mat4::from_scale_rotation_translation(
            Vec3::splat(0.5 + step as f32 * 0.1),
            Quat::from_rotation_y(angle),
            Vec3::new(step as f32, 0.0, -(step as f32)),
        );
        scene.move_instance(r.placement, m).unwrap();
        let snap = scene.publish().unwrap();
        let inst = snap.dynamic_data.instances[0];
        assert_eq!(inst.flags, INSTANCE_VALID);
        let product = Mat4::from_cols_array_2d(&inst.model_inverse) * Mat4::from_cols_array_2d(&inst.model);
        assert!(is_identity(&product, 1e-4), "step {step}");
    }
}

#[test]
fn test_material_growth_past_capacity() {
    let config = LayoutConfig {
        min_capacity: 4096,
        ..Default::default()
    };
    let mut scene = SceneBuilder::with_config(config, 45.0).unwrap();
    let initial = scene.shared().load();

    let mut root = Node::group("many");
    for i in 0..40 {
        root = root.with_child(Node::with_mesh(format!("t{i}"), single_triangle(material(i))));
    }
    scene.add_model(&ModelTree::new("many", root), Mat4::IDENTITY).unwrap();

    let err = scene.publish().unwrap_err();
    let (buffer, required) = match err {
        Error::BufferCapacityExceeded { buffer, required, capacity } => {
            assert_eq!(capacity, 4096);
            (buffer, required)
        }
        other => panic!("unexpected {other}"),
    };
    assert_eq!(buffer, PhysicalBuffer::TriangleMaterial);
    assert_eq!(required, 1280 + 40 * 80);
    assert!(std::sync::Arc::ptr_eq(&scene.shared().load(), &initial));

    assert_eq!(scene.grow(buffer, required).unwrap(), 8192);
    let snap = scene.publish().unwrap();
    let layout = &snap.layout;

    let bindings = layout.slice(ArrayKind::TriangleBindings);
    assert_eq!((bindings.offset, bindings.size), (0, 640));
    let materials = layout.slice(ArrayKind::Materials);
    assert_eq!((materials.offset, materials.size), (1280, 3200));
    let normals = layout.slice(ArrayKind::Normals);
    assert_eq!((normals.offset, normals.size), (2048, 1920));
    assert_eq!(snap.capacities.get(PhysicalBuffer::TriangleMaterial), 8192);
    assert_eq!(snap.capacities.get(PhysicalBuffer::VertexNormal), 4096);

    // Same sizes fit the same way again
    let again = roomtrace::gpu::BufferLayout::fit(
        &roomtrace::scene::array_sizes(&snap.static_data, &snap.dynamic_data),
        &snap.capacities,
        &config,
    )
    .unwrap();
    assert_eq!(&again, layout);
}

#[test]
fn test_bytes_match_layout() {
    let mut scene = builder();
    scene.add_model(&model("a", &[40, 20]), Mat4::IDENTITY).unwrap();
    scene.add_model(&box_model(Vec3::ONE, material(3)), Mat4::IDENTITY).unwrap();
    let snap = scene.publish().unwrap();

    for kind in ArrayKind::ALL {
        let slice = snap.layout.slice(kind);
        let bytes = snap.array_bytes(kind);
        assert_eq!(bytes.len() as u64, slice.count * kind.stride(), "{kind}");
        assert!(bytes.len() as u64 <= slice.size);
    }
}

#[test]
fn test_removed_instance_leaves_geometry() {
    let mut scene = builder();
    let a = scene.add_model(&model("a", &[10]), Mat4::IDENTITY).unwrap();
    let b = scene.add_model(&model("b", &[6]), Mat4::from_translation(Vec3::Z * 5.0)).unwrap();
    let first = scene.publish().unwrap();

    scene.remove(a.placement).unwrap();
    let snap = scene.publish().unwrap();
    assert!(snap.shares_static(&first));
    assert_eq!(snap.instance_count(), 1);
    assert_eq!(snap.dynamic_data.instances[0].triangle_offset, b.ranges.triangle_offset);
    // single remaining instance is the TLAS root leaf
    assert_eq!(snap.dynamic_data.tlas_nodes.len(), 1);
    assert_eq!(snap.dynamic_data.tlas_nodes[0].left_or_first, 0);
    assert!(matches!(scene.instance(a.placement), Err(Error::UnknownPlacement(_))));
}
