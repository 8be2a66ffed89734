//! Models loaded from JSON files on the worker thread and committed into a scene.

use std::sync::Arc;
use std::time::Duration;

use glam::{Mat4, Vec3};
use roomtrace::model::primitives::box_model;
use roomtrace::model::{ground_transform, MaterialDesc, PlacementOptions};
use roomtrace::prelude::*;
use roomtrace::scene::LoadResult;

const WAIT: Duration = Duration::from_secs(10);

fn write_model(dir: &std::path::Path, file: &str, tree: &ModelTree) {
    let json = serde_json::to_string(tree).unwrap();
    std::fs::write(dir.join(file), json).unwrap();
}

fn next(worker: &LoadWorker) -> LoadResult {
    worker.recv_timeout(WAIT).expect("loader did not answer")
}

#[test]
fn test_json_models_through_worker() {
    let dir = tempfile::tempdir().unwrap();
    let mut chair = box_model(Vec3::new(200.0, 450.0, 200.0), MaterialDesc::colored([0.6, 0.4, 0.2, 1.0], 0.7, 0.0));
    chair.name = String::new();
    write_model(dir.path(), "chair.json", &chair);
    write_model(dir.path(), "lamp.json", &box_model(Vec3::splat(100.0), MaterialDesc::default()));

    let settings = Settings {
        model_root: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    let loader = JsonModelLoader::with_root(dir.path());
    let worker = LoadWorker::spawn(Arc::new(loader), settings.smooth_angle);
    let mut scene = SceneBuilder::new(&settings).unwrap();

    let chair_id = scene.begin_placement(Mat4::IDENTITY);
    let lamp_id = scene.begin_placement(Mat4::from_translation(Vec3::X * 2.0));
    worker.request(chair_id, "chair.json").unwrap();
    worker.request(lamp_id, "lamp.json").unwrap();

    let first = next(&worker).apply(&mut scene).unwrap().unwrap();
    let second = next(&worker).apply(&mut scene).unwrap().unwrap();
    assert_eq!(first.placement, chair_id);
    assert_eq!(first.name, "chair");
    assert_eq!(second.placement, lamp_id);
    assert_eq!(second.ranges.triangle_offset, 12);
    assert_eq!(second.ranges.vertex_offset, 24);

    let snap = scene.publish_growing().unwrap();
    assert_eq!(snap.instance_count(), 2);
    assert_eq!(snap.triangle_count(), 24);
    assert_eq!(snap.static_data.materials.len(), 2);
}

#[test]
fn test_missing_file_cancels_placement() {
    let dir = tempfile::tempdir().unwrap();
    let worker = LoadWorker::spawn(Arc::new(JsonModelLoader::with_root(dir.path())), 45.0);
    let mut scene = SceneBuilder::with_config(LayoutConfig::default(), 45.0).unwrap();

    let id = scene.begin_placement(Mat4::IDENTITY);
    worker.request(id, "nowhere.json").unwrap();
    let err = next(&worker).apply(&mut scene).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert!(!scene.is_pending(id));
    assert!(!scene.is_dirty());
}

#[test]
fn test_ground_placement_of_millimetre_model() {
    // Authored Z-up in millimetres: 400 x 400 x 900 box standing on z = 0
    let mut tree = box_model(Vec3::new(200.0, 200.0, 450.0), MaterialDesc::default());
    tree.root.transform = Mat4::from_translation(Vec3::new(1000.0, 0.0, 450.0)).to_cols_array();

    let mut scene = SceneBuilder::new(&Settings::default()).unwrap();
    let report = scene.add_model_on_ground(&tree).unwrap();
    let model = scene.instance(report.placement).unwrap().model();
    assert_eq!(model, ground_transform(&tree, &PlacementOptions::default()));

    let world = scene.instance(report.placement).unwrap().world_bounds().unwrap();
    assert!(world.min.y.abs() < 1e-4, "{:?}", world.min);
    assert!((world.max.y - 0.9).abs() < 1e-4, "{:?}", world.max);
    assert!(world.center().x.abs() < 1e-4);
    assert!(world.center().z.abs() < 1e-4);
}
