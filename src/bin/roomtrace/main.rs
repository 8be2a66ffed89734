//! roomtrace CLI - inspect models and pack scenes into GPU buffer layouts.

use std::env;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context};
use roomtrace::gpu::{ArrayKind, PhysicalBuffer};
use roomtrace::model::primitives::box_model;
use roomtrace::prelude::*;
use roomtrace::scene::{extract, prepare_model};
use serde_json::json;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

#[cfg(feature = "trace")]
type TraceGuard = tracing_chrome::FlushGuard;
#[cfg(not(feature = "trace"))]
type TraceGuard = ();

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    // Parse global flags
    let mut level = "info";
    let mut filtered_args: Vec<&str> = Vec::new();
    for arg in &args {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            _ => filtered_args.push(arg),
        }
    }
    let _trace_guard = init_tracing(level);

    if filtered_args.is_empty() {
        print_help();
        return ExitCode::SUCCESS;
    }

    let rest = &filtered_args[1..];
    let result = match filtered_args[0] {
        "i" | "inspect" => cmd_inspect(rest),
        "p" | "pack" => cmd_pack(rest),
        "d" | "demo" => cmd_demo(rest),
        "V" | "version" | "--version" => {
            print_version();
            Ok(())
        }
        "h" | "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => Err(anyhow!("unknown command '{other}', see 'roomtrace help'")),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Console output filtered by `RUST_LOG` or the verbosity flags. With the
/// `trace` feature and `ROOMTRACE_TRACE=1` spans also go to `trace.json`.
fn init_tracing(default_level: &str) -> Option<TraceGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter).with(console);

    #[cfg(feature = "trace")]
    if env::var("ROOMTRACE_TRACE").ok().as_deref() == Some("1") {
        let (chrome_layer, guard) = tracing_chrome::ChromeLayerBuilder::new()
            .file("trace.json")
            .build();
        return registry.with(chrome_layer).try_init().ok().map(|_| guard);
    }

    let _ = registry.try_init();
    None
}

fn loader(settings: &Settings) -> JsonModelLoader {
    match &settings.model_root {
        Some(root) => JsonModelLoader::with_root(root),
        None => JsonModelLoader::new(),
    }
}

fn cmd_inspect(args: &[&str]) -> anyhow::Result<()> {
    let Some(&source) = args.first() else {
        bail!("missing model argument\nUsage: roomtrace inspect <model.json>");
    };
    let settings = Settings::load();
    let tree = loader(&settings)
        .load(source)
        .with_context(|| format!("failed to load {source}"))?;

    let bounds = tree.bounds();
    println!("Model: {}", tree.name);
    println!("Meshes: {}", tree.mesh_count());
    if !bounds.is_empty() {
        println!("Bounds: {:?} .. {:?}", bounds.min.to_array(), bounds.max.to_array());
    }
    println!();

    for record in extract(&tree, settings.smooth_angle) {
        match record {
            Ok(r) => println!(
                "  [{}] {:<40} {:>7} tris {:>7} verts  {}{}",
                r.ordinal,
                r.path,
                r.triangle_count(),
                r.vertex_count(),
                r.material.label(),
                if r.normals_generated { "  (normals generated)" } else { "" }
            ),
            Err(e) => println!("  skipped: {e}"),
        }
    }

    let prepared = prepare_model(&tree, settings.smooth_angle);
    println!();
    println!(
        "Packed: {} triangles, {} vertices, {} materials, {} BLAS nodes",
        prepared.triangle_count(),
        prepared.vertex_count(),
        prepared.mesh_count(),
        prepared.blas.len()
    );
    Ok(())
}

fn cmd_pack(args: &[&str]) -> anyhow::Result<()> {
    let mut sources = Vec::new();
    let mut json_out = None;
    let mut spacing = 1.5f32;
    let mut iter = args.iter();
    while let Some(&arg) = iter.next() {
        match arg {
            "--json" => json_out = Some(*iter.next().context("--json needs a file")?),
            "--spacing" => {
                let value = iter.next().context("--spacing needs a value")?;
                spacing = value.parse().with_context(|| format!("bad spacing '{value}'"))?;
            }
            _ => sources.push(arg),
        }
    }
    if sources.is_empty() {
        bail!("missing model arguments\nUsage: roomtrace pack <model.json>... [--spacing <m>] [--json <out>]");
    }

    let settings = Settings::load();
    let loader = loader(&settings);
    let mut scene = SceneBuilder::new(&settings)?;

    for (i, source) in sources.iter().enumerate() {
        let tree = loader
            .load(source)
            .with_context(|| format!("failed to load {source}"))?;
        let report = scene.add_model_on_ground(&tree)?;
        scene.translate_instance(report.placement, Vec3::X * spacing * i as f32)?;
        for e in &report.skipped {
            println!("{source}: skipped {e}");
        }
    }

    let snapshot = scene.publish_growing()?;
    print_layout(&snapshot);

    if let Some(out) = json_out {
        write_summary(&snapshot, Path::new(out))?;
        println!();
        println!("Summary written to {out}");
    }
    Ok(())
}

fn cmd_demo(args: &[&str]) -> anyhow::Result<()> {
    let count: u32 = match args.first() {
        Some(v) => v.parse().with_context(|| format!("bad count '{v}'"))?,
        None => 4,
    };

    let settings = Settings::load();
    let mut scene = SceneBuilder::new(&settings)?;
    let mut placed = Vec::new();
    for i in 0..count {
        let hue = i as f32 / count.max(1) as f32;
        let material = MaterialDesc::colored([hue, 0.6, 1.0 - hue, 1.0], 0.4, 0.0);
        let tree = box_model(Vec3::splat(0.5), material);
        let at = Mat4::from_translation(Vec3::new(i as f32 * 1.5, 0.5, 0.0));
        placed.push(scene.add_model(&tree, at)?.placement);
    }
    let first = scene.publish_growing()?;
    println!(
        "Published generation {}: {} instances, {} triangles",
        first.generation,
        first.instance_count(),
        first.triangle_count()
    );

    if let Some(&id) = placed.first() {
        scene.translate_instance(id, Vec3::new(0.0, 0.0, -2.0))?;
        let moved = scene.publish_growing()?;
        println!(
            "Moved {id}: static generation {} -> {}, dynamic generation {} -> {}",
            first.static_generation,
            moved.static_generation,
            first.dynamic_generation,
            moved.dynamic_generation
        );

        match scene.move_instance(id, Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0))) {
            Err(e) => println!("Flattening {id} rejected: {e}"),
            Ok(()) => println!("Flattening {id} unexpectedly accepted"),
        }
    }

    println!();
    print_layout(&scene.shared().load());
    Ok(())
}

fn print_layout(snapshot: &SceneSnapshot) {
    println!("Buffers:");
    for buffer in PhysicalBuffer::STORAGE {
        println!(
            "  {:<18} {:>10} / {:>10} bytes",
            buffer.name(),
            snapshot.layout.required(buffer),
            snapshot.capacities.get(buffer)
        );
        for slice in snapshot.layout.slices_in(buffer) {
            println!(
                "    {:<18} offset {:>10}  size {:>10}  count {:>8}",
                slice.kind.name(),
                slice.offset,
                slice.size,
                slice.count
            );
        }
    }
    println!();
    println!("Bind groups:");
    for group in &snapshot.bind_groups {
        println!("  @group({}) {:?}", group.group, group.frequency);
        for e in &group.entries {
            let name = e.array.map_or("frame_uniforms", ArrayKind::name);
            println!(
                "    @binding({}) {:<18} {:?} {}[{}..+{}]",
                e.binding,
                name,
                e.ty,
                e.buffer,
                e.offset,
                e.size
            );
        }
    }
}

fn write_summary(snapshot: &SceneSnapshot, out: &Path) -> anyhow::Result<()> {
    let arrays: Vec<_> = snapshot
        .layout
        .slices()
        .iter()
        .map(|s| {
            json!({
                "array": s.kind.name(),
                "buffer": s.buffer.name(),
                "offset": s.offset,
                "size": s.size,
                "count": s.count,
            })
        })
        .collect();
    let buffers: Vec<_> = PhysicalBuffer::STORAGE
        .iter()
        .map(|&b| {
            json!({
                "buffer": b.name(),
                "required": snapshot.layout.required(b),
                "capacity": snapshot.capacities.get(b),
            })
        })
        .collect();
    let instances: Vec<_> = snapshot
        .dynamic_data
        .instances
        .iter()
        .map(|i| {
            json!({
                "tri_count": i.tri_count,
                "material_count": i.material_count,
                "triangle_offset": i.triangle_offset,
                "material_offset": i.material_offset,
                "vertex_offset": i.vertex_offset,
                "blas_root": i.blas_root,
                "valid": i.flags & roomtrace::scene::INSTANCE_VALID != 0,
            })
        })
        .collect();
    let summary = json!({
        "generation": snapshot.generation,
        "buffers": buffers,
        "arrays": arrays,
        "instances": instances,
    });
    std::fs::write(out, serde_json::to_string_pretty(&summary)?)
        .with_context(|| format!("failed to write {}", out.display()))?;
    Ok(())
}

fn print_version() {
    println!(
        "roomtrace {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        roomtrace::BUILD_DATE,
        roomtrace::BUILD_TIME
    );
}

fn print_help() {
    println!("roomtrace - scene to GPU buffer packer");
    println!();
    println!("USAGE:");
    println!("    roomtrace [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, inspect <model.json>            Show meshes, materials and packed sizes");
    println!("    p, pack    <model.json>...         Place models side by side and print the buffer layout");
    println!("               [--spacing <m>]         Distance between models along X (default 1.5)");
    println!("               [--json <out>]          Also write the layout as JSON");
    println!("    d, demo    [count]                 Pack a row of boxes, move one, show generations");
    println!("    V, version                         Show version and build date");
    println!("    h, help                            Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose    Show debug output");
    println!("    -vv, --trace     Show trace output (very verbose)");
    println!("    -q, --quiet      Errors only");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUST_LOG           Overrides the verbosity flags");
    println!("    ROOMTRACE_TRACE=1  Write trace.json (build with --features trace)");
    println!();
    println!("EXAMPLES:");
    println!("    roomtrace inspect chair.json");
    println!("    roomtrace pack chair.json table.json --json layout.json");
    println!("    roomtrace -v demo 8");
}
