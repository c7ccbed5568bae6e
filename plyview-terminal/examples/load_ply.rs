/// Example: parse a PLY file and print one frame as plain ASCII
///
/// Usage: cargo run --example load_ply -- path/to/model.ply [columns] [rows]
use std::env;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use plyview_core::{ply, Camera, Light, Mesh, ParseOptions, RenderPipeline, RenderSettings};
use plyview_terminal::renderer::viewport_for_cells;
use plyview_terminal::AsciiRenderer;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    let mesh = match args.get(1) {
        Some(path) => {
            let report = ply::load(Path::new(path), ParseOptions::default())?;
            for issue in &report.issues {
                eprintln!("skipped: {}", issue);
            }
            report.mesh
        }
        None => {
            eprintln!("Usage: {} <ply-file> [columns] [rows]", args[0]);
            eprintln!("\nNo PLY file provided, using default cube...");
            Mesh::cube(1.0)
        }
    };
    let columns = args.get(2).map(|c| c.parse()).transpose()?.unwrap_or(80);
    let rows = args.get(3).map(|r| r.parse()).transpose()?.unwrap_or(24);

    println!(
        "Loaded {} vertices, {} triangles",
        mesh.vertex_count(),
        mesh.triangle_count()
    );

    let mut renderer = AsciiRenderer::new(columns, rows);
    let pipeline = RenderPipeline::new(
        Arc::new(mesh),
        viewport_for_cells(columns, rows),
        RenderSettings::default(),
    );
    pipeline.render(&mut renderer, &Camera::new(), &Light::new(45.0, 30.0));
    print!("{}", renderer.to_text());
    Ok(())
}
