/// plyview terminal viewer
///
/// Shows a PLY model as shaded ASCII art. Without a model a colored demo
/// cube is shown. Controls are listed on the bottom line of the screen.
use clap::Parser;
use log::{info, warn};
use plyview_core::{ply, Mesh, ViewerConfig};
use plyview_terminal::TerminalApp;
use std::error::Error;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "plyview-terminal", about = "View and annotate PLY models in the terminal", version)]
struct Args {
    /// PLY model to show; a demo cube when omitted
    model: Option<PathBuf>,

    /// TOML file with gesture, render, light and parser settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Save picked annotations as JSON on exit
    #[arg(long)]
    annotations: Option<PathBuf>,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,
}

fn init_logging(log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    let mut builder = match log_file {
        Some(_) => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")),
        // Raw mode mangles stderr output, so stay quiet unless asked
        None => env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("error")),
    };
    if let Some(path) = log_file {
        builder.target(env_logger::Target::Pipe(Box::new(File::create(path)?)));
    }
    builder.init();
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_logging(args.log_file.as_ref())?;

    let config = match &args.config {
        Some(path) => ViewerConfig::load(path)?,
        None => ViewerConfig::default(),
    };

    let mesh = match &args.model {
        Some(path) => {
            let report = ply::load(path, config.parser)?;
            if !report.is_clean() {
                warn!("{} records skipped in {}", report.issues.len(), path.display());
            }
            report.mesh
        }
        None => {
            info!("No model given, showing the demo cube");
            Mesh::cube(1.0)
        }
    };

    let mut app = TerminalApp::new(Arc::new(mesh), config)?.with_target_fps(args.fps);
    app.run()?;

    if let Some(path) = &args.annotations {
        let annotations = app.annotations();
        serde_json::to_writer_pretty(File::create(path)?, &annotations)?;
        info!("Saved {} annotations to {}", annotations.len(), path.display());
    }

    Ok(())
}
