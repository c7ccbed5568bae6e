/// Terminal front-end for the plyview core
///
/// Input runs on its own thread (mouse gestures, keyboard controls, picks);
/// the main thread renders continuously from snapshots of the shared view.
use crossterm::{
    cursor,
    event::{DisableMouseCapture, EnableMouseCapture},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use log::{error, info};
use parking_lot::Mutex;
use plyview_core::{
    Annotation, AnnotationLog, AnnotationShape, AnnotationSink, FrameUniforms, Mesh,
    PickingEngine, RenderPipeline, SharedView, ViewState, ViewerConfig,
};
use std::io::{self, stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub mod input;
pub mod renderer;

pub use input::{InputAction, InputController, InputMapper};
pub use renderer::AsciiRenderer;

use nalgebra::Point3;
use renderer::{cell_of, viewport_for_cells};

const HELP: &str =
    "drag=pan ctrl+drag=rotate/pinch dblclick/r=reset rclick=pick wheel/+-=zoom \u{2190}\u{2192}=orbit a/d w/s=light c=clear q=quit";

/// Main application struct for terminal 3D rendering
pub struct TerminalApp {
    mesh: Arc<Mesh>,
    config: ViewerConfig,
    view: SharedView,
    annotations: Arc<Mutex<AnnotationLog>>,
    running: Arc<AtomicBool>,
    target_fps: u32,
}

impl TerminalApp {
    pub fn new(mesh: Arc<Mesh>, config: ViewerConfig) -> io::Result<Self> {
        let (columns, rows) = terminal::size()?;
        let view = SharedView::new(ViewState {
            light: config.light,
            viewport: viewport_for_cells(columns, rows),
            ..ViewState::default()
        });

        Ok(Self {
            mesh,
            config,
            view,
            annotations: Arc::new(Mutex::new(AnnotationLog::new())),
            running: Arc::new(AtomicBool::new(true)),
            target_fps: 30,
        })
    }

    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = fps.max(1);
        self
    }

    /// Copy of every annotation recorded so far
    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations.lock().annotations().to_vec()
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            stdout(),
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide
        )?;

        let result = self.run_threads();

        // Cleanup
        self.running.store(false, Ordering::Relaxed);
        terminal::disable_raw_mode()?;
        execute!(
            stdout(),
            cursor::Show,
            DisableMouseCapture,
            terminal::LeaveAlternateScreen
        )?;

        result
    }

    fn run_threads(&mut self) -> io::Result<()> {
        let (columns, rows) = terminal::size()?;
        let controller = InputController::new(
            columns,
            rows,
            self.config.gesture,
            self.config.render,
            self.view.clone(),
            PickingEngine::new(Arc::clone(&self.mesh)),
            Arc::clone(&self.annotations),
            Arc::clone(&self.running),
        );

        let running = Arc::clone(&self.running);
        let input = thread::Builder::new()
            .name("plyview-input".into())
            .spawn(move || {
                let result = controller.run();
                if let Err(e) = &result {
                    error!("Input thread failed: {}", e);
                }
                running.store(false, Ordering::Relaxed);
                result
            })?;

        let result = self.render_loop();
        self.running.store(false, Ordering::Relaxed);

        let input_result = input
            .join()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "input thread panicked"))?;
        result.and(input_result)
    }

    fn render_loop(&mut self) -> io::Result<()> {
        let target_frame_time = Duration::from_secs_f64(1.0 / self.target_fps as f64);
        let initial = self.view.snapshot().viewport;
        let mut pipeline = RenderPipeline::new(Arc::clone(&self.mesh), initial, self.config.render);
        let mut renderer = AsciiRenderer::new(0, 0);
        pipeline.resize(&mut renderer, initial);

        let mut last_frame = Instant::now();
        let mut frame_count = 0u32;
        let mut fps = 0.0f32;

        info!(
            "Rendering {} vertices, {} triangles at up to {} FPS",
            self.mesh.vertex_count(),
            self.mesh.triangle_count(),
            self.target_fps
        );

        while self.running.load(Ordering::Relaxed) {
            let frame_start = Instant::now();

            let state = self.view.snapshot();
            if state.viewport != pipeline.viewport() {
                pipeline.resize(&mut renderer, state.viewport);
                execute!(stdout(), Clear(ClearType::All))?;
            }
            let uniforms = pipeline.render(&mut renderer, &state.camera, &state.light);
            self.present(&renderer, &uniforms, &state, fps)?;

            // Frame timing
            frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                thread::sleep(target_frame_time - elapsed);
            }

            // Update FPS counter
            let now = Instant::now();
            if (now - last_frame).as_secs() >= 1 {
                fps = frame_count as f32 / (now - last_frame).as_secs_f32();
                frame_count = 0;
                last_frame = now;
            }
        }

        Ok(())
    }

    fn present(
        &self,
        renderer: &AsciiRenderer,
        uniforms: &FrameUniforms,
        state: &ViewState,
        fps: f32,
    ) -> io::Result<()> {
        let mut stdout = stdout();
        renderer.present(&mut stdout, 0)?;

        let annotations = self.annotations.lock();

        // Markers for picked points
        for annotation in annotations.annotations() {
            if let AnnotationShape::Point { position: [x, y, z], .. } = annotation.shape {
                if let Some((column, row)) = cell_of(uniforms, &Point3::new(x, y, z)) {
                    queue!(
                        stdout,
                        cursor::MoveTo(column, row),
                        SetForegroundColor(Color::Red),
                        Print('X')
                    )?;
                }
            }
        }

        // Draw UI overlay
        let camera = state.camera;
        let mut status = format!(
            "plyview | FPS: {:.1} | dist {:.2} pan ({:.2}, {:.2}) orbit {:.1} | light az {:.0} el {:.0} | {} picks",
            fps,
            camera.distance,
            camera.translate_x,
            camera.translate_y,
            camera.orbit_angle,
            state.light.azimuth,
            state.light.elevation,
            annotations.len()
        );
        if let Some(Annotation {
            shape: AnnotationShape::Point { position: [x, y, z], .. },
            ..
        }) = annotations.last()
        {
            status.push_str(&format!(" | last ({:.2}, {:.2}, {:.2})", x, y, z));
        }
        drop(annotations);

        let width = renderer.width();
        let bottom = renderer.height().saturating_sub(1) as u16;
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            SetForegroundColor(Color::Yellow),
            Print(truncate(&status, width)),
            cursor::MoveTo(0, bottom),
            SetForegroundColor(Color::DarkGrey),
            Print(truncate(HELP, width)),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}
