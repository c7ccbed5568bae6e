/// Terminal input: crossterm events to pointer events and viewer actions
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use log::{debug, error, info};
use parking_lot::Mutex;
use plyview_core::projection::projection_matrix;
use plyview_core::{
    AnnotationLog, AnnotationShape, AnnotationSink, CameraDelta, FrameTransforms,
    GestureInterpreter, GestureSettings, PickHit, PickingEngine, PointerEvent, RenderSettings,
    SharedView,
};

use crate::renderer::{cell_center, viewport_for_cells};

/// Pointer id of the mouse
const PRIMARY: u64 = 0;
/// Pointer id of the virtual finger held at the screen center during Ctrl+drag
const SECONDARY: u64 = 1;

const ORBIT_STEP: f32 = 5.0;
const LIGHT_STEP: f32 = 5.0;
const ZOOM_STEP: f32 = 1.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputAction {
    Pointer(PointerEvent),
    Camera(CameraDelta),
    /// Pick the surface under a terminal cell
    Pick { column: u16, row: u16 },
    AzimuthBy(f32),
    ElevationBy(f32),
    ClearAnnotations,
    Resize { columns: u16, rows: u16 },
    Quit,
}

/// Stateful translation of terminal events. Tracks the grid size for the
/// virtual second finger and whether a Ctrl+drag is in progress.
#[derive(Debug, Clone)]
pub struct InputMapper {
    columns: u16,
    rows: u16,
    two_finger: bool,
}

impl InputMapper {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            columns,
            rows,
            two_finger: false,
        }
    }

    fn center(&self) -> (f32, f32) {
        cell_center(self.columns / 2, self.rows / 2)
    }

    pub fn translate(&mut self, event: Event, time_ms: u64) -> Vec<InputAction> {
        match event {
            Event::Key(key) => self.translate_key(key).into_iter().collect(),
            Event::Mouse(mouse) => self.translate_mouse(mouse, time_ms),
            Event::Resize(columns, rows) => {
                self.columns = columns;
                self.rows = rows;
                vec![InputAction::Resize { columns, rows }]
            }
            _ => Vec::new(),
        }
    }

    fn translate_key(&self, key: KeyEvent) -> Option<InputAction> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        let action = match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => InputAction::Quit,
            KeyCode::Char('q') | KeyCode::Esc => InputAction::Quit,
            KeyCode::Left => InputAction::Camera(CameraDelta::Orbit(-ORBIT_STEP)),
            KeyCode::Right => InputAction::Camera(CameraDelta::Orbit(ORBIT_STEP)),
            KeyCode::Char('a') => InputAction::AzimuthBy(-LIGHT_STEP),
            KeyCode::Char('d') => InputAction::AzimuthBy(LIGHT_STEP),
            KeyCode::Char('w') => InputAction::ElevationBy(LIGHT_STEP),
            KeyCode::Char('s') => InputAction::ElevationBy(-LIGHT_STEP),
            KeyCode::Char('+') | KeyCode::Char('=') => InputAction::Camera(CameraDelta::Zoom(ZOOM_STEP)),
            KeyCode::Char('-') => InputAction::Camera(CameraDelta::Zoom(1.0 / ZOOM_STEP)),
            KeyCode::Char('r') => InputAction::Camera(CameraDelta::Reset),
            KeyCode::Char('c') => InputAction::ClearAnnotations,
            _ => return None,
        };
        Some(action)
    }

    fn translate_mouse(&mut self, mouse: MouseEvent, time_ms: u64) -> Vec<InputAction> {
        let (x, y) = cell_center(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let mut actions = vec![InputAction::Pointer(PointerEvent::down(PRIMARY, x, y, time_ms))];
                if mouse.modifiers.contains(KeyModifiers::CONTROL) {
                    let (cx, cy) = self.center();
                    actions.push(InputAction::Pointer(PointerEvent::down(SECONDARY, cx, cy, time_ms)));
                    self.two_finger = true;
                }
                actions
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                vec![InputAction::Pointer(PointerEvent::moved(PRIMARY, x, y, time_ms))]
            }
            MouseEventKind::Up(MouseButton::Left) => {
                let mut actions = Vec::with_capacity(2);
                if std::mem::take(&mut self.two_finger) {
                    let (cx, cy) = self.center();
                    actions.push(InputAction::Pointer(PointerEvent::up(SECONDARY, cx, cy, time_ms)));
                }
                actions.push(InputAction::Pointer(PointerEvent::up(PRIMARY, x, y, time_ms)));
                actions
            }
            MouseEventKind::Down(MouseButton::Right) => vec![InputAction::Pick {
                column: mouse.column,
                row: mouse.row,
            }],
            MouseEventKind::ScrollUp => vec![InputAction::Camera(CameraDelta::Zoom(ZOOM_STEP))],
            MouseEventKind::ScrollDown => vec![InputAction::Camera(CameraDelta::Zoom(1.0 / ZOOM_STEP))],
            _ => Vec::new(),
        }
    }
}

/// Owns the input timeline: gestures, parameter controls and picking.
/// Writes go to the shared view and the annotation log; the render loop
/// only reads them.
pub struct InputController {
    mapper: InputMapper,
    interpreter: GestureInterpreter,
    view: SharedView,
    picking: PickingEngine,
    annotations: Arc<Mutex<AnnotationLog>>,
    render: RenderSettings,
    running: Arc<AtomicBool>,
    started: Instant,
}

impl InputController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        columns: u16,
        rows: u16,
        gestures: GestureSettings,
        render: RenderSettings,
        view: SharedView,
        picking: PickingEngine,
        annotations: Arc<Mutex<AnnotationLog>>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            mapper: InputMapper::new(columns, rows),
            interpreter: GestureInterpreter::new(gestures),
            view,
            picking,
            annotations,
            render,
            running,
            started: Instant::now(),
        }
    }

    /// Poll terminal events until the app stops
    pub fn run(mut self) -> std::io::Result<()> {
        while self.running.load(Ordering::Relaxed) {
            if !event::poll(Duration::from_millis(50))? {
                continue;
            }
            let event = event::read()?;
            let time_ms = self.started.elapsed().as_millis() as u64;
            for action in self.mapper.translate(event, time_ms) {
                self.perform(action);
            }
        }
        Ok(())
    }

    pub fn perform(&mut self, action: InputAction) {
        match action {
            InputAction::Pointer(pointer) => {
                if let Some(delta) = self.interpreter.interpret(&pointer) {
                    self.view.apply(delta);
                }
            }
            InputAction::Camera(delta) => self.view.apply(delta),
            InputAction::Pick { column, row } => {
                self.pick(column, row);
            }
            InputAction::AzimuthBy(step) => self.view.set_light_azimuth(self.view.light_azimuth() + step),
            InputAction::ElevationBy(step) => {
                self.view.set_light_elevation(self.view.light_elevation() + step)
            }
            InputAction::ClearAnnotations => {
                self.annotations.lock().clear();
                info!("Annotations cleared");
            }
            InputAction::Resize { columns, rows } => {
                self.view.set_viewport(viewport_for_cells(columns, rows));
            }
            InputAction::Quit => self.running.store(false, Ordering::Relaxed),
        }
    }

    /// Cast a ray through a cell center using the current view and record
    /// the hit as a point annotation
    pub fn pick(&mut self, column: u16, row: u16) -> Option<PickHit> {
        let state = self.view.snapshot();
        let projection = projection_matrix(state.viewport, self.render.near, self.render.far);
        let frame = FrameTransforms::new(&state.camera, projection, state.viewport);

        let (x, y) = cell_center(column, row);
        let Some(ray) = frame.pick_ray(x, y) else {
            debug!("No pick ray through cell ({column}, {row})");
            return None;
        };
        let Some(hit) = self.picking.cast(&ray) else {
            debug!("Pick at cell ({column}, {row}) missed the model");
            return None;
        };

        match self.annotations.lock().store("", AnnotationShape::from_hit(&hit)) {
            Ok(id) => info!(
                "Annotation {} at ({:.3}, {:.3}, {:.3}) on triangle {}",
                id, hit.point.x, hit.point.y, hit.point.z, hit.triangle
            ),
            Err(e) => error!("Failed to record pick: {}", e),
        }
        Some(hit)
    }
}
