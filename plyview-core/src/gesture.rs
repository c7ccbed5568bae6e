/// Multi-pointer gesture recognition as an explicit state machine
///
/// [`GestureState::step`] consumes one pointer event and returns the next
/// state together with at most one [`CameraDelta`]. It touches no camera and
/// no input layer, so any event sequence can be replayed in tests.
///
/// - One pointer moving past the touch slop pans.
/// - Two pointers rotate the orbit angle by the change in angle of the line
///   between them, until their span drifts past the scale slop; from then on
///   the gesture only pinch-zooms until fewer than two pointers remain.
/// - A double tap resets the camera.
use log::debug;
use serde::{Deserialize, Serialize};

use crate::camera::{Camera, CameraDelta};

/// Spans shorter than this cannot produce a meaningful pinch factor
const MIN_SPAN: f32 = 1e-3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
}

/// Raw pointer input in screen pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u64,
    pub x: f32,
    pub y: f32,
    pub phase: PointerPhase,
    /// Milliseconds on any monotonic clock
    pub time_ms: u64,
}

impl PointerEvent {
    pub fn down(pointer_id: u64, x: f32, y: f32, time_ms: u64) -> Self {
        Self {
            pointer_id,
            x,
            y,
            phase: PointerPhase::Down,
            time_ms,
        }
    }

    pub fn moved(pointer_id: u64, x: f32, y: f32, time_ms: u64) -> Self {
        Self {
            phase: PointerPhase::Move,
            ..Self::down(pointer_id, x, y, time_ms)
        }
    }

    pub fn up(pointer_id: u64, x: f32, y: f32, time_ms: u64) -> Self {
        Self {
            phase: PointerPhase::Up,
            ..Self::down(pointer_id, x, y, time_ms)
        }
    }
}

/// Thresholds for telling taps, drags and pinches apart
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureSettings {
    /// Pixels a single pointer must travel before a drag pans
    pub touch_slop: f32,
    /// Pixels the two-pointer span must change before a pinch zooms
    pub scale_slop: f32,
    /// Longest press still counted as a tap
    pub tap_timeout_ms: u64,
    /// Longest gap between a tap and the next press of a double tap
    pub double_tap_timeout_ms: u64,
    /// Farthest the second press of a double tap may land from the first
    pub double_tap_slop: f32,
}

impl Default for GestureSettings {
    fn default() -> Self {
        Self {
            touch_slop: 8.0,
            scale_slop: 16.0,
            tap_timeout_ms: 300,
            double_tap_timeout_ms: 300,
            double_tap_slop: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GestureMode {
    #[default]
    Idle,
    Panning,
    Scaling,
    Rotating,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TrackedPointer {
    id: u64,
    x: f32,
    y: f32,
}

/// Press that may still turn out to be a tap
#[derive(Debug, Clone, Copy, PartialEq)]
struct TapCandidate {
    x: f32,
    y: f32,
    down_ms: u64,
}

/// Completed tap waiting for a second one
#[derive(Debug, Clone, Copy, PartialEq)]
struct Tap {
    x: f32,
    y: f32,
    up_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureState {
    mode: GestureMode,
    /// Active pointers in press order; the first two drive two-pointer gestures
    pointers: Vec<TrackedPointer>,
    /// Where a lone pointer started, for the touch slop
    anchor: Option<(f32, f32)>,
    start_span: f32,
    last_span: f32,
    /// Degrees
    last_angle: f32,
    tap: Option<TapCandidate>,
    last_tap: Option<Tap>,
}

impl GestureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> GestureMode {
        self.mode
    }

    pub fn pointer_count(&self) -> usize {
        self.pointers.len()
    }

    /// Advance the state machine by one event
    pub fn step(
        mut self,
        event: &PointerEvent,
        settings: &GestureSettings,
    ) -> (GestureState, Option<CameraDelta>) {
        let delta = match event.phase {
            PointerPhase::Down => self.pointer_down(event, settings),
            PointerPhase::Move => self.pointer_move(event, settings),
            PointerPhase::Up => self.pointer_up(event, settings),
        };
        (self, delta)
    }

    fn pointer_down(&mut self, event: &PointerEvent, settings: &GestureSettings) -> Option<CameraDelta> {
        if let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == event.pointer_id) {
            pointer.x = event.x;
            pointer.y = event.y;
            return None;
        }

        self.pointers.push(TrackedPointer {
            id: event.pointer_id,
            x: event.x,
            y: event.y,
        });

        match self.pointers.len() {
            1 => {
                self.set_mode(GestureMode::Idle);
                self.anchor = Some((event.x, event.y));

                if let Some(tap) = self.last_tap.take() {
                    let quick = event.time_ms.saturating_sub(tap.up_ms) <= settings.double_tap_timeout_ms;
                    let close = distance((tap.x, tap.y), (event.x, event.y)) <= settings.double_tap_slop;
                    if quick && close {
                        debug!("Double tap, resetting camera");
                        self.tap = None;
                        return Some(CameraDelta::Reset);
                    }
                }

                self.tap = Some(TapCandidate {
                    x: event.x,
                    y: event.y,
                    down_ms: event.time_ms,
                });
                None
            }
            2 => {
                self.tap = None;
                self.last_tap = None;
                self.begin_two_pointer();
                None
            }
            _ => {
                if self.mode == GestureMode::Rotating {
                    self.set_mode(GestureMode::Idle);
                }
                None
            }
        }
    }

    fn pointer_move(&mut self, event: &PointerEvent, settings: &GestureSettings) -> Option<CameraDelta> {
        let pointer = self.pointers.iter_mut().find(|p| p.id == event.pointer_id)?;
        let previous = *pointer;
        pointer.x = event.x;
        pointer.y = event.y;

        if let Some(tap) = self.tap {
            if distance((tap.x, tap.y), (event.x, event.y)) > settings.touch_slop {
                self.tap = None;
            }
        }

        match self.pointers.len() {
            1 => self.single_pointer_move(previous, event, settings),
            2 => self.two_pointer_move(settings),
            _ if self.mode == GestureMode::Scaling => self.two_pointer_move(settings),
            _ => None,
        }
    }

    fn pointer_up(&mut self, event: &PointerEvent, settings: &GestureSettings) -> Option<CameraDelta> {
        let index = self.pointers.iter().position(|p| p.id == event.pointer_id)?;
        self.pointers.remove(index);

        match self.pointers.len() {
            0 => {
                if let Some(tap) = self.tap.take() {
                    let short = event.time_ms.saturating_sub(tap.down_ms) <= settings.tap_timeout_ms;
                    let still = distance((tap.x, tap.y), (event.x, event.y)) <= settings.touch_slop;
                    if short && still {
                        self.last_tap = Some(Tap {
                            x: tap.x,
                            y: tap.y,
                            up_ms: event.time_ms,
                        });
                    }
                }
                self.anchor = None;
                self.set_mode(GestureMode::Idle);
            }
            1 => {
                // Dropped below two pointers: two-pointer gestures end and the
                // remaining pointer has to clear the slop again before panning
                let rest = self.pointers[0];
                self.anchor = Some((rest.x, rest.y));
                self.tap = None;
                self.set_mode(GestureMode::Idle);
            }
            2 => {
                if self.mode == GestureMode::Scaling {
                    if let Some((span, _)) = self.pair_geometry() {
                        self.last_span = span;
                    }
                } else {
                    self.begin_two_pointer();
                }
            }
            _ => {}
        }
        None
    }

    fn single_pointer_move(
        &mut self,
        previous: TrackedPointer,
        event: &PointerEvent,
        settings: &GestureSettings,
    ) -> Option<CameraDelta> {
        let mut from = (previous.x, previous.y);

        if self.mode == GestureMode::Idle {
            let anchor = self.anchor.unwrap_or(from);
            if distance(anchor, (event.x, event.y)) <= settings.touch_slop {
                return None;
            }
            self.set_mode(GestureMode::Panning);
            from = anchor;
        }

        if self.mode != GestureMode::Panning {
            return None;
        }

        // Scroll distance: the content follows the pointer
        Some(CameraDelta::Pan {
            dx: from.0 - event.x,
            dy: from.1 - event.y,
        })
    }

    fn two_pointer_move(&mut self, settings: &GestureSettings) -> Option<CameraDelta> {
        let (span, angle) = self.pair_geometry()?;

        match self.mode {
            GestureMode::Rotating => {
                if (span - self.start_span).abs() > settings.scale_slop {
                    self.set_mode(GestureMode::Scaling);
                    return self.scale_to(span);
                }

                let delta = normalize_rotation_delta(angle - self.last_angle);
                self.last_angle = angle;
                self.last_span = span;
                if delta == 0.0 {
                    None
                } else {
                    Some(CameraDelta::Orbit(delta))
                }
            }
            GestureMode::Scaling => self.scale_to(span),
            GestureMode::Idle | GestureMode::Panning => None,
        }
    }

    fn scale_to(&mut self, span: f32) -> Option<CameraDelta> {
        let previous = self.last_span;
        self.last_span = span;
        if previous < MIN_SPAN || span < MIN_SPAN {
            return None;
        }
        Some(CameraDelta::Zoom(span / previous))
    }

    fn begin_two_pointer(&mut self) {
        self.anchor = None;
        if let Some((span, angle)) = self.pair_geometry() {
            self.start_span = span;
            self.last_span = span;
            self.last_angle = angle;
        }
        self.set_mode(GestureMode::Rotating);
    }

    /// Span in pixels and angle in degrees of the line from the first to
    /// the second pointer
    fn pair_geometry(&self) -> Option<(f32, f32)> {
        let [a, b] = [self.pointers.first()?, self.pointers.get(1)?];
        let (dx, dy) = (b.x - a.x, b.y - a.y);
        Some((dx.hypot(dy), dy.atan2(dx).to_degrees()))
    }

    fn set_mode(&mut self, mode: GestureMode) {
        if self.mode != mode {
            debug!("Gesture {:?} -> {:?}", self.mode, mode);
            self.mode = mode;
        }
    }
}

/// Wrap an angle difference into (-180, 180] so crossing the +-180 seam
/// yields the short way round.
pub fn normalize_rotation_delta(delta: f32) -> f32 {
    if delta > 180.0 {
        delta - 360.0
    } else if delta <= -180.0 {
        delta + 360.0
    } else {
        delta
    }
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

/// Feeds pointer events through the state machine and applies the result
#[derive(Debug, Clone, Default)]
pub struct GestureInterpreter {
    state: GestureState,
    settings: GestureSettings,
}

impl GestureInterpreter {
    pub fn new(settings: GestureSettings) -> Self {
        Self {
            state: GestureState::new(),
            settings,
        }
    }

    pub fn state(&self) -> &GestureState {
        &self.state
    }

    pub fn mode(&self) -> GestureMode {
        self.state.mode()
    }

    /// Advance the state machine and return the camera change, if any
    pub fn interpret(&mut self, event: &PointerEvent) -> Option<CameraDelta> {
        let (next, delta) = std::mem::take(&mut self.state).step(event, &self.settings);
        self.state = next;
        delta
    }

    /// Advance the state machine and apply the result to `camera`
    pub fn handle(&mut self, event: &PointerEvent, camera: &mut Camera) -> Option<CameraDelta> {
        let delta = self.interpret(event);
        if let Some(delta) = delta {
            camera.apply(delta);
        }
        delta
    }
}
