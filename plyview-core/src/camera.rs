/// Orbit camera state driven by gestures and parameter controls
use nalgebra::{Point3, Vector3};

pub const DEFAULT_DISTANCE: f32 = 3.0;
pub const MIN_DISTANCE: f32 = 1.0;
pub const MAX_DISTANCE: f32 = 10.0;

/// Camera-space units per screen pixel of pan
pub const PAN_SCALE: f32 = 1.0 / 100.0;

/// A change requested by the gesture layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CameraDelta {
    /// Scroll distance in pixels (previous minus current position)
    Pan { dx: f32, dy: f32 },
    /// Pinch scale factor; > 1 moves the camera closer
    Zoom(f32),
    /// Orbit angle change in degrees
    Orbit(f32),
    Reset,
}

/// Simplified orbit camera: the eye sits at `distance` in front of a target
/// that pans in the z = 0 plane, the model spins by `orbit_angle` around Y.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub distance: f32,
    pub translate_x: f32,
    pub translate_y: f32,
    /// Degrees
    pub orbit_angle: f32,
}

impl Camera {
    pub fn new() -> Self {
        Self {
            distance: DEFAULT_DISTANCE,
            translate_x: 0.0,
            translate_y: 0.0,
            orbit_angle: 0.0,
        }
    }

    pub fn eye(&self) -> Point3<f32> {
        Point3::new(self.translate_x, self.translate_y, self.distance)
    }

    pub fn target(&self) -> Point3<f32> {
        Point3::new(self.translate_x, self.translate_y, 0.0)
    }

    pub fn up(&self) -> Vector3<f32> {
        Vector3::y()
    }

    /// Pan by a scroll distance in pixels. Screen Y grows downwards, so it
    /// is subtracted.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.translate_x += dx * PAN_SCALE;
        self.translate_y -= dy * PAN_SCALE;
    }

    /// Divide the distance by a pinch factor and clamp it. Factors that are
    /// not strictly positive are ignored.
    pub fn zoom(&mut self, scale: f32) {
        if !(scale > 0.0) {
            return;
        }
        self.distance = (self.distance / scale).clamp(MIN_DISTANCE, MAX_DISTANCE);
    }

    pub fn orbit(&mut self, degrees: f32) {
        self.orbit_angle += degrees;
    }

    /// Back to the default distance and pan. The orbit angle is kept.
    pub fn reset(&mut self) {
        self.distance = DEFAULT_DISTANCE;
        self.translate_x = 0.0;
        self.translate_y = 0.0;
    }

    pub fn apply(&mut self, delta: CameraDelta) {
        match delta {
            CameraDelta::Pan { dx, dy } => self.pan(dx, dy),
            CameraDelta::Zoom(scale) => self.zoom(scale),
            CameraDelta::Orbit(degrees) => self.orbit(degrees),
            CameraDelta::Reset => self.reset(),
        }
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}
