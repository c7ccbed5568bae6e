/// View state shared between the input and render timelines
use std::sync::Arc;

use parking_lot::RwLock;

use crate::camera::{Camera, CameraDelta};
use crate::light::{Light, AZIMUTH_RANGE, ELEVATION_RANGE};
use crate::projection::Viewport;

/// Everything a frame needs besides the mesh
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ViewState {
    pub camera: Camera,
    pub light: Light,
    pub viewport: Viewport,
}

/// Cloneable handle to one [`ViewState`].
///
/// Writers go through [`SharedView::update`] or the parameter setters; the
/// renderer copies the whole state once per frame with
/// [`SharedView::snapshot`], so a frame never mixes two camera updates.
#[derive(Debug, Clone, Default)]
pub struct SharedView {
    inner: Arc<RwLock<ViewState>>,
}

impl SharedView {
    pub fn new(state: ViewState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn snapshot(&self) -> ViewState {
        *self.inner.read()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut ViewState) -> R) -> R {
        let mut state = self.inner.write();
        f(&mut *state)
    }

    pub fn apply(&self, delta: CameraDelta) {
        self.inner.write().camera.apply(delta);
    }

    pub fn camera(&self) -> Camera {
        self.inner.read().camera
    }

    pub fn light(&self) -> Light {
        self.inner.read().light
    }

    pub fn set_viewport(&self, viewport: Viewport) {
        self.inner.write().viewport = viewport;
    }

    pub fn orbit_angle(&self) -> f32 {
        self.inner.read().camera.orbit_angle
    }

    pub fn set_orbit_angle(&self, degrees: f32) {
        self.inner.write().camera.orbit_angle = degrees;
    }

    pub fn light_azimuth(&self) -> f32 {
        self.inner.read().light.azimuth
    }

    /// Clamped to the slider range
    pub fn set_light_azimuth(&self, degrees: f32) {
        self.inner.write().light.azimuth = degrees.clamp(AZIMUTH_RANGE.0, AZIMUTH_RANGE.1);
    }

    pub fn light_elevation(&self) -> f32 {
        self.inner.read().light.elevation
    }

    /// Clamped to the slider range
    pub fn set_light_elevation(&self, degrees: f32) {
        self.inner.write().light.elevation = degrees.clamp(ELEVATION_RANGE.0, ELEVATION_RANGE.1);
    }
}
