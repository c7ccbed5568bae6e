/// Directional light steered by azimuth and elevation
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Slider range in which azimuth is meaningful
pub const AZIMUTH_RANGE: (f32, f32) = (-180.0, 180.0);
/// Slider range in which elevation is meaningful
pub const ELEVATION_RANGE: (f32, f32) = (-90.0, 90.0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    /// Degrees around the Y axis, measured from +X towards +Z
    pub azimuth: f32,
    /// Degrees above the XZ plane
    pub elevation: f32,
}

impl Light {
    pub fn new(azimuth: f32, elevation: f32) -> Self {
        Self { azimuth, elevation }
    }

    /// Unit vector pointing towards the light
    pub fn direction(&self) -> Vector3<f32> {
        let azimuth = self.azimuth.to_radians();
        let elevation = self.elevation.to_radians();
        Vector3::new(
            elevation.cos() * azimuth.cos(),
            elevation.sin(),
            elevation.cos() * azimuth.sin(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_points_along_x() {
        let direction = Light::default().direction();
        assert!((direction - Vector3::x()).norm() < 1e-6);
    }

    #[test]
    fn test_direction_is_unit_length() {
        for azimuth in (-180..=180).step_by(30) {
            for elevation in (-90..=90).step_by(15) {
                let light = Light::new(azimuth as f32, elevation as f32);
                assert!((light.direction().norm() - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_known_directions() {
        let overhead = Light::new(0.0, 90.0).direction();
        assert!((overhead - Vector3::y()).norm() < 1e-6);

        let side = Light::new(90.0, 0.0).direction();
        assert!((side - Vector3::z()).norm() < 1e-6);
    }
}
