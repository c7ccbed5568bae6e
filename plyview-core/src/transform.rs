/// Model and view matrices for the orbit camera
use nalgebra::{Matrix4, Vector3};

use crate::camera::Camera;

/// Uniform scale applied to every model before display
pub const PRESENTATION_SCALE: f32 = 0.5;
/// Offset applied to every model (in model units) before scaling
pub const PRESENTATION_OFFSET: [f32; 3] = [0.0, -0.5, 0.0];

/// Transform builder for 3D transformations
pub struct Transform;

impl Transform {
    /// Rotation around the Y axis, angle in degrees
    pub fn rotation_y(degrees: f32) -> Matrix4<f32> {
        Matrix4::new_rotation(Vector3::new(0.0, degrees.to_radians(), 0.0))
    }

    /// Create a translation matrix
    pub fn translation_matrix(x: f32, y: f32, z: f32) -> Matrix4<f32> {
        Matrix4::new_translation(&Vector3::new(x, y, z))
    }

    /// Create a scale matrix
    pub fn scale_matrix(sx: f32, sy: f32, sz: f32) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz))
    }

    /// Orbit rotation, then the fixed presentation scale, then the fixed
    /// offset: `R(orbit) * S * T`, so vertices are offset first.
    pub fn model_matrix(orbit_angle: f32) -> Matrix4<f32> {
        let [ox, oy, oz] = PRESENTATION_OFFSET;
        Self::rotation_y(orbit_angle)
            * Self::scale_matrix(PRESENTATION_SCALE, PRESENTATION_SCALE, PRESENTATION_SCALE)
            * Self::translation_matrix(ox, oy, oz)
    }

    /// Look from the camera eye at its target, +Y up
    pub fn view_matrix(camera: &Camera) -> Matrix4<f32> {
        Matrix4::look_at_rh(&camera.eye(), &camera.target(), &camera.up())
    }

    /// Create a model-view-projection matrix
    pub fn mvp_matrix(
        model: &Matrix4<f32>,
        view: &Matrix4<f32>,
        projection: &Matrix4<f32>,
    ) -> Matrix4<f32> {
        projection * view * model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn test_identity_rotation() {
        let matrix = Transform::rotation_y(0.0);
        assert!((matrix - Matrix4::identity()).norm() < 1e-6);
    }

    #[test]
    fn test_rotation_y_quarter_turn() {
        let matrix = Transform::rotation_y(90.0);
        let rotated = matrix.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert!((rotated - Point3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
    }

    #[test]
    fn test_model_matrix_offsets_then_scales() {
        let model = Transform::model_matrix(0.0);
        let p = model.transform_point(&Point3::new(0.0, 0.5, 0.0));
        assert!((p - Point3::origin()).norm() < 1e-6);

        let q = model.transform_point(&Point3::new(2.0, 0.5, 0.0));
        assert!((q - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_view_matrix_follows_pan() {
        let mut camera = Camera::new();
        camera.translate_x = 1.5;
        camera.translate_y = -2.0;
        let view = Transform::view_matrix(&camera);

        // The target lands on the view axis, `distance` in front of the eye
        let target = view.transform_point(&camera.target());
        assert!((target - Point3::new(0.0, 0.0, -camera.distance)).norm() < 1e-5);
    }
}
