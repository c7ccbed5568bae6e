/// Viewport, perspective frustum and per-frame transforms
use nalgebra::{Matrix4, Point3, Vector4};

use crate::camera::Camera;
use crate::picking::Ray;
use crate::transform::Transform;

/// Drawable surface size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; a zero height counts as one pixel
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// Off-center perspective frustum, same layout as `glFrustum`
#[rustfmt::skip]
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Matrix4<f32> {
    let width = right - left;
    let height = top - bottom;
    let depth = far - near;

    Matrix4::new(
        2.0 * near / width, 0.0, (right + left) / width, 0.0,
        0.0, 2.0 * near / height, (top + bottom) / height, 0.0,
        0.0, 0.0, -(far + near) / depth, -2.0 * far * near / depth,
        0.0, 0.0, -1.0, 0.0,
    )
}

/// Symmetric frustum with a vertical half-extent of 1 at the near plane
pub fn projection_matrix(viewport: Viewport, near: f32, far: f32) -> Matrix4<f32> {
    let ratio = viewport.aspect();
    frustum(-ratio, ratio, -1.0, 1.0, near, far)
}

/// Every matrix needed to draw or pick one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTransforms {
    pub model: Matrix4<f32>,
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub mvp: Matrix4<f32>,
    pub viewport: Viewport,
}

impl FrameTransforms {
    pub fn new(camera: &Camera, projection: Matrix4<f32>, viewport: Viewport) -> Self {
        let model = Transform::model_matrix(camera.orbit_angle);
        let view = Transform::view_matrix(camera);
        Self {
            model,
            view,
            projection,
            mvp: Transform::mvp_matrix(&model, &view, &projection),
            viewport,
        }
    }

    /// Model space to clip space
    pub fn clip(&self, point: &Point3<f32>) -> Vector4<f32> {
        self.mvp * point.to_homogeneous()
    }

    /// Project a model-space point to screen pixels plus NDC depth.
    /// Points behind the eye or outside the depth range give `None`.
    pub fn project(&self, point: &Point3<f32>) -> Option<(f32, f32, f32)> {
        let clip = self.clip(point);

        // Prevent division by near-zero depth values
        if clip.w < 1e-6 {
            return None;
        }

        let ndc_x = clip.x / clip.w;
        let ndc_y = clip.y / clip.w;
        let depth = clip.z / clip.w;

        if !(-1.0..=1.0).contains(&depth) {
            return None;
        }

        // Convert to screen space
        let screen_x = (ndc_x + 1.0) * 0.5 * self.viewport.width as f32;
        let screen_y = (1.0 - ndc_y) * 0.5 * self.viewport.height as f32;

        Some((screen_x, screen_y, depth))
    }

    /// Unproject a screen position into a model-space ray running from the
    /// near plane towards the far plane.
    pub fn pick_ray(&self, screen_x: f32, screen_y: f32) -> Option<Ray> {
        let inverse = self.mvp.try_inverse()?;
        let ndc_x = 2.0 * screen_x / self.viewport.width.max(1) as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * screen_y / self.viewport.height.max(1) as f32;

        let unproject = |ndc_z: f32| {
            let p = inverse * Vector4::new(ndc_x, ndc_y, ndc_z, 1.0);
            Point3::from(p.xyz() / p.w)
        };
        let near = unproject(-1.0);
        let far = unproject(1.0);

        let direction = (far - near).try_normalize(f32::EPSILON)?;
        Some(Ray::new(near, direction))
    }
}
