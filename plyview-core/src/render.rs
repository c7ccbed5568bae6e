/// Backend-agnostic render pipeline
///
/// The pipeline owns everything derived from the mesh and the viewport
/// (interleaved vertex data, flat index list, projection matrix) and, once
/// per frame, turns a camera and a light into [`FrameUniforms`] plus a single
/// [`DrawCall`] against a [`RenderBackend`].
use std::sync::Arc;

use log::debug;
use nalgebra::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::error::ConfigError;
use crate::geometry::{Mesh, Primitive, VertexLayout, DEFAULT_COLOR};
use crate::light::Light;
use crate::projection::{projection_matrix, FrameTransforms, Viewport};

/// Surface normal used for lighting in place of per-vertex normals
pub const REFERENCE_NORMAL: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

const AMBIENT: f32 = 0.3;
const DIFFUSE: f32 = 0.7;

/// Point sizes are clamped into this range, in pixels
pub const POINT_SIZE_RANGE: (f32, f32) = (1.0, 64.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Screen size of a point-cloud vertex, in pixels
    pub point_size: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            point_size: 3.0,
            near: 2.0,
            far: 10.0,
        }
    }
}

impl RenderSettings {
    /// Clamp the point size and reject clip planes that give no frustum
    pub fn validated(self) -> Result<Self, ConfigError> {
        let (near, far) = (self.near, self.far);
        if !(near > 0.0 && near < far && far.is_finite()) {
            return Err(ConfigError::ClipPlanes { near, far });
        }
        let point_size = if self.point_size.is_nan() {
            Self::default().point_size
        } else {
            self.point_size.clamp(POINT_SIZE_RANGE.0, POINT_SIZE_RANGE.1)
        };
        Ok(Self { point_size, ..self })
    }
}

/// Interleaved vertex attributes: position, then color when the layout has one
#[derive(Debug, Clone, PartialEq)]
pub struct VertexBuffer {
    data: Vec<f32>,
    layout: VertexLayout,
}

impl VertexBuffer {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        let layout = mesh.layout();
        let mut data = Vec::with_capacity(mesh.vertex_count() * layout.stride());
        for vertex in mesh.vertices() {
            data.extend_from_slice(&[vertex.position.x, vertex.position.y, vertex.position.z]);
            if layout.color_offset().is_some() {
                data.extend_from_slice(&vertex.color.unwrap_or(DEFAULT_COLOR));
            }
        }
        Self { data, layout }
    }

    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    pub fn stride(&self) -> usize {
        self.layout.stride()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn vertex_count(&self) -> usize {
        self.data.len() / self.stride()
    }

    pub fn position(&self, index: usize) -> Option<Point3<f32>> {
        let start = index * self.stride();
        let p = self.data.get(start..start + 3)?;
        Some(Point3::new(p[0], p[1], p[2]))
    }

    /// Vertex color; opaque white when the layout carries none
    pub fn color(&self, index: usize) -> Option<[f32; 4]> {
        if index >= self.vertex_count() {
            return None;
        }
        let Some(offset) = self.layout.color_offset() else {
            return Some(DEFAULT_COLOR);
        };
        let start = index * self.stride() + offset;
        let c = self.data.get(start..start + 4)?;
        Some([c[0], c[1], c[2], c[3]])
    }
}

/// Per-frame values handed to the backend before drawing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameUniforms {
    pub transforms: FrameTransforms,
    /// Unit vector towards the light
    pub light_direction: Vector3<f32>,
}

/// One draw command; the variant follows the mesh primitive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawCall<'a> {
    IndexedTriangles {
        vertices: &'a VertexBuffer,
        /// Three entries per triangle
        indices: &'a [u32],
    },
    Points {
        vertices: &'a VertexBuffer,
        point_size: f32,
    },
}

/// Graphics surface the pipeline draws into
pub trait RenderBackend {
    fn resize(&mut self, viewport: Viewport);
    fn begin_frame(&mut self, uniforms: &FrameUniforms);
    fn draw(&mut self, call: DrawCall<'_>);
    fn end_frame(&mut self);
}

/// Lambert shading against a fixed normal: `rgb * (ambient + diffuse * n.l)`.
/// Alpha passes through.
pub fn shade(color: [f32; 4], normal: &Vector3<f32>, light_direction: &Vector3<f32>) -> [f32; 4] {
    let lambert = light_direction
        .try_normalize(f32::EPSILON)
        .map_or(0.0, |l| normal.dot(&l).max(0.0));
    let intensity = AMBIENT + DIFFUSE * lambert;
    [
        color[0] * intensity,
        color[1] * intensity,
        color[2] * intensity,
        color[3],
    ]
}

pub struct RenderPipeline {
    mesh: Arc<Mesh>,
    vertices: VertexBuffer,
    indices: Vec<u32>,
    settings: RenderSettings,
    viewport: Viewport,
    projection: Matrix4<f32>,
}

impl RenderPipeline {
    pub fn new(mesh: Arc<Mesh>, viewport: Viewport, settings: RenderSettings) -> Self {
        let vertices = VertexBuffer::from_mesh(&mesh);
        let indices = mesh.triangles().iter().flatten().copied().collect();
        Self {
            mesh,
            vertices,
            indices,
            settings,
            viewport,
            projection: projection_matrix(viewport, settings.near, settings.far),
        }
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn vertices(&self) -> &VertexBuffer {
        &self.vertices
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Adopt a new surface size. The projection is only rebuilt when the
    /// size actually changes.
    pub fn resize<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, viewport: Viewport) {
        if viewport != self.viewport {
            self.viewport = viewport;
            self.projection = projection_matrix(viewport, self.settings.near, self.settings.far);
            debug!(
                "Projection rebuilt for {}x{} (aspect {:.3})",
                viewport.width,
                viewport.height,
                viewport.aspect()
            );
        }
        backend.resize(viewport);
    }

    /// Matrices and light for one frame
    pub fn frame(&self, camera: &Camera, light: &Light) -> FrameUniforms {
        FrameUniforms {
            transforms: FrameTransforms::new(camera, self.projection, self.viewport),
            light_direction: light.direction(),
        }
    }

    /// Draw one frame and return the uniforms it used
    pub fn render<B: RenderBackend + ?Sized>(
        &self,
        backend: &mut B,
        camera: &Camera,
        light: &Light,
    ) -> FrameUniforms {
        let uniforms = self.frame(camera, light);
        backend.begin_frame(&uniforms);
        backend.draw(self.draw_call());
        backend.end_frame();
        uniforms
    }

    fn draw_call(&self) -> DrawCall<'_> {
        match self.mesh.primitive() {
            Primitive::Triangles(_) => DrawCall::IndexedTriangles {
                vertices: &self.vertices,
                indices: &self.indices,
            },
            Primitive::Points => DrawCall::Points {
                vertices: &self.vertices,
                point_size: self.settings.point_size,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vertex;

    #[derive(Default)]
    struct Recorder {
        resizes: Vec<Viewport>,
        frames: Vec<FrameUniforms>,
        triangles: Vec<Vec<u32>>,
        points: Vec<(usize, f32)>,
        ended: usize,
    }

    impl RenderBackend for Recorder {
        fn resize(&mut self, viewport: Viewport) {
            self.resizes.push(viewport);
        }

        fn begin_frame(&mut self, uniforms: &FrameUniforms) {
            self.frames.push(*uniforms);
        }

        fn draw(&mut self, call: DrawCall<'_>) {
            match call {
                DrawCall::IndexedTriangles { indices, .. } => self.triangles.push(indices.to_vec()),
                DrawCall::Points { vertices, point_size } => {
                    self.points.push((vertices.vertex_count(), point_size))
                }
            }
        }

        fn end_frame(&mut self) {
            self.ended += 1;
        }
    }

    fn point_cloud() -> Arc<Mesh> {
        let vertices = vec![
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
        ];
        Arc::new(Mesh::from_parts(vertices, Vec::new()).unwrap())
    }

    #[test]
    fn test_shade_facing_light() {
        let lit = shade([1.0, 0.5, 0.2, 0.8], &REFERENCE_NORMAL, &Vector3::new(0.0, 0.0, 2.0));
        assert!((lit[0] - 1.0).abs() < 1e-6);
        assert!((lit[1] - 0.5).abs() < 1e-6);
        assert!((lit[2] - 0.2).abs() < 1e-6);
        assert_eq!(lit[3], 0.8);
    }

    #[test]
    fn test_shade_ambient_floor() {
        let behind = shade([1.0, 1.0, 1.0, 1.0], &REFERENCE_NORMAL, &Vector3::new(0.0, 0.0, -1.0));
        assert!((behind[0] - 0.3).abs() < 1e-6);

        let grazing = shade([1.0, 1.0, 1.0, 1.0], &REFERENCE_NORMAL, &Vector3::x());
        assert!((grazing[1] - 0.3).abs() < 1e-6);

        let zero = shade([1.0, 1.0, 1.0, 1.0], &REFERENCE_NORMAL, &Vector3::zeros());
        assert!((zero[2] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_vertex_buffer_strides() {
        let plain = VertexBuffer::from_mesh(&point_cloud());
        assert_eq!(plain.stride(), 3);
        assert_eq!(plain.as_slice().len(), 9);
        assert_eq!(plain.color(1), Some(DEFAULT_COLOR));
        assert_eq!(plain.position(1), Some(Point3::new(1.0, 0.0, 0.0)));
        assert_eq!(plain.position(3), None);

        let cube = VertexBuffer::from_mesh(&Mesh::cube(1.0));
        assert_eq!(cube.stride(), 7);
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.as_slice().len(), 56);
        assert!(cube.color(7).is_some());
        assert_eq!(cube.color(8), None);
    }

    #[test]
    fn test_triangle_mesh_draws_indexed() {
        let mesh = Arc::new(Mesh::cube(1.0));
        let pipeline = RenderPipeline::new(mesh, Viewport::default(), RenderSettings::default());
        let mut recorder = Recorder::default();

        pipeline.render(&mut recorder, &Camera::new(), &Light::default());

        assert_eq!(recorder.frames.len(), 1);
        assert_eq!(recorder.ended, 1);
        assert!(recorder.points.is_empty());
        assert_eq!(recorder.triangles.len(), 1);
        assert_eq!(recorder.triangles[0].len(), 36);
    }

    #[test]
    fn test_point_cloud_draws_points() {
        let settings = RenderSettings {
            point_size: 5.0,
            ..RenderSettings::default()
        };
        let pipeline = RenderPipeline::new(point_cloud(), Viewport::default(), settings);
        let mut recorder = Recorder::default();

        pipeline.render(&mut recorder, &Camera::new(), &Light::default());

        assert!(recorder.triangles.is_empty());
        assert_eq!(recorder.points, vec![(3, 5.0)]);
    }

    #[test]
    fn test_frame_uses_camera_and_light() {
        let pipeline = RenderPipeline::new(point_cloud(), Viewport::default(), RenderSettings::default());
        let mut camera = Camera::new();
        camera.orbit_angle = 45.0;
        let light = Light::new(90.0, 0.0);

        let uniforms = pipeline.frame(&camera, &light);
        let expected = FrameTransforms::new(
            &camera,
            projection_matrix(Viewport::default(), 2.0, 10.0),
            Viewport::default(),
        );
        assert!((uniforms.transforms.mvp - expected.mvp).norm() < 1e-6);
        assert!((uniforms.light_direction - Vector3::z()).norm() < 1e-6);
    }

    #[test]
    fn test_resize_rebuilds_projection() {
        let mut pipeline =
            RenderPipeline::new(point_cloud(), Viewport::new(100, 100), RenderSettings::default());
        let mut recorder = Recorder::default();
        let before = pipeline.frame(&Camera::new(), &Light::default()).transforms.projection;

        pipeline.resize(&mut recorder, Viewport::new(200, 100));
        let after = pipeline.frame(&Camera::new(), &Light::default()).transforms.projection;

        assert_eq!(recorder.resizes, vec![Viewport::new(200, 100)]);
        assert_eq!(pipeline.viewport(), Viewport::new(200, 100));
        assert!((before[(0, 0)] - 2.0).abs() < 1e-6);
        assert!((after[(0, 0)] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_height_viewport_does_not_break_frame() {
        let pipeline = RenderPipeline::new(point_cloud(), Viewport::new(640, 0), RenderSettings::default());
        let uniforms = pipeline.frame(&Camera::new(), &Light::default());
        assert!(uniforms.transforms.mvp.iter().all(|v| v.is_finite()));
    }
}
