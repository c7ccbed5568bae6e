use std::sync::Arc;

use nalgebra::{Point3, Vector3};
use plyview_core::projection::projection_matrix;
use plyview_core::{
    ply, AnnotationLog, AnnotationShape, AnnotationSink, Camera, DrawCall, FrameTransforms,
    FrameUniforms, GestureInterpreter, Light, ParseOptions, PickingEngine, PointerEvent,
    RenderBackend, RenderPipeline, RenderSettings, SharedView, ViewState, Viewport,
};

const SQUARE: &str = "ply
format ascii 1.0
comment unit square standing on the floor
element vertex 4
property float x
property float y
property float z
property uchar red
property uchar green
property uchar blue
element face 2
property list uchar int vertex_indices
end_header
-1 -1 0 255 0 0
1 -1 0 0 255 0
1 2 0 0 0 255
-1 2 0 255 255 255
3 0 1 2
3 0 2 3
";

const LEGACY_CLOUD: &str = "ply
element vertex 3
end_header
0 0 0 0 0 1 255 128 0 255
1 0 0 0 0 1 0 128 255 255
0 1 0 0 0 1 255 255 255 255
";

#[derive(Default)]
struct Recorder {
    frames: Vec<FrameUniforms>,
    triangle_indices: Vec<usize>,
    points: Vec<(usize, usize)>,
}

impl RenderBackend for Recorder {
    fn resize(&mut self, _viewport: Viewport) {}

    fn begin_frame(&mut self, uniforms: &FrameUniforms) {
        self.frames.push(*uniforms);
    }

    fn draw(&mut self, call: DrawCall<'_>) {
        match call {
            DrawCall::IndexedTriangles { indices, .. } => self.triangle_indices.push(indices.len()),
            DrawCall::Points { vertices, .. } => self.points.push((vertices.vertex_count(), vertices.stride())),
        }
    }

    fn end_frame(&mut self) {}
}

fn frame_for(camera: &Camera, viewport: Viewport) -> FrameTransforms {
    FrameTransforms::new(camera, projection_matrix(viewport, 2.0, 10.0), viewport)
}

#[test]
fn test_declared_colors_survive_parse() {
    let report = ply::parse_with_report(SQUARE.as_bytes(), ParseOptions::default());
    assert!(report.is_clean(), "issues: {:?}", report.issues);
    assert_eq!(report.mesh.vertex_count(), 4);
    assert_eq!(report.mesh.triangle_count(), 2);
    assert_eq!(report.mesh.vertices()[0].color, Some([1.0, 0.0, 0.0, 1.0]));
}

#[test]
fn test_center_pick_hits_parsed_surface() {
    let mesh = Arc::new(ply::parse_str(SQUARE));
    let engine = PickingEngine::new(Arc::clone(&mesh));
    let viewport = Viewport::new(800, 600);

    let ray = frame_for(&Camera::new(), viewport).pick_ray(400.0, 300.0).unwrap();
    let hit = engine.cast(&ray).expect("center ray hits the square");

    assert!((hit.point - Point3::new(0.0, 0.5, 0.0)).norm() < 1e-3);
    assert!((hit.normal - Vector3::z()).norm() < 1e-5);
    assert!((hit.distance - 2.0).abs() < 1e-3);

    let mut log = AnnotationLog::new();
    let id = log.store("", AnnotationShape::from_hit(&hit)).unwrap();
    assert_eq!(log.annotations()[0].id, id);
    assert_eq!(log.annotations()[0].label, "No Label");
}

#[test]
fn test_panned_away_pick_misses() {
    let mesh = Arc::new(ply::parse_str(SQUARE));
    let engine = PickingEngine::new(mesh);
    let mut camera = Camera::new();
    camera.pan(600.0, 0.0);

    let ray = frame_for(&camera, Viewport::new(800, 600)).pick_ray(400.0, 300.0).unwrap();
    assert!(engine.cast(&ray).is_none());
}

#[test]
fn test_picked_point_projects_back_under_cursor() {
    let mesh = Arc::new(ply::parse_str(SQUARE));
    let engine = PickingEngine::new(mesh);
    let mut camera = Camera::new();
    camera.orbit(25.0);
    camera.zoom(1.2);
    let frame = frame_for(&camera, Viewport::new(640, 480));

    let ray = frame.pick_ray(300.0, 220.0).unwrap();
    let hit = engine.cast(&ray).unwrap();
    let (x, y, _) = frame.project(&hit.point).unwrap();
    assert!((x - 300.0).abs() < 0.5);
    assert!((y - 220.0).abs() < 0.5);
}

#[test]
fn test_parsed_mesh_renders_indexed() {
    let mesh = Arc::new(ply::parse_str(SQUARE));
    let pipeline = RenderPipeline::new(mesh, Viewport::default(), RenderSettings::default());
    let mut recorder = Recorder::default();

    pipeline.render(&mut recorder, &Camera::new(), &Light::new(0.0, 90.0));

    assert_eq!(recorder.triangle_indices, vec![6]);
    assert!(recorder.points.is_empty());
    assert!((recorder.frames[0].light_direction - Vector3::y()).norm() < 1e-6);
}

#[test]
fn test_legacy_cloud_renders_colored_points() {
    let mesh = ply::parse_str(LEGACY_CLOUD);
    assert!(mesh.is_point_cloud());
    let color = mesh.vertices()[0].color.unwrap();
    assert!((color[1] - 128.0 / 255.0).abs() < 1e-6);

    let pipeline = RenderPipeline::new(Arc::new(mesh), Viewport::default(), RenderSettings::default());
    let mut recorder = Recorder::default();
    pipeline.render(&mut recorder, &Camera::new(), &Light::default());

    assert_eq!(recorder.points, vec![(3, 7)]);
}

#[test]
fn test_truncated_stream_still_renders() {
    let text = "ply\nelement vertex 5\nelement face 1\nend_header\n0 0 0\n1 0 0\n0 1 0\n";
    let report = ply::parse_with_report(text.as_bytes(), ParseOptions::default());
    assert_eq!(report.mesh.vertex_count(), 3);
    assert!(!report.is_clean());

    let pipeline = RenderPipeline::new(Arc::new(report.mesh), Viewport::default(), RenderSettings::default());
    let mut recorder = Recorder::default();
    pipeline.render(&mut recorder, &Camera::new(), &Light::default());
    assert_eq!(recorder.points, vec![(3, 3)]);
}

#[test]
fn test_gestures_reach_the_next_frame() {
    let view = SharedView::new(ViewState::default());
    let mut interpreter = GestureInterpreter::default();
    let input = view.clone();

    // Pinch out to double the span
    for event in [
        PointerEvent::down(0, 100.0, 100.0, 0),
        PointerEvent::down(1, 200.0, 100.0, 0),
        PointerEvent::moved(1, 300.0, 100.0, 16),
        PointerEvent::up(1, 300.0, 100.0, 32),
        PointerEvent::up(0, 100.0, 100.0, 32),
    ] {
        if let Some(delta) = interpreter.interpret(&event) {
            input.apply(delta);
        }
    }

    let state = view.snapshot();
    assert!((state.camera.distance - 1.5).abs() < 1e-5);

    let pipeline = RenderPipeline::new(
        Arc::new(ply::parse_str(SQUARE)),
        state.viewport,
        RenderSettings::default(),
    );
    let uniforms = pipeline.frame(&state.camera, &state.light);
    let eye_space = uniforms.transforms.view.transform_point(&Point3::origin());
    assert!((eye_space.z + 1.5).abs() < 1e-5);
}
