/// plyview core library
///
/// Everything needed to show a PLY model independent of any windowing or
/// graphics API: the tolerant PLY parser, the orbit camera and its gesture
/// state machine, the render pipeline that talks to a pluggable backend, and
/// ray picking for annotations.

pub mod annotation;
pub mod camera;
pub mod config;
pub mod error;
pub mod geometry;
pub mod gesture;
pub mod light;
pub mod picking;
pub mod ply;
pub mod projection;
pub mod render;
pub mod shared;
pub mod transform;

// Re-export commonly used types
pub use annotation::{Annotation, AnnotationLog, AnnotationShape, AnnotationSink};
pub use camera::{Camera, CameraDelta};
pub use config::ViewerConfig;
pub use error::{AnnotationError, ConfigError, LoadError, MeshError, RecordIssue};
pub use geometry::{Mesh, Primitive, Vertex, VertexLayout};
pub use gesture::{GestureInterpreter, GestureMode, GestureSettings, GestureState, PointerEvent, PointerPhase};
pub use light::Light;
pub use picking::{PickHit, PickingEngine, Ray};
pub use ply::{LayoutPolicy, ParseOptions, ParseReport};
pub use projection::{FrameTransforms, Viewport};
pub use render::{DrawCall, FrameUniforms, RenderBackend, RenderPipeline, RenderSettings, VertexBuffer};
pub use shared::{SharedView, ViewState};
pub use transform::Transform;
