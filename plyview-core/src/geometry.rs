/// Geometry primitives for 3D rendering
use nalgebra::{Point3, Vector3};

use crate::error::MeshError;

/// Color used when a vertex carries none
pub const DEFAULT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];

/// Per-vertex attribute layout of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexLayout {
    /// x, y, z
    Position,
    /// x, y, z, r, g, b, a
    PositionColor,
}

impl VertexLayout {
    /// Number of floats per vertex record
    pub fn stride(self) -> usize {
        match self {
            VertexLayout::Position => 3,
            VertexLayout::PositionColor => 7,
        }
    }

    /// Offset of the color attribute within a vertex record
    pub fn color_offset(self) -> Option<usize> {
        match self {
            VertexLayout::Position => None,
            VertexLayout::PositionColor => Some(3),
        }
    }
}

/// A 3D vertex with position and optional normalized RGBA color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Point3<f32>,
    pub color: Option<[f32; 4]>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Point3::new(x, y, z),
            color: None,
        }
    }

    pub fn with_color(x: f32, y: f32, z: f32, color: [f32; 4]) -> Self {
        Self {
            position: Point3::new(x, y, z),
            color: Some(color),
        }
    }

    pub fn layout(&self) -> VertexLayout {
        if self.color.is_some() {
            VertexLayout::PositionColor
        } else {
            VertexLayout::Position
        }
    }
}

/// How the mesh is drawn, fixed when the mesh is built
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Triangles(Vec<[u32; 3]>),
    /// No faces: every vertex is drawn as a point
    Points,
}

/// An immutable vertex/index mesh. A mesh without triangles is a point cloud.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    vertices: Vec<Vertex>,
    layout: VertexLayout,
    primitive: Primitive,
}

impl Mesh {
    /// An empty point cloud
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            layout: VertexLayout::Position,
            primitive: Primitive::Points,
        }
    }

    /// Build a mesh, checking that every vertex shares one layout and every
    /// index is in range.
    pub fn from_parts(vertices: Vec<Vertex>, triangles: Vec<[u32; 3]>) -> Result<Self, MeshError> {
        let layout = vertices
            .first()
            .map(Vertex::layout)
            .unwrap_or(VertexLayout::Position);

        if let Some(index) = vertices.iter().position(|v| v.layout() != layout) {
            return Err(MeshError::MixedLayout { index });
        }

        let count = vertices.len();
        for (triangle, indices) in triangles.iter().enumerate() {
            if let Some(&vertex) = indices.iter().find(|&&i| i as usize >= count) {
                return Err(MeshError::IndexOutOfRange {
                    triangle,
                    vertex,
                    count,
                });
            }
        }

        Ok(Self::assemble(vertices, layout, triangles))
    }

    /// Build from parts the caller already validated
    pub(crate) fn assemble(
        vertices: Vec<Vertex>,
        layout: VertexLayout,
        triangles: Vec<[u32; 3]>,
    ) -> Self {
        debug_assert!(vertices.iter().all(|v| v.layout() == layout));
        let primitive = if triangles.is_empty() {
            Primitive::Points
        } else {
            Primitive::Triangles(triangles)
        };
        Self {
            vertices,
            layout,
            primitive,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    pub fn primitive(&self) -> &Primitive {
        &self.primitive
    }

    /// Triangle index triples; empty for a point cloud
    pub fn triangles(&self) -> &[[u32; 3]] {
        match &self.primitive {
            Primitive::Triangles(triangles) => triangles,
            Primitive::Points => &[],
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles().len()
    }

    pub fn is_point_cloud(&self) -> bool {
        matches!(self.primitive, Primitive::Points)
    }

    /// Positions of the three corners of a triangle
    pub fn triangle_positions(&self, triangle: usize) -> Option<[Point3<f32>; 3]> {
        let [a, b, c] = *self.triangles().get(triangle)?;
        Some([
            self.vertices[a as usize].position,
            self.vertices[b as usize].position,
            self.vertices[c as usize].position,
        ])
    }

    /// Calculate the face normal of a triangle from its corner positions
    pub fn face_normal(&self, triangle: usize) -> Option<Vector3<f32>> {
        let [v0, v1, v2] = self.triangle_positions(triangle)?;

        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        edge1.cross(&edge2).try_normalize(f32::EPSILON)
    }

    /// Create an indexed cube centered on the origin, one color per corner
    pub fn cube(size: f32) -> Self {
        let half = size / 2.0;
        let mut vertices = Vec::with_capacity(8);
        for &z in &[half, -half] {
            for &(x, y) in &[(-half, -half), (half, -half), (half, half), (-half, half)] {
                let color = [
                    if x > 0.0 { 1.0 } else { 0.25 },
                    if y > 0.0 { 1.0 } else { 0.25 },
                    if z > 0.0 { 1.0 } else { 0.25 },
                    1.0,
                ];
                vertices.push(Vertex::with_color(x, y, z, color));
            }
        }

        // 0..4 front (+z), 4..8 back (-z), counter-clockwise seen from outside
        let triangles = vec![
            // Front face
            [0, 1, 2],
            [0, 2, 3],
            // Back face
            [5, 4, 7],
            [5, 7, 6],
            // Top face
            [3, 2, 6],
            [3, 6, 7],
            // Bottom face
            [4, 5, 1],
            [4, 1, 0],
            // Right face
            [1, 5, 6],
            [1, 6, 2],
            // Left face
            [4, 0, 3],
            [4, 3, 7],
        ];

        Self {
            vertices,
            layout: VertexLayout::PositionColor,
            primitive: Primitive::Triangles(triangles),
        }
    }
}

impl Default for Mesh {
    fn default() -> Self {
        Self::empty()
    }
}
