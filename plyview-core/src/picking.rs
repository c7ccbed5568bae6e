/// Ray casting against mesh triangles for surface picking
///
/// Every pick scans all triangles (Möller-Trumbore per triangle). There is no
/// acceleration structure, so cost grows linearly with the triangle count.
use std::sync::Arc;

use nalgebra::{Point3, Vector3};

use crate::geometry::Mesh;

/// Determinants below this mean the ray is parallel to the triangle plane
const PARALLEL_EPSILON: f32 = 1e-6;
/// Hits closer than this to the ray origin are ignored
const MIN_DISTANCE: f32 = 1e-6;

/// A ray in model space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    pub fn at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }
}

/// Closest surface point hit by a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PickHit {
    pub point: Point3<f32>,
    /// Flat face normal of the hit triangle
    pub normal: Vector3<f32>,
    /// Ray parameter of the hit, in units of the direction's length
    pub distance: f32,
    pub triangle: usize,
}

/// Möller-Trumbore ray-triangle intersection.
/// Returns the ray parameter if hit, or None if no intersection.
pub fn ray_triangle_intersect(
    ray: &Ray,
    v0: &Point3<f32>,
    v1: &Point3<f32>,
    v2: &Point3<f32>,
) -> Option<f32> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let pvec = ray.direction.cross(&edge2);
    let det = edge1.dot(&pvec);

    // Ray is parallel to triangle, or the triangle has no area
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let tvec = ray.origin - v0;
    let u = tvec.dot(&pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let v = ray.direction.dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&qvec) * inv_det;

    // Intersection is behind the ray origin
    if t > MIN_DISTANCE {
        Some(t)
    } else {
        None
    }
}

/// Maps rays to the nearest surface point of a shared mesh
#[derive(Debug, Clone)]
pub struct PickingEngine {
    mesh: Arc<Mesh>,
}

impl PickingEngine {
    pub fn new(mesh: Arc<Mesh>) -> Self {
        Self { mesh }
    }

    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Nearest hit along the ray. Point clouds never report a hit.
    pub fn intersect(&self, origin: Point3<f32>, direction: Vector3<f32>) -> Option<PickHit> {
        self.cast(&Ray::new(origin, direction))
    }

    /// Triangles too small to yield a unit normal are skipped, so they never
    /// hide surfaces behind them.
    pub fn cast(&self, ray: &Ray) -> Option<PickHit> {
        let mut best: Option<PickHit> = None;

        for triangle in 0..self.mesh.triangle_count() {
            let Some([v0, v1, v2]) = self.mesh.triangle_positions(triangle) else {
                continue;
            };
            let Some(distance) = ray_triangle_intersect(ray, &v0, &v1, &v2) else {
                continue;
            };
            if best.map_or(false, |nearest| nearest.distance <= distance) {
                continue;
            }
            let Some(normal) = self.mesh.face_normal(triangle) else {
                continue;
            };
            best = Some(PickHit {
                point: ray.at(distance),
                normal,
                distance,
                triangle,
            });
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vertex;

    fn single_triangle() -> PickingEngine {
        let vertices = vec![
            Vertex::new(-1.0, -1.0, 0.0),
            Vertex::new(1.0, -1.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
        ];
        PickingEngine::new(Arc::new(Mesh::from_parts(vertices, vec![[0, 1, 2]]).unwrap()))
    }

    #[test]
    fn test_ray_hits_triangle_center() {
        let engine = single_triangle();
        let hit = engine
            .intersect(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert!((hit.point - Point3::origin()).norm() < 1e-6);
        assert!((hit.distance - 5.0).abs() < 1e-6);
        assert!((hit.normal - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-6);
        assert_eq!(hit.triangle, 0);
    }

    #[test]
    fn test_ray_pointing_away_misses() {
        let engine = single_triangle();
        let hit = engine.intersect(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(hit.is_none());
    }

    #[test]
    fn test_parallel_ray_misses() {
        let engine = single_triangle();
        let hit = engine.intersect(Point3::new(-5.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert!(hit.is_none());
    }

    #[test]
    fn test_ray_outside_triangle_misses() {
        let engine = single_triangle();
        assert!(engine
            .intersect(Point3::new(0.9, 0.9, 5.0), Vector3::new(0.0, 0.0, -1.0))
            .is_none());
        assert!(engine
            .intersect(Point3::new(-2.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0))
            .is_none());
    }

    #[test]
    fn test_degenerate_triangle_is_skipped() {
        let vertices = vec![
            Vertex::new(0.0, 0.0, 0.0),
            Vertex::new(1.0, 0.0, 0.0),
            Vertex::new(2.0, 0.0, 0.0),
        ];
        let mesh = Mesh::from_parts(vertices, vec![[0, 1, 2]]).unwrap();
        let engine = PickingEngine::new(Arc::new(mesh));
        assert!(engine
            .intersect(Point3::new(1.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0))
            .is_none());
    }

    #[test]
    fn test_nearest_of_stacked_triangles_wins() {
        let mut vertices = Vec::new();
        let mut triangles = Vec::new();
        for (i, &z) in [-2.0f32, 1.0, -0.5].iter().enumerate() {
            vertices.push(Vertex::new(-1.0, -1.0, z));
            vertices.push(Vertex::new(1.0, -1.0, z));
            vertices.push(Vertex::new(0.0, 1.0, z));
            let base = (i * 3) as u32;
            triangles.push([base, base + 1, base + 2]);
        }
        let engine = PickingEngine::new(Arc::new(Mesh::from_parts(vertices, triangles).unwrap()));

        let hit = engine
            .intersect(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_eq!(hit.triangle, 1);
        assert!((hit.point.z - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tiny_triangle_does_not_hide_surface() {
        let vertices = vec![
            Vertex::new(-1.0, -1.0, 0.0),
            Vertex::new(1.0, -1.0, 0.0),
            Vertex::new(0.0, 1.0, 0.0),
            Vertex::new(0.0, 0.0, 1.0),
            Vertex::new(1e-4, 0.0, 1.0),
            Vertex::new(0.0, 1e-4, 1.0),
        ];
        let mesh = Mesh::from_parts(vertices, vec![[0, 1, 2], [3, 4, 5]]).unwrap();
        let engine = PickingEngine::new(Arc::new(mesh));

        let hit = engine
            .intersect(Point3::new(2e-5, 2e-5, 5.0), Vector3::new(0.0, 0.0, -1000.0))
            .expect("surface behind the sliver is still picked");
        assert_eq!(hit.triangle, 0);
        assert!(hit.point.z.abs() < 1e-4);
        assert!((hit.normal - Vector3::z()).norm() < 1e-6);
    }

    #[test]
    fn test_point_cloud_never_hits() {
        let engine = PickingEngine::new(Arc::new(Mesh::from_parts(
            vec![Vertex::new(0.0, 0.0, 0.0)],
            Vec::new(),
        )
        .unwrap()));
        assert!(engine
            .intersect(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0))
            .is_none());
    }
}
