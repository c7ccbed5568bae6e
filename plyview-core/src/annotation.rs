/// Annotation records and the boundary to whatever stores them
use serde::{Deserialize, Serialize};

use crate::error::AnnotationError;
use crate::picking::PickHit;

/// Label given to annotations created with a blank one
pub const DEFAULT_LABEL: &str = "No Label";
/// A 2D rectangle must exceed this many pixels in at least one dimension
pub const MIN_RECT_EXTENT: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum AnnotationShape {
    /// Picked surface point, model space
    Point { position: [f32; 3], normal: [f32; 3] },
    /// Screen-space rectangle, pixels
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
    /// Screen-space segment, pixels
    Line { x1: f32, y1: f32, x2: f32, y2: f32 },
}

impl AnnotationShape {
    pub fn from_hit(hit: &PickHit) -> Self {
        AnnotationShape::Point {
            position: [hit.point.x, hit.point.y, hit.point.z],
            normal: [hit.normal.x, hit.normal.y, hit.normal.z],
        }
    }

    /// Rectangle spanned by two corners in any order
    pub fn rect_between(a: (f32, f32), b: (f32, f32)) -> Self {
        AnnotationShape::Rect {
            x: a.0.min(b.0),
            y: a.1.min(b.1),
            width: (a.0 - b.0).abs(),
            height: (a.1 - b.1).abs(),
        }
    }

    fn validate(&self) -> Result<(), AnnotationError> {
        match *self {
            AnnotationShape::Rect { width, height, .. }
                if width.abs() <= MIN_RECT_EXTENT && height.abs() <= MIN_RECT_EXTENT =>
            {
                Err(AnnotationError::TooSmall { width, height })
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    pub label: String,
    #[serde(flatten)]
    pub shape: AnnotationShape,
}

fn normalize_label(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        DEFAULT_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Persistence collaborator for annotations
pub trait AnnotationSink {
    /// Record a new annotation and return its id
    fn store(&mut self, label: &str, shape: AnnotationShape) -> Result<u64, AnnotationError>;
    fn relabel(&mut self, id: u64, label: &str) -> Result<(), AnnotationError>;
    fn remove(&mut self, id: u64) -> Result<Annotation, AnnotationError>;
    fn clear(&mut self);
    fn annotations(&self) -> &[Annotation];
}

/// In-memory sink handing out increasing ids
#[derive(Debug, Clone, Default)]
pub struct AnnotationLog {
    entries: Vec<Annotation>,
    next_id: u64,
}

impl AnnotationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Annotation> {
        self.entries.last()
    }
}

impl AnnotationSink for AnnotationLog {
    fn store(&mut self, label: &str, shape: AnnotationShape) -> Result<u64, AnnotationError> {
        shape.validate()?;
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(Annotation {
            id,
            label: normalize_label(label),
            shape,
        });
        Ok(id)
    }

    fn relabel(&mut self, id: u64, label: &str) -> Result<(), AnnotationError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(AnnotationError::UnknownId(id))?;
        entry.label = normalize_label(label);
        Ok(())
    }

    fn remove(&mut self, id: u64) -> Result<Annotation, AnnotationError> {
        let index = self
            .entries
            .iter()
            .position(|a| a.id == id)
            .ok_or(AnnotationError::UnknownId(id))?;
        Ok(self.entries.remove(index))
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn annotations(&self) -> &[Annotation] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn test_store_assigns_ids_and_default_label() {
        let mut log = AnnotationLog::new();
        let first = log
            .store("Wall", AnnotationShape::Line { x1: 0.0, y1: 0.0, x2: 5.0, y2: 5.0 })
            .unwrap();
        let second = log.store("   ", AnnotationShape::rect_between((40.0, 40.0), (0.0, 35.0))).unwrap();

        assert!(second > first);
        assert_eq!(log.len(), 2);
        assert_eq!(log.annotations()[0].label, "Wall");
        assert_eq!(log.annotations()[1].label, DEFAULT_LABEL);
        assert_eq!(
            log.annotations()[1].shape,
            AnnotationShape::Rect { x: 0.0, y: 35.0, width: 40.0, height: 5.0 }
        );
    }

    #[test]
    fn test_tiny_rect_is_rejected() {
        let mut log = AnnotationLog::new();
        let result = log.store("dot", AnnotationShape::rect_between((5.0, 5.0), (12.0, 15.0)));
        assert_eq!(result, Err(AnnotationError::TooSmall { width: 7.0, height: 10.0 }));
        assert!(log.is_empty());
    }

    #[test]
    fn test_relabel_and_remove() {
        let mut log = AnnotationLog::new();
        let id = log
            .store("a", AnnotationShape::Point { position: [0.0; 3], normal: [0.0, 0.0, 1.0] })
            .unwrap();

        log.relabel(id, "corner").unwrap();
        assert_eq!(log.last().map(|a| a.label.as_str()), Some("corner"));
        assert_eq!(log.relabel(id + 1, "x"), Err(AnnotationError::UnknownId(id + 1)));

        let removed = log.remove(id).unwrap();
        assert_eq!(removed.label, "corner");
        assert!(log.remove(id).is_err());
    }

    #[test]
    fn test_ids_keep_increasing_after_clear() {
        let mut log = AnnotationLog::new();
        let shape = AnnotationShape::Line { x1: 0.0, y1: 0.0, x2: 1.0, y2: 1.0 };
        let first = log.store("", shape.clone()).unwrap();
        log.clear();
        let second = log.store("", shape).unwrap();
        assert!(log.len() == 1 && second > first);
    }

    #[test]
    fn test_point_from_hit_serializes() {
        let hit = PickHit {
            point: Point3::new(0.5, 0.25, 0.0),
            normal: Vector3::z(),
            distance: 5.0,
            triangle: 3,
        };
        let annotation = Annotation {
            id: 1,
            label: "tip".to_string(),
            shape: AnnotationShape::from_hit(&hit),
        };

        let json = serde_json::to_value(&annotation).unwrap();
        assert_eq!(json["shape"], "point");
        assert_eq!(json["label"], "tip");
        assert_eq!(json["position"][1], 0.25);

        let back: Annotation = serde_json::from_value(json).unwrap();
        assert_eq!(back, annotation);
    }
}
