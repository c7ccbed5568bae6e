/// Error types shared across the core library
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to open a model file. Parsing itself never fails.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to open model {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Rejected input to [`crate::Mesh::from_parts`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    #[error("vertex {index} does not match the mesh layout")]
    MixedLayout { index: usize },
    #[error("triangle {triangle} references vertex {vertex}, mesh has {count} vertices")]
    IndexOutOfRange {
        triangle: usize,
        vertex: u32,
        count: usize,
    },
}

/// Failure to load or parse a viewer configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid clip planes: near {near}, far {far}")]
    ClipPlanes { near: f32, far: f32 },
}

/// Rejected annotation request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotationError {
    #[error("rectangle {width}x{height} is too small to annotate")]
    TooSmall { width: f32, height: f32 },
    #[error("no annotation with id {0}")]
    UnknownId(u64),
}

/// A non-fatal problem found while parsing a PLY stream.
///
/// Every issue is recoverable: the offending record is dropped (or the
/// parse stops early) and whatever was collected is still returned.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordIssue {
    #[error("line {line}: malformed {element} record ({reason})")]
    MalformedRecord {
        line: usize,
        element: ElementKind,
        reason: String,
    },
    #[error("line {line}: face with {sides} vertices dropped, only triangles are supported")]
    UnsupportedFace { line: usize, sides: i64 },
    #[error("line {line}: unreadable header directive `{text}`")]
    BadHeader { line: usize, text: String },
    #[error("unsupported format `{format}`, only ascii bodies can be read")]
    UnsupportedFormat { format: String },
    #[error("stream ended early: {missing_vertices} vertices and {missing_faces} faces missing")]
    StreamTruncated {
        missing_vertices: usize,
        missing_faces: usize,
    },
    #[error("read error after line {line}: {message}")]
    Read { line: usize, message: String },
}

/// Which PLY element a body record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Vertex,
    Face,
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ElementKind::Vertex => f.write_str("vertex"),
            ElementKind::Face => f.write_str("face"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_messages() {
        let issue = RecordIssue::MalformedRecord {
            line: 12,
            element: ElementKind::Vertex,
            reason: "expected 3 tokens, found 2".to_string(),
        };
        assert_eq!(
            issue.to_string(),
            "line 12: malformed vertex record (expected 3 tokens, found 2)"
        );

        let truncated = RecordIssue::StreamTruncated {
            missing_vertices: 2,
            missing_faces: 0,
        };
        assert!(truncated.to_string().contains("2 vertices"));
    }
}
