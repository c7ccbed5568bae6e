/// PLY text parser tolerant to several vertex record layouts
///
/// The header is scanned for `element vertex <N>`, `element face <M>` and
/// `end_header`; the body is then consumed as N vertex records followed by
/// M face records. Malformed records are dropped and reported, a short
/// stream yields a partial mesh. Parsing never fails.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::{debug, info, warn};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1},
    character::complete::{i64 as integer, space0, space1},
    combinator::{all_consuming, map, rest},
    number::complete::float,
    sequence::{terminated, tuple},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::error::{ElementKind, LoadError, RecordIssue};
use crate::geometry::{Mesh, Vertex, VertexLayout};

/// Token count at which a vertex line is read as position + normal + color
const COLORED_RECORD_TOKENS: usize = 10;
const POSITION_TOKENS: usize = 3;

/// How vertex records are mapped to attributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutPolicy {
    /// Use the header's property declarations when they name x, y and z,
    /// otherwise infer from token counts
    #[default]
    Auto,
    /// Infer from token counts only (legacy files)
    Inferred,
    /// Require property declarations; falls back to inference without them
    Declared,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub layout: LayoutPolicy,
}

/// Parsed mesh plus everything that was skipped on the way
#[derive(Debug, Clone)]
pub struct ParseReport {
    pub mesh: Mesh,
    pub issues: Vec<RecordIssue>,
}

impl ParseReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Parse a PLY stream with default options, discarding diagnostics
pub fn parse<R: BufRead>(reader: R) -> Mesh {
    parse_with_report(reader, ParseOptions::default()).mesh
}

/// Parse PLY text held in memory
pub fn parse_str(text: &str) -> Mesh {
    parse(text.as_bytes())
}

/// Open and parse a PLY file. Only failing to open the file is an error.
pub fn load(path: &Path, options: ParseOptions) -> Result<ParseReport, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Loading model {}", path.display());
    Ok(parse_with_report(BufReader::new(file), options))
}

/// Parse a PLY stream and collect per-record diagnostics
pub fn parse_with_report<R: BufRead>(mut reader: R, options: ParseOptions) -> ParseReport {
    let mut parser = Parser::new(options);
    let mut buf = Vec::new();
    let mut line_no = 0;

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                line_no += 1;
                let line = String::from_utf8_lossy(&buf);
                if parser.feed(line_no, &line) == Flow::Stop {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                parser.issues.push(RecordIssue::Read {
                    line: line_no,
                    message: e.to_string(),
                });
                break;
            }
        }
    }

    parser.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Header,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderElement {
    Vertex,
    Face,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarKind {
    Integer,
    Float,
}

impl ScalarKind {
    fn from_type_name(name: &str) -> Self {
        match name {
            "float" | "double" | "float32" | "float64" => ScalarKind::Float,
            _ => ScalarKind::Integer,
        }
    }

    /// Divisor that maps a color channel of this type into [0, 1]. Float
    /// channels are taken as 0-255 when the record carries any value above 1.
    fn color_divisor(self, wide: bool) -> f32 {
        match self {
            ScalarKind::Float if !wide => 1.0,
            _ => 255.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    name: String,
    kind: ScalarKind,
}

/// Field positions resolved from the header's vertex properties
#[derive(Debug, Clone, Copy, PartialEq)]
struct DeclaredLayout {
    position: [usize; 3],
    /// (token index, type) for r, g, b
    color: Option<[(usize, ScalarKind); 3]>,
    alpha: Option<(usize, ScalarKind)>,
    width: usize,
}

impl DeclaredLayout {
    fn resolve(properties: &[Property]) -> Option<Self> {
        let field = |name: &str| properties.iter().position(|p| p.name == name);
        let channel = |name: &str| {
            field(name).map(|index| (index, properties[index].kind))
        };

        let position = [field("x")?, field("y")?, field("z")?];
        let color = match (channel("red"), channel("green"), channel("blue")) {
            (Some(r), Some(g), Some(b)) => Some([r, g, b]),
            _ => None,
        };

        Some(Self {
            position,
            color,
            alpha: color.and(channel("alpha")),
            width: properties.len(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum RecordRule {
    Inferred,
    Declared(DeclaredLayout),
}

struct Parser {
    options: ParseOptions,
    phase: Phase,
    element: HeaderElement,
    vertex_properties: Vec<Property>,
    pending_vertices: usize,
    pending_faces: usize,
    rule: RecordRule,
    layout: Option<VertexLayout>,
    vertices: Vec<Vertex>,
    /// Mesh index of each vertex record read so far, None when it was dropped
    record_map: Vec<Option<u32>>,
    triangles: Vec<[u32; 3]>,
    issues: Vec<RecordIssue>,
}

impl Parser {
    fn new(options: ParseOptions) -> Self {
        Self {
            options,
            phase: Phase::Header,
            element: HeaderElement::Other,
            vertex_properties: Vec::new(),
            pending_vertices: 0,
            pending_faces: 0,
            rule: RecordRule::Inferred,
            layout: None,
            vertices: Vec::new(),
            record_map: Vec::new(),
            triangles: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn feed(&mut self, line_no: usize, line: &str) -> Flow {
        let line = line.trim();
        match self.phase {
            Phase::Header => self.header_line(line_no, line),
            Phase::Body => self.body_line(line_no, line),
        }
    }

    fn header_line(&mut self, line_no: usize, line: &str) -> Flow {
        match directive(line) {
            Directive::Element { name, count } => {
                self.element = match name {
                    "vertex" => HeaderElement::Vertex,
                    "face" => HeaderElement::Face,
                    _ => HeaderElement::Other,
                };
                let count = match parse_count(count) {
                    Some(count) => count,
                    None => {
                        self.issues.push(RecordIssue::BadHeader {
                            line: line_no,
                            text: line.to_string(),
                        });
                        0
                    }
                };
                match self.element {
                    HeaderElement::Vertex => {
                        self.pending_vertices = count;
                        self.vertex_properties.clear();
                    }
                    HeaderElement::Face => self.pending_faces = count,
                    HeaderElement::Other => {}
                }
            }
            Directive::Property { scalar, name } => {
                if self.element == HeaderElement::Vertex {
                    self.vertex_properties.push(Property {
                        name: name.to_string(),
                        kind: ScalarKind::from_type_name(scalar),
                    });
                }
            }
            Directive::Format(format) => {
                if format != "ascii" {
                    self.issues.push(RecordIssue::UnsupportedFormat {
                        format: format.to_string(),
                    });
                    return Flow::Stop;
                }
            }
            Directive::EndHeader => {
                self.rule = self.select_rule();
                self.phase = Phase::Body;
                debug!(
                    "PLY header: {} vertices, {} faces, rule {:?}",
                    self.pending_vertices, self.pending_faces, self.rule
                );
                return self.body_flow();
            }
            Directive::Other => {}
        }
        Flow::Continue
    }

    fn select_rule(&self) -> RecordRule {
        if self.options.layout == LayoutPolicy::Inferred {
            return RecordRule::Inferred;
        }
        match DeclaredLayout::resolve(&self.vertex_properties) {
            Some(declared) => RecordRule::Declared(declared),
            None => {
                if self.options.layout == LayoutPolicy::Declared {
                    warn!("PLY header declares no x/y/z vertex properties, inferring layout from token counts");
                }
                RecordRule::Inferred
            }
        }
    }

    fn body_flow(&self) -> Flow {
        if self.pending_vertices == 0 && self.pending_faces == 0 {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    fn body_line(&mut self, line_no: usize, line: &str) -> Flow {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            return Flow::Continue;
        }

        if self.pending_vertices > 0 {
            self.pending_vertices -= 1;
            match self.read_vertex(&tokens) {
                Ok(vertex) => {
                    self.layout.get_or_insert(vertex.layout());
                    self.record_map.push(Some(self.vertices.len() as u32));
                    self.vertices.push(vertex);
                }
                Err(reason) => {
                    self.record_map.push(None);
                    self.issues.push(RecordIssue::MalformedRecord {
                        line: line_no,
                        element: ElementKind::Vertex,
                        reason,
                    });
                }
            }
        } else if self.pending_faces > 0 {
            self.pending_faces -= 1;
            match self.read_face(line_no, &tokens) {
                Ok(triangle) => self.triangles.push(triangle),
                Err(issue) => self.issues.push(issue),
            }
        }

        self.body_flow()
    }

    fn read_vertex(&self, tokens: &[&str]) -> Result<Vertex, String> {
        match self.rule {
            RecordRule::Inferred => self.read_inferred_vertex(tokens),
            RecordRule::Declared(declared) => read_declared_vertex(&declared, tokens),
        }
    }

    /// Layout by token count: >= 10 tokens is x y z nx ny nz r g b a with
    /// 0-255 colors, >= 3 is position only. The first record fixes the layout.
    fn read_inferred_vertex(&self, tokens: &[&str]) -> Result<Vertex, String> {
        let layout = self.layout.unwrap_or(if tokens.len() >= COLORED_RECORD_TOKENS {
            VertexLayout::PositionColor
        } else {
            VertexLayout::Position
        });
        let needed = match layout {
            VertexLayout::Position => POSITION_TOKENS,
            VertexLayout::PositionColor => COLORED_RECORD_TOKENS,
        };
        if tokens.len() < needed {
            return Err(format!(
                "expected at least {} tokens, found {}",
                needed,
                tokens.len()
            ));
        }

        let [x, y, z] = [number(tokens[0])?, number(tokens[1])?, number(tokens[2])?];
        match layout {
            VertexLayout::Position => Ok(Vertex::new(x, y, z)),
            VertexLayout::PositionColor => {
                let mut color = [0.0; 4];
                for (channel, token) in color.iter_mut().zip(&tokens[6..10]) {
                    *channel = normalize_channel(number(token)?, 255.0);
                }
                Ok(Vertex::with_color(x, y, z, color))
            }
        }
    }

    fn read_face(&self, line_no: usize, tokens: &[&str]) -> Result<[u32; 3], RecordIssue> {
        let malformed = |reason: String| RecordIssue::MalformedRecord {
            line: line_no,
            element: ElementKind::Face,
            reason,
        };

        let sides = index(tokens[0])
            .ok_or_else(|| malformed(format!("vertex count `{}` is not an integer", tokens[0])))?;
        if sides != 3 {
            return Err(RecordIssue::UnsupportedFace {
                line: line_no,
                sides,
            });
        }
        if tokens.len() < 4 {
            return Err(malformed(format!(
                "expected 3 vertex indices, found {}",
                tokens.len() - 1
            )));
        }

        let mut triangle = [0u32; 3];
        for (slot, token) in triangle.iter_mut().zip(&tokens[1..4]) {
            let value =
                index(token).ok_or_else(|| malformed(format!("index `{}` is not an integer", token)))?;
            let record = usize::try_from(value)
                .ok()
                .filter(|&record| record < self.record_map.len())
                .ok_or_else(|| {
                    malformed(format!(
                        "index {} out of range for {} vertices",
                        value,
                        self.record_map.len()
                    ))
                })?;
            *slot = self.record_map[record]
                .ok_or_else(|| malformed(format!("index {} refers to a dropped vertex", value)))?;
        }

        Ok(triangle)
    }

    fn finish(mut self) -> ParseReport {
        if self.pending_vertices > 0 || self.pending_faces > 0 {
            warn!(
                "PLY stream ended with {} vertices and {} faces still pending",
                self.pending_vertices, self.pending_faces
            );
            self.issues.push(RecordIssue::StreamTruncated {
                missing_vertices: self.pending_vertices,
                missing_faces: self.pending_faces,
            });
        }

        let skipped = self
            .issues
            .iter()
            .filter(|issue| !matches!(issue, RecordIssue::StreamTruncated { .. }))
            .count();
        if skipped > 0 {
            warn!("{} PLY records or directives skipped", skipped);
            for issue in &self.issues {
                debug!("{}", issue);
            }
        }

        debug!(
            "Parsed {} vertices and {} faces",
            self.vertices.len(),
            self.triangles.len()
        );

        let layout = self.layout.unwrap_or(VertexLayout::Position);
        ParseReport {
            mesh: Mesh::assemble(self.vertices, layout, self.triangles),
            issues: self.issues,
        }
    }
}

fn read_declared_vertex(declared: &DeclaredLayout, tokens: &[&str]) -> Result<Vertex, String> {
    if tokens.len() < declared.width {
        return Err(format!(
            "expected {} declared properties, found {} tokens",
            declared.width,
            tokens.len()
        ));
    }

    let [xi, yi, zi] = declared.position;
    let (x, y, z) = (number(tokens[xi])?, number(tokens[yi])?, number(tokens[zi])?);

    match declared.color {
        None => Ok(Vertex::new(x, y, z)),
        Some([r, g, b]) => {
            let mut channels = vec![r, g, b];
            channels.extend(declared.alpha);
            let values = channels
                .iter()
                .map(|&(index, kind)| number(tokens[index]).map(|value| (value, kind)))
                .collect::<Result<Vec<_>, _>>()?;
            let wide = values
                .iter()
                .any(|&(value, kind)| kind == ScalarKind::Float && value > 1.0);

            let mut color = [1.0; 4];
            for (slot, &(value, kind)) in color.iter_mut().zip(&values) {
                *slot = normalize_channel(value, kind.color_divisor(wide));
            }
            Ok(Vertex::with_color(x, y, z, color))
        }
    }
}

fn normalize_channel(value: f32, divisor: f32) -> f32 {
    (value / divisor).clamp(0.0, 1.0)
}

/// Header directives the parser acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive<'a> {
    Element { name: &'a str, count: &'a str },
    Property { scalar: &'a str, name: &'a str },
    Format(&'a str),
    EndHeader,
    Other,
}

fn word(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace)(input)
}

fn element(input: &str) -> IResult<&str, Directive<'_>> {
    map(
        tuple((tag("element"), space1, word, space1, word)),
        |(_, _, name, _, count)| Directive::Element { name, count },
    )(input)
}

/// `property list <count type> <index type> <name>` belongs to faces and
/// carries nothing the parser needs
fn list_property(input: &str) -> IResult<&str, Directive<'_>> {
    map(tuple((tag("property"), space1, tag("list"), rest)), |_| {
        Directive::Other
    })(input)
}

fn property(input: &str) -> IResult<&str, Directive<'_>> {
    map(
        tuple((tag("property"), space1, word, space1, word)),
        |(_, _, scalar, _, name)| Directive::Property { scalar, name },
    )(input)
}

fn format_line(input: &str) -> IResult<&str, Directive<'_>> {
    map(tuple((tag("format"), space1, word)), |(_, _, format)| {
        Directive::Format(format)
    })(input)
}

fn end_header(input: &str) -> IResult<&str, Directive<'_>> {
    map(all_consuming(terminated(tag("end_header"), space0)), |_| {
        Directive::EndHeader
    })(input)
}

fn directive(line: &str) -> Directive<'_> {
    alt((element, list_property, property, format_line, end_header))(line)
        .map(|(_, directive)| directive)
        .unwrap_or(Directive::Other)
}

fn parse_count(token: &str) -> Option<usize> {
    let result: IResult<&str, i64> = all_consuming(integer)(token);
    result
        .ok()
        .and_then(|(_, count)| usize::try_from(count).ok())
}

fn index(token: &str) -> Option<i64> {
    let result: IResult<&str, i64> = all_consuming(integer)(token);
    result.ok().map(|(_, value)| value)
}

fn number(token: &str) -> Result<f32, String> {
    let result: IResult<&str, f32> = all_consuming(float)(token);
    result
        .map(|(_, value)| value)
        .map_err(|_| format!("`{}` is not a number", token))
}
