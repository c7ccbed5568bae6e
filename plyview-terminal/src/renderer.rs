/// ASCII rasterizer for terminal rendering
use crossterm::{
    cursor,
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use nalgebra::Point3;
use plyview_core::render::{shade, POINT_SIZE_RANGE, REFERENCE_NORMAL};
use plyview_core::{DrawCall, FrameUniforms, RenderBackend, VertexBuffer, Viewport};
use std::io::Write;

/// Character density ramp (sparse to dense); nearer surfaces get denser glyphs
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

/// Nominal pixel size of one terminal cell
pub const CELL_WIDTH: u32 = 8;
pub const CELL_HEIGHT: u32 = 16;

/// Pixel viewport covered by a grid of terminal cells
pub fn viewport_for_cells(columns: u16, rows: u16) -> Viewport {
    Viewport::new(columns as u32 * CELL_WIDTH, rows as u32 * CELL_HEIGHT)
}

/// Screen position in cells plus NDC depth
type CellVertex = (f32, f32, f32);

/// ASCII renderer that rasterizes draw calls into a character grid
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    color_buffer: Vec<[f32; 3]>,
    char_buffer: Vec<char>,
    uniforms: Option<FrameUniforms>,
}

impl AsciiRenderer {
    pub fn new(columns: u16, rows: u16) -> Self {
        let mut renderer = Self {
            width: 0,
            height: 0,
            depth_buffer: Vec::new(),
            color_buffer: Vec::new(),
            char_buffer: Vec::new(),
            uniforms: None,
        };
        renderer.resize(viewport_for_cells(columns, rows));
        renderer
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.color_buffer.fill([0.0; 3]);
        self.char_buffer.fill(' ');
    }

    pub fn char_at(&self, x: usize, y: usize) -> Option<char> {
        if x >= self.width {
            return None;
        }
        self.char_buffer.get(y * self.width + x).copied()
    }

    /// Number of cells covered by the last frame
    pub fn covered_cells(&self) -> usize {
        self.depth_buffer.iter().filter(|d| d.is_finite()).count()
    }

    fn to_cell(&self, vertices: &VertexBuffer, index: usize) -> Option<CellVertex> {
        let uniforms = self.uniforms.as_ref()?;
        let position = vertices.position(index)?;
        let (x, y, depth) = uniforms.transforms.project(&position)?;
        Some((x / CELL_WIDTH as f32, y / CELL_HEIGHT as f32, depth))
    }

    fn shaded(&self, vertices: &VertexBuffer, index: usize) -> [f32; 3] {
        let color = vertices.color(index).unwrap_or([1.0; 4]);
        let light = self
            .uniforms
            .as_ref()
            .map(|u| u.light_direction)
            .unwrap_or(REFERENCE_NORMAL);
        let [r, g, b, _] = shade(color, &REFERENCE_NORMAL, &light);
        [r, g, b]
    }

    fn draw_triangles(&mut self, vertices: &VertexBuffer, indices: &[u32]) {
        for triangle in indices.chunks_exact(3) {
            let mut coords = [(0.0, 0.0, 0.0); 3];
            let mut colors = [[0.0; 3]; 3];
            let mut visible = true;
            for (corner, &index) in triangle.iter().enumerate() {
                match self.to_cell(vertices, index as usize) {
                    Some(cell) => coords[corner] = cell,
                    None => {
                        // Triangle is clipped
                        visible = false;
                        break;
                    }
                }
                colors[corner] = self.shaded(vertices, index as usize);
            }
            if visible {
                self.rasterize_triangle(&coords, &colors);
            }
        }
    }

    fn draw_points(&mut self, vertices: &VertexBuffer, point_size: f32) {
        let limit = POINT_SIZE_RANGE.1 / CELL_WIDTH as f32;
        let span = (point_size / CELL_WIDTH as f32).ceil().clamp(1.0, limit) as i32;
        for index in 0..vertices.vertex_count() {
            let Some((x, y, depth)) = self.to_cell(vertices, index) else {
                continue;
            };
            let color = self.shaded(vertices, index);
            let (cx, cy) = (x.floor() as i32, y.floor() as i32);
            for dy in 0..span {
                for dx in 0..span {
                    self.plot(cx + dx - span / 2, cy + dy - span / 2, depth, color);
                }
            }
        }
    }

    fn rasterize_triangle(&mut self, coords: &[CellVertex; 3], colors: &[[f32; 3]; 3]) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box
        let min_x = v0.0.min(v1.0).min(v2.0).floor() as i32;
        let max_x = v0.0.max(v1.0).max(v2.0).ceil() as i32;
        let min_y = v0.1.min(v1.1).min(v2.1).floor() as i32;
        let max_y = v0.1.max(v1.1).max(v2.1).ceil() as i32;

        // Clip to screen bounds
        let min_x = min_x.max(0);
        let max_x = max_x.min(self.width as i32 - 1);
        let min_y = min_y.max(0);
        let max_y = max_y.min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) = barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), p) else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let color = [0, 1, 2].map(|c| w0 * colors[0][c] + w1 * colors[1][c] + w2 * colors[2][c]);
                self.plot(x, y, depth, color);
            }
        }
    }

    fn plot(&mut self, x: i32, y: i32, depth: f32, color: [f32; 3]) {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return;
        }
        let idx = y as usize * self.width + x as usize;
        if depth < self.depth_buffer[idx] {
            self.depth_buffer[idx] = depth;
            self.color_buffer[idx] = color;
        }
    }

    /// Pick glyphs from depth, spreading the ramp over the depth range of
    /// this frame
    fn resolve_glyphs(&mut self) {
        let (near, far) = self
            .depth_buffer
            .iter()
            .filter(|d| d.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &d| (lo.min(d), hi.max(d)));
        let range = (far - near).max(f32::EPSILON);
        let top = LUMINOSITY_RAMP.len() - 1;

        for (glyph, &depth) in self.char_buffer.iter_mut().zip(&self.depth_buffer) {
            *glyph = if depth.is_finite() {
                let closeness = 1.0 - (depth - near) / range;
                // Skip the blank glyph so every covered cell stays visible
                let index = 1 + (closeness * (top - 1) as f32).round() as usize;
                LUMINOSITY_RAMP[index.min(top)]
            } else {
                ' '
            };
        }
    }

    /// The character grid as plain text, one line per row
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity((self.width + 1) * self.height);
        for row in self.char_buffer.chunks(self.width.max(1)) {
            text.extend(row.iter());
            text.push('\n');
        }
        text
    }

    /// Queue the character grid starting at terminal row `top`
    pub fn present<W: Write>(&self, writer: &mut W, top: u16) -> std::io::Result<()> {
        let mut current: Option<Color> = None;
        for y in 0..self.height {
            writer.queue(cursor::MoveTo(0, top + y as u16))?;
            for x in 0..self.width {
                let idx = y * self.width + x;
                let c = self.char_buffer[idx];
                if c != ' ' {
                    let color = to_terminal_color(self.color_buffer[idx]);
                    if current != Some(color) {
                        writer.queue(SetForegroundColor(color))?;
                        current = Some(color);
                    }
                }
                writer.queue(Print(c))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

impl RenderBackend for AsciiRenderer {
    fn resize(&mut self, viewport: Viewport) {
        self.width = (viewport.width / CELL_WIDTH) as usize;
        self.height = (viewport.height / CELL_HEIGHT) as usize;
        let size = self.width * self.height;
        self.depth_buffer = vec![f32::INFINITY; size];
        self.color_buffer = vec![[0.0; 3]; size];
        self.char_buffer = vec![' '; size];
    }

    fn begin_frame(&mut self, uniforms: &FrameUniforms) {
        self.uniforms = Some(*uniforms);
        self.clear();
    }

    fn draw(&mut self, call: DrawCall<'_>) {
        match call {
            DrawCall::IndexedTriangles { vertices, indices } => self.draw_triangles(vertices, indices),
            DrawCall::Points { vertices, point_size } => self.draw_points(vertices, point_size),
        }
    }

    fn end_frame(&mut self) {
        self.resolve_glyphs();
    }
}

fn to_terminal_color(rgb: [f32; 3]) -> Color {
    let [r, g, b] = rgb.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color::Rgb { r, g, b }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);

    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

/// Pixel position of a terminal cell's center
pub fn cell_center(x: u16, y: u16) -> (f32, f32) {
    (
        (x as f32 + 0.5) * CELL_WIDTH as f32,
        (y as f32 + 0.5) * CELL_HEIGHT as f32,
    )
}

/// Terminal cell containing a model-space point, if it is on screen
pub fn cell_of(uniforms: &FrameUniforms, point: &Point3<f32>) -> Option<(u16, u16)> {
    let (x, y, _) = uniforms.transforms.project(point)?;
    let viewport = uniforms.transforms.viewport;
    if x < 0.0 || y < 0.0 || x >= viewport.width as f32 || y >= viewport.height as f32 {
        return None;
    }
    Some(((x / CELL_WIDTH as f32) as u16, (y / CELL_HEIGHT as f32) as u16))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plyview_core::{Camera, Light, Mesh, RenderPipeline, RenderSettings, Vertex};
    use std::sync::Arc;

    fn render(mesh: Mesh, columns: u16, rows: u16) -> AsciiRenderer {
        let mut renderer = AsciiRenderer::new(columns, rows);
        let pipeline = RenderPipeline::new(
            Arc::new(mesh),
            viewport_for_cells(columns, rows),
            RenderSettings::default(),
        );
        pipeline.render(&mut renderer, &Camera::new(), &Light::default());
        renderer
    }

    #[test]
    fn test_barycentric_inside_and_degenerate() {
        let (w0, w1, w2) = barycentric((0.0, 0.0), (4.0, 0.0), (0.0, 4.0), (1.0, 1.0)).unwrap();
        assert!((w0 + w1 + w2 - 1.0).abs() < 1e-6);
        assert!(w0 > 0.0 && w1 > 0.0 && w2 > 0.0);

        assert!(barycentric((0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (1.0, 0.0)).is_none());
    }

    #[test]
    fn test_cube_covers_screen_center() {
        let renderer = render(Mesh::cube(1.0), 80, 24);
        assert_eq!(renderer.width(), 80);
        assert_eq!(renderer.height(), 24);
        // The presentation offset moves the cube just below the vertical center
        assert!(renderer.covered_cells() > 0);
        let center = renderer.char_at(40, 13).unwrap();
        assert_ne!(center, ' ');
        assert_eq!(renderer.char_at(0, 0), Some(' '));
        assert_eq!(renderer.char_at(80, 0), None);
    }

    #[test]
    fn test_point_cloud_plots_cells() {
        let vertices = vec![
            Vertex::new(0.0, 0.5, 0.0),
            Vertex::new(0.5, 0.5, 0.0),
            Vertex::new(-0.5, 0.5, 0.0),
        ];
        let renderer = render(Mesh::from_parts(vertices, Vec::new()).unwrap(), 80, 24);
        assert_eq!(renderer.covered_cells(), 3);
    }

    #[test]
    fn test_oversized_points_stay_bounded() {
        let mesh = Mesh::from_parts(vec![Vertex::new(0.0, 0.5, 0.0)], Vec::new()).unwrap();
        let mut renderer = AsciiRenderer::new(80, 24);
        let settings = RenderSettings {
            point_size: 1e9,
            ..RenderSettings::default()
        };
        let pipeline = RenderPipeline::new(Arc::new(mesh), viewport_for_cells(80, 24), settings);
        pipeline.render(&mut renderer, &Camera::new(), &Light::default());

        let covered = renderer.covered_cells();
        assert!(covered > 1 && covered <= 64, "covered {}", covered);
    }

    #[test]
    fn test_present_writes_every_row() {
        let renderer = render(Mesh::cube(1.0), 20, 6);
        let mut out = Vec::new();
        renderer.present(&mut out, 1).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(LUMINOSITY_RAMP[1..].iter().any(|c| text.contains(*c)));
        // One cursor move per row
        assert_eq!(text.matches('H').count(), 6);
    }

    #[test]
    fn test_text_has_one_line_per_row() {
        let renderer = render(Mesh::cube(1.0), 20, 6);
        let text = renderer.to_text();
        assert_eq!(text.lines().count(), 6);
        assert!(text.lines().all(|line| line.chars().count() == 20));
    }

    #[test]
    fn test_resize_reallocates_grid() {
        let mut renderer = AsciiRenderer::new(10, 10);
        renderer.resize(Viewport::new(CELL_WIDTH * 4, CELL_HEIGHT * 3 + 5));
        assert_eq!((renderer.width(), renderer.height()), (4, 3));
        assert_eq!(renderer.char_at(3, 2), Some(' '));
        assert_eq!(renderer.char_at(0, 3), None);
    }
}
