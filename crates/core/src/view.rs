//! View state and page quad geometry
//!
//! Coordinates are viewport pixels with the origin at the viewport centre
//! and y pointing up. A scale of 1.0 maps one raster pixel to one viewport
//! pixel; a scale of 0.0 means "fit the rotated page into the viewport".

use std::fmt;

/// How the page should be scaled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleRequest {
    /// Largest scale at which the rotated page fits the viewport.
    Fit,
    /// Fixed factor, must be finite and positive.
    Factor(f64),
}

/// Render-thread view parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    /// Page shown; `None` without a document.
    pub current_page: Option<u32>,
    /// `0.0` means fit-to-viewport.
    pub scale: f64,
    /// Degrees counter-clockwise, in `[0, 360)`.
    pub rotation: f64,
    /// Viewport size in pixels.
    pub viewport: (u32, u32),
}

impl Default for ViewState {
    fn default() -> Self {
        Self { current_page: None, scale: 0.0, rotation: 0.0, viewport: (0, 0) }
    }
}

impl ViewState {
    pub fn apply_scale(&mut self, request: ScaleRequest) {
        self.scale = match request {
            ScaleRequest::Fit => 0.0,
            ScaleRequest::Factor(factor) => factor,
        };
    }

    pub fn is_fit(&self) -> bool {
        self.scale == 0.0
    }

    /// Scale actually used for a page of `width` x `height` pixels.
    pub fn effective_scale(&self, width: u32, height: u32) -> f64 {
        if self.is_fit() {
            fit_scale(width, height, self.rotation, self.viewport)
        } else {
            self.scale
        }
    }

    /// Quad for a page of `width` x `height` pixels, or `None` when the
    /// viewport or page is empty.
    pub fn page_quad<T>(&self, texture: T, width: u32, height: u32) -> Option<Quad<T>> {
        let (vw, vh) = self.viewport;
        if vw == 0 || vh == 0 || width == 0 || height == 0 {
            return None;
        }

        let scale = self.effective_scale(width, height);
        let half_w = width as f64 * scale / 2.0;
        let half_h = height as f64 * scale / 2.0;
        let (sin, cos) = self.rotation.to_radians().sin_cos();

        // TL, TR, BR, BL; the raster's top row is texture row 0.
        let corners = [(-half_w, half_h), (half_w, half_h), (half_w, -half_h), (-half_w, -half_h)];
        let tex_coords = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

        let mut vertices = [Vertex::default(); 4];
        for (vertex, ((x, y), tex_coord)) in vertices.iter_mut().zip(corners.into_iter().zip(tex_coords)) {
            vertex.position = [(x * cos - y * sin) as f32, (x * sin + y * cos) as f32];
            vertex.tex_coord = tex_coord;
        }

        Some(Quad { texture, vertices })
    }
}

/// Normalize degrees into `[0, 360)`.
pub fn normalize_rotation(degrees: f64) -> f64 {
    let normalized = degrees.rem_euclid(360.0);
    // rem_euclid of a tiny negative value rounds up to 360.0
    if normalized >= 360.0 {
        0.0
    } else {
        normalized
    }
}

/// Largest scale at which a `width` x `height` page rotated by `rotation`
/// degrees fits inside `viewport`.
pub fn fit_scale(width: u32, height: u32, rotation: f64, viewport: (u32, u32)) -> f64 {
    let (sin, cos) = rotation.to_radians().sin_cos();
    let (w, h) = (width as f64, height as f64);
    let bound_w = (w * cos).abs() + (h * sin).abs();
    let bound_h = (w * sin).abs() + (h * cos).abs();
    if bound_w <= 0.0 || bound_h <= 0.0 {
        return 0.0;
    }
    (viewport.0 as f64 / bound_w).min(viewport.1 as f64 / bound_h)
}

/// One corner of the page quad.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    /// Viewport pixels relative to the centre, y up.
    pub position: [f32; 2],
    pub tex_coord: [f32; 2],
}

/// Textured page quad, corners in TL, TR, BR, BL order of the unrotated page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad<T> {
    pub texture: T,
    pub vertices: [Vertex; 4],
}

impl<T> Quad<T> {
    /// Axis-aligned bounds as `(min_x, min_y, max_x, max_y)`.
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        self.vertices.iter().fold(
            (f32::MAX, f32::MAX, f32::MIN, f32::MIN),
            |(min_x, min_y, max_x, max_y), v| {
                (
                    min_x.min(v.position[0]),
                    min_y.min(v.position[1]),
                    max_x.max(v.position[0]),
                    max_y.max(v.position[1]),
                )
            },
        )
    }
}

/// Orthographic projection for the current viewport, origin at the centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    half_width: f32,
    half_height: f32,
}

impl Projection {
    pub fn new(width: u32, height: u32) -> Self {
        Self { half_width: width.max(1) as f32 / 2.0, half_height: height.max(1) as f32 / 2.0 }
    }

    /// Map a centre-relative pixel position to normalized device coordinates.
    pub fn to_ndc(&self, position: [f32; 2]) -> [f32; 2] {
        [position[0] / self.half_width, position[1] / self.half_height]
    }

    /// Column-major 4x4 matrix, ready for a `mat4` uniform.
    #[rustfmt::skip]
    pub fn matrix(&self) -> [f32; 16] {
        [
            1.0 / self.half_width, 0.0, 0.0, 0.0,
            0.0, 1.0 / self.half_height, 0.0, 0.0,
            0.0, 0.0, -1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ]
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

/// Everything the host needs to draw one frame.
#[derive(Clone, Copy, PartialEq)]
pub struct Frame<T> {
    pub clear_color: [f32; 4],
    pub projection: Projection,
    /// `None` draws the background only.
    pub quad: Option<Quad<T>>,
}

impl<T> Frame<T> {
    pub fn is_blank(&self) -> bool {
        self.quad.is_none()
    }
}

impl<T: fmt::Debug> fmt::Debug for Frame<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("clear_color", &self.clear_color)
            .field("texture", &self.quad.as_ref().map(|q| &q.texture))
            .finish()
    }
}
