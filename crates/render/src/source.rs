//! Raster source contract
//!
//! A [`RasterSource`] opens documents; the resulting [`DocumentHandle`] is
//! shared read-only between the render thread and the rasterization worker.

use image::{ImageBuffer, Rgba};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// RGBA8 image as produced by the backends.
pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Longest raster side a backend will allocate. Larger pages fail instead
/// of exhausting memory; no GPU samples a bigger texture anyway.
pub const MAX_RASTER_SIDE: u32 = 16_384;

/// Page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// US Letter, used when a page carries no usable MediaBox.
    pub const LETTER: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };
}

/// Resolution every page is rasterized at, in pixels per inch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetResolution {
    pub x_dpi: f32,
    pub y_dpi: f32,
}

impl Default for TargetResolution {
    fn default() -> Self {
        Self::uniform(220.0)
    }
}

impl TargetResolution {
    /// Same resolution on both axes.
    pub fn uniform(dpi: f32) -> Self {
        Self { x_dpi: dpi, y_dpi: dpi }
    }

    /// Pixel dimensions of a page of `size` at this resolution.
    ///
    /// Both dimensions are at least one pixel.
    pub fn pixel_size(&self, size: PageSize) -> (u32, u32) {
        let width = (size.width_pt * self.x_dpi / 72.0).round().max(1.0) as u32;
        let height = (size.height_pt * self.y_dpi / 72.0).round().max(1.0) as u32;
        (width, height)
    }

    /// Like [`pixel_size`](Self::pixel_size), but refuses sizes with a side
    /// longer than [`MAX_RASTER_SIDE`]. The error is the failure reason.
    pub fn bounded_pixel_size(&self, size: PageSize) -> Result<(u32, u32), String> {
        let width = (size.width_pt * self.x_dpi / 72.0).round();
        let height = (size.height_pt * self.y_dpi / 72.0).round();
        let limit = MAX_RASTER_SIDE as f32;
        if !(width <= limit && height <= limit) {
            return Err(format!(
                "raster of {width}x{height} pixels exceeds the {MAX_RASTER_SIDE} pixel side limit"
            ));
        }
        Ok(self.pixel_size(size))
    }
}

/// A decoded page: tightly packed RGBA8 rows, top row first.
#[derive(Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Wrap an image produced by a backend.
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height, pixels: image.into_raw() }
    }

    /// Number of bytes a `width` x `height` RGBA8 buffer must hold.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * BYTES_PER_PIXEL
    }

    /// Whether the buffer length matches the dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.pixels.len() == Self::expected_len(self.width, self.height)
    }
}

impl fmt::Debug for Raster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Raster")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Failure to open a document. The viewer stays empty after either variant.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to open document: {0}")]
    Open(String),
    #[error("document is password protected")]
    Locked,
}

impl OpenError {
    /// Password-protected documents are reported separately to the host.
    pub fn is_locked(&self) -> bool {
        matches!(self, OpenError::Locked)
    }
}

/// Failure to rasterize a single page. Never fatal to a sweep.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("page {page} out of range (page_count={page_count})")]
    OutOfRange { page: u32, page_count: u32 },
    #[error("page {page} failed to rasterize: {reason}")]
    Failed { page: u32, reason: String },
}

/// An opened document.
///
/// Implementations must be callable from the rasterization worker while the
/// render thread holds another reference to the same handle.
pub trait Document: Send + Sync {
    /// Number of pages `N`; valid indices are `0..N`.
    fn page_count(&self) -> u32;

    /// Page size in points.
    fn page_size(&self, page: u32) -> Result<PageSize, PageError>;

    /// Rasterize one page. May take hundreds of milliseconds.
    fn rasterize(&self, page: u32, resolution: TargetResolution) -> Result<Raster, PageError>;
}

/// Shared, read-only reference to an opened document.
pub type DocumentHandle = Arc<dyn Document>;

/// Opens documents from disk.
pub trait RasterSource: Send + Sync {
    fn open(&self, path: &Path) -> Result<DocumentHandle, OpenError>;
}

pub(crate) fn check_range(page: u32, page_count: u32) -> Result<(), PageError> {
    if page < page_count {
        Ok(())
    } else {
        Err(PageError::OutOfRange { page, page_count })
    }
}
