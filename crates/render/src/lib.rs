//! Page rasterization sources
//!
//! Turns a page of an opened document into an RGBA pixel buffer at a fixed
//! target resolution. The viewer treats every backend as a black box behind
//! the [`RasterSource`] and [`Document`] traits.

pub mod lopdf_source;
#[cfg(feature = "pdfium")]
pub mod pdfium_source;
pub mod source;

pub use lopdf_source::{LopdfDocument, LopdfSource};
#[cfg(feature = "pdfium")]
pub use pdfium_source::{PdfiumDocument, PdfiumSource};
pub use source::{
    Document, DocumentHandle, OpenError, PageError, PageSize, Raster, RasterSource, RgbaImage,
    TargetResolution, MAX_RASTER_SIDE,
};

/// Backend used when no other source is configured.
pub fn default_source() -> LopdfSource {
    LopdfSource::new()
}
