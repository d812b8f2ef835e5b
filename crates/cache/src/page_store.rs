//! Per-page records for the loaded document
//!
//! Records live in a `Vec` sized once at load time and indexed by page
//! number. A record keeps its raster pixels for as long as the document is
//! loaded, so an evicted texture can be recreated without rasterizing again.

use std::fmt;

/// Raster availability of one page.
#[derive(Clone, PartialEq, Eq)]
pub enum RasterState {
    /// Not received yet.
    Pending,
    /// Pixels received; `pixels` is `width * height` RGBA8, top row first.
    Ready { width: u32, height: u32, pixels: Vec<u8> },
    /// Rasterization failed; the page stays blank until the next load.
    Failed { reason: String },
}

impl fmt::Debug for RasterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterState::Pending => f.write_str("Pending"),
            RasterState::Ready { width, height, pixels } => f
                .debug_struct("Ready")
                .field("width", width)
                .field("height", height)
                .field("bytes", &pixels.len())
                .finish(),
            RasterState::Failed { reason } => {
                f.debug_struct("Failed").field("reason", reason).finish()
            }
        }
    }
}

/// One page of the loaded document.
///
/// A texture is only ever bound to a record whose raster is ready.
#[derive(Debug, Clone)]
pub struct PageRecord<T> {
    raster: RasterState,
    texture: Option<T>,
}

impl<T: Copy> PageRecord<T> {
    fn pending() -> Self {
        Self { raster: RasterState::Pending, texture: None }
    }

    pub fn raster(&self) -> &RasterState {
        &self.raster
    }

    /// Pixels have been received for this page.
    pub fn raster_valid(&self) -> bool {
        matches!(self.raster, RasterState::Ready { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.raster, RasterState::Failed { .. })
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self.raster {
            RasterState::Ready { width, height, .. } => Some((width, height)),
            _ => None,
        }
    }

    pub fn pixels(&self) -> Option<&[u8]> {
        match &self.raster {
            RasterState::Ready { pixels, .. } => Some(pixels),
            _ => None,
        }
    }

    /// Texture currently representing this page.
    pub fn texture(&self) -> Option<T> {
        self.texture
    }

    pub fn texture_bound(&self) -> bool {
        self.texture.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("empty raster for page {page}")]
    EmptyRaster { page: u32 },
    #[error("raster for page {page} is {width}x{height} but holds {len} bytes")]
    SizeMismatch { page: u32, width: u32, height: u32, len: usize },
}

/// Records for every page of the current document, generic over the GPU
/// texture handle type.
#[derive(Debug, Clone)]
pub struct PageStore<T> {
    pages: Vec<PageRecord<T>>,
}

impl<T: Copy> Default for PageStore<T> {
    fn default() -> Self {
        Self { pages: Vec::new() }
    }
}

impl<T: Copy> PageStore<T> {
    /// An empty store (no document).
    pub fn new() -> Self {
        Self::default()
    }

    /// A store of `page_count` pending records.
    pub fn with_pages(page_count: u32) -> Self {
        let mut store = Self::new();
        store.reset(page_count);
        store
    }

    /// Reallocate for a document of `page_count` pages.
    ///
    /// Textures must have been released through the cache beforehand; any
    /// handle still bound is returned so the caller can destroy it.
    #[must_use = "orphaned textures must be destroyed"]
    pub fn reset(&mut self, page_count: u32) -> Vec<T> {
        let orphans: Vec<T> = self.pages.iter().filter_map(PageRecord::texture).collect();
        if !orphans.is_empty() {
            tracing::warn!(count = orphans.len(), "page store reset with textures still bound");
        }
        self.pages.clear();
        self.pages.resize_with(page_count as usize, PageRecord::pending);
        orphans
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn record(&self, page: u32) -> Option<&PageRecord<T>> {
        self.pages.get(page as usize)
    }

    /// Store the raster received for `page`.
    ///
    /// A later call for the same page overwrites the earlier pixels. Texture
    /// state is left alone.
    pub fn record_raster(
        &mut self,
        page: u32,
        pixels: Vec<u8>,
        width: u32,
        height: u32,
    ) -> Result<(), StoreError> {
        self.check_range(page)?;
        if pixels.is_empty() || width == 0 || height == 0 {
            return Err(StoreError::EmptyRaster { page });
        }
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(StoreError::SizeMismatch { page, width, height, len: pixels.len() });
        }

        self.pages[page as usize].raster = RasterState::Ready { width, height, pixels };
        Ok(())
    }

    /// Mark `page` as permanently failed.
    ///
    /// Returns `false` and changes nothing when a raster was already
    /// received for the page.
    pub fn record_failure(&mut self, page: u32, reason: String) -> Result<bool, StoreError> {
        self.check_range(page)?;
        let record = &mut self.pages[page as usize];
        if record.raster_valid() {
            return Ok(false);
        }
        record.raster = RasterState::Failed { reason };
        Ok(true)
    }

    /// Pixel dimensions of a received raster; `None` until it arrives.
    pub fn page_dimensions(&self, page: u32) -> Option<(u32, u32)> {
        self.record(page).and_then(PageRecord::dimensions)
    }

    pub fn ready_count(&self) -> usize {
        self.pages.iter().filter(|r| r.raster_valid()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.pages.iter().filter(|r| r.is_failed()).count()
    }

    /// Records with a live texture.
    pub fn bound_count(&self) -> usize {
        self.pages.iter().filter(|r| r.texture_bound()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &PageRecord<T>)> {
        self.pages.iter().enumerate().map(|(i, r)| (i as u32, r))
    }

    pub(crate) fn check_range(&self, page: u32) -> Result<(), StoreError> {
        if page < self.page_count() {
            Ok(())
        } else {
            Err(StoreError::PageOutOfRange { page, page_count: self.page_count() })
        }
    }

    /// Raster of a ready page, borrowed for upload.
    pub(crate) fn ready_raster(&self, page: u32) -> Option<(u32, u32, &[u8])> {
        match &self.pages.get(page as usize)?.raster {
            RasterState::Ready { width, height, pixels } => Some((*width, *height, pixels)),
            _ => None,
        }
    }

    pub(crate) fn bind(&mut self, page: u32, texture: T) {
        let record = &mut self.pages[page as usize];
        debug_assert!(record.raster_valid(), "binding a texture to a page without pixels");
        record.texture = Some(texture);
    }

    pub(crate) fn unbind(&mut self, page: u32) -> Option<T> {
        self.pages.get_mut(page as usize).and_then(|r| r.texture.take())
    }
}
