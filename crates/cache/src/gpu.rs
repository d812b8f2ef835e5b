//! GPU texture cache with LRU eviction
//!
//! Keeps at most `capacity` page textures alive. Textures are created lazily
//! from the pixels retained in the [`PageStore`]; when the cache is full the
//! least recently used texture is destroyed to make room.
//!
//! The cache owns the GPU side (backend and recency order); the binding of a
//! texture to a page lives in the page's record. After every public call:
//!
//! - `live_count() == recency order length == store.bound_count()`
//! - every page in the recency order has a texture bound
//! - a page with a texture bound has a ready raster

use crate::backend::{GpuError, TextureBackend, TextureFilter};
use crate::page_store::PageStore;
use std::collections::VecDeque;

/// Default maximum number of live textures.
pub const DEFAULT_CAPACITY: usize = 50;

/// Result of [`TextureCache::ensure_texture`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureStatus<T> {
    /// A live texture represents the page.
    Bound(T),
    /// No raster for the page yet (or it failed); nothing was changed.
    NotReady,
}

impl<T: Copy> TextureStatus<T> {
    pub fn texture(&self) -> Option<T> {
        match self {
            TextureStatus::Bound(texture) => Some(*texture),
            TextureStatus::NotReady => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, TextureStatus::Bound(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    /// Allocation kept failing after every other texture was evicted.
    #[error("out of texture memory for page {page}: {source}")]
    OutOfTextureMemory { page: u32, source: GpuError },
    #[error("texture upload failed for page {page}: {source}")]
    Upload { page: u32, source: GpuError },
}

/// Statistics about texture cache usage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextureCacheStats {
    /// Textures currently alive
    pub live: usize,
    /// Maximum live textures
    pub capacity: usize,
    /// Requests answered by an already bound texture
    pub hits: u64,
    /// Requests for pages without a raster
    pub not_ready: u64,
    /// Textures created from stored pixels
    pub uploads: u64,
    /// Textures destroyed to make room
    pub evictions: u64,
    /// Allocations the backend refused for lack of memory
    pub allocation_failures: u64,
}

impl TextureCacheStats {
    /// Fraction of requests for ready pages that needed no upload.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.uploads;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Bounded cache of page textures.
///
/// Must only be used on the thread that owns the graphics context.
///
/// # Example
///
/// ```
/// use pageview_cache::{HeadlessBackend, PageStore, TextureCache, TextureStatus};
///
/// let mut cache = TextureCache::new(HeadlessBackend::new(), 2);
/// let mut store = PageStore::with_pages(3);
///
/// assert_eq!(cache.ensure_texture(&mut store, 0).unwrap(), TextureStatus::NotReady);
///
/// store.record_raster(0, vec![255; 4], 1, 1).unwrap();
/// assert!(cache.ensure_texture(&mut store, 0).unwrap().is_bound());
/// assert_eq!(cache.live_count(), 1);
/// ```
#[derive(Debug)]
pub struct TextureCache<B: TextureBackend> {
    backend: B,
    /// Least recently used at the front.
    recency: VecDeque<u32>,
    capacity: usize,
    filter: TextureFilter,
    stats: TextureCacheStats,
}

impl<B: TextureBackend> TextureCache<B> {
    /// Create a cache holding at most `capacity` textures (at least one).
    pub fn new(backend: B, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            backend,
            recency: VecDeque::with_capacity(capacity),
            capacity,
            filter: TextureFilter::Linear,
            stats: TextureCacheStats { capacity, ..Default::default() },
        }
    }

    /// Filter used for textures created from now on.
    pub fn with_filter(mut self, filter: TextureFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Make sure `page` has a live texture, creating one from its stored
    /// pixels if needed.
    ///
    /// A bound page becomes the most recently used and keeps its handle.
    /// An unbound page with a ready raster gets a new texture, after
    /// evicting least recently used textures while the cache is full. A page
    /// without a raster returns [`TextureStatus::NotReady`] and changes
    /// nothing.
    ///
    /// The currently displayed page is not pinned; it survives only by
    /// being touched every frame.
    ///
    /// # Errors
    ///
    /// [`CacheError::OutOfTextureMemory`] when the backend keeps refusing the
    /// allocation after every other texture was evicted. The page is left
    /// unbound and the cache consistent.
    pub fn ensure_texture(
        &mut self,
        store: &mut PageStore<B::Texture>,
        page: u32,
    ) -> Result<TextureStatus<B::Texture>, CacheError> {
        let page_count = store.page_count();
        if page >= page_count {
            return Err(CacheError::PageOutOfRange { page, page_count });
        }

        if let Some(texture) = store.record(page).and_then(|r| r.texture()) {
            self.touch(page);
            self.stats.hits += 1;
            return Ok(TextureStatus::Bound(texture));
        }

        if store.ready_raster(page).is_none() {
            self.stats.not_ready += 1;
            return Ok(TextureStatus::NotReady);
        }

        while self.recency.len() >= self.capacity {
            if !self.evict_lru(store) {
                break;
            }
        }

        loop {
            let created = match store.ready_raster(page) {
                Some((width, height, pixels)) => {
                    self.backend.create_texture(width, height, pixels, self.filter)
                }
                None => return Ok(TextureStatus::NotReady),
            };

            match created {
                Ok(texture) => {
                    store.bind(page, texture);
                    self.recency.push_back(page);
                    self.stats.uploads += 1;
                    self.sync_live();
                    self.debug_check(store);
                    return Ok(TextureStatus::Bound(texture));
                }
                Err(source @ GpuError::OutOfMemory { .. }) => {
                    self.stats.allocation_failures += 1;
                    if !self.evict_lru(store) {
                        tracing::warn!(page, "{source}, nothing left to evict");
                        self.debug_check(store);
                        return Err(CacheError::OutOfTextureMemory { page, source });
                    }
                    tracing::debug!(page, "{source}, evicted another texture and retrying");
                }
                Err(source) => {
                    tracing::warn!(page, "{source}");
                    self.debug_check(store);
                    return Err(CacheError::Upload { page, source });
                }
            }
        }
    }

    /// Destroy every live texture. Stored rasters are kept, so pages can be
    /// re-uploaded later without rasterizing again.
    pub fn invalidate_all(&mut self, store: &mut PageStore<B::Texture>) {
        let count = self.recency.len();
        while let Some(page) = self.recency.pop_front() {
            if let Some(texture) = store.unbind(page) {
                self.backend.destroy_texture(texture);
            }
        }
        // Bindings the recency order does not know about would be leaks.
        for page in 0..store.page_count() {
            if let Some(texture) = store.unbind(page) {
                tracing::warn!(page, "unbinding texture missing from recency order");
                self.backend.destroy_texture(texture);
            }
        }
        self.sync_live();
        if count > 0 {
            tracing::debug!(count, "invalidated all textures");
        }
    }

    /// Change the capacity for future evictions (at least one).
    ///
    /// Shrinking does not evict right away; the next upload that needs room
    /// evicts down below the new capacity.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        self.stats.capacity = self.capacity;
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live textures.
    pub fn live_count(&self) -> usize {
        self.recency.len()
    }

    /// Bound pages, least recently used first.
    pub fn recency_order(&self) -> impl Iterator<Item = u32> + '_ {
        self.recency.iter().copied()
    }

    pub fn stats(&self) -> TextureCacheStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn touch(&mut self, page: u32) {
        if let Some(pos) = self.recency.iter().position(|&p| p == page) {
            self.recency.remove(pos);
        }
        self.recency.push_back(page);
    }

    /// Destroy the least recently used texture. Returns `false` when the
    /// cache is empty.
    fn evict_lru(&mut self, store: &mut PageStore<B::Texture>) -> bool {
        let Some(page) = self.recency.pop_front() else {
            return false;
        };
        if let Some(texture) = store.unbind(page) {
            self.backend.destroy_texture(texture);
        }
        self.stats.evictions += 1;
        self.sync_live();
        tracing::debug!(page, "evicted texture");
        true
    }

    fn sync_live(&mut self) {
        self.stats.live = self.recency.len();
    }

    fn debug_check(&self, store: &PageStore<B::Texture>) {
        debug_assert_eq!(self.recency.len(), store.bound_count());
        debug_assert!(self
            .recency
            .iter()
            .all(|&p| store.record(p).is_some_and(|r| r.texture_bound() && r.raster_valid())));
    }
}
