//! Page store and bounded GPU texture cache
//!
//! The [`PageStore`] keeps one record per page: the retained raster and the
//! texture currently representing it, if any. The [`TextureCache`] decides
//! which pages hold a live texture, never more than its capacity, evicting
//! the least recently used one when it needs room.

pub mod backend;
pub mod gpu;
pub mod page_store;

pub use backend::{GpuError, HeadlessBackend, HeadlessTexture, TextureBackend, TextureFilter};
pub use gpu::{CacheError, TextureCache, TextureCacheStats, TextureStatus, DEFAULT_CAPACITY};
pub use page_store::{PageRecord, PageStore, RasterState, StoreError};
