use pageview_cache::CacheError;
use pageview_render::OpenError;
use pageview_scheduler::WorkerError;

/// Errors returned by the viewport controller.
#[derive(Debug, thiserror::Error)]
pub enum ViewerError {
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("no document loaded")]
    NoDocument,
    #[error("invalid scale {0}: must be finite and positive")]
    InvalidScale(f64),
    #[error("invalid rotation {0}: must be finite")]
    InvalidRotation(f64),
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error(transparent)]
    Texture(#[from] CacheError),
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl ViewerError {
    /// The document could not be opened because it is password protected.
    pub fn is_locked(&self) -> bool {
        matches!(self, ViewerError::Open(err) if err.is_locked())
    }
}

pub type ViewerResult<T> = Result<T, ViewerError>;
