//! Cooperative cancellation for a sweep
//!
//! The worker polls the token between pages; a page that is already being
//! rasterized always runs to completion.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Stop flag shared between the render thread and one worker.
///
/// Clones observe the same flag. A token is never reset: every load gets a
/// fresh one, so a late `cancel` cannot leak into the next sweep.
///
/// # Example
///
/// ```
/// use pageview_scheduler::CancellationToken;
///
/// let token = CancellationToken::new();
/// let worker_token = token.clone();
///
/// token.cancel();
/// assert!(worker_token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a token in the running state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the sweep to stop. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Whether `cancel()` was called on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
