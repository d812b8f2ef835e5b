//! The rasterization worker.
//!
//! One background thread per loaded document. It rasterizes pages `0..N` in
//! order, publishes each result as soon as it is ready and checks its
//! cancellation token between pages. It never touches GPU state or the page
//! store; the inbox is its only output.

use crate::cancel::CancellationToken;
use crate::inbox::{InboxMessage, RasterPublisher, SweepSummary};
use pageview_render::{DocumentHandle, PageError, TargetResolution};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Called on the worker thread after every publish, so a host can schedule
/// a repaint instead of polling.
pub type WakeCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("failed to spawn raster worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("raster worker panicked")]
    Panicked,
}

/// Handle to a running sweep.
///
/// Dropping the handle cancels the sweep and waits for the thread, so a
/// worker never outlives the load that started it.
pub struct RasterWorker {
    token: CancellationToken,
    thread: Option<JoinHandle<SweepSummary>>,
}

impl RasterWorker {
    /// Start sweeping `document` on a new thread.
    ///
    /// # Arguments
    ///
    /// * `document` - Handle shared read-only with the render thread
    /// * `resolution` - Resolution every page is rasterized at
    /// * `publisher` - Sending half of this load's inbox
    /// * `wake` - Optional callback invoked after each publish
    pub fn spawn(
        document: DocumentHandle,
        resolution: TargetResolution,
        publisher: RasterPublisher,
        wake: Option<WakeCallback>,
    ) -> Result<Self, WorkerError> {
        let token = CancellationToken::new();
        let worker_token = token.clone();

        let thread = thread::Builder::new()
            .name("pageview-raster-worker".to_string())
            .spawn(move || sweep(document, resolution, publisher, worker_token, wake))?;

        Ok(Self { token, thread: Some(thread) })
    }

    /// A clone of the sweep's stop flag.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Ask the sweep to stop after the page in progress.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The thread has exited.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the sweep to end on its own.
    pub fn join(mut self) -> Result<SweepSummary, WorkerError> {
        self.join_inner()
    }

    /// Cancel, then wait until the worker is quiescent.
    ///
    /// After this returns no further message from this sweep can be
    /// published.
    pub fn cancel_and_join(mut self) -> Result<SweepSummary, WorkerError> {
        self.token.cancel();
        self.join_inner()
    }

    fn join_inner(&mut self) -> Result<SweepSummary, WorkerError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| WorkerError::Panicked),
            None => Ok(SweepSummary::default()),
        }
    }
}

impl Drop for RasterWorker {
    fn drop(&mut self) {
        self.token.cancel();
        if let Err(err) = self.join_inner() {
            tracing::error!("{err}");
        }
    }
}

fn sweep(
    document: DocumentHandle,
    resolution: TargetResolution,
    publisher: RasterPublisher,
    token: CancellationToken,
    wake: Option<WakeCallback>,
) -> SweepSummary {
    let page_count = document.page_count();
    let mut summary = SweepSummary::default();
    tracing::debug!(pages = page_count, "raster sweep started");

    for page in 0..page_count {
        if token.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let message = match document.rasterize(page, resolution) {
            Ok(raster) if raster.is_well_formed() => {
                summary.rasterized += 1;
                InboxMessage::Raster { page, raster }
            }
            Ok(raster) => {
                summary.failed += 1;
                let reason = format!(
                    "malformed raster {}x{} with {} bytes",
                    raster.width,
                    raster.height,
                    raster.pixels.len()
                );
                tracing::warn!(page, "{reason}");
                InboxMessage::PageFailed { page, error: PageError::Failed { page, reason } }
            }
            Err(error) => {
                summary.failed += 1;
                tracing::warn!(page, "{error}");
                InboxMessage::PageFailed { page, error }
            }
        };

        if !publisher.publish(message) {
            tracing::debug!(page, "inbox closed, abandoning sweep");
            summary.cancelled = true;
            return summary;
        }
        if let Some(wake) = &wake {
            wake();
        }
    }

    publisher.publish(InboxMessage::SweepFinished(summary));
    if let Some(wake) = &wake {
        wake();
    }
    tracing::debug!(?summary, "raster sweep finished");
    summary
}
