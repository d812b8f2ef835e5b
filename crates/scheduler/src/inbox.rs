//! Worker → render thread handoff
//!
//! An unbounded channel, so publishing never blocks the worker. Messages are
//! delivered in publish order, exactly once.

use flume::{Receiver, Sender};
use pageview_render::{PageError, Raster};

/// Outcome of a whole sweep, published as the last message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Pages that produced a raster.
    pub rasterized: u32,
    /// Pages that failed and will never get one.
    pub failed: u32,
    /// The sweep stopped early on cancellation.
    pub cancelled: bool,
}

/// One message from the worker.
#[derive(Debug)]
pub enum InboxMessage {
    /// A page finished rasterizing.
    Raster { page: u32, raster: Raster },
    /// A page could not be rasterized.
    PageFailed { page: u32, error: PageError },
    /// No more messages follow for this sweep.
    SweepFinished(SweepSummary),
}

impl InboxMessage {
    /// Page the message refers to, if any.
    pub fn page(&self) -> Option<u32> {
        match self {
            InboxMessage::Raster { page, .. } | InboxMessage::PageFailed { page, .. } => {
                Some(*page)
            }
            InboxMessage::SweepFinished(_) => None,
        }
    }
}

/// Create a connected publisher/inbox pair. One pair per document load.
pub fn raster_inbox() -> (RasterPublisher, RasterInbox) {
    let (tx, rx) = flume::unbounded();
    (RasterPublisher { tx }, RasterInbox { rx })
}

/// Sending half, owned by the worker.
#[derive(Debug, Clone)]
pub struct RasterPublisher {
    tx: Sender<InboxMessage>,
}

impl RasterPublisher {
    /// Publish a message without blocking.
    ///
    /// Returns `false` when the inbox has been dropped, i.e. the render
    /// thread has moved on to another document.
    pub fn publish(&self, message: InboxMessage) -> bool {
        self.tx.send(message).is_ok()
    }

    /// Publish a finished page.
    pub fn publish_raster(&self, page: u32, pixels: Vec<u8>, width: u32, height: u32) -> bool {
        self.publish(InboxMessage::Raster { page, raster: Raster { width, height, pixels } })
    }
}

/// Receiving half, owned by the render thread.
#[derive(Debug)]
pub struct RasterInbox {
    rx: Receiver<InboxMessage>,
}

impl RasterInbox {
    /// Take every message currently queued, oldest first.
    ///
    /// Returns immediately; the result is empty when nothing is pending.
    pub fn drain_all(&self) -> Vec<InboxMessage> {
        self.rx.try_iter().collect()
    }

    /// Number of queued messages.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Every publisher is gone; whatever is queued is all there will be.
    pub fn is_disconnected(&self) -> bool {
        self.rx.is_disconnected()
    }
}
