//! Background page rasterization
//!
//! A single [`RasterWorker`] sweeps every page of a document on its own
//! thread and publishes the results through a [`RasterInbox`]. The render
//! thread drains the inbox once per frame; nothing else is shared.
//!
//! # Example
//!
//! ```no_run
//! use pageview_render::{default_source, RasterSource, TargetResolution};
//! use pageview_scheduler::{raster_inbox, RasterWorker};
//! use std::path::Path;
//!
//! let document = default_source().open(Path::new("manual.pdf")).unwrap();
//! let (publisher, inbox) = raster_inbox();
//! let worker = RasterWorker::spawn(document, TargetResolution::default(), publisher, None).unwrap();
//!
//! // Once per frame on the render thread:
//! for message in inbox.drain_all() {
//!     println!("{message:?}");
//! }
//!
//! // Before opening another document:
//! worker.cancel_and_join();
//! ```

mod cancel;
mod inbox;
mod worker;

pub use cancel::CancellationToken;
pub use inbox::{raster_inbox, InboxMessage, RasterInbox, RasterPublisher, SweepSummary};
pub use worker::{RasterWorker, WakeCallback, WorkerError};
