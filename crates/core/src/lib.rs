//! Single-page document viewer core
//!
//! [`ViewportController`] ties the pieces together on the render thread:
//! documents are opened through a [`RasterSource`](pageview_render::RasterSource),
//! rasterized in the background by a
//! [`RasterWorker`](pageview_scheduler::RasterWorker), and shown through a
//! bounded [`TextureCache`](pageview_cache::TextureCache).
//!
//! # Example
//!
//! ```no_run
//! use pageview_cache::HeadlessBackend;
//! use pageview_core::{ScaleRequest, ViewerConfig, ViewportController};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let source = Arc::new(pageview_render::default_source());
//! let mut viewer = ViewportController::new(HeadlessBackend::new(), source, ViewerConfig::default());
//!
//! viewer.on_resize(1280, 720);
//! viewer.load_document(Path::new("manual.pdf")).unwrap();
//! viewer.set_scale(ScaleRequest::Fit).unwrap();
//!
//! // Once per frame:
//! let frame = viewer.paint();
//! if let Some(quad) = frame.quad {
//!     println!("draw {:?} with {:?}", quad.texture, quad.vertices);
//! }
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod events;
#[cfg(feature = "glow")]
pub mod gl;
pub mod phase;
pub mod view;

pub use config::{ConfigError, ViewerConfig};
pub use controller::ViewportController;
pub use error::{ViewerError, ViewerResult};
pub use events::ViewerEvent;
#[cfg(feature = "glow")]
pub use gl::GlowBackend;
pub use phase::{PhaseInput, ViewerPhase};
pub use view::{Frame, Projection, Quad, ScaleRequest, Vertex, ViewState};
