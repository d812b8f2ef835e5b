//! Notifications for the host toolkit

/// Something the host should react to, e.g. by updating a title bar or a
/// page counter. Collected by the controller and taken with
/// `drain_events`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    /// A document opened; its pages are being rasterized.
    DocumentLoaded { name: String, page_count: u32 },
    /// Opening a document failed; the viewer is empty.
    LoadFailed {
        reason: String,
        /// The document is password protected.
        locked: bool,
    },
    /// The current page changed.
    PageChanged { index: u32 },
    /// A texture for `page` could not be created.
    TextureFailed { page: u32, reason: String },
    /// The rasterization worker died before finishing; pages it did not
    /// reach stay blank until the document is reloaded.
    SweepAborted { reason: String },
}

impl ViewerEvent {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewerEvent::DocumentLoaded { .. } => "document_loaded",
            ViewerEvent::LoadFailed { .. } => "load_failed",
            ViewerEvent::PageChanged { .. } => "page_changed",
            ViewerEvent::TextureFailed { .. } => "texture_failed",
            ViewerEvent::SweepAborted { .. } => "sweep_aborted",
        }
    }
}
