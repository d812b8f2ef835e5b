//! Viewport controller
//!
//! Render-thread owner of everything the viewer shows: the open document,
//! its page records, the texture cache and the view parameters. The host
//! toolkit calls into it from its callbacks and draws the [`Frame`] that
//! [`ViewportController::paint`] returns.
//!
//! Loading a document cancels and joins the previous rasterization worker
//! before any page record is reset, so a raster from an earlier document can
//! never be recorded into the current one.

use crate::config::ViewerConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::events::ViewerEvent;
use crate::phase::{PhaseInput, ViewerPhase};
use crate::view::{normalize_rotation, Frame, Projection, ScaleRequest, ViewState};
use pageview_cache::{CacheError, PageStore, TextureBackend, TextureCache, TextureCacheStats};
use pageview_render::{DocumentHandle, OpenError, RasterSource};
use pageview_scheduler::{
    raster_inbox, InboxMessage, RasterInbox, RasterWorker, SweepSummary, WakeCallback,
};
use std::path::Path;
use std::sync::Arc;

/// State that exists only while a document is open.
struct OpenDocument {
    name: String,
    handle: DocumentHandle,
    worker: Option<RasterWorker>,
    inbox: RasterInbox,
    sweep: Option<SweepSummary>,
}

/// Single-page document viewer driven by host callbacks.
///
/// Must live on the thread that owns the graphics context.
pub struct ViewportController<B: TextureBackend> {
    source: Arc<dyn RasterSource>,
    config: ViewerConfig,
    wake: Option<WakeCallback>,
    phase: ViewerPhase,
    document: Option<OpenDocument>,
    store: PageStore<B::Texture>,
    cache: TextureCache<B>,
    view: ViewState,
    projection: Projection,
    events: Vec<ViewerEvent>,
    redraw: bool,
    /// Page whose texture failure was already reported.
    texture_failure: Option<u32>,
}

impl<B: TextureBackend> ViewportController<B> {
    pub fn new(backend: B, source: Arc<dyn RasterSource>, config: ViewerConfig) -> Self {
        let cache = TextureCache::new(backend, config.max_live_textures);
        Self {
            source,
            config,
            wake: None,
            phase: ViewerPhase::Empty,
            document: None,
            store: PageStore::new(),
            cache,
            view: ViewState::default(),
            projection: Projection::default(),
            events: Vec::new(),
            redraw: true,
            texture_failure: None,
        }
    }

    /// Callback run on the worker thread after each published page, e.g. to
    /// post a repaint request to the host's event loop.
    pub fn with_wake(mut self, wake: WakeCallback) -> Self {
        self.wake = Some(wake);
        self
    }

    /// Open `path` and start rasterizing it.
    ///
    /// The previous document is closed first, whatever the outcome. On
    /// success the viewer shows page 0 in the `Loading` phase; on failure it
    /// is `Empty` and a [`ViewerEvent::LoadFailed`] is queued.
    pub fn load_document(&mut self, path: &Path) -> ViewerResult<()> {
        self.teardown();
        tracing::info!(path = %path.display(), "loading document");

        let handle = match self.source.open(path) {
            Ok(handle) if handle.page_count() > 0 => handle,
            Ok(_) => return Err(self.fail_load(OpenError::Open("document has no pages".into()))),
            Err(err) => return Err(self.fail_load(err)),
        };
        let page_count = handle.page_count();

        let orphans = self.store.reset(page_count);
        self.destroy_orphans(orphans);

        let (publisher, inbox) = raster_inbox();
        let worker = match RasterWorker::spawn(
            handle.clone(),
            self.config.resolution(),
            publisher,
            self.wake.clone(),
        ) {
            Ok(worker) => worker,
            Err(err) => {
                let orphans = self.store.reset(0);
                self.destroy_orphans(orphans);
                self.phase = self.phase.next(PhaseInput::LoadFailed);
                self.events.push(ViewerEvent::LoadFailed { reason: err.to_string(), locked: false });
                self.redraw = true;
                return Err(err.into());
            }
        };

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        tracing::info!(%name, page_count, "document loaded");

        self.document =
            Some(OpenDocument { name: name.clone(), handle, worker: Some(worker), inbox, sweep: None });
        self.view.current_page = Some(0);
        self.phase = self.phase.next(PhaseInput::LoadStarted);
        self.events.push(ViewerEvent::DocumentLoaded { name, page_count });
        self.events.push(ViewerEvent::PageChanged { index: 0 });
        self.redraw = true;
        Ok(())
    }

    /// Close the current document, if any, and release its textures.
    pub fn close(&mut self) {
        if self.teardown() {
            tracing::info!("document closed");
            self.phase = self.phase.next(PhaseInput::Closed);
            self.redraw = true;
        }
    }

    /// Show page `page`.
    ///
    /// The page changes even if its raster has not arrived yet; the frame
    /// then shows the background until it does, without another call.
    ///
    /// # Errors
    /// [`ViewerError::PageOutOfRange`] and [`ViewerError::NoDocument`] leave
    /// the view untouched. [`ViewerError::Texture`] is returned after the
    /// page change when its texture could not be created.
    pub fn change_page(&mut self, page: u32) -> ViewerResult<()> {
        if self.document.is_none() {
            return Err(ViewerError::NoDocument);
        }
        let page_count = self.page_count();
        if page >= page_count {
            return Err(ViewerError::PageOutOfRange { page, page_count });
        }

        self.view.current_page = Some(page);
        self.texture_failure = None;
        self.events.push(ViewerEvent::PageChanged { index: page });
        self.redraw = true;

        let result = self.ensure_current_texture();
        self.sync_phase();
        result.map(|_| ()).map_err(ViewerError::from)
    }

    /// Advance one page. Returns `false` on the last page.
    pub fn next_page(&mut self) -> ViewerResult<bool> {
        let current = self.view.current_page.ok_or(ViewerError::NoDocument)?;
        if current + 1 >= self.page_count() {
            return Ok(false);
        }
        self.change_page(current + 1)?;
        Ok(true)
    }

    /// Go back one page. Returns `false` on the first page.
    pub fn prev_page(&mut self) -> ViewerResult<bool> {
        let current = self.view.current_page.ok_or(ViewerError::NoDocument)?;
        if current == 0 {
            return Ok(false);
        }
        self.change_page(current - 1)?;
        Ok(true)
    }

    pub fn set_scale(&mut self, request: ScaleRequest) -> ViewerResult<()> {
        if let ScaleRequest::Factor(factor) = request {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(ViewerError::InvalidScale(factor));
            }
        }
        self.view.apply_scale(request);
        self.redraw = true;
        Ok(())
    }

    /// Rotate the page to `degrees` counter-clockwise.
    pub fn set_rotation(&mut self, degrees: f64) -> ViewerResult<()> {
        if !degrees.is_finite() {
            return Err(ViewerError::InvalidRotation(degrees));
        }
        self.view.rotation = normalize_rotation(degrees);
        self.redraw = true;
        Ok(())
    }

    /// The viewport changed size; recompute the projection.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.view.viewport = (width, height);
        self.projection = Projection::new(width, height);
        self.redraw = true;
    }

    /// Per-frame work: take finished rasters from the worker, make sure the
    /// current page has a texture and build the frame to draw.
    pub fn paint(&mut self) -> Frame<B::Texture> {
        self.redraw = false;
        self.drain_inbox();

        // Never fails the frame; failures are reported as events.
        let texture = self.ensure_current_texture().ok().flatten();
        self.sync_phase();

        let quad = match (texture, self.current_page_dimensions()) {
            (Some(texture), Some((width, height))) => self.view.page_quad(texture, width, height),
            _ => None,
        };

        Frame { clear_color: self.config.background_color, projection: self.projection, quad }
    }

    /// Take the events queued since the last call.
    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    /// Something changed since the last [`paint`](Self::paint).
    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    pub fn phase(&self) -> ViewerPhase {
        self.phase
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Pages of the open document; 0 without one.
    pub fn page_count(&self) -> u32 {
        self.store.page_count()
    }

    pub fn current_page(&self) -> Option<u32> {
        self.view.current_page
    }

    /// Raster size of the current page, once it has arrived.
    pub fn current_page_dimensions(&self) -> Option<(u32, u32)> {
        self.view.current_page.and_then(|page| self.store.page_dimensions(page))
    }

    /// File name of the open document.
    pub fn document_name(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.name.as_str())
    }

    pub fn document(&self) -> Option<&DocumentHandle> {
        self.document.as_ref().map(|doc| &doc.handle)
    }

    /// Summary of the current sweep once its last message was drained.
    pub fn sweep_summary(&self) -> Option<SweepSummary> {
        self.document.as_ref().and_then(|doc| doc.sweep)
    }

    pub fn store(&self) -> &PageStore<B::Texture> {
        &self.store
    }

    pub fn cache_stats(&self) -> TextureCacheStats {
        self.cache.stats()
    }

    pub fn backend(&self) -> &B {
        self.cache.backend()
    }

    /// Change the live texture limit. Takes effect on the next upload.
    pub fn set_max_live_textures(&mut self, count: usize) {
        self.cache.set_capacity(count);
        self.config.max_live_textures = self.cache.capacity();
    }

    /// Host callback: the widget was resized.
    pub fn on_resize(&mut self, width: u32, height: u32) {
        self.resize(width, height);
    }

    /// Host callback: the widget needs repainting.
    pub fn on_paint(&mut self) -> Frame<B::Texture> {
        self.paint()
    }

    /// Host callback: the user picked a file. Failures are reported through
    /// [`ViewerEvent::LoadFailed`].
    pub fn on_load_requested(&mut self, path: &Path) -> bool {
        match self.load_document(path) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %path.display(), "{err}");
                false
            }
        }
    }

    /// Host callback: the user typed a page number (zero-based).
    pub fn on_page_requested(&mut self, page: u32) -> bool {
        accepted(self.change_page(page))
    }

    pub fn on_scale_requested(&mut self, request: ScaleRequest) -> bool {
        accepted(self.set_scale(request))
    }

    pub fn on_rotate_requested(&mut self, degrees: f64) -> bool {
        accepted(self.set_rotation(degrees))
    }

    fn fail_load(&mut self, err: OpenError) -> ViewerError {
        tracing::warn!("failed to open document: {err}");
        self.phase = self.phase.next(PhaseInput::LoadFailed);
        self.events.push(ViewerEvent::LoadFailed { reason: err.to_string(), locked: err.is_locked() });
        self.redraw = true;
        ViewerError::Open(err)
    }

    /// Stop the worker, then drop everything derived from the document.
    /// Returns `false` when no document was open.
    fn teardown(&mut self) -> bool {
        let Some(mut document) = self.document.take() else {
            return false;
        };

        if let Some(worker) = document.worker.take() {
            match worker.cancel_and_join() {
                Ok(summary) => tracing::debug!(?summary, "raster worker stopped"),
                Err(err) => tracing::error!("{err}"),
            }
        }
        let stale = document.inbox.len();
        if stale > 0 {
            tracing::debug!(stale, "discarding messages from the previous document");
        }
        drop(document);

        self.cache.invalidate_all(&mut self.store);
        let orphans = self.store.reset(0);
        self.destroy_orphans(orphans);
        self.view.current_page = None;
        self.texture_failure = None;
        true
    }

    fn destroy_orphans(&mut self, orphans: Vec<B::Texture>) {
        for texture in orphans {
            self.cache.backend_mut().destroy_texture(texture);
        }
    }

    fn drain_inbox(&mut self) {
        let Some(document) = self.document.as_mut() else {
            return;
        };

        // Once disconnected, everything the worker sent is already queued.
        let disconnected = document.inbox.is_disconnected();
        for message in document.inbox.drain_all() {
            match message {
                InboxMessage::Raster { page, raster } => {
                    let recorded =
                        self.store.record_raster(page, raster.pixels, raster.width, raster.height);
                    match recorded {
                        Ok(()) if self.view.current_page == Some(page) => self.redraw = true,
                        Ok(()) => {}
                        Err(err) => tracing::warn!("dropping raster: {err}"),
                    }
                }
                InboxMessage::PageFailed { page, error } => {
                    match self.store.record_failure(page, error.to_string()) {
                        Ok(true) => tracing::debug!(page, "page marked failed"),
                        Ok(false) => {}
                        Err(err) => tracing::warn!("{err}"),
                    }
                    if self.view.current_page == Some(page) {
                        self.redraw = true;
                    }
                }
                InboxMessage::SweepFinished(summary) => {
                    tracing::info!(
                        rasterized = summary.rasterized,
                        failed = summary.failed,
                        cancelled = summary.cancelled,
                        "raster sweep finished"
                    );
                    document.sweep = Some(summary);
                }
            }
        }

        if disconnected && document.sweep.is_none() {
            let reason = match document.worker.take().map(RasterWorker::join) {
                Some(Err(err)) => err.to_string(),
                _ => "raster worker stopped without finishing".to_owned(),
            };
            tracing::error!("{reason}");
            document.sweep = Some(SweepSummary {
                rasterized: self.store.ready_count() as u32,
                failed: self.store.failed_count() as u32,
                cancelled: true,
            });
            self.events.push(ViewerEvent::SweepAborted { reason });
            self.redraw = true;
        }
    }

    /// Bind the current page, reporting a failure once per page.
    fn ensure_current_texture(&mut self) -> Result<Option<B::Texture>, CacheError> {
        let Some(page) = self.view.current_page else {
            return Ok(None);
        };

        match self.cache.ensure_texture(&mut self.store, page) {
            Ok(status) => {
                if status.is_bound() {
                    self.texture_failure = None;
                }
                Ok(status.texture())
            }
            Err(err) => {
                if self.texture_failure != Some(page) {
                    tracing::warn!(page, "{err}");
                    self.events.push(ViewerEvent::TextureFailed { page, reason: err.to_string() });
                    self.texture_failure = Some(page);
                }
                Err(err)
            }
        }
    }

    fn sync_phase(&mut self) {
        let ready = self
            .view
            .current_page
            .and_then(|page| self.store.record(page))
            .is_some_and(|record| record.raster_valid());
        let input = if ready { PhaseInput::CurrentPageReady } else { PhaseInput::CurrentPageMissing };
        self.phase = self.phase.next(input);
    }
}

fn accepted(result: ViewerResult<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("request rejected: {err}");
            false
        }
    }
}

impl<B: TextureBackend> Drop for ViewportController<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
