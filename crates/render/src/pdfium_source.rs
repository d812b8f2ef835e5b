//! PDFium-backed rasterization (feature `pdfium`).

use crate::source::{
    check_range, Document, DocumentHandle, OpenError, PageError, PageSize, Raster, RasterSource,
    TargetResolution,
};
use pdfium_render::prelude::*;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Opens documents through a PDFium library bound once per source.
pub struct PdfiumSource {
    pdfium: &'static Pdfium,
}

impl PdfiumSource {
    /// Bind PDFium, looking next to the executable, then in the working
    /// directory, then in the system library paths.
    pub fn bind() -> Result<Self, OpenError> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()));

        let bindings = exe_dir
            .ok_or(())
            .and_then(|dir| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                    .map_err(|_| ())
            })
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| OpenError::Open(format!("failed to bind pdfium: {e}")))?;

        // Documents borrow the library for their whole life.
        let pdfium: &'static Pdfium = Box::leak(Box::new(Pdfium::new(bindings)));
        Ok(Self { pdfium })
    }
}

impl RasterSource for PdfiumSource {
    fn open(&self, path: &Path) -> Result<DocumentHandle, OpenError> {
        let document = self.pdfium.load_pdf_from_file(path, None).map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                OpenError::Locked
            }
            other => OpenError::Open(other.to_string()),
        })?;

        let page_count = document.pages().len() as u32;
        tracing::debug!(path = %path.display(), pages = page_count, "opened document with pdfium");
        Ok(Arc::new(PdfiumDocument { document: Mutex::new(document), page_count }))
    }
}

/// PDFium is not re-entrant; every call goes through the lock.
pub struct PdfiumDocument {
    document: Mutex<PdfDocument<'static>>,
    page_count: u32,
}

impl PdfiumDocument {
    fn with_page<T>(
        &self,
        page: u32,
        f: impl FnOnce(&PdfPage<'_>) -> Result<T, String>,
    ) -> Result<T, PageError> {
        check_range(page, self.page_count)?;
        let document = self
            .document
            .lock()
            .map_err(|_| PageError::Failed { page, reason: "document lock poisoned".into() })?;
        let pdf_page = document
            .pages()
            .get(page as u16)
            .map_err(|e| PageError::Failed { page, reason: e.to_string() })?;
        f(&pdf_page).map_err(|reason| PageError::Failed { page, reason })
    }
}

impl Document for PdfiumDocument {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn page_size(&self, page: u32) -> Result<PageSize, PageError> {
        self.with_page(page, |p| {
            Ok(PageSize { width_pt: p.width().value, height_pt: p.height().value })
        })
    }

    fn rasterize(&self, page: u32, resolution: TargetResolution) -> Result<Raster, PageError> {
        self.with_page(page, |p| {
            let size = PageSize { width_pt: p.width().value, height_pt: p.height().value };
            let (width, height) = resolution.bounded_pixel_size(size)?;

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = p.render_with_config(&config).map_err(|e| e.to_string())?;

            let raster = Raster {
                width: bitmap.width() as u32,
                height: bitmap.height() as u32,
                pixels: bitmap.as_rgba_bytes().to_vec(),
            };
            if raster.is_well_formed() {
                Ok(raster)
            } else {
                Err(format!("bitmap size mismatch ({}x{})", raster.width, raster.height))
            }
        })
    }
}
