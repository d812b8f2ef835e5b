use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pageview_cache::HeadlessBackend;
use pageview_core::{ViewerConfig, ViewerEvent, ViewportController};
use pageview_render::RasterSource;
use serde::Serialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Viewport used for headless sweeps.
const SWEEP_VIEWPORT: (u32, u32) = (1024, 768);

#[derive(Debug, Parser)]
#[command(name = "pageview-cli")]
#[command(about = "Headless driver for the pageview rasterization pipeline")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable document metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Rasterize every page through the viewer pipeline and report cache statistics.
    Sweep {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Maximum live textures.
        #[arg(long)]
        capacity: Option<usize>,
        /// Rasterization resolution in DPI.
        #[arg(long)]
        dpi: Option<f32>,
        /// TOML configuration file.
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
        /// Page (zero-based) to show while the sweep runs.
        #[arg(long, default_value_t = 0)]
        page: u32,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    first_page_size_pt: Option<PageSizeOutput>,
}

#[derive(Debug, Serialize)]
struct PageSizeOutput {
    width: f32,
    height: f32,
}

#[derive(Debug, Serialize)]
struct SweepOutput {
    path: String,
    page_count: u32,
    rasterized: u32,
    failed: u32,
    /// `false` when the worker stopped before the last page.
    sweep_complete: bool,
    pages_drawn: u32,
    raster_dpi: f32,
    capacity: usize,
    live_textures: usize,
    uploads: u64,
    evictions: u64,
    hits: u64,
    allocation_failures: u64,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging();

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Sweep { file, capacity, dpi, config, page } => {
            let config = load_config(config.as_deref(), capacity, dpi)?;
            run_sweep(&file, config, page)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging() {
    // Diagnostics go to stderr so stdout stays machine-readable.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(not(feature = "pdfium"))]
fn raster_source() -> Result<Arc<dyn RasterSource>> {
    Ok(Arc::new(pageview_render::default_source()))
}

#[cfg(feature = "pdfium")]
fn raster_source() -> Result<Arc<dyn RasterSource>> {
    let source = pageview_render::PdfiumSource::bind().context("failed to load PDFium")?;
    Ok(Arc::new(source))
}

fn load_config(path: Option<&Path>, capacity: Option<usize>, dpi: Option<f32>) -> Result<ViewerConfig> {
    let mut config = match path {
        Some(path) => ViewerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ViewerConfig::default(),
    }
    .with_env_overrides()
    .context("invalid PAGEVIEW_* environment")?;

    if let Some(capacity) = capacity {
        config.max_live_textures = capacity;
    }
    if let Some(dpi) = dpi {
        config.raster_dpi = dpi;
    }
    config.validate()?;
    Ok(config)
}

fn run_info(file: &Path) -> Result<()> {
    ensure_pdf_exists(file)?;

    let source = raster_source()?;
    let document = source.open(file).context("failed to open document")?;

    let page_count = document.page_count();
    let first_page_size_pt = if page_count > 0 {
        let size = document.page_size(0)?;
        Some(PageSizeOutput { width: size.width_pt, height: size.height_pt })
    } else {
        None
    };

    let payload = InfoOutput { path: file.display().to_string(), page_count, first_page_size_pt };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_sweep(file: &Path, config: ViewerConfig, start_page: u32) -> Result<()> {
    ensure_pdf_exists(file)?;

    let (wake_tx, wake_rx) = flume::unbounded::<()>();
    let raster_dpi = config.raster_dpi;
    let mut viewer = ViewportController::new(HeadlessBackend::new(), raster_source()?, config)
        .with_wake(Arc::new(move || {
            let _ = wake_tx.send(());
        }));

    viewer.on_resize(SWEEP_VIEWPORT.0, SWEEP_VIEWPORT.1);
    viewer.load_document(file).context("failed to open document")?;
    if start_page != 0 {
        viewer.change_page(start_page).context("invalid --page")?;
    }

    let summary = loop {
        viewer.paint();
        if let Some(summary) = viewer.sweep_summary() {
            break summary;
        }
        // Woken per published page; the timeout only bounds a missed wake.
        let _ = wake_rx.recv_timeout(Duration::from_millis(100));
    };
    log_events(&mut viewer);

    let mut pages_drawn = 0;
    for page in 0..viewer.page_count() {
        if let Err(err) = viewer.change_page(page) {
            tracing::warn!(page, "{err}");
        }
        if !viewer.paint().is_blank() {
            pages_drawn += 1;
        }
    }
    log_events(&mut viewer);

    let stats = viewer.cache_stats();
    let payload = SweepOutput {
        path: file.display().to_string(),
        page_count: viewer.page_count(),
        rasterized: summary.rasterized,
        failed: summary.failed,
        sweep_complete: !summary.cancelled,
        pages_drawn,
        raster_dpi,
        capacity: stats.capacity,
        live_textures: stats.live,
        uploads: stats.uploads,
        evictions: stats.evictions,
        hits: stats.hits,
        allocation_failures: stats.allocation_failures,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn log_events(viewer: &mut ViewportController<HeadlessBackend>) {
    for event in viewer.drain_events() {
        match &event {
            ViewerEvent::TextureFailed { page, reason } => {
                tracing::warn!(page, "texture failed: {reason}")
            }
            ViewerEvent::SweepAborted { reason } => tracing::warn!("sweep aborted: {reason}"),
            other => tracing::debug!(kind = other.kind(), ?other, "viewer event"),
        }
    }
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}
