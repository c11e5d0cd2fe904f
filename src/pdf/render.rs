//! On-demand rasterization of single PDF pages to JPEG.
//!
//! [`PageRenderer`] resolves a [`PdfPageRef`] to a file in the [`PdfCache`],
//! asks a [`Rasterizer`] for an RGB bitmap of exactly that page at
//! `scale` times its point size, and JPEG-encodes the result. All of it runs
//! on a blocking thread; every call opens and drops its own document handle.
//!
//! The production rasterizer is pdfium. The native library is not
//! thread-safe, so [`PdfiumRasterizer`] funnels work to one dedicated thread
//! that owns the binding; JPEG encoding still runs in parallel.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, OnceLock};

use image::RgbImage;
use image::codecs::jpeg::JpegEncoder;
use pdfium_render::prelude::{PdfBitmapFormat, PdfRenderConfig, Pdfium};
use tracing::{debug, info, instrument, warn};

use super::error::PdfError;
use super::page_ref::PdfPageRef;
use crate::cache::PdfCache;

/// Default linear upscale factor relative to the page's point size.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Default JPEG quality.
pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Content type of rendered pages.
pub const RENDERED_CONTENT_TYPE: &str = "image/jpeg";

/// Environment variable naming an explicit pdfium library path.
pub const PDFIUM_LIB_PATH_ENV: &str = "PAGEBRIDGE_PDFIUM_LIB_PATH";

/// Turns one page of a PDF file into an RGB bitmap.
pub trait Rasterizer: Send + Sync + 'static {
    /// Renders page `page_index` of the document at `path`, scaled by `scale`.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::DocumentOpen`] for unreadable files,
    /// [`PdfError::PageIndexOutOfRange`] for indices past the last page, and
    /// [`PdfError::Render`] if rasterization itself fails.
    fn rasterize(&self, path: &Path, page_index: u16, scale: f32) -> Result<RgbImage, PdfError>;
}

/// A rendered, encoded page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    /// Encoded JPEG bytes.
    pub bytes: Vec<u8>,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
}

/// Renders virtual PDF page references to JPEG images.
#[derive(Clone)]
pub struct PageRenderer {
    cache: PdfCache,
    rasterizer: Arc<dyn Rasterizer>,
    scale: f32,
    jpeg_quality: u8,
}

impl std::fmt::Debug for PageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRenderer")
            .field("cache_dir", &self.cache.dir())
            .field("scale", &self.scale)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish_non_exhaustive()
    }
}

impl PageRenderer {
    /// Creates a renderer using pdfium with default scale and quality.
    #[must_use]
    pub fn new(cache: PdfCache) -> Self {
        Self::with_rasterizer(cache, Arc::new(PdfiumRasterizer))
    }

    /// Creates a renderer with a custom rasterizer.
    #[must_use]
    pub fn with_rasterizer(cache: PdfCache, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            cache,
            rasterizer,
            scale: DEFAULT_RENDER_SCALE,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    /// Sets the upscale factor. Non-finite or non-positive values are ignored.
    #[must_use]
    pub fn scale(mut self, scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.scale = scale;
        } else {
            warn!(scale, "ignoring invalid render scale");
        }
        self
    }

    /// Sets the JPEG quality, clamped to `1..=100`.
    #[must_use]
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    /// Renders `reference` to JPEG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::DocumentOpen`] if the cache file name is invalid or
    /// the file cannot be opened, [`PdfError::PageIndexOutOfRange`] for stale
    /// indices, and [`PdfError::Render`] / [`PdfError::Encode`] on failure.
    #[instrument(skip(self), fields(file = %reference.file_name, page = reference.page_index))]
    pub async fn render(&self, reference: &PdfPageRef) -> Result<RenderedPage, PdfError> {
        let path = self
            .cache
            .path_for(&reference.file_name)
            .map_err(|e| PdfError::document_open(&reference.file_name, e))?;
        let rasterizer = Arc::clone(&self.rasterizer);
        let page_index = reference.page_index;
        let scale = self.scale;
        let quality = self.jpeg_quality;

        let rendered = tokio::task::spawn_blocking(move || {
            let bitmap = rasterizer.rasterize(&path, page_index, scale)?;
            encode_jpeg(&bitmap, page_index, quality)
        })
        .await
        .map_err(|e| PdfError::blocking(&e))??;

        debug!(
            width = rendered.width,
            height = rendered.height,
            bytes = rendered.bytes.len(),
            "rendered page"
        );
        Ok(rendered)
    }
}

/// Encodes `bitmap` as JPEG at `quality`.
///
/// # Errors
///
/// Returns [`PdfError::Encode`] if encoding fails.
pub fn encode_jpeg(bitmap: &RgbImage, page_index: u16, quality: u8) -> Result<RenderedPage, PdfError> {
    let mut buffer = Cursor::new(Vec::new());
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(bitmap)
        .map_err(|e| PdfError::Encode {
            index: page_index,
            reason: e.to_string(),
        })?;
    Ok(RenderedPage {
        bytes: buffer.into_inner(),
        width: bitmap.width(),
        height: bitmap.height(),
    })
}

/// Pixel size of a page of `points` at `scale`, at least one pixel.
#[must_use]
pub fn scaled_dimension(points: f32, scale: f32) -> i32 {
    #[allow(clippy::cast_possible_truncation)]
    let pixels = (points * scale).round() as i32;
    pixels.max(1)
}

/// Rasterizer backed by the pdfium native library.
///
/// The library is bound on first use from `PAGEBRIDGE_PDFIUM_LIB_PATH`, the
/// executable's directory, the working directory, then the system library
/// path. A binding failure is remembered and reported on every call as
/// [`PdfError::RasterizerUnavailable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfiumRasterizer;

enum WorkerRequest {
    Probe(mpsc::Sender<Result<(), String>>),
    PageCount {
        path: PathBuf,
        reply: mpsc::Sender<Result<usize, PdfError>>,
    },
    Render(RenderJob),
}

struct RenderJob {
    path: PathBuf,
    page_index: u16,
    scale: f32,
    reply: mpsc::Sender<Result<RgbImage, PdfError>>,
}

static PDFIUM_WORKER: OnceLock<Result<mpsc::Sender<WorkerRequest>, String>> = OnceLock::new();

impl PdfiumRasterizer {
    /// Binds pdfium if needed and reports whether it is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::RasterizerUnavailable`] with the binding failure.
    pub fn ensure_available() -> Result<(), PdfError> {
        let (reply, response) = mpsc::channel();
        send(WorkerRequest::Probe(reply))?;
        response
            .recv()
            .map_err(|_| worker_stopped())?
            .map_err(|reason| PdfError::RasterizerUnavailable { reason })
    }

    /// Counts the pages of the PDF at `path` with the same engine that renders them.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::RasterizerUnavailable`] if pdfium cannot be bound
    /// and [`PdfError::DocumentOpen`] if the file cannot be loaded.
    pub fn page_count(path: &Path) -> Result<usize, PdfError> {
        let (reply, response) = mpsc::channel();
        send(WorkerRequest::PageCount {
            path: path.to_path_buf(),
            reply,
        })?;
        response.recv().map_err(|_| worker_stopped())?
    }
}

impl Rasterizer for PdfiumRasterizer {
    fn rasterize(&self, path: &Path, page_index: u16, scale: f32) -> Result<RgbImage, PdfError> {
        let (reply, response) = mpsc::channel();
        send(WorkerRequest::Render(RenderJob {
            path: path.to_path_buf(),
            page_index,
            scale,
            reply,
        }))?;
        response.recv().map_err(|_| worker_stopped())?
    }
}

fn worker_stopped() -> PdfError {
    PdfError::RasterizerUnavailable {
        reason: "pdfium worker thread stopped".to_string(),
    }
}

fn send(request: WorkerRequest) -> Result<(), PdfError> {
    let worker = PDFIUM_WORKER
        .get_or_init(|| {
            let (sender, receiver) = mpsc::channel::<WorkerRequest>();
            std::thread::Builder::new()
                .name("pdfium".to_string())
                .spawn(move || run_worker(&receiver))
                .map(|_| sender)
                .map_err(|e| format!("failed to start pdfium worker thread: {e}"))
        })
        .as_ref()
        .map_err(|reason| PdfError::RasterizerUnavailable {
            reason: reason.clone(),
        })?;
    worker.send(request).map_err(|_| worker_stopped())
}

fn run_worker(requests: &mpsc::Receiver<WorkerRequest>) {
    let pdfium = bind_pdfium();
    match &pdfium {
        Ok(_) => info!("pdfium library bound"),
        Err(reason) => warn!(%reason, "pdfium library unavailable; PDF pages cannot be rendered"),
    }

    // Replies are best effort: the caller may have given up waiting.
    for request in requests {
        match request {
            WorkerRequest::Probe(reply) => {
                let _ = reply.send(pdfium.as_ref().map(|_| ()).map_err(Clone::clone));
            }
            WorkerRequest::PageCount { path, reply } => {
                let result = match &pdfium {
                    Ok(pdfium) => count_with(pdfium, &path),
                    Err(reason) => Err(PdfError::RasterizerUnavailable {
                        reason: reason.clone(),
                    }),
                };
                let _ = reply.send(result);
            }
            WorkerRequest::Render(job) => {
                let result = match &pdfium {
                    Ok(pdfium) => rasterize_with(pdfium, &job.path, job.page_index, job.scale),
                    Err(reason) => Err(PdfError::RasterizerUnavailable {
                        reason: reason.clone(),
                    }),
                };
                let _ = job.reply.send(result);
            }
        }
    }
}

fn bind_pdfium() -> Result<Pdfium, String> {
    if let Ok(path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        return Pdfium::bind_to_library(&path)
            .map(Pdfium::new)
            .map_err(|e| format!("failed to load pdfium from {PDFIUM_LIB_PATH_ENV}={path}: {e}"));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Ok(exe) = std::env::current_exe()
        && let Some(dir) = exe.parent()
    {
        candidates.push(Pdfium::pdfium_platform_library_name_at_path(dir));
    }
    candidates.push(Pdfium::pdfium_platform_library_name_at_path(Path::new(".")));

    for candidate in candidates {
        if let Ok(bindings) = Pdfium::bind_to_library(&candidate) {
            return Ok(Pdfium::new(bindings));
        }
    }

    Pdfium::bind_to_system_library().map(Pdfium::new).map_err(|e| {
        format!(
            "{e}; install pdfium system-wide, place {} next to the executable, or set {PDFIUM_LIB_PATH_ENV}",
            Pdfium::pdfium_platform_library_name().to_string_lossy()
        )
    })
}

fn count_with(pdfium: &Pdfium, path: &Path) -> Result<usize, PdfError> {
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| PdfError::document_open(path, e))?;
    Ok(usize::from(document.pages().len()))
}

fn rasterize_with(pdfium: &Pdfium, path: &Path, page_index: u16, scale: f32) -> Result<RgbImage, PdfError> {
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| PdfError::document_open(path, e))?;
    let pages = document.pages();
    let page_count = pages.len();
    if page_index >= page_count {
        return Err(PdfError::PageIndexOutOfRange {
            index: page_index,
            page_count: usize::from(page_count),
        });
    }
    let page = pages
        .get(page_index)
        .map_err(|e| PdfError::render(page_index, e))?;

    let config = PdfRenderConfig::new()
        .set_target_width(scaled_dimension(page.width().value, scale))
        .set_target_height(scaled_dimension(page.height().value, scale))
        .set_format(PdfBitmapFormat::BGRA);
    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| PdfError::render(page_index, e))?;

    let width = u32::try_from(bitmap.width()).map_err(|e| PdfError::render(page_index, e))?;
    let height = u32::try_from(bitmap.height()).map_err(|e| PdfError::render(page_index, e))?;
    bgra_to_rgb(&bitmap.as_raw_bytes(), width, height)
        .ok_or_else(|| PdfError::render(page_index, "bitmap buffer smaller than its dimensions"))
}

/// Converts a BGRA buffer (rows possibly padded) into an RGB image.
fn bgra_to_rgb(raw: &[u8], width: u32, height: u32) -> Option<RgbImage> {
    let rows = usize::try_from(height).ok()?;
    let columns = usize::try_from(width).ok()?;
    if rows == 0 || columns == 0 {
        return None;
    }
    let stride = raw.len() / rows;
    if stride < columns * 4 {
        return None;
    }
    let mut pixels = Vec::with_capacity(columns * rows * 3);
    for row in raw.chunks_exact(stride).take(rows) {
        for bgra in row[..columns * 4].chunks_exact(4) {
            pixels.extend_from_slice(&[bgra[2], bgra[1], bgra[0]]);
        }
    }
    RgbImage::from_raw(width, height, pixels)
}
