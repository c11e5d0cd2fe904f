//! Page counting for cached PDFs.

use std::path::Path;

use tracing::{debug, instrument};

use super::error::PdfError;
use super::page_ref::{Page, PageList, PdfPageRef};
use super::render::PdfiumRasterizer;
use crate::cache::CachedDocument;

/// Builds page lists for cached documents without rasterizing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageEnumerator;

impl PageEnumerator {
    /// Creates an enumerator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns one page per PDF page, indices `0..count` in ascending order.
    ///
    /// The document is parsed on a blocking thread and dropped before this
    /// returns.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError::DocumentOpen`] if the file is unreadable or not a
    /// PDF, and [`PdfError::TooManyPages`] past `u16::MAX + 1` pages.
    #[instrument(skip(self, document), fields(file = %document.file_name))]
    pub async fn enumerate(&self, document: &CachedDocument) -> Result<PageList, PdfError> {
        let path = document.path.clone();
        let page_count = tokio::task::spawn_blocking(move || count_pages(&path))
            .await
            .map_err(|e| PdfError::blocking(&e))??;

        debug!(page_count, "enumerated PDF pages");
        build_page_list(&document.file_name, page_count, &document.path)
    }
}

/// Counts the pages of the PDF at `path`.
///
/// pdfium does the counting so the list matches what the renderer can
/// address, including files whose cross-reference table pdfium repairs. When
/// the native library is not available the count comes from lopdf.
///
/// # Errors
///
/// Returns [`PdfError::DocumentOpen`] if the file cannot be parsed.
pub fn count_pages(path: &Path) -> Result<usize, PdfError> {
    count_pages_with(path, PdfiumRasterizer::page_count)
}

fn count_pages_with(
    path: &Path,
    primary: impl FnOnce(&Path) -> Result<usize, PdfError>,
) -> Result<usize, PdfError> {
    match primary(path) {
        Err(PdfError::RasterizerUnavailable { reason }) => {
            debug!(%reason, "pdfium unavailable; counting pages with lopdf");
            count_pages_lopdf(path)
        }
        other => other,
    }
}

fn count_pages_lopdf(path: &Path) -> Result<usize, PdfError> {
    let document = lopdf::Document::load(path).map_err(|e| PdfError::document_open(path, e))?;
    Ok(document.get_pages().len())
}

fn build_page_list(file_name: &str, page_count: usize, path: &Path) -> Result<PageList, PdfError> {
    if page_count > usize::from(u16::MAX) + 1 {
        return Err(PdfError::TooManyPages {
            path: path.to_path_buf(),
            page_count,
        });
    }
    (0..page_count)
        .map(|index| {
            let page_index = u16::try_from(index).map_err(|_| PdfError::TooManyPages {
                path: path.to_path_buf(),
                page_count,
            })?;
            let reference = PdfPageRef::new(file_name, page_index)
                .map_err(|e| PdfError::document_open(path, e))?;
            Ok(Page::from_pdf(&reference))
        })
        .collect()
}
