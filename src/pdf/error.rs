//! Error types for PDF enumeration and rendering.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or rasterizing cached PDFs.
#[derive(Debug, Error)]
pub enum PdfError {
    /// The file is missing, unreadable, or not a valid PDF.
    #[error("cannot open PDF {path}: {reason}")]
    DocumentOpen {
        /// Path of the document.
        path: PathBuf,
        /// Parser or loader message.
        reason: String,
    },

    /// The requested page does not exist in the document.
    #[error("page index {index} out of range (document has {page_count} pages)")]
    PageIndexOutOfRange {
        /// Requested zero-based index.
        index: u16,
        /// Number of pages in the document.
        page_count: usize,
    },

    /// The document has more pages than a page reference can address.
    #[error("document {path} has {page_count} pages, more than can be addressed")]
    TooManyPages {
        /// Path of the document.
        path: PathBuf,
        /// Number of pages found.
        page_count: usize,
    },

    /// The rasterizer failed on an otherwise valid page.
    #[error("failed to render page {index}: {reason}")]
    Render {
        /// Page index being rendered.
        index: u16,
        /// Rasterizer message.
        reason: String,
    },

    /// JPEG encoding failed.
    #[error("failed to encode page {index} as JPEG: {reason}")]
    Encode {
        /// Page index being encoded.
        index: u16,
        /// Encoder message.
        reason: String,
    },

    /// The native rasterizer library could not be loaded.
    #[error("PDF rasterizer unavailable: {reason}")]
    RasterizerUnavailable {
        /// Why binding failed.
        reason: String,
    },

    /// A blocking worker task panicked or was cancelled.
    #[error("blocking PDF task failed: {reason}")]
    BlockingTask {
        /// Join error message.
        reason: String,
    },
}

impl PdfError {
    /// Creates a document-open error.
    pub fn document_open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::DocumentOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a render error.
    pub fn render(index: u16, reason: impl ToString) -> Self {
        Self::Render {
            index,
            reason: reason.to_string(),
        }
    }

    /// Creates a blocking-task error from a join failure.
    pub fn blocking(error: &tokio::task::JoinError) -> Self {
        Self::BlockingTask {
            reason: error.to_string(),
        }
    }
}
