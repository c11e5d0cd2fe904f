//! Errors surfaced by the host entry points.

use thiserror::Error;

use crate::cache::CacheError;
use crate::http::FetchError;
use crate::pdf::{PageRefError, PdfError};

/// A failed chapter resolution, image fetch, or listing fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or HTTP failure.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Cache write or lookup failure.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// PDF could not be enumerated or rendered.
    #[error(transparent)]
    Pdf(#[from] PdfError),

    /// A page carried a malformed `pdf:` reference.
    #[error(transparent)]
    PageRef(#[from] PageRefError),

    /// The pagination collaborator failed.
    #[error("pagination failed: {reason}")]
    Pagination {
        /// Collaborator message.
        reason: String,
    },

    /// A chapter path could not be turned into a URL.
    #[error("invalid chapter URL {input:?}: {reason}")]
    InvalidChapterUrl {
        /// The chapter path or URL as given.
        input: String,
        /// Parser message.
        reason: String,
    },

    /// A page has neither an image URL nor a page URL.
    #[error("page {index} has no image source")]
    MissingImageSource {
        /// Page index.
        index: usize,
    },
}

impl SourceError {
    /// Returns true if the underlying failure looks like an expired clearance.
    #[must_use]
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Fetch(FetchError::ChallengeDetected { .. }))
    }
}
