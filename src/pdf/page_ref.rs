//! Page model and the virtual `pdf:` page reference.
//!
//! Internally a page image source is a [`PageRef`]. Only at the host boundary,
//! where a page carries a single string `image_url`, is a PDF page written as
//! `pdf:<cache file name>:<page index>`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scheme prefix of virtual PDF page URLs.
pub const PDF_SCHEME: &str = "pdf";

/// One page of a chapter, in the shape the host expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Zero-based position in the chapter.
    pub index: usize,
    /// Page URL (HTML reader page); empty for PDF-derived pages.
    pub url: String,
    /// Direct image URL or virtual `pdf:` reference.
    pub image_url: Option<String>,
}

impl Page {
    /// Creates a page backed by a PDF page reference.
    #[must_use]
    pub fn from_pdf(reference: &PdfPageRef) -> Self {
        Self {
            index: usize::from(reference.page_index),
            url: String::new(),
            image_url: Some(reference.to_string()),
        }
    }

    /// Returns the typed image source of this page, if it has one.
    ///
    /// # Errors
    ///
    /// Returns [`PageRefError`] for a malformed `pdf:` reference.
    pub fn image_ref(&self) -> Result<Option<PageRef>, PageRefError> {
        self.image_url.as_deref().map(str::parse).transpose()
    }
}

/// Ordered pages of one chapter.
pub type PageList = Vec<Page>;

/// A single page inside a cached PDF.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfPageRef {
    /// Cache file name (`<hex>.pdf`), never containing `:`.
    pub file_name: String,
    /// Zero-based page index.
    pub page_index: u16,
}

impl PdfPageRef {
    /// Creates a reference, rejecting file names that would break the string form.
    ///
    /// # Errors
    ///
    /// Returns [`PageRefError::InvalidFileName`] if `file_name` is empty or contains `:`.
    pub fn new(file_name: impl Into<String>, page_index: u16) -> Result<Self, PageRefError> {
        let file_name = file_name.into();
        if file_name.is_empty() || file_name.contains(':') {
            return Err(PageRefError::InvalidFileName { file_name });
        }
        Ok(Self {
            file_name,
            page_index,
        })
    }
}

impl fmt::Display for PdfPageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PDF_SCHEME}:{}:{}", self.file_name, self.page_index)
    }
}

impl FromStr for PdfPageRef {
    type Err = PageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(PDF_SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| PageRefError::MissingScheme { value: s.to_string() })?;
        let (file_name, index) = rest
            .rsplit_once(':')
            .ok_or_else(|| PageRefError::MissingIndex { value: s.to_string() })?;
        let page_index = index.parse::<u16>().map_err(|_| PageRefError::InvalidIndex {
            value: s.to_string(),
        })?;
        Self::new(file_name, page_index)
    }
}

/// Typed source of a page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRef {
    /// An ordinary image URL fetched over HTTP.
    DirectImage(String),
    /// A page rendered from a cached PDF.
    Pdf(PdfPageRef),
}

impl fmt::Display for PageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectImage(url) => f.write_str(url),
            Self::Pdf(reference) => reference.fmt(f),
        }
    }
}

impl FromStr for PageRef {
    type Err = PageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.starts_with("pdf:") {
            s.parse().map(Self::Pdf)
        } else {
            Ok(Self::DirectImage(s.to_string()))
        }
    }
}

/// Errors produced when parsing a virtual page reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageRefError {
    /// The value does not start with `pdf:`.
    #[error("not a pdf page reference: {value}")]
    MissingScheme {
        /// Rejected value.
        value: String,
    },

    /// No `:<index>` suffix.
    #[error("pdf page reference has no page index: {value}")]
    MissingIndex {
        /// Rejected value.
        value: String,
    },

    /// The index is not a non-negative integer in range.
    #[error("pdf page reference has an invalid page index: {value}")]
    InvalidIndex {
        /// Rejected value.
        value: String,
    },

    /// The file name is empty or contains `:`.
    #[error("invalid cache file name in pdf page reference: {file_name:?}")]
    InvalidFileName {
        /// Rejected file name.
        file_name: String,
    },
}
