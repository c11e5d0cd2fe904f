//! Error types for the PDF cache.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while storing or locating cached documents.
#[derive(Debug, Error)]
pub enum CacheError {
    /// File system error while creating the directory or writing a file.
    #[error("IO error on cache path {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The source stream failed while being copied into the cache.
    #[error("body stream failed while caching {key}: {source}")]
    Body {
        /// The source key being cached.
        key: String,
        /// The stream error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The source stream ended without yielding any bytes.
    #[error("empty body while caching {key}")]
    EmptyBody {
        /// The source key being cached.
        key: String,
    },

    /// A cache file name did not have the `<hex>.pdf` shape.
    #[error("invalid cache file name: {file_name}")]
    InvalidFileName {
        /// The rejected name.
        file_name: String,
    },

    /// No cache directory could be determined.
    #[error("unable to determine cache directory (set XDG_CACHE_HOME or HOME)")]
    CacheDirUnavailable,
}

impl CacheError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid file name error.
    pub fn invalid_file_name(file_name: impl Into<String>) -> Self {
        Self::InvalidFileName {
            file_name: file_name.into(),
        }
    }
}
