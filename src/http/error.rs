//! Error types for the request path.

use thiserror::Error;

/// Errors that can occur while fetching a resource.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, body read).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response looked like an anti-bot challenge page.
    ///
    /// Advisory only: detection is heuristic and an expired token may still
    /// produce responses that are not flagged.
    #[error(
        "[CHALLENGE] HTTP {status} challenge page fetching {url}\n  Suggestion: refresh the clearance token (`pagebridge auth hint`)"
    )]
    ChallengeDetected {
        /// The URL that returned the challenge.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response carried no body.
    #[error("empty response body from {url}")]
    MissingBody {
        /// The URL whose response was empty.
        url: String,
    },

    /// The provided URL is malformed or unsupported.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// A configured credential cannot be sent as a header value.
    #[error("configured {header} contains characters not allowed in an HTTP header")]
    InvalidCredential {
        /// Which header the credential was destined for.
        header: &'static str,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {reason}")]
    ClientBuild {
        /// Why construction failed.
        reason: String,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn from_reqwest(url: impl Into<String>, source: reqwest::Error) -> Self {
        let url = url.into();
        if source.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::Network { url, source }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a challenge-detected error.
    pub fn challenge(url: impl Into<String>, status: u16) -> Self {
        Self::ChallengeDetected {
            url: url.into(),
            status,
        }
    }

    /// Creates a missing-body error.
    pub fn missing_body(url: impl Into<String>) -> Self {
        Self::MissingBody { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }
}

// No `From<reqwest::Error>`: every variant needs the URL for context, which
// the source error does not reliably carry.
