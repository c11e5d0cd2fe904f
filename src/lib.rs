//! Pagebridge Core Library
//!
//! Reads chapters from a site guarded by an anti-bot challenge, using a
//! clearance token and User-Agent the user copied from a real browser.
//! A chapter is served either as ordinary image pages or as a PDF, which is
//! cached on disk and rendered page by page on demand.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`auth`] - Clearance credentials, in memory and on disk
//! - [`http`] - HTTP client that replays the credentials on every request
//! - [`cache`] - Content-addressed on-disk PDF cache
//! - [`pdf`] - Page model, page enumeration, and JPEG rendering
//! - [`source`] - Chapter resolution and the host-facing [`Source`]

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod cache;
pub mod http;
pub mod pdf;
pub mod source;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use auth::{CredentialStore, Credentials};
pub use cache::{CacheError, CachedDocument, PdfCache};
pub use http::{AugmentedClient, FetchError};
pub use pdf::{Page, PageList, PageRef, PageRenderer, PdfError, PdfPageRef};
pub use source::{ContentResolver, ImageResponse, ListingItem, Source, SourceError};
