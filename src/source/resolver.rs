//! Chapter content resolution.
//!
//! A chapter URL answers either with a PDF, with markup that links a PDF, or
//! with markup that is itself the reader. The first two end in the cache and a
//! PDF page list; the last is handed to the [`HtmlPagination`] collaborator.

use std::sync::Arc;

use reqwest::Response;
use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::SourceError;
use super::links::find_pdf_link;
use super::pagination::HtmlPagination;
use crate::auth::CLEARANCE_HINT;
use crate::cache::{CacheError, CachedDocument, PdfCache};
use crate::http::{AugmentedClient, FetchError, body_looks_like_challenge};
use crate::pdf::{PageEnumerator, PageList};

/// Resolves chapter URLs to page lists.
#[derive(Clone)]
pub struct ContentResolver {
    client: AugmentedClient,
    cache: PdfCache,
    enumerator: PageEnumerator,
    pagination: Arc<dyn HtmlPagination>,
}

impl std::fmt::Debug for ContentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentResolver")
            .field("client", &self.client)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

enum MarkupOutcome {
    LinkedPdf(Url),
    ImagePages(PageList),
}

impl ContentResolver {
    /// Creates a resolver.
    #[must_use]
    pub fn new(client: AugmentedClient, cache: PdfCache, pagination: Arc<dyn HtmlPagination>) -> Self {
        Self {
            client,
            cache,
            enumerator: PageEnumerator::new(),
            pagination,
        }
    }

    /// Resolves `document_url` to its page list.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] if a network call fails or returns no
    /// body, [`SourceError::Cache`] if the PDF cannot be stored,
    /// [`SourceError::Pdf`] if it cannot be enumerated, and whatever the
    /// pagination collaborator returns for reader pages.
    #[instrument(skip(self), fields(url = %document_url))]
    pub async fn resolve_pages(&self, document_url: &Url) -> Result<PageList, SourceError> {
        let response = self.client.get(document_url).await?;

        let document = if is_pdf_response(&response) {
            info!("chapter served as PDF");
            self.cache_response(document_url, response).await?
        } else {
            let html = response
                .text()
                .await
                .map_err(|e| FetchError::from_reqwest(document_url.as_str(), e))?;
            if html.trim().is_empty() {
                return Err(FetchError::missing_body(document_url.as_str()).into());
            }
            if body_looks_like_challenge(&html) {
                warn!(hint = CLEARANCE_HINT, "chapter markup looks like a challenge page");
            }

            match self.inspect_markup(&html, document_url)? {
                MarkupOutcome::ImagePages(pages) => {
                    info!(pages = pages.len(), "no PDF link; using HTML pagination");
                    return Ok(pages);
                }
                MarkupOutcome::LinkedPdf(pdf_url) => {
                    info!(pdf = %pdf_url, "chapter links a PDF");
                    self.fetch_linked_pdf(&pdf_url).await?
                }
            }
        };

        let pages = self.enumerator.enumerate(&document).await?;
        info!(pages = pages.len(), file = %document.file_name, "resolved PDF chapter");
        Ok(pages)
    }

    /// Parses the markup and decides the branch; the parsed tree is dropped here.
    fn inspect_markup(&self, html: &str, document_url: &Url) -> Result<MarkupOutcome, SourceError> {
        let parsed = Html::parse_document(html);
        match find_pdf_link(&parsed, document_url) {
            Some(pdf_url) => Ok(MarkupOutcome::LinkedPdf(pdf_url)),
            None => self
                .pagination
                .parse_image_page_list(&parsed, document_url)
                .map(MarkupOutcome::ImagePages),
        }
    }

    async fn fetch_linked_pdf(&self, pdf_url: &Url) -> Result<CachedDocument, SourceError> {
        if let Some(existing) = self.cache.lookup(pdf_url.as_str()).await? {
            debug!(file = %existing.file_name, "linked PDF already cached; skipping fetch");
            return Ok(existing);
        }
        let response = self.client.get(pdf_url).await?;
        self.cache_response(pdf_url, response).await
    }

    async fn cache_response(&self, key: &Url, response: Response) -> Result<CachedDocument, SourceError> {
        self.cache
            .store(key.as_str(), response.bytes_stream())
            .await
            .map_err(|error| cache_failure(key, error))
    }
}

/// Returns true if the declared content type is a PDF.
fn is_pdf_response(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains("application/pdf"))
}

/// Body-stream failures are network failures, not storage failures.
fn cache_failure(url: &Url, error: CacheError) -> SourceError {
    match error {
        CacheError::EmptyBody { .. } => FetchError::missing_body(url.as_str()).into(),
        CacheError::Body { key, source } => match source.downcast::<reqwest::Error>() {
            Ok(reqwest_error) => FetchError::from_reqwest(url.as_str(), *reqwest_error).into(),
            Err(source) => CacheError::Body { key, source }.into(),
        },
        other => other.into(),
    }
}
