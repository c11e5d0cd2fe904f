//! Host-facing source: page lists, page images, and listings.
//!
//! [`Source`] ties the pieces together the way a reader host calls them:
//! `fetch_page_list` for a chapter path, `fetch_image` for one page of the
//! resulting list, and `fetch_popular` for the listing pages.

mod error;
mod links;
mod pagination;
mod resolver;

pub use error::SourceError;
pub use links::{find_pdf_link, is_pdf_url};
pub use pagination::{
    DEFAULT_IMAGE_SELECTOR, DEFAULT_LISTING_SELECTOR, HtmlPagination, ListingItem,
    SelectorPagination,
};
pub use resolver::ContentResolver;

use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use scraper::Html;
use tracing::{debug, instrument};
use url::Url;

use crate::auth::CredentialStore;
use crate::cache::PdfCache;
use crate::http::{AugmentedClient, FetchError};
use crate::pdf::{Page, PageList, PageRef, PageRenderer, RENDERED_CONTENT_TYPE};

/// Content type used when a direct image response declares none.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Image bytes with the response metadata the host expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageResponse {
    /// HTTP status (200 for rendered pages).
    pub status: u16,
    /// Declared content type.
    pub content_type: String,
    /// Image bytes.
    pub bytes: Vec<u8>,
}

/// A chapter source rooted at one base URL.
#[derive(Clone)]
pub struct Source {
    base_url: Url,
    client: AugmentedClient,
    cache: PdfCache,
    resolver: ContentResolver,
    renderer: PageRenderer,
    pagination: Arc<dyn HtmlPagination>,
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("base_url", &self.base_url.as_str())
            .field("cache_dir", &self.cache.dir())
            .field("renderer", &self.renderer)
            .finish_non_exhaustive()
    }
}

impl Source {
    /// Creates a source with default HTTP settings, pdfium rendering, and
    /// [`SelectorPagination`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Fetch`] if the HTTP client cannot be built.
    pub fn new(base_url: Url, credentials: CredentialStore, cache: PdfCache) -> Result<Self, SourceError> {
        let client = AugmentedClient::new(credentials)?;
        Ok(Self::from_parts(base_url, client, cache))
    }

    /// Creates a source from an existing client.
    #[must_use]
    pub fn from_parts(base_url: Url, client: AugmentedClient, cache: PdfCache) -> Self {
        let pagination: Arc<dyn HtmlPagination> = Arc::new(SelectorPagination::default());
        Self {
            resolver: ContentResolver::new(client.clone(), cache.clone(), Arc::clone(&pagination)),
            renderer: PageRenderer::new(cache.clone()),
            base_url,
            client,
            cache,
            pagination,
        }
    }

    /// Replaces the HTML pagination collaborator.
    #[must_use]
    pub fn with_pagination(mut self, pagination: Arc<dyn HtmlPagination>) -> Self {
        self.resolver = ContentResolver::new(self.client.clone(), self.cache.clone(), Arc::clone(&pagination));
        self.pagination = pagination;
        self
    }

    /// Replaces the page renderer.
    #[must_use]
    pub fn with_renderer(mut self, renderer: PageRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the PDF cache.
    #[must_use]
    pub fn cache(&self) -> &PdfCache {
        &self.cache
    }

    /// Returns the credential store shared with the HTTP client.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        self.client.credentials()
    }

    /// Turns a chapter path into an absolute URL.
    ///
    /// Absolute `http(s)` URLs pass through; anything else is appended to the
    /// base URL.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidChapterUrl`] if the result is not a URL.
    pub fn chapter_url(&self, chapter: &str) -> Result<Url, SourceError> {
        let chapter = chapter.trim();
        if let Ok(url) = Url::parse(chapter)
            && matches!(url.scheme(), "http" | "https")
        {
            return Ok(url);
        }
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            chapter.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| SourceError::InvalidChapterUrl {
            input: chapter.to_string(),
            reason: e.to_string(),
        })
    }

    /// Resolves a chapter to its page list.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the chapter cannot be fetched, cached, or
    /// enumerated. The whole list fails; there are no partial results.
    #[instrument(skip(self))]
    pub async fn fetch_page_list(&self, chapter: &str) -> Result<PageList, SourceError> {
        let url = self.chapter_url(chapter)?;
        self.resolver.resolve_pages(&url).await
    }

    /// Fetches the image of one page.
    ///
    /// PDF pages are rendered locally and reported as `200 image/jpeg`;
    /// direct images are fetched with credentials. A page without an image
    /// URL falls back to its page URL.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] for this page only.
    #[instrument(skip(self, page), fields(index = page.index))]
    pub async fn fetch_image(&self, page: &Page) -> Result<ImageResponse, SourceError> {
        let image_ref = match page.image_ref()? {
            Some(image_ref) => image_ref,
            None if !page.url.is_empty() => PageRef::DirectImage(page.url.clone()),
            None => return Err(SourceError::MissingImageSource { index: page.index }),
        };

        match image_ref {
            PageRef::Pdf(reference) => {
                let rendered = self.renderer.render(&reference).await?;
                Ok(ImageResponse {
                    status: 200,
                    content_type: RENDERED_CONTENT_TYPE.to_string(),
                    bytes: rendered.bytes,
                })
            }
            PageRef::DirectImage(raw) => {
                let url = Url::parse(&raw).map_err(|_| FetchError::invalid_url(&raw))?;
                let response = self.client.get(&url).await?;
                let status = response.status().as_u16();
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or(FALLBACK_CONTENT_TYPE)
                    .to_string();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;
                debug!(status, bytes = bytes.len(), "fetched direct image");
                Ok(ImageResponse {
                    status,
                    content_type,
                    bytes: bytes.to_vec(),
                })
            }
        }
    }

    /// Fetches one page of the popular listing (`<base>/popular?page=<n>`).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the listing cannot be fetched or parsed.
    #[instrument(skip(self))]
    pub async fn fetch_popular(&self, page_number: u32) -> Result<Vec<ListingItem>, SourceError> {
        let url = self.chapter_url(&format!("popular?page={page_number}"))?;
        let response = self.client.get(&url).await?;
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;
        let items = {
            let document = Html::parse_document(&html);
            self.pagination.parse_listing(&document, &url)?
        };
        debug!(items = items.len(), "parsed listing");
        Ok(items)
    }
}
