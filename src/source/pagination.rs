//! HTML pagination collaborator.
//!
//! When a chapter page links no PDF, the page list comes from the markup
//! itself. [`HtmlPagination`] is that seam; [`SelectorPagination`] is a
//! CSS-selector driven default.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::SourceError;
use crate::pdf::{Page, PageList};

/// Default selector for listing entries.
pub const DEFAULT_LISTING_SELECTOR: &str = "div.manga-list > div.manga-item";

/// Default selector for page images in a reader page.
pub const DEFAULT_IMAGE_SELECTOR: &str = "img[data-src], img[src]";

#[allow(clippy::expect_used)]
static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a").expect("link selector is valid"));

/// One entry of a listing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingItem {
    /// Display title.
    pub title: String,
    /// Entry URL as written in the markup (usually host-relative).
    pub url: String,
}

/// Turns parsed markup into listings and image page lists.
///
/// Implementations are synchronous; callers parse and drop the document
/// between network calls.
pub trait HtmlPagination: Send + Sync {
    /// Extracts listing entries from a listing page.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Pagination`] if the markup cannot be interpreted.
    fn parse_listing(&self, document: &Html, document_url: &Url) -> Result<Vec<ListingItem>, SourceError>;

    /// Extracts the image pages of a chapter that has no PDF.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Pagination`] if the markup cannot be interpreted.
    fn parse_image_page_list(&self, document: &Html, document_url: &Url) -> Result<PageList, SourceError>;
}

/// Selector-driven [`HtmlPagination`].
#[derive(Debug, Clone)]
pub struct SelectorPagination {
    listing: Selector,
    image: Selector,
}

impl Default for SelectorPagination {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self::new(DEFAULT_LISTING_SELECTOR, DEFAULT_IMAGE_SELECTOR)
            .expect("default pagination selectors are valid")
    }
}

impl SelectorPagination {
    /// Creates a pagination with custom selectors.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Pagination`] if either selector is invalid CSS.
    pub fn new(listing_selector: &str, image_selector: &str) -> Result<Self, SourceError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| SourceError::Pagination {
                reason: format!("invalid selector {css:?}: {e}"),
            })
        };
        Ok(Self {
            listing: parse(listing_selector)?,
            image: parse(image_selector)?,
        })
    }
}

impl HtmlPagination for SelectorPagination {
    fn parse_listing(&self, document: &Html, _document_url: &Url) -> Result<Vec<ListingItem>, SourceError> {
        Ok(document
            .select(&self.listing)
            .filter_map(|item| item.select(&LINK_SELECTOR).next())
            .filter_map(|link| {
                let url = link.value().attr("href")?.trim();
                if url.is_empty() {
                    return None;
                }
                let title = link
                    .value()
                    .attr("title")
                    .map(str::trim)
                    .filter(|title| !title.is_empty())
                    .map_or_else(|| text_of(&link), str::to_string);
                Some(ListingItem {
                    title,
                    url: url.to_string(),
                })
            })
            .collect())
    }

    fn parse_image_page_list(&self, document: &Html, document_url: &Url) -> Result<PageList, SourceError> {
        Ok(document
            .select(&self.image)
            .filter_map(|image| {
                let raw = image
                    .value()
                    .attr("data-src")
                    .or_else(|| image.value().attr("src"))?;
                document_url.join(raw.trim()).ok()
            })
            .enumerate()
            .map(|(index, image_url)| Page {
                index,
                url: document_url.to_string(),
                image_url: Some(image_url.to_string()),
            })
            .collect())
    }
}

fn text_of(element: &ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
