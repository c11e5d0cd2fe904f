//! PDF link discovery in chapter markup.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

#[allow(clippy::expect_used)]
static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("anchor selector is valid"));

#[allow(clippy::expect_used)]
static IFRAME_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe[src]").expect("iframe selector is valid"));

/// Returns the first PDF target in `document`, resolved against `base`.
///
/// Anchors (`a[href]`) are searched before frames (`iframe[src]`); within
/// each, document order wins.
#[must_use]
pub fn find_pdf_link(document: &Html, base: &Url) -> Option<Url> {
    first_pdf_target(document, &ANCHOR_SELECTOR, "href", base)
        .or_else(|| first_pdf_target(document, &IFRAME_SELECTOR, "src", base))
}

fn first_pdf_target(document: &Html, selector: &Selector, attr: &str, base: &Url) -> Option<Url> {
    document
        .select(selector)
        .filter_map(|element| element.value().attr(attr))
        .filter_map(|raw| base.join(raw.trim()).ok())
        .find(is_pdf_url)
}

/// Returns true if the absolute URL ends in `.pdf` (ASCII case-insensitive).
///
/// The whole serialized URL is matched, so `viewer?file=doc.pdf` matches and
/// `doc.pdf?dl=1` does not.
#[must_use]
pub fn is_pdf_url(url: &Url) -> bool {
    const SUFFIX: &[u8] = b".pdf";
    let raw = url.as_str().as_bytes();
    matches!(url.scheme(), "http" | "https")
        && raw.len() >= SUFFIX.len()
        && raw[raw.len() - SUFFIX.len()..].eq_ignore_ascii_case(SUFFIX)
}
