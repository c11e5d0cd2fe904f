//! Integration tests for chapter resolution through the public `Source` API.

use std::path::Path;
use std::sync::Arc;

use image::{Rgb, RgbImage};
use pagebridge_core::cache::cache_file_name;
use pagebridge_core::pdf::{PdfError, PdfPageRef, Rasterizer, scaled_dimension};
use pagebridge_core::source::{HtmlPagination, ListingItem, SelectorPagination, SourceError};
use pagebridge_core::{
    CredentialStore, Credentials, FetchError, Page, PageList, PageRef, PageRenderer, PdfCache,
    Source,
};
use scraper::Html;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fixtures::pdf_bytes;
use support::socket_guard::start_mock_server_or_skip;

/// Rasterizer that counts pages with lopdf and paints a blank bitmap of the scaled size.
struct LopdfSizedRasterizer;

impl Rasterizer for LopdfSizedRasterizer {
    fn rasterize(&self, path: &Path, page_index: u16, scale: f32) -> Result<RgbImage, PdfError> {
        let document =
            lopdf::Document::load(path).map_err(|e| PdfError::document_open(path, e))?;
        let page_count = document.get_pages().len();
        if usize::from(page_index) >= page_count {
            return Err(PdfError::PageIndexOutOfRange {
                index: page_index,
                page_count,
            });
        }
        // Fixtures put a 120 x 180 MediaBox on the page tree.
        let width = u32::try_from(scaled_dimension(120.0, scale)).unwrap();
        let height = u32::try_from(scaled_dimension(180.0, scale)).unwrap();
        Ok(RgbImage::from_pixel(width, height, Rgb([255, 255, 255])))
    }
}

struct SentinelPagination;

impl HtmlPagination for SentinelPagination {
    fn parse_listing(&self, _: &Html, _: &Url) -> Result<Vec<ListingItem>, SourceError> {
        Ok(Vec::new())
    }

    fn parse_image_page_list(&self, _: &Html, _: &Url) -> Result<PageList, SourceError> {
        Ok(vec![
            Page {
                index: 0,
                url: "sentinel://a".to_string(),
                image_url: Some("https://img.example/a.jpg".to_string()),
            },
            Page {
                index: 1,
                url: "sentinel://b".to_string(),
                image_url: None,
            },
        ])
    }
}

fn source(base: &str, cache_dir: &Path, token: Option<&str>) -> Source {
    let store = CredentialStore::new(Credentials::new(token.map(str::to_string), None));
    let cache = PdfCache::new(cache_dir);
    Source::new(Url::parse(base).unwrap(), store, cache.clone())
        .unwrap()
        .with_renderer(PageRenderer::with_rasterizer(cache, Arc::new(LopdfSizedRasterizer)))
}

#[tokio::test]
async fn test_direct_pdf_chapter_caches_exact_bytes_and_counts_pages() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    let body = pdf_bytes(5, 120, 180);
    Mock::given(method("GET"))
        .and(path("/chapter/5"))
        .and(header("cookie", "cf_clearance=abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(body.clone()),
        )
        .expect(1)
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source = source(&server.uri(), temp.path(), Some("abc123"));

    let pages = source.fetch_page_list("/chapter/5").await.unwrap();

    let key = format!("{}/chapter/5", server.uri());
    let cached = temp.path().join(cache_file_name(&key));
    assert_eq!(std::fs::read(&cached).unwrap(), body);
    assert_eq!(pages.len(), 5);
    for (i, page) in pages.iter().enumerate() {
        assert_eq!(page.index, i);
        match page.image_ref().unwrap() {
            Some(PageRef::Pdf(reference)) => {
                assert_eq!(reference.file_name, cache_file_name(&key));
                assert_eq!(usize::from(reference.page_index), i);
            }
            other => panic!("expected pdf page ref, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_html_chapter_with_relative_pdf_link_fetches_absolute_url() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/books/vol1/ch2"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    r#"<html><body>
                        <iframe src="/viewer/ignored.pdf"></iframe>
                        <a href="doc.pdf">Read</a>
                    </body></html>"#,
                ),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/books/vol1/doc.pdf"))
        .and(header("cookie", "cf_clearance=abc123"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(pdf_bytes(3, 120, 180)),
        )
        .expect(1)
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source = source(&server.uri(), temp.path(), Some("abc123"));

    let pages = source.fetch_page_list("books/vol1/ch2").await.unwrap();

    assert_eq!(pages.len(), 3);
    let pdf_key = format!("{}/books/vol1/doc.pdf", server.uri());
    assert!(temp.path().join(cache_file_name(&pdf_key)).exists());
}

#[tokio::test]
async fn test_html_chapter_without_pdf_returns_pagination_output_unmodified() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/chapter/img"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(r#"<img src="/p/1.jpg"><a href="/next">next</a>"#),
        )
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source =
        source(&server.uri(), temp.path(), None).with_pagination(Arc::new(SentinelPagination));

    let pages = source.fetch_page_list("/chapter/img").await.unwrap();

    let expected = SentinelPagination
        .parse_image_page_list(
            &Html::parse_document(""),
            &Url::parse("https://x.test").unwrap(),
        )
        .unwrap();
    assert_eq!(pages, expected);
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_default_pagination_reads_reader_images() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/chapter/img"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    r#"<img src="/p/1.jpg"><img data-src="/p/2.jpg" src="lazy.gif">"#,
                ),
        )
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source = source(&server.uri(), temp.path(), None)
        .with_pagination(Arc::new(SelectorPagination::default()));

    let pages = source.fetch_page_list("/chapter/img").await.unwrap();

    let images: Vec<_> = pages.iter().filter_map(|p| p.image_url.clone()).collect();
    assert_eq!(
        images,
        vec![
            format!("{}/p/1.jpg", server.uri()),
            format!("{}/p/2.jpg", server.uri())
        ]
    );
}

#[tokio::test]
async fn test_rendered_page_is_jpeg_at_twice_point_size() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/chapter/r"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(pdf_bytes(2, 120, 180)),
        )
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source = source(&server.uri(), temp.path(), None);
    let pages = source.fetch_page_list("/chapter/r").await.unwrap();

    let response = source.fetch_image(&pages[1]).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.content_type, "image/jpeg");
    let decoded = image::load_from_memory(&response.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (240, 360));
}

#[tokio::test]
async fn test_stale_page_index_fails_only_that_page() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/chapter/s"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(pdf_bytes(1, 120, 180)),
        )
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source = source(&server.uri(), temp.path(), None);
    let pages = source.fetch_page_list("/chapter/s").await.unwrap();
    let Some(PageRef::Pdf(reference)) = pages[0].image_ref().unwrap() else {
        panic!("expected pdf page ref");
    };
    let stale = Page::from_pdf(&PdfPageRef::new(reference.file_name, 7).unwrap());

    let result = source.fetch_image(&stale).await;

    assert!(matches!(
        result,
        Err(SourceError::Pdf(PdfError::PageIndexOutOfRange { index: 7, page_count: 1 }))
    ));
    assert!(source.fetch_image(&pages[0]).await.is_ok());
}

#[tokio::test]
async fn test_challenge_response_is_reported_as_challenge() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(403)
                .insert_header("cf-mitigated", "challenge")
                .set_body_string("<title>Just a moment...</title>"),
        )
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source = source(&server.uri(), temp.path(), Some("expired"));

    let error = source.fetch_page_list("/chapter/1").await.unwrap_err();

    assert!(error.is_challenge(), "{error:?}");
    assert!(matches!(
        error,
        SourceError::Fetch(FetchError::ChallengeDetected { status: 403, .. })
    ));
}

#[tokio::test]
async fn test_credential_replacement_applies_to_next_request() {
    let Some(server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/chapter/n"))
        .and(header("cookie", "cf_clearance=fresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(pdf_bytes(1, 120, 180)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/chapter/n"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();
    let source = source(&server.uri(), temp.path(), Some("stale"));

    assert!(source.fetch_page_list("/chapter/n").await.is_err());
    source
        .credentials()
        .replace(Credentials::new(Some("fresh".into()), None));
    assert_eq!(source.fetch_page_list("/chapter/n").await.unwrap().len(), 1);
}
