//! Shared helpers for unit tests.

#![allow(clippy::unwrap_used)]

pub(crate) mod socket_guard {
    use std::net::TcpListener;
    use std::panic::Location;

    use wiremock::MockServer;

    fn socket_tests_required() -> bool {
        std::env::var("PAGEBRIDGE_REQUIRE_SOCKET_TESTS")
            .ok()
            .is_some_and(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
    }

    /// Starts a wiremock server, or returns `None` when localhost sockets are unavailable.
    #[track_caller]
    pub(crate) fn start_mock_server_or_skip() -> impl std::future::Future<Output = Option<MockServer>> {
        let can_bind = TcpListener::bind("127.0.0.1:0").is_ok();
        if !can_bind {
            let location = Location::caller();
            let message = format!(
                "[socket-bound-test] cannot bind localhost socket at {}:{}",
                location.file(),
                location.line()
            );
            assert!(
                !socket_tests_required(),
                "{message}. Set PAGEBRIDGE_REQUIRE_SOCKET_TESTS=0 to allow skipping."
            );
            eprintln!("{message}. Skipping test.");
        }
        async move {
            if can_bind {
                Some(MockServer::start().await)
            } else {
                None
            }
        }
    }
}

pub(crate) mod fixtures {
    use lopdf::{Document, Object, Stream, dictionary};

    /// Builds a minimal valid PDF with `pages` blank pages of `width` x `height` points.
    #[allow(clippy::unwrap_used)]
    pub(crate) fn pdf_bytes(pages: u32, width: i64, height: i64) -> Vec<u8> {
        let mut document = Document::with_version("1.5");
        let pages_id = document.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for _ in 0..pages {
            let content_id = document.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = document.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }
        document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => i64::from(pages),
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(width),
                    Object::Integer(height),
                ],
            }),
        );
        let catalog_id = document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        document.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        document.save_to(&mut bytes).unwrap();
        bytes
    }
}
