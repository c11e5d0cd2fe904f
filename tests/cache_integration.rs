//! Integration tests for the content-addressed PDF cache.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::stream::{self, StreamExt};
use pagebridge_core::cache::{cache_file_name, is_cache_file_name};
use pagebridge_core::{CacheError, PdfCache};
use tempfile::TempDir;

mod support;
use support::fixtures::pdf_bytes;

fn chunks(bytes: &[u8], size: usize) -> Vec<Result<Vec<u8>, io::Error>> {
    bytes.chunks(size).map(|c| Ok(c.to_vec())).collect()
}

#[tokio::test]
async fn test_store_then_lookup_returns_same_document() {
    let temp = TempDir::new().unwrap();
    let cache = PdfCache::new(temp.path().join("pdf_cache"));
    let body = pdf_bytes(2, 100, 100);

    let stored = cache
        .store("https://site.example/ch/1", stream::iter(chunks(&body, 37)))
        .await
        .unwrap();
    let found = cache.lookup("https://site.example/ch/1").await.unwrap().unwrap();

    assert_eq!(stored, found);
    assert!(is_cache_file_name(&stored.file_name));
    assert_eq!(stored.len, body.len() as u64);
    assert_eq!(std::fs::read(&stored.path).unwrap(), body);
}

#[tokio::test]
async fn test_different_keys_never_share_a_file() {
    let temp = TempDir::new().unwrap();
    let cache = PdfCache::new(temp.path());

    let a = cache
        .store("https://a.example/x.pdf", stream::iter(chunks(b"%PDF-a", 4)))
        .await
        .unwrap();
    let b = cache
        .store("https://a.example/x.pdf?v=2", stream::iter(chunks(b"%PDF-b", 4)))
        .await
        .unwrap();

    assert_ne!(a.file_name, b.file_name);
    assert_eq!(cache.entries().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_existing_entry_is_never_overwritten() {
    let temp = TempDir::new().unwrap();
    let cache = PdfCache::new(temp.path());
    let key = "https://site.example/ch/2";
    cache
        .store(key, stream::iter(chunks(b"first body", 3)))
        .await
        .unwrap();

    let second = cache
        .store(key, stream::iter(chunks(b"second, longer body", 3)))
        .await
        .unwrap();

    assert_eq!(std::fs::read(&second.path).unwrap(), b"first body");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_stores_across_clones_write_once() {
    let temp = TempDir::new().unwrap();
    let cache = PdfCache::new(temp.path());
    let body = pdf_bytes(3, 80, 80);
    let polled = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let body = body.clone();
        let polled = Arc::clone(&polled);
        handles.push(tokio::spawn(async move {
            let mut first = true;
            let counted = stream::iter(chunks(&body, 64)).inspect(move |_| {
                if std::mem::take(&mut first) {
                    polled.fetch_add(1, Ordering::SeqCst);
                }
            });
            cache.store("https://site.example/ch/3", counted).await
        }));
    }
    let mut names = Vec::new();
    for handle in handles {
        names.push(handle.await.unwrap().unwrap().file_name);
    }

    names.dedup();
    assert_eq!(names, vec![cache_file_name("https://site.example/ch/3")]);
    assert_eq!(polled.load(Ordering::SeqCst), 1, "exactly one writer reads its stream");
    let files: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
}

#[tokio::test]
async fn test_failed_store_leaves_no_entry() {
    let temp = TempDir::new().unwrap();
    let cache = PdfCache::new(temp.path());
    let body: Vec<Result<Vec<u8>, io::Error>> = vec![
        Ok(b"%PDF-1.5 partial".to_vec()),
        Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
    ];

    let result = cache.store("https://site.example/ch/4", stream::iter(body)).await;

    assert!(matches!(result, Err(CacheError::Body { .. })));
    assert!(cache.lookup("https://site.example/ch/4").await.unwrap().is_none());
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_clear_removes_all_entries() {
    let temp = TempDir::new().unwrap();
    let cache = PdfCache::new(temp.path());
    for key in ["k1", "k2", "k3"] {
        cache
            .store(key, stream::iter(chunks(b"%PDF", 2)))
            .await
            .unwrap();
    }

    let removed = cache.clear().await.unwrap();

    assert_eq!(removed, 3);
    assert!(cache.entries().await.unwrap().is_empty());
}
