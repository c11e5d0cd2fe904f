//! Content-addressed on-disk cache for downloaded PDFs.
//!
//! Each document is stored as `<hex sha256 of source key>.pdf` inside the
//! cache directory. A present, non-empty file is treated as complete: writes
//! go to a unique temporary sibling and are renamed into place only after the
//! whole body has been flushed, so a partial download never becomes visible.
//!
//! Writers for the same key are serialized with a per-key async lock. Entries
//! are never evicted by the cache itself.

mod error;

pub use error::CacheError;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use futures_util::{Stream, StreamExt};
use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// File extension of cached documents.
const CACHE_FILE_EXTENSION: &str = ".pdf";

/// Hex length of a SHA-256 digest.
const FINGERPRINT_HEX_LEN: usize = 64;

/// Marker inserted into temporary file names.
const PARTIAL_MARKER: &str = ".part-";

/// A cached document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedDocument {
    /// Full path of the cached file.
    pub path: PathBuf,
    /// File name inside the cache directory (`<hex>.pdf`).
    pub file_name: String,
    /// Size in bytes.
    pub len: u64,
}

/// Returns the deterministic cache file name for `key`.
#[must_use]
pub fn cache_file_name(key: &str) -> String {
    format!("{:x}{CACHE_FILE_EXTENSION}", Sha256::digest(key.as_bytes()))
}

/// Returns true if `file_name` has the exact `<64 hex>.pdf` shape.
#[must_use]
pub fn is_cache_file_name(file_name: &str) -> bool {
    file_name
        .strip_suffix(CACHE_FILE_EXTENSION)
        .is_some_and(|stem| {
            stem.len() == FINGERPRINT_HEX_LEN
                && stem
                    .bytes()
                    .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
        })
}

/// Content-addressed PDF store.
///
/// Cloning is cheap; clones share the per-key writer locks.
#[derive(Debug, Clone)]
pub struct PdfCache {
    dir: PathBuf,
    writers: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl PdfCache {
    /// Creates a cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            writers: Arc::new(DashMap::new()),
        }
    }

    /// Returns the default cache directory.
    ///
    /// Priority: `$XDG_CACHE_HOME/pagebridge/pdf_cache`,
    /// `$HOME/.cache/pagebridge/pdf_cache`, `%LOCALAPPDATA%/pagebridge/pdf_cache`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::CacheDirUnavailable`] if none of these is set.
    pub fn default_dir() -> Result<PathBuf, CacheError> {
        let non_empty = |name: &str| {
            env::var_os(name)
                .filter(|value| !value.to_string_lossy().trim().is_empty())
                .map(PathBuf::from)
        };
        let base = non_empty("XDG_CACHE_HOME")
            .or_else(|| non_empty("HOME").map(|home| home.join(".cache")))
            .or_else(|| non_empty("LOCALAPPDATA"))
            .ok_or(CacheError::CacheDirUnavailable)?;
        Ok(base.join("pagebridge").join("pdf_cache"))
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolves a cache file name to its path, rejecting anything that is not
    /// a `<hex>.pdf` name produced by this cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidFileName`] for malformed names.
    pub fn path_for(&self, file_name: &str) -> Result<PathBuf, CacheError> {
        if !is_cache_file_name(file_name) {
            return Err(CacheError::invalid_file_name(file_name));
        }
        Ok(self.dir.join(file_name))
    }

    /// Returns the cached document for `key` if a non-empty file exists.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] for metadata errors other than not-found.
    pub async fn lookup(&self, key: &str) -> Result<Option<CachedDocument>, CacheError> {
        let file_name = cache_file_name(key);
        let path = self.dir.join(&file_name);
        existing_document(path, file_name).await
    }

    /// Stores the body of `key` in the cache and returns the cached document.
    ///
    /// If a non-empty entry already exists, the stream is dropped unread (which
    /// closes the underlying connection) and the existing entry is returned.
    /// Otherwise the whole stream is copied to a temporary file that is then
    /// renamed into place.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] on directory or file write failures,
    /// [`CacheError::Body`] if the stream fails, and [`CacheError::EmptyBody`]
    /// if it yields no bytes. Temporary files are removed on failure.
    #[instrument(skip(self, body), fields(key = %key))]
    pub async fn store<S, B, E>(&self, key: &str, body: S) -> Result<CachedDocument, CacheError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let file_name = cache_file_name(key);
        let path = self.dir.join(&file_name);

        if let Some(existing) = existing_document(path.clone(), file_name.clone()).await? {
            debug!(file = %file_name, "cache hit; closing unread source stream");
            drop(body);
            return Ok(existing);
        }

        // Clone the Arc so the DashMap shard lock is released before awaiting.
        let lock = self
            .writers
            .entry(file_name.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock().await;

        let outcome = match existing_document(path.clone(), file_name.clone()).await {
            Ok(Some(existing)) => {
                debug!(file = %file_name, "entry written by concurrent writer; closing unread source stream");
                drop(body);
                Ok(existing)
            }
            Ok(None) => self.write_new(key, body, &path, &file_name).await,
            Err(error) => Err(error),
        };

        drop(guard);
        self.writers
            .remove_if(&file_name, |_, held| Arc::strong_count(held) <= 2);
        outcome
    }

    async fn write_new<S, B, E>(
        &self,
        key: &str,
        body: S,
        path: &Path,
        file_name: &str,
    ) -> Result<CachedDocument, CacheError>
    where
        S: Stream<Item = Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
    {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(self.dir.clone(), e))?;

        let temp_path = self
            .dir
            .join(format!("{file_name}{PARTIAL_MARKER}{:016x}", rand::random::<u64>()));

        let written = match copy_stream_to_file(key, body, &temp_path).await {
            Ok(0) => Err(CacheError::EmptyBody {
                key: key.to_string(),
            }),
            Ok(written) => tokio::fs::rename(&temp_path, path)
                .await
                .map(|()| written)
                .map_err(|e| CacheError::io(path.to_path_buf(), e)),
            Err(error) => Err(error),
        };

        match written {
            Ok(len) => {
                info!(file = %file_name, bytes = len, "cached document");
                Ok(CachedDocument {
                    path: path.to_path_buf(),
                    file_name: file_name.to_string(),
                    len,
                })
            }
            Err(error) => {
                debug!(path = %temp_path.display(), "removing partial cache file after error");
                if let Err(remove_error) = tokio::fs::remove_file(&temp_path).await
                    && remove_error.kind() != std::io::ErrorKind::NotFound
                {
                    warn!(
                        path = %temp_path.display(),
                        error = %remove_error,
                        "failed to remove partial cache file"
                    );
                }
                Err(error)
            }
        }
    }

    /// Lists complete cache entries, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be read.
    pub async fn entries(&self) -> Result<Vec<CachedDocument>, CacheError> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CacheError::io(self.dir.clone(), e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(self.dir.clone(), e))?
        {
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !is_cache_file_name(&file_name) {
                continue;
            }
            if let Some(document) = existing_document(entry.path(), file_name).await? {
                entries.push(document);
            }
        }
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    /// Deletes every cache file (complete or partial) and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Io`] if the directory cannot be read or a file cannot be removed.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut read_dir = match tokio::fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(CacheError::io(self.dir.clone(), e)),
        };

        let mut removed = 0;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| CacheError::io(self.dir.clone(), e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let ours = is_cache_file_name(&name)
                || name
                    .split_once(PARTIAL_MARKER)
                    .is_some_and(|(stem, _)| is_cache_file_name(stem));
            if !ours {
                continue;
            }
            let path = entry.path();
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| CacheError::io(path.clone(), e))?;
            removed += 1;
        }
        info!(removed, "cleared PDF cache");
        Ok(removed)
    }
}

async fn existing_document(
    path: PathBuf,
    file_name: String,
) -> Result<Option<CachedDocument>, CacheError> {
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(Some(CachedDocument {
            path,
            file_name,
            len: meta.len(),
        })),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(CacheError::io(path, e)),
    }
}

/// Streams `body` into a new file at `path`, returning bytes written.
async fn copy_stream_to_file<S, B, E>(key: &str, mut body: S, path: &Path) -> Result<u64, CacheError>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    E: std::error::Error + Send + Sync + 'static,
{
    let file = File::create(path)
        .await
        .map_err(|e| CacheError::io(path.to_path_buf(), e))?;
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| CacheError::Body {
            key: key.to_string(),
            source: Box::new(e),
        })?;
        let chunk = chunk.as_ref();
        writer
            .write_all(chunk)
            .await
            .map_err(|e| CacheError::io(path.to_path_buf(), e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| CacheError::io(path.to_path_buf(), e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| CacheError::io(path.to_path_buf(), e))?;

    Ok(bytes_written)
}
