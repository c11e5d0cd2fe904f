//! Cache command handlers: list and purge cached PDFs.

use std::path::PathBuf;

use anyhow::{Context, Result};
use pagebridge_core::PdfCache;
use tracing::info;

use super::setup::resolve_cache_dir;
use crate::cli::CacheCommand;

pub async fn run_cache_command(cache_dir: Option<PathBuf>, command: CacheCommand) -> Result<()> {
    let cache = PdfCache::new(resolve_cache_dir(cache_dir)?);
    match command {
        CacheCommand::List => {
            let entries = cache.entries().await.context("Failed to list cache")?;
            println!("cache_dir = {}", cache.dir().display());
            for entry in &entries {
                println!("{}\t{}", entry.file_name, entry.len);
            }
            let total: u64 = entries.iter().map(|entry| entry.len).sum();
            info!(files = entries.len(), bytes = total, "Cache listing complete");
        }
        CacheCommand::Clear => {
            let removed = cache.clear().await.context("Failed to clear cache")?;
            info!(removed, dir = %cache.dir().display(), "Cache cleared");
        }
    }
    Ok(())
}
