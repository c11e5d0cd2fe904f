//! Chapter command handlers: list pages, fetch one image, export all, list popular.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use pagebridge_core::auth::CLEARANCE_HINT;
use pagebridge_core::{ImageResponse, Page, PageList, Source, SourceError};
use tracing::{info, warn};

pub async fn run_pages_command(source: &Source, chapter: &str, json: bool) -> Result<()> {
    let pages = resolve_chapter(source, chapter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&pages)?);
    } else {
        for page in &pages {
            println!(
                "{}\t{}",
                page.index,
                page.image_url.as_deref().unwrap_or(page.url.as_str())
            );
        }
    }
    info!(pages = pages.len(), "Chapter resolved");
    Ok(())
}

pub async fn run_image_command(
    source: &Source,
    chapter: &str,
    index: usize,
    output: Option<PathBuf>,
) -> Result<()> {
    let pages = resolve_chapter(source, chapter).await?;
    let Some(page) = pages.iter().find(|page| page.index == index) else {
        bail!("Chapter has {} pages; index {index} is out of range", pages.len());
    };

    let image = source
        .fetch_image(page)
        .await
        .map_err(|error| with_clearance_hint(error, format!("Failed to fetch page {index}")))?;
    let path = output.unwrap_or_else(|| PathBuf::from(page_file_name(index, &image.content_type)));
    write_image(&path, &image).await?;
    info!(path = %path.display(), bytes = image.bytes.len(), "Page written");
    Ok(())
}

pub async fn run_export_command(
    source: &Source,
    chapter: &str,
    output_dir: &Path,
    jobs: u8,
    show_progress: bool,
) -> Result<()> {
    let pages = resolve_chapter(source, chapter).await?;
    tokio::fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Cannot create output directory '{}'", output_dir.display()))?;

    let progress = if show_progress {
        progress_bar(pages.len())
    } else {
        ProgressBar::hidden()
    };

    let results: Vec<(usize, Result<PathBuf>)> = stream::iter(pages.iter())
        .map(|page| {
            let progress = progress.clone();
            async move {
                let result = export_page(source, page, output_dir).await;
                progress.inc(1);
                (page.index, result)
            }
        })
        .buffer_unordered(usize::from(jobs))
        .collect()
        .await;
    progress.finish_and_clear();

    let mut failed = 0usize;
    for (index, result) in &results {
        if let Err(error) = result {
            failed += 1;
            warn!(page = index, error = %format!("{error:#}"), "Page export failed");
        }
    }
    info!(
        exported = results.len() - failed,
        failed,
        dir = %output_dir.display(),
        "Export complete"
    );
    if failed > 0 {
        bail!("{failed} of {} pages failed to export", results.len());
    }
    Ok(())
}

pub async fn run_popular_command(source: &Source, page: u32, json: bool) -> Result<()> {
    let items = source.fetch_popular(page).await.map_err(|error| {
        with_clearance_hint(error, format!("Failed to fetch popular listing page {page}"))
    })?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            println!("{}\t{}", item.title, item.url);
        }
    }
    info!(items = items.len(), "Listing fetched");
    Ok(())
}

async fn resolve_chapter(source: &Source, chapter: &str) -> Result<PageList> {
    source
        .fetch_page_list(chapter)
        .await
        .map_err(|error| with_clearance_hint(error, format!("Failed to resolve chapter '{chapter}'")))
}

/// Wraps `error` in `context`, adding the token refresh hint for challenge pages.
fn with_clearance_hint(error: SourceError, context: String) -> anyhow::Error {
    if error.is_challenge() {
        anyhow::Error::new(error).context(format!("{context}\n  Hint: {CLEARANCE_HINT}"))
    } else {
        anyhow::Error::new(error).context(context)
    }
}

async fn export_page(source: &Source, page: &Page, output_dir: &Path) -> Result<PathBuf> {
    let image = source.fetch_image(page).await?;
    let path = output_dir.join(page_file_name(page.index, &image.content_type));
    write_image(&path, &image).await?;
    Ok(path)
}

async fn write_image(path: &Path, image: &ImageResponse) -> Result<()> {
    tokio::fs::write(path, &image.bytes)
        .await
        .with_context(|| format!("Cannot write '{}'", path.display()))
}

fn progress_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {bar:30} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.set_message("Exporting pages...");
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// File name for page `index` with an extension matching `content_type`.
fn page_file_name(index: usize, content_type: &str) -> String {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let extension = match mime.as_str() {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/avif" => "avif",
        _ => "bin",
    };
    format!("page-{index:04}.{extension}")
}
