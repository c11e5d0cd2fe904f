//! Builds a configured [`Source`] from CLI flags, config file, and stored credentials.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use pagebridge_core::auth::{default_credentials_path, load_credentials};
use pagebridge_core::http::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_READ_TIMEOUT_SECS};
use pagebridge_core::pdf::{DEFAULT_JPEG_QUALITY, DEFAULT_RENDER_SCALE};
use pagebridge_core::source::{DEFAULT_IMAGE_SELECTOR, DEFAULT_LISTING_SELECTOR, SelectorPagination};
use pagebridge_core::{AugmentedClient, CredentialStore, PageRenderer, PdfCache, Source};
use tracing::debug;
use url::Url;

use crate::app_config::{FileConfig, load_default_file_config};
use crate::cli::{RenderArgs, SiteArgs};

/// Resolves the cache directory: flag, then config file, then the user cache dir.
pub fn resolve_cache_dir(flag: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(dir) = flag {
        return Ok(dir);
    }
    let loaded = load_default_file_config()?;
    if let Some(dir) = loaded.config.and_then(|config| config.cache_dir) {
        return Ok(dir);
    }
    PdfCache::default_dir().map_err(|error| anyhow!("{error}"))
}

/// Builds the source for a fetching command.
pub fn build_source(site: SiteArgs, render: &RenderArgs) -> Result<Source> {
    let loaded = load_default_file_config()?;
    let config = loaded.config.unwrap_or_default();
    debug!(path = ?loaded.path, ?config, "Loaded file config");

    let base_url = resolve_base_url(site.base_url.as_deref(), &config)?;
    let cache_dir = match site.cache_dir.or_else(|| config.cache_dir.clone()) {
        Some(dir) => dir,
        None => PdfCache::default_dir().map_err(|error| anyhow!("{error}"))?,
    };
    let cache = PdfCache::new(cache_dir);

    let credentials_path = default_credentials_path().map_err(|error| anyhow!("{error}"))?;
    let mut credentials = load_credentials(&credentials_path).map_err(|error| {
        anyhow!(
            "Failed to read credentials from '{}': {error}",
            credentials_path.display()
        )
    })?;
    if let Some(token) = site.token {
        credentials = credentials.with_clearance_token(Some(token));
    }
    if let Some(user_agent) = site.user_agent {
        credentials = credentials.with_user_agent(Some(user_agent));
    }
    if credentials.clearance_token().is_none() {
        tracing::warn!("No clearance token configured; protected pages will likely fail (see `pagebridge auth hint`)");
    }

    let client = AugmentedClient::with_timeouts(
        CredentialStore::new(credentials),
        config.connect_timeout_secs.unwrap_or(DEFAULT_CONNECT_TIMEOUT_SECS),
        config.read_timeout_secs.unwrap_or(DEFAULT_READ_TIMEOUT_SECS),
    )?;

    let renderer = PageRenderer::new(cache.clone())
        .scale(render.scale.or(config.render_scale).unwrap_or(DEFAULT_RENDER_SCALE))
        .jpeg_quality(render.quality.or(config.jpeg_quality).unwrap_or(DEFAULT_JPEG_QUALITY));

    let pagination = SelectorPagination::new(
        config.listing_selector.as_deref().unwrap_or(DEFAULT_LISTING_SELECTOR),
        config.image_selector.as_deref().unwrap_or(DEFAULT_IMAGE_SELECTOR),
    )
    .context("Invalid selector in config file")?;

    Ok(Source::from_parts(base_url, client, cache)
        .with_renderer(renderer)
        .with_pagination(Arc::new(pagination)))
}

fn resolve_base_url(flag: Option<&str>, config: &FileConfig) -> Result<Url> {
    let Some(raw) = flag.or(config.base_url.as_deref()) else {
        bail!("No base URL: pass --base-url or set `base_url` in config.toml");
    };
    let url = Url::parse(raw).with_context(|| format!("Invalid base URL '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Base URL must be http or https: {raw}");
    }
    Ok(url)
}
