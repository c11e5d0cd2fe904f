//! Application configuration loading for CLI defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use pagebridge_core::auth::default_config_dir;

/// File name of the CLI defaults file inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// TOML-style file configuration for CLI defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FileConfig {
    /// Base URL of the site.
    pub base_url: Option<String>,
    /// PDF cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Render upscale factor.
    pub render_scale: Option<f32>,
    /// JPEG quality of rendered pages.
    pub jpeg_quality: Option<u8>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP read timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// CSS selector for listing entries.
    pub listing_selector: Option<String>,
    /// CSS selector for reader page images.
    pub image_selector: Option<String>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(scale) = self.render_scale
            && !(scale.is_finite() && (0.25..=8.0).contains(&scale))
        {
            bail!("Invalid config value for `render_scale`: {scale}. Expected range: 0.25..=8.0");
        }
        if let Some(quality) = self.jpeg_quality
            && !(1..=100).contains(&quality)
        {
            bail!("Invalid config value for `jpeg_quality`: {quality}. Expected range: 1..=100");
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        if let Some(base_url) = &self.base_url {
            let parsed = url::Url::parse(base_url)
                .with_context(|| format!("Invalid config value for `base_url`: {base_url}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                bail!("Invalid config value for `base_url`: {base_url}. Expected an http(s) URL");
            }
        }
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=3600).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..=3600");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves the default config path (`<config dir>/pagebridge/config.toml`).
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    default_config_dir().ok().map(|dir| dir.join(CONFIG_FILE_NAME))
}

/// Loads config from the default path if present.
pub fn load_default_file_config() -> Result<LoadedConfig> {
    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(load_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw).with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let mut cfg = FileConfig::default();
    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = strip_inline_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            bail!("Invalid config syntax on line {line_number}: expected key = value");
        };

        let key = raw_key.trim();
        let value = raw_value.trim();
        let context = || format!("Invalid `{key}` value on line {line_number}");

        match key {
            "base_url" => cfg.base_url = Some(parse_string_literal(value).with_context(context)?),
            "cache_dir" => {
                cfg.cache_dir = Some(PathBuf::from(parse_string_literal(value).with_context(context)?));
            }
            "render_scale" => cfg.render_scale = Some(parse_float(value).with_context(context)?),
            "jpeg_quality" => cfg.jpeg_quality = Some(parse_integer_u8(value).with_context(context)?),
            "connect_timeout_secs" => {
                cfg.connect_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "read_timeout_secs" => {
                cfg.read_timeout_secs = Some(parse_integer_u64(value).with_context(context)?);
            }
            "listing_selector" => {
                cfg.listing_selector = Some(parse_string_literal(value).with_context(context)?);
            }
            "image_selector" => {
                cfg.image_selector = Some(parse_string_literal(value).with_context(context)?);
            }
            unknown => bail!("Unknown configuration key: '{unknown}' on line {line_number}"),
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw_value: &str) -> Result<String> {
    raw_value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .map(str::to_string)
        .context("Expected double-quoted string")
}

fn parse_integer_u8(raw_value: &str) -> Result<u8> {
    let value = raw_value.parse::<u16>()?;
    u8::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u8"))
}

fn parse_integer_u64(raw_value: &str) -> Result<u64> {
    let value = raw_value.parse::<i128>()?;
    if value < 0 {
        bail!("Expected non-negative integer");
    }
    u64::try_from(value).map_err(|_| anyhow::anyhow!("Integer value out of range for u64"))
}

fn parse_float(raw_value: &str) -> Result<f32> {
    Ok(raw_value.parse::<f32>()?)
}
