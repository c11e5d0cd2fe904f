//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Read chapters from a challenge-protected site.
///
/// Pagebridge replays a clearance cookie copied from a real browser, caches
/// PDF chapters locally, and renders their pages to JPEG on demand.
#[derive(Parser, Debug)]
#[command(name = "pagebridge")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the pages of a chapter
    Pages {
        #[command(flatten)]
        site: SiteArgs,

        /// Chapter path (joined onto the base URL) or absolute URL
        chapter: String,

        /// Print the page list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fetch one page image of a chapter and write it to a file
    Image {
        #[command(flatten)]
        site: SiteArgs,

        #[command(flatten)]
        render: RenderArgs,

        /// Chapter path (joined onto the base URL) or absolute URL
        chapter: String,

        /// Zero-based page index
        index: usize,

        /// Output file (defaults to page-<index>.<ext> in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Fetch every page of a chapter into a directory
    Export {
        #[command(flatten)]
        site: SiteArgs,

        #[command(flatten)]
        render: RenderArgs,

        /// Chapter path (joined onto the base URL) or absolute URL
        chapter: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        /// Pages fetched or rendered at once (1-32)
        #[arg(short = 'j', long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(1..=32))]
        jobs: u8,
    },

    /// List one page of the popular listing
    Popular {
        #[command(flatten)]
        site: SiteArgs,

        /// Listing page number
        #[arg(default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        page: u32,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage the clearance token and User-Agent override
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Inspect or purge the PDF cache
    Cache {
        /// Cache directory (defaults to the config file value or the user cache dir)
        #[arg(long, global = true)]
        cache_dir: Option<PathBuf>,

        #[command(subcommand)]
        command: CacheCommand,
    },
}

/// Site and network options shared by fetching commands.
#[derive(Args, Clone, Default)]
pub struct SiteArgs {
    /// Base URL of the site (overrides `base_url` in config.toml)
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// Cache directory (overrides `cache_dir` in config.toml)
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Clearance token for this run only (not persisted)
    #[arg(long, env = "PAGEBRIDGE_CF_CLEARANCE", hide_env_values = true)]
    pub token: Option<String>,

    /// User-Agent for this run only (not persisted)
    #[arg(long, env = "PAGEBRIDGE_USER_AGENT")]
    pub user_agent: Option<String>,
}

impl std::fmt::Debug for SiteArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteArgs")
            .field("base_url", &self.base_url)
            .field("cache_dir", &self.cache_dir)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

/// Rendering options for PDF pages.
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Upscale factor relative to the page's point size (0.25-8.0)
    #[arg(long, value_parser = parse_scale)]
    pub scale: Option<f32>,

    /// JPEG quality of rendered pages (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub quality: Option<u8>,
}

/// Credential commands.
#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Store the clearance token (reads stdin when omitted)
    SetToken {
        /// The `cf_clearance` cookie value
        token: Option<String>,
    },
    /// Store the User-Agent override (reads stdin when omitted)
    SetUserAgent {
        /// The browser's User-Agent string
        user_agent: Option<String>,
    },
    /// Show the stored credentials with the token redacted
    Show,
    /// Remove the stored credentials
    Clear,
    /// Explain how to obtain a clearance token
    Hint,
}

/// Cache maintenance commands.
#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// List cached PDFs
    List,
    /// Delete every cached PDF
    Clear,
}

fn parse_scale(raw: &str) -> Result<f32, String> {
    let scale: f32 = raw.parse().map_err(|e| format!("{e}"))?;
    if scale.is_finite() && (0.25..=8.0).contains(&scale) {
        Ok(scale)
    } else {
        Err(format!("{scale} is not in 0.25..=8.0"))
    }
}
