//! CLI entry point for pagebridge.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app_config;
mod cli;
mod commands;

use cli::{Cli, Command, RenderArgs};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Command::Pages {
            site,
            chapter,
            json,
        } => {
            let source = commands::build_source(site, &RenderArgs::default())?;
            commands::run_pages_command(&source, &chapter, json).await
        }
        Command::Image {
            site,
            render,
            chapter,
            index,
            output,
        } => {
            let source = commands::build_source(site, &render)?;
            commands::run_image_command(&source, &chapter, index, output).await
        }
        Command::Export {
            site,
            render,
            chapter,
            output_dir,
            jobs,
        } => {
            let source = commands::build_source(site, &render)?;
            let show_progress = !cli.quiet && io::stderr().is_terminal();
            commands::run_export_command(&source, &chapter, &output_dir, jobs, show_progress).await
        }
        Command::Popular { site, page, json } => {
            let source = commands::build_source(site, &RenderArgs::default())?;
            commands::run_popular_command(&source, page, json).await
        }
        Command::Auth { command } => commands::run_auth_command(command),
        Command::Cache { cache_dir, command } => commands::run_cache_command(cache_dir, command).await,
    }
}
