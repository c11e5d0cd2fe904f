//! Auth command handlers: store, show, and clear clearance credentials.

use std::io::{self, IsTerminal, Read};

use anyhow::{Result, anyhow, bail};
use pagebridge_core::auth::{
    CLEARANCE_HINT, Credentials, default_credentials_path, load_credentials, save_credentials,
};
use tracing::info;

use crate::cli::AuthCommand;

pub fn run_auth_command(command: AuthCommand) -> Result<()> {
    match command {
        AuthCommand::SetToken { token } => {
            let token = value_or_stdin(token, "clearance token")?;
            update_credentials(|current| current.with_clearance_token(Some(token)))?;
            info!("Stored clearance token");
        }
        AuthCommand::SetUserAgent { user_agent } => {
            let user_agent = value_or_stdin(user_agent, "User-Agent")?;
            update_credentials(|current| current.with_user_agent(Some(user_agent)))?;
            info!("Stored User-Agent override");
        }
        AuthCommand::Show => run_auth_show_command()?,
        AuthCommand::Clear => run_auth_clear_command()?,
        AuthCommand::Hint => println!("{CLEARANCE_HINT}"),
    }
    Ok(())
}

fn run_auth_show_command() -> Result<()> {
    let path = default_credentials_path()
        .map_err(|error| anyhow!("Failed to resolve credential path: {error}"))?;
    let credentials = load_credentials(&path)
        .map_err(|error| anyhow!("Failed to read credentials: {error}"))?;

    println!("credentials_path = {}", path.display());
    println!(
        "cf_clearance_cookie = {}",
        credentials.clearance_token().map_or("<not set>", |_| "<redacted>")
    );
    println!(
        "user_agent_override = {}",
        credentials.user_agent().unwrap_or("<not set>")
    );
    Ok(())
}

fn run_auth_clear_command() -> Result<()> {
    let path = default_credentials_path()
        .map_err(|error| anyhow!("Failed to resolve credential path: {error}"))?;
    match std::fs::remove_file(&path) {
        Ok(()) => info!(path = %path.display(), "Cleared stored credentials"),
        Err(error) if error.kind() == io::ErrorKind::NotFound => info!("No stored credentials found"),
        Err(error) => bail!("Failed to remove '{}': {error}", path.display()),
    }
    Ok(())
}

fn update_credentials(update: impl FnOnce(&Credentials) -> Credentials) -> Result<()> {
    let path = default_credentials_path()
        .map_err(|error| anyhow!("Failed to resolve credential path: {error}"))?;
    let current = load_credentials(&path)
        .map_err(|error| anyhow!("Failed to read credentials: {error}"))?;
    save_credentials(&path, &update(&current))
        .map_err(|error| anyhow!("Failed to write credentials: {error}"))?;
    info!(path = %path.display(), "Updated credential file");
    Ok(())
}

fn value_or_stdin(value: Option<String>, label: &str) -> Result<String> {
    let raw = match value {
        Some(value) => value,
        None if !io::stdin().is_terminal() => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
        None => {
            info!("Paste the {label}, then press Enter:");
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line
        }
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("No {label} provided");
    }
    Ok(trimmed.to_string())
}
