//! Persisted credential file.
//!
//! Credentials live in `~/.config/pagebridge/credentials` (or
//! `$XDG_CONFIG_HOME/pagebridge/credentials`) as `key = "value"` lines. Only
//! two keys are recognized: `cf_clearance_cookie` and `user_agent_override`.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::Credentials;

/// Key holding the clearance token.
pub const CLEARANCE_TOKEN_KEY: &str = "cf_clearance_cookie";
/// Key holding the User-Agent override.
pub const USER_AGENT_KEY: &str = "user_agent_override";

const CREDENTIALS_FILE_NAME: &str = "credentials";
const APP_DIR_NAME: &str = "pagebridge";

/// Errors for persisted credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialFileError {
    /// No suitable user config directory is available.
    #[error("unable to determine config directory (set XDG_CONFIG_HOME or HOME)")]
    ConfigDirUnavailable,
    /// Filesystem I/O failed.
    #[error("IO error on credential file {path}: {source}")]
    Io {
        /// The credential file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// A line could not be parsed.
    #[error("line {line_number}: {reason}")]
    InvalidLine {
        /// 1-based line number.
        line_number: usize,
        /// What was wrong (never includes the value).
        reason: String,
    },
}

/// Returns the per-user config directory for this program.
///
/// Priority: `$XDG_CONFIG_HOME/pagebridge`, `$HOME/.config/pagebridge`,
/// `%APPDATA%/pagebridge`.
///
/// # Errors
///
/// Returns [`CredentialFileError::ConfigDirUnavailable`] if none is set.
pub fn default_config_dir() -> Result<PathBuf, CredentialFileError> {
    resolve_config_dir(
        sanitize_env_path(env::var_os("XDG_CONFIG_HOME")),
        sanitize_env_path(env::var_os("HOME")),
        sanitize_env_path(env::var_os("APPDATA")),
    )
}

/// Returns the default credential file path.
///
/// # Errors
///
/// Returns [`CredentialFileError::ConfigDirUnavailable`] if no config dir is found.
pub fn default_credentials_path() -> Result<PathBuf, CredentialFileError> {
    Ok(default_config_dir()?.join(CREDENTIALS_FILE_NAME))
}

fn sanitize_env_path(value: Option<OsString>) -> Option<PathBuf> {
    let value = value?;
    if value.to_string_lossy().trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(value))
}

fn resolve_config_dir(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    app_data: Option<PathBuf>,
) -> Result<PathBuf, CredentialFileError> {
    if let Some(xdg) = xdg_config_home {
        return Ok(xdg.join(APP_DIR_NAME));
    }
    if let Some(home) = home {
        return Ok(home.join(".config").join(APP_DIR_NAME));
    }
    if let Some(app_data) = app_data {
        return Ok(app_data.join(APP_DIR_NAME));
    }
    Err(CredentialFileError::ConfigDirUnavailable)
}

/// Loads credentials from `path`. A missing file yields empty credentials.
///
/// # Errors
///
/// Returns [`CredentialFileError`] when the file cannot be read or parsed.
#[instrument(level = "debug")]
pub fn load_credentials(path: &Path) -> Result<Credentials, CredentialFileError> {
    if !path.exists() {
        debug!("no credential file; starting without clearance credentials");
        return Ok(Credentials::default());
    }
    let raw = fs::read_to_string(path).map_err(|source| CredentialFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_credentials(&raw)
}

/// Writes credentials to `path` with owner-only permissions.
///
/// # Errors
///
/// Returns [`CredentialFileError::Io`] when the directory or file cannot be written.
#[instrument(level = "debug", skip(credentials))]
pub fn save_credentials(path: &Path, credentials: &Credentials) -> Result<(), CredentialFileError> {
    let io_err = |source| CredentialFileError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, render_credentials(credentials)).map_err(io_err)?;
    set_owner_only_permissions(path).map_err(io_err)?;
    Ok(())
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Parses credential file contents.
///
/// # Errors
///
/// Returns [`CredentialFileError::InvalidLine`] for syntax errors or unknown keys.
pub fn parse_credentials(raw: &str) -> Result<Credentials, CredentialFileError> {
    let mut token = None;
    let mut user_agent = None;

    for (line_index, raw_line) in raw.lines().enumerate() {
        let line_number = line_index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((raw_key, raw_value)) = line.split_once('=') else {
            return Err(CredentialFileError::InvalidLine {
                line_number,
                reason: "expected key = \"value\"".to_string(),
            });
        };

        let value = parse_string_literal(raw_value.trim()).ok_or_else(|| {
            CredentialFileError::InvalidLine {
                line_number,
                reason: "expected double-quoted string".to_string(),
            }
        })?;

        match raw_key.trim() {
            CLEARANCE_TOKEN_KEY => token = Some(value),
            USER_AGENT_KEY => user_agent = Some(value),
            unknown => {
                return Err(CredentialFileError::InvalidLine {
                    line_number,
                    reason: format!("unknown key '{unknown}'"),
                });
            }
        }
    }

    Ok(Credentials::new(token, user_agent))
}

/// Renders credentials in the on-disk format.
#[must_use]
pub fn render_credentials(credentials: &Credentials) -> String {
    let mut out = String::from("# pagebridge clearance credentials\n");
    if let Some(token) = credentials.clearance_token() {
        out.push_str(&format!("{CLEARANCE_TOKEN_KEY} = {}\n", quote(token)));
    }
    if let Some(user_agent) = credentials.user_agent() {
        out.push_str(&format!("{USER_AGENT_KEY} = {}\n", quote(user_agent)));
    }
    out
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

fn parse_string_literal(raw_value: &str) -> Option<String> {
    let inner = raw_value.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => out.push(chars.next()?),
            '"' => return None,
            _ => out.push(ch),
        }
    }
    Some(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_credentials_both_keys() {
        let raw = "\
# comment
cf_clearance_cookie = \"abc123\"
user_agent_override = \"Mozilla/5.0 (X11; Linux x86_64)\"
";
        let creds = parse_credentials(raw).unwrap();
        assert_eq!(creds.clearance_token(), Some("abc123"));
        assert_eq!(creds.user_agent(), Some("Mozilla/5.0 (X11; Linux x86_64)"));
    }

    #[test]
    fn test_parse_credentials_unknown_key_rejected() {
        let err = parse_credentials("base_url = \"https://example.com\"").unwrap_err();
        assert!(err.to_string().contains("unknown key 'base_url'"), "{err}");
    }

    #[test]
    fn test_parse_credentials_unquoted_value_rejected() {
        let err = parse_credentials("cf_clearance_cookie = abc").unwrap_err();
        assert!(matches!(
            err,
            CredentialFileError::InvalidLine { line_number: 1, .. }
        ));
        assert!(!err.to_string().contains("abc"), "value leaked: {err}");
    }

    #[test]
    fn test_render_then_parse_preserves_quotes_and_backslashes() {
        let creds = Credentials::new(
            Some("tok\\en".to_string()),
            Some("Agent \"quoted\"".to_string()),
        );
        let parsed = parse_credentials(&render_credentials(&creds)).unwrap();
        assert_eq!(parsed, creds);
    }

    #[test]
    fn test_load_missing_file_returns_empty() {
        let dir = TempDir::new().unwrap();
        let creds = load_credentials(&dir.path().join("missing")).unwrap();
        assert!(creds.is_empty());
    }

    #[test]
    fn test_save_creates_parent_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("credentials");
        let creds = Credentials::new(Some("abc123".to_string()), None);

        save_credentials(&path, &creds).unwrap();
        assert_eq!(load_credentials(&path).unwrap(), creds);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn test_resolve_config_dir_priority() {
        let dir = resolve_config_dir(
            Some(PathBuf::from("/xdg")),
            Some(PathBuf::from("/home/u")),
            None,
        )
        .unwrap();
        assert_eq!(dir, PathBuf::from("/xdg/pagebridge"));

        let dir = resolve_config_dir(None, Some(PathBuf::from("/home/u")), None).unwrap();
        assert_eq!(dir, PathBuf::from("/home/u/.config/pagebridge"));

        assert!(matches!(
            resolve_config_dir(None, None, None),
            Err(CredentialFileError::ConfigDirUnavailable)
        ));
    }
}
