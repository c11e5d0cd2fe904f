//! HTTP client that replays clearance credentials on every request.
//!
//! [`AugmentedClient`] wraps a `reqwest::Client`. Each request is rewritten
//! with the current credential snapshot before it reaches the transport: the
//! clearance token is bound into the `Cookie` header and the User-Agent is
//! overridden when configured. Responses are returned unmodified.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy, Request, Response};
use tracing::{debug, instrument, warn};
use url::Url;

use super::challenge::detect_challenge;
use super::error::FetchError;
use crate::auth::{CLEARANCE_HINT, CredentialStore, Credentials};
use crate::user_agent;

/// Cookie name the challenge provider uses for its clearance token.
pub const CLEARANCE_COOKIE_NAME: &str = "cf_clearance";

/// Default HTTP connect timeout (30 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (2 minutes; chapters may be large PDFs).
pub const DEFAULT_READ_TIMEOUT_SECS: u64 = 120;

/// Credential-augmenting HTTP client.
///
/// Cheap to clone; clones share the connection pool and credential store.
#[derive(Debug, Clone)]
pub struct AugmentedClient {
    client: Client,
    credentials: CredentialStore,
}

impl AugmentedClient {
    /// Creates a client with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the underlying client cannot be built.
    pub fn new(credentials: CredentialStore) -> Result<Self, FetchError> {
        Self::with_timeouts(
            credentials,
            DEFAULT_CONNECT_TIMEOUT_SECS,
            DEFAULT_READ_TIMEOUT_SECS,
        )
    }

    /// Creates a client with explicit timeout values.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the underlying client cannot be built.
    #[instrument(level = "debug", skip(credentials))]
    pub fn with_timeouts(
        credentials: CredentialStore,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, FetchError> {
        let client = build_client(connect_timeout_secs, read_timeout_secs)?;
        Ok(Self {
            client,
            credentials,
        })
    }

    /// Returns the credential store this client reads from.
    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Applies the current credential snapshot to `request`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidCredential`] if a configured value cannot
    /// be encoded as a header.
    pub fn augment(&self, request: &mut Request) -> Result<(), FetchError> {
        let snapshot = self.credentials.snapshot();
        apply_credentials(request.headers_mut(), &snapshot)
    }

    /// Issues an augmented GET and returns the response with its body unread.
    ///
    /// No retries are attempted. Non-success statuses become errors; a
    /// challenge-looking error response becomes [`FetchError::ChallengeDetected`].
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on transport failure or non-success status.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &Url) -> Result<Response, FetchError> {
        let mut request = self
            .client
            .get(url.clone())
            .build()
            .map_err(|_| FetchError::invalid_url(url.as_str()))?;
        self.augment(&mut request)?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| FetchError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        debug!(status = status.as_u16(), "response received");

        if let Some(signal) = detect_challenge(status, response.headers()) {
            warn!(
                status = status.as_u16(),
                ?signal,
                hint = CLEARANCE_HINT,
                "response looks like a challenge page; clearance token may be missing or expired"
            );
            return Err(FetchError::challenge(url.as_str(), status.as_u16()));
        }

        if !status.is_success() {
            return Err(FetchError::http_status(url.as_str(), status.as_u16()));
        }

        Ok(response)
    }
}

/// Rewrites `headers` with the given credentials.
///
/// When a token is configured, the `Cookie` header is made to contain
/// `cf_clearance=<token>`: it is merged into any existing Cookie header and
/// replaces a stale `cf_clearance` pair. When a User-Agent override is
/// configured, it replaces the `User-Agent` header. Absent values leave the
/// headers untouched.
///
/// # Errors
///
/// Returns [`FetchError::InvalidCredential`] if a value is not a valid header value.
pub fn apply_credentials(headers: &mut HeaderMap, credentials: &Credentials) -> Result<(), FetchError> {
    if let Some(token) = credentials.clearance_token() {
        let pair = format!("{CLEARANCE_COOKIE_NAME}={token}");
        let merged = match headers.get(COOKIE).and_then(|v| v.to_str().ok()) {
            Some(existing) => merge_cookie_header(existing, &pair),
            None => pair,
        };
        let value = HeaderValue::from_str(&merged)
            .map_err(|_| FetchError::InvalidCredential { header: "Cookie" })?;
        headers.insert(COOKIE, value);
    }

    if let Some(agent) = credentials.user_agent() {
        let value = HeaderValue::from_str(agent)
            .map_err(|_| FetchError::InvalidCredential { header: "User-Agent" })?;
        headers.insert(USER_AGENT, value);
    }

    Ok(())
}

fn merge_cookie_header(existing: &str, pair: &str) -> String {
    let prefix = format!("{CLEARANCE_COOKIE_NAME}=");
    let mut parts: Vec<&str> = existing
        .split(';')
        .map(str::trim)
        .filter(|part| !part.is_empty() && !part.starts_with(&prefix))
        .collect();
    parts.push(pair);
    parts.join("; ")
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn build_client(connect_timeout_secs: u64, read_timeout_secs: u64) -> Result<Client, FetchError> {
    match try_build_client(connect_timeout_secs, read_timeout_secs, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic while reading system proxy
            // settings; retry with environment proxies only.
            warn!("HTTP client builder panicked loading system proxy settings; using env-proxy fallback");
            try_build_client(connect_timeout_secs, read_timeout_secs, true).map_err(|failure| {
                FetchError::ClientBuild {
                    reason: match failure {
                        BuildClientFailure::Panic => "builder panicked in env-proxy fallback".to_string(),
                        BuildClientFailure::Build(error) => error.to_string(),
                    },
                }
            })
        }
        Err(BuildClientFailure::Build(error)) => Err(FetchError::ClientBuild {
            reason: error.to_string(),
        }),
    }
}

fn try_build_client(
    connect_timeout_secs: u64,
    read_timeout_secs: u64,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent());
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn apply_env_proxy_fallback(mut builder: ClientBuilder) -> ClientBuilder {
    if let Some(proxy) = env_proxy_for_scheme("https")
        && let Ok(resolved) = Proxy::https(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    if let Some(proxy) = env_proxy_for_scheme("http")
        && let Ok(resolved) = Proxy::http(&proxy)
    {
        builder = builder.proxy(resolved);
    }
    builder
}

fn env_proxy_for_scheme(scheme: &str) -> Option<String> {
    let names: &[&str] = match scheme {
        "https" => &["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"],
        "http" => &["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"],
        _ => return None,
    };
    names.iter().find_map(|name| {
        std::env::var(name)
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}
