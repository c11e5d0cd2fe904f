//! Credential-augmented HTTP access.
//!
//! Every network call the crate makes goes through [`AugmentedClient`], which
//! injects the clearance cookie and User-Agent override from the shared
//! [`CredentialStore`](crate::auth::CredentialStore). Challenge detection in
//! [`challenge`] is advisory: it labels suspicious responses but never tries
//! to solve them.
//!
//! # Example
//!
//! ```no_run
//! use pagebridge_core::auth::{CredentialStore, Credentials};
//! use pagebridge_core::http::AugmentedClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = CredentialStore::new(Credentials::new(Some("abc123".into()), None));
//! let client = AugmentedClient::new(store)?;
//! let response = client.get(&"https://example.com/chapter/1".parse()?).await?;
//! println!("status: {}", response.status());
//! # Ok(())
//! # }
//! ```

pub mod challenge;
mod client;
mod error;

pub use challenge::{ChallengeSignal, body_looks_like_challenge, detect_challenge};
pub use client::{
    AugmentedClient, CLEARANCE_COOKIE_NAME, DEFAULT_CONNECT_TIMEOUT_SECS,
    DEFAULT_READ_TIMEOUT_SECS, apply_credentials,
};
pub use error::FetchError;
