//! Clearance credentials and the shared snapshot store read by every request.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Credentials obtained outside the program after solving a site challenge.
///
/// The clearance token is redacted in Debug output to prevent accidental
/// logging of session data.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    clearance_token: Option<String>,
    user_agent: Option<String>,
}

impl Credentials {
    /// Creates credentials, treating blank values as absent.
    #[must_use]
    pub fn new(clearance_token: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            clearance_token: non_blank(clearance_token),
            user_agent: non_blank(user_agent),
        }
    }

    /// Returns the clearance token, if configured and non-blank.
    ///
    /// The token is sensitive; do not log the return value.
    #[must_use]
    pub fn clearance_token(&self) -> Option<&str> {
        self.clearance_token.as_deref()
    }

    /// Returns the User-Agent override, if configured and non-blank.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    /// Returns true when neither value is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clearance_token.is_none() && self.user_agent.is_none()
    }

    /// Returns a copy with the token replaced.
    #[must_use]
    pub fn with_clearance_token(&self, token: Option<String>) -> Self {
        Self::new(token, self.user_agent.clone())
    }

    /// Returns a copy with the User-Agent override replaced.
    #[must_use]
    pub fn with_user_agent(&self, user_agent: Option<String>) -> Self {
        Self::new(self.clearance_token.clone(), user_agent)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field(
                "clearance_token",
                &self.clearance_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Shared, cheaply cloneable handle over the current credentials.
///
/// Readers get a whole `Arc<Credentials>` snapshot; writers swap the pair in
/// one step, so a token is never observed alongside a stale User-Agent.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    current: Arc<RwLock<Arc<Credentials>>>,
}

impl CredentialStore {
    /// Creates a store holding `credentials`.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(credentials))),
        }
    }

    /// Returns a consistent snapshot of the current credentials.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Credentials> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replaces the credentials atomically.
    pub fn replace(&self, credentials: Credentials) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(credentials);
    }
}
