//! Default User-Agent for outgoing requests.
//!
//! Used only when no override is configured in the credential store. Sites
//! that bind the clearance cookie to a browser User-Agent need the override.

/// Project URL for User-Agent identification.
const PROJECT_UA_URL: &str = "https://github.com/fierce/pagebridge";

/// Default User-Agent sent when the credential store has no override.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("pagebridge/{version} (+{PROJECT_UA_URL})")
}
