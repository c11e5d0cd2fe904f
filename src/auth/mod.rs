//! Clearance credential management.
//!
//! The clearance token and User-Agent override are obtained by the user in a
//! real browser after solving the site's challenge. This module holds them in
//! memory for the request path and persists them between runs.

mod credentials;
mod store;

pub use credentials::{CredentialStore, Credentials};
pub use store::{
    CLEARANCE_TOKEN_KEY, CredentialFileError, USER_AGENT_KEY, default_config_dir,
    default_credentials_path, load_credentials, parse_credentials, render_credentials,
    save_credentials,
};

/// Guidance shown when the clearance token is missing or has expired.
pub const CLEARANCE_HINT: &str = "Open the site in a browser and solve the challenge. \
Copy the value of the `cf_clearance` cookie and store it with `pagebridge auth set-token`. \
The cookie is usually bound to the browser's User-Agent; copy it too with \
`pagebridge auth set-user-agent`.";
