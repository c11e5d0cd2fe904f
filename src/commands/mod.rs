//! CLI command handlers.

mod auth;
mod cache;
mod chapter;
mod setup;

pub use auth::run_auth_command;
pub use cache::run_cache_command;
pub use chapter::{run_export_command, run_image_command, run_pages_command, run_popular_command};
pub use setup::build_source;
