// ABOUTME: Command implementations behind the CLI
// ABOUTME: Exports the sync and search-url commands

pub mod search_url;
pub mod sync;

pub use search_url::search_url;
pub use sync::sync;
