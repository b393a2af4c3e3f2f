// ABOUTME: Listing synchronisation - diffing, the run pipeline and scheduling
// ABOUTME: Ties the finn.no source to the listing store

pub mod daemon;
pub mod diff;
pub mod job;

pub use daemon::SyncDaemon;
pub use diff::{diff_records, FieldChange};
pub use job::{log_preview, ListingOutcome, Outcome, SyncReport, Synchronizer};
