//! Advertiser source-failure monitor.
//!
//! - `fetch`: remote feed of advertisers with failing sources
//! - `store`: persisted snapshot of the previous run
//! - `diff`: new and re-occurred failure detection
//! - `job`: the run orchestrator

pub mod diff;
pub mod fetch;
pub mod job;
pub mod store;

pub use diff::PendingNotification;
pub use fetch::{FailureFeed, FetchError, HttpFeed};
pub use job::{Monitor, MonitorError, RunOutcome, RunReport};
pub use store::{FileSnapshotStore, InMemorySnapshotStore, SnapshotError, SnapshotStore};
