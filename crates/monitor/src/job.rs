//! One monitoring run: fetch, compare, notify, persist.
//!
//! ```text
//! START → FETCHED → SNAPSHOT_LOADED ─┬→ BOOTSTRAP_EXIT ──┬→ SNAPSHOT_SAVED → END
//!                                    └→ DIFF_AND_NOTIFY ─┘
//! ```
//!
//! A fetch or snapshot-load failure ends the run before anything is written,
//! so the next run compares against the same previous snapshot.

use std::fmt;

use sourcewatch_core::{FailurePolicy, Snapshot};
use sourcewatch_notify::{Notifier, NotifyError, TemplateRenderer};
use thiserror::Error;
use tracing::{info, warn};

use crate::diff::{self, PendingNotification};
use crate::fetch::{FailureFeed, FetchError};
use crate::store::{SnapshotError, SnapshotStore};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("fetching current state failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("snapshot store failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("notifying advertiser {advertiser_id} failed: {source}")]
    Notify {
        advertiser_id: String,
        #[source]
        source: NotifyError,
    },
}

/// Step of a run, recorded on each log line as `phase`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Fetched,
    SnapshotLoaded,
    BootstrapExit,
    DiffAndNotify,
    SnapshotSaved,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetched => "fetched",
            Self::SnapshotLoaded => "snapshot_loaded",
            Self::BootstrapExit => "bootstrap_exit",
            Self::DiffAndNotify => "diff_and_notify",
            Self::SnapshotSaved => "snapshot_saved",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// No previous state: baseline recorded, nothing sent.
    Bootstrap,
    /// Compared against the previous state and notified.
    Completed,
}

/// A notification that could not be delivered under [`FailurePolicy::Defer`].
#[derive(Debug, Clone)]
pub struct DeliveryFailure {
    pub advertiser_id: String,
    pub error: String,
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Advertiser ids that were notified.
    pub notified: Vec<String>,
    pub failed: Vec<DeliveryFailure>,
    /// False for dry runs, and for deferred runs that had nothing to record.
    pub snapshot_saved: bool,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Sequences one run over explicit collaborators.
pub struct Monitor {
    feed: Box<dyn FailureFeed>,
    store: Box<dyn SnapshotStore>,
    notifier: Box<dyn Notifier>,
    renderer: TemplateRenderer,
    policy: FailurePolicy,
    dry_run: bool,
}

impl Monitor {
    pub fn new(
        feed: Box<dyn FailureFeed>,
        store: Box<dyn SnapshotStore>,
        notifier: Box<dyn Notifier>,
        renderer: TemplateRenderer,
    ) -> Self {
        Self {
            feed,
            store,
            notifier,
            renderer,
            policy: FailurePolicy::default(),
            dry_run: false,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// When set, the run never writes the snapshot.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute one run.
    ///
    /// # Errors
    ///
    /// Fetch and snapshot errors always abort. A notification error aborts
    /// under [`FailurePolicy::Abort`] (the snapshot is then left untouched);
    /// under [`FailurePolicy::Defer`] it is recorded in the report instead.
    pub async fn run(&self) -> Result<RunReport, MonitorError> {
        let current = self.feed.fetch().await?;
        info!(
            phase = %RunPhase::Fetched,
            advertisers = current.len(),
            sources = current.source_count(),
            "current state fetched"
        );

        let previous = self.store.load()?;
        info!(
            phase = %RunPhase::SnapshotLoaded,
            advertisers = previous.len(),
            sources = previous.source_count(),
            "previous snapshot loaded"
        );

        if diff::is_bootstrap(&previous) {
            info!(
                phase = %RunPhase::BootstrapExit,
                "first run detected: saving current errors as snapshot, no emails will be sent"
            );
            let snapshot_saved = self.persist(&current)?;
            return Ok(RunReport {
                outcome: RunOutcome::Bootstrap,
                notified: Vec::new(),
                failed: Vec::new(),
                snapshot_saved,
            });
        }

        let pending = diff::diff(&current, &previous);
        info!(
            phase = %RunPhase::DiffAndNotify,
            advertisers = pending.len(),
            channel = self.notifier.channel_name(),
            "new failures detected"
        );

        let mut acknowledged = current;
        let mut notified = Vec::new();
        let mut failed = Vec::new();

        for item in &pending {
            match self.deliver(item).await {
                Ok(()) => {
                    info!(
                        advertiser_id = %item.advertiser_id,
                        advertiser = %item.advertiser.name,
                        sources = item.advertiser.sources.len(),
                        "sent notification"
                    );
                    notified.push(item.advertiser_id.clone());
                }
                Err(err) => match self.policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Defer => {
                        warn!(
                            advertiser_id = %item.advertiser_id,
                            error = %err,
                            "notification failed, leaving sources unacknowledged"
                        );
                        diff::unacknowledge(&mut acknowledged, &previous, item);
                        failed.push(DeliveryFailure {
                            advertiser_id: item.advertiser_id.clone(),
                            error: err.to_string(),
                        });
                    }
                },
            }
        }

        // An empty snapshot would make the next run a bootstrap and swallow
        // the deferred notifications, so the previous one stays in place.
        if acknowledged.is_empty() && !failed.is_empty() {
            warn!(
                failed = failed.len(),
                "no delivered failures to record, keeping previous snapshot"
            );
            return Ok(RunReport {
                outcome: RunOutcome::Completed,
                notified,
                failed,
                snapshot_saved: false,
            });
        }

        let snapshot_saved = self.persist(&acknowledged)?;
        Ok(RunReport {
            outcome: RunOutcome::Completed,
            notified,
            failed,
            snapshot_saved,
        })
    }

    async fn deliver(&self, item: &PendingNotification) -> Result<(), MonitorError> {
        let to_error = |source| MonitorError::Notify {
            advertiser_id: item.advertiser_id.clone(),
            source,
        };
        let notification = self
            .renderer
            .render(&item.advertiser_id, &item.advertiser)
            .map_err(to_error)?;
        self.notifier.send(&notification).await.map_err(to_error)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<bool, MonitorError> {
        if self.dry_run {
            info!(advertisers = snapshot.len(), "dry run: snapshot not saved");
            return Ok(false);
        }
        self.store.save(snapshot)?;
        info!(
            phase = %RunPhase::SnapshotSaved,
            advertisers = snapshot.len(),
            sources = snapshot.source_count(),
            "snapshot saved"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names() {
        assert_eq!(RunPhase::Fetched.to_string(), "fetched");
        assert_eq!(RunPhase::BootstrapExit.to_string(), "bootstrap_exit");
        assert_eq!(RunPhase::SnapshotSaved.to_string(), "snapshot_saved");
    }

    #[test]
    fn notify_error_names_advertiser() {
        let err = MonitorError::Notify {
            advertiser_id: "A1".to_string(),
            source: NotifyError::Smtp("connection refused".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("A1"), "got: {msg}");
        assert!(msg.contains("connection refused"), "got: {msg}");
    }
}
