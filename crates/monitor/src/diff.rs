//! Detection of newly failing sources.
//!
//! A flagged source needs a notification when the previous snapshot does
//! not list it for that advertiser, or lists it with a different
//! `sync_failed_at` (it recovered and failed again in between). Sources
//! that dropped out of the current state have recovered and produce
//! nothing.

use indexmap::IndexMap;
use sourcewatch_core::{Advertiser, Snapshot, Source};

/// Sources of one advertiser that need a notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub advertiser_id: String,
    /// The advertiser with only its pending sources.
    pub advertiser: Advertiser,
}

/// An empty previous snapshot marks the first run: the current state is
/// recorded as the baseline and nothing is sent.
pub fn is_bootstrap(previous: &Snapshot) -> bool {
    previous.is_empty()
}

/// Sources in `current` that are new or whose failure time changed since
/// `previous`.
pub fn diff_advertiser(current: &Advertiser, previous: Option<&Advertiser>) -> IndexMap<String, Source> {
    current
        .sources
        .iter()
        .filter(|(id, source)| {
            match previous.and_then(|p| p.sources.get(id.as_str())) {
                None => true,
                Some(seen) => seen.sync_failed_at != source.sync_failed_at,
            }
        })
        .map(|(id, source)| (id.clone(), source.clone()))
        .collect()
}

/// Pending notifications for every advertiser in `current`, in feed order.
/// Advertisers with nothing new are left out.
pub fn diff(current: &Snapshot, previous: &Snapshot) -> Vec<PendingNotification> {
    current
        .iter()
        .filter_map(|(advertiser_id, advertiser)| {
            let sources = diff_advertiser(advertiser, previous.get(advertiser_id));
            if sources.is_empty() {
                return None;
            }
            Some(PendingNotification {
                advertiser_id: advertiser_id.clone(),
                advertiser: Advertiser {
                    name: advertiser.name.clone(),
                    sources,
                },
            })
        })
        .collect()
}

/// Undo the acknowledgement of `pending` in `snapshot`.
///
/// Each pending source goes back to what `previous` recorded for it, or is
/// dropped if `previous` never had it, so the next run reports it again.
/// An advertiser left without sources is removed.
pub fn unacknowledge(snapshot: &mut Snapshot, previous: &Snapshot, pending: &PendingNotification) {
    let id = pending.advertiser_id.as_str();
    let prior = previous.get(id);

    if let Some(advertiser) = snapshot.get_mut(id) {
        for source_id in pending.advertiser.sources.keys() {
            match prior.and_then(|p| p.sources.get(source_id)) {
                Some(seen) => {
                    advertiser.sources.insert(source_id.clone(), seen.clone());
                }
                None => {
                    advertiser.sources.shift_remove(source_id);
                }
            }
        }
        if advertiser.sources.is_empty() {
            snapshot.remove(id);
        }
    }
}
