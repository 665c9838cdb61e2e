//! Flagged-source state as stored between runs.
//!
//! Only sources that are enabled for fetching and currently failing ever
//! make it into these types; healthy sources are dropped when the feed
//! response is normalized.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A failing data feed owned by an advertiser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub source_type: String,
    /// When the last sync failed. A changed value means the source
    /// recovered and failed again.
    pub sync_failed_at: Option<String>,
}

/// An advertiser and its flagged sources, keyed by source id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advertiser {
    pub name: String,
    #[serde(default)]
    pub sources: IndexMap<String, Source>,
}

impl Advertiser {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: IndexMap::new(),
        }
    }

    /// Builder-style source insert.
    pub fn with_source(mut self, id: impl Into<String>, source: Source) -> Self {
        self.sources.insert(id.into(), source);
        self
    }
}

/// Advertiser id → advertiser, as observed by one fetch.
///
/// Serializes as a bare JSON object so the file on disk reads
/// `{ "<advertiser id>": { "name": ..., "sources": { ... } } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    advertisers: IndexMap<String, Advertiser>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.advertisers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.advertisers.is_empty()
    }

    pub fn get(&self, advertiser_id: &str) -> Option<&Advertiser> {
        self.advertisers.get(advertiser_id)
    }

    pub fn get_mut(&mut self, advertiser_id: &str) -> Option<&mut Advertiser> {
        self.advertisers.get_mut(advertiser_id)
    }

    pub fn contains(&self, advertiser_id: &str) -> bool {
        self.advertisers.contains_key(advertiser_id)
    }

    /// Insert or replace an advertiser, returning the previous entry.
    pub fn insert(&mut self, advertiser_id: impl Into<String>, advertiser: Advertiser) -> Option<Advertiser> {
        self.advertisers.insert(advertiser_id.into(), advertiser)
    }

    /// Remove an advertiser, keeping the order of the rest.
    pub fn remove(&mut self, advertiser_id: &str) -> Option<Advertiser> {
        self.advertisers.shift_remove(advertiser_id)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Advertiser> {
        self.advertisers.iter()
    }

    /// Total number of flagged sources across all advertisers.
    pub fn source_count(&self) -> usize {
        self.advertisers.values().map(|a| a.sources.len()).sum()
    }
}

impl FromIterator<(String, Advertiser)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Advertiser)>>(iter: I) -> Self {
        Self {
            advertisers: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = (&'a String, &'a Advertiser);
    type IntoIter = indexmap::map::Iter<'a, String, Advertiser>;

    fn into_iter(self) -> Self::IntoIter {
        self.advertisers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, at: &str) -> Source {
        Source {
            name: name.to_string(),
            source_type: "facebook_ads".to_string(),
            sync_failed_at: Some(at.to_string()),
        }
    }

    #[test]
    fn snapshot_serializes_as_plain_object() {
        let snapshot: Snapshot = [(
            "A1".to_string(),
            Advertiser::new("Acme").with_source("S1", source("Main feed", "2024-01-01T00:00")),
        )]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "A1": {
                    "name": "Acme",
                    "sources": {
                        "S1": {
                            "name": "Main feed",
                            "source_type": "facebook_ads",
                            "sync_failed_at": "2024-01-01T00:00"
                        }
                    }
                }
            })
        );
    }

    #[test]
    fn snapshot_reads_file_shape() {
        let raw = r#"{
            "12": {"name": "Beta", "sources": {
                "7": {"name": "GA", "source_type": "google", "sync_failed_at": "2024-02-01T10:00"},
                "3": {"name": "FB", "source_type": "facebook", "sync_failed_at": null}
            }}
        }"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.source_count(), 2);

        let adv = snapshot.get("12").unwrap();
        let ids: Vec<&str> = adv.sources.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["7", "3"]);
        assert_eq!(adv.sources["3"].sync_failed_at, None);
    }

    #[test]
    fn remove_keeps_order() {
        let mut snapshot: Snapshot = ["a", "b", "c"]
            .into_iter()
            .map(|id| (id.to_string(), Advertiser::new(id)))
            .collect();
        assert!(snapshot.remove("b").is_some());
        let ids: Vec<&String> = snapshot.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert!(!snapshot.contains("b"));
    }

    #[test]
    fn empty_snapshot() {
        let snapshot: Snapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot, Snapshot::new());
    }
}
