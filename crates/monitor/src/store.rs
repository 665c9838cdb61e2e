//! Persistence of the last observed snapshot.
//!
//! The snapshot is one JSON document replaced wholesale at the end of each
//! run. A missing file means no run has completed yet and loads as an empty
//! snapshot.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use sourcewatch_core::Snapshot;
use thiserror::Error;
use tracing::debug;

/// Errors produced by [`SnapshotStore`] operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

/// Load/save capability for the previous run's state.
pub trait SnapshotStore: Send + Sync {
    /// Return the persisted snapshot, or an empty one if none exists yet.
    fn load(&self) -> Result<Snapshot, SnapshotError>;

    /// Replace the persisted snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError>;
}

// ── File-backed ─────────────────────────────────────────────────

/// Stores the snapshot as pretty-printed JSON at a fixed path.
///
/// Writes go to `{path}.tmp` first and are renamed over `{path}`, so the
/// target is never left half-written.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        PathBuf::from(tmp)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Snapshot, SnapshotError> {
        let json = match std::fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path().display(), "no snapshot yet");
                return Ok(Snapshot::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path().display(), advertisers = snapshot.len(), "snapshot written");
        Ok(())
    }
}

// ── In-memory ───────────────────────────────────────────────────

/// In-memory store. Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct InMemorySnapshotStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Debug, Default)]
struct StoreState {
    snapshot: Snapshot,
    saves: usize,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot, as if a previous run had saved it.
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState { snapshot, saves: 0 })),
        }
    }

    /// The currently stored snapshot.
    pub fn snapshot(&self) -> Result<Snapshot, SnapshotError> {
        Ok(self.lock()?.snapshot.clone())
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> Result<usize, SnapshotError> {
        Ok(self.lock()?.saves)
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, SnapshotError> {
        self.state
            .lock()
            .map_err(|_| SnapshotError::Unavailable("lock poisoned".into()))
    }
}

impl SnapshotStore for InMemorySnapshotStore {
    fn load(&self) -> Result<Snapshot, SnapshotError> {
        self.snapshot()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let mut state = self.lock()?;
        state.snapshot = snapshot.clone();
        state.saves += 1;
        Ok(())
    }
}
