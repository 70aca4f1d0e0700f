//! JSON file persistence for the territory snapshot.

use std::path::PathBuf;

use dominion_engine::hooks::{PersistenceError, PersistenceStore};
use dominion_types::TerritorySnapshot;

/// Stores the snapshot as pretty-printed JSON at a fixed path.
///
/// Writes go through a sibling temp file and an atomic rename, so a crash
/// mid-save leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file path.
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Whether a snapshot file exists at the store's path.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl PersistenceStore for JsonFileStore {
    fn load(&self) -> Result<TerritorySnapshot, PersistenceError> {
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| PersistenceError::Backend(format!("read {}: {e}", self.path.display())))?;
        serde_json::from_str(&contents)
            .map_err(|e| PersistenceError::Backend(format!("parse {}: {e}", self.path.display())))
    }

    fn save(&self, snapshot: &TerritorySnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| PersistenceError::Backend(format!("serialize snapshot: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .map_err(|e| PersistenceError::Backend(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| PersistenceError::Backend(format!("rename to {}: {e}", self.path.display())))
    }
}
