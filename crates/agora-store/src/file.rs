//! File-backed credential store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::CredentialStore;

/// A [`CredentialStore`] persisted as a single JSON object on disk.
///
/// This is the native-client analogue of the browser's local storage: a
/// flat `{ "accessToken": "...", "refreshToken": "..." }` object that
/// survives restarts. The whole file is loaded once on open and rewritten
/// on every mutation — with two short strings in it, write-through is far
/// simpler than anything clever and plenty fast.
///
/// # Degraded storage
///
/// An unreadable or malformed file degrades to an empty store; a failed
/// write drops the mutation. Both log a warning. The session layer is built
/// to survive this ("fail open to logged out"), so the worst case of a
/// broken disk is that the user has to log in again.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`, loading any existing entries.
    ///
    /// The file doesn't need to exist yet — it's created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Returns the path this store persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        let json = match serde_json::to_string_pretty(entries) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, "could not serialize credential store");
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(
                    error = %e,
                    path = %self.path.display(),
                    "could not create credential store directory, dropping write"
                );
                return;
            }
        }
        if let Err(e) = std::fs::write(&self.path, json) {
            tracing::warn!(
                error = %e,
                path = %self.path.display(),
                "could not write credential store, dropping write"
            );
        }
    }
}

/// Reads and parses the store file, degrading to empty on any failure.
fn load_entries(path: &Path) -> HashMap<String, String> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return HashMap::new();
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "could not read credential store, treating as empty"
            );
            return HashMap::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                error = %e,
                path = %path.display(),
                "credential store file is malformed, treating as empty"
            );
            HashMap::new()
        }
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.entries.read() {
            Ok(map) => map.get(key).cloned(),
            Err(_) => {
                tracing::warn!(key, "credential store poisoned, reading as absent");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        let Ok(mut map) = self.entries.write() else {
            tracing::warn!(key, "credential store poisoned, dropping write");
            return;
        };
        map.insert(key.to_string(), value.to_string());
        self.persist(&map);
    }

    fn remove(&self, key: &str) {
        let Ok(mut map) = self.entries.write() else {
            tracing::warn!(key, "credential store poisoned, dropping remove");
            return;
        };
        if map.remove(key).is_some() {
            self.persist(&map);
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
