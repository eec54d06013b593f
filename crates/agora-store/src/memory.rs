//! In-memory credential store.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::CredentialStore;

/// A [`CredentialStore`] backed by a plain in-memory map.
///
/// Nothing survives the process — which is exactly right for tests and for
/// "don't remember me" sessions where credentials should die with the app.
///
/// The map sits behind an `RwLock` because reads (every outgoing request
/// checks for an access token) vastly outnumber writes (a handful of
/// session transitions per app lifetime).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored entries. Test-suite convenience.
    pub fn len(&self) -> usize {
        match self.entries.read() {
            Ok(map) => map.len(),
            Err(_) => 0,
        }
    }

    /// Returns `true` if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        // A poisoned lock means another task panicked mid-write. Treat the
        // store as unavailable: report absent rather than propagate.
        match self.entries.read() {
            Ok(map) => map.get(key).cloned(),
            Err(_) => {
                tracing::warn!(key, "credential store poisoned, reading as absent");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        match self.entries.write() {
            Ok(mut map) => {
                map.insert(key.to_string(), value.to_string());
            }
            Err(_) => {
                tracing::warn!(key, "credential store poisoned, dropping write");
            }
        }
    }

    fn remove(&self, key: &str) {
        match self.entries.write() {
            Ok(mut map) => {
                map.remove(key);
            }
            Err(_) => {
                tracing::warn!(key, "credential store poisoned, dropping remove");
            }
        }
    }
}

// =========================================================================
// Tests
// =========================================================================
