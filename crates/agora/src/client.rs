//! `AgoraClient` builder and facade.
//!
//! This is the entry point for embedding the client. It ties together
//! all the layers: store → dispatch → auth API → session.

use std::path::PathBuf;
use std::sync::Arc;

use agora_api::{ApiConfig, AuthApi, Dispatcher, Identity};
use agora_session::{
    BootLocation, SessionConfig, SessionManager, SessionSnapshot,
};
use agora_store::{CredentialStore, FileStore, MemoryStore};
use tokio::sync::watch;

use crate::AgoraError;

/// Builder for configuring and assembling an Agora client.
///
/// # Example
///
/// ```rust,ignore
/// use agora::prelude::*;
///
/// let client = AgoraClient::builder()
///     .base_url("https://forum.example.org/api")
///     .credential_file("~/.agora/credentials.json")
///     .build();
/// client.boot(BootLocation::Elsewhere).await;
/// ```
pub struct AgoraClientBuilder {
    api_config: ApiConfig,
    session_config: SessionConfig,
    store: Option<Arc<dyn CredentialStore>>,
}

impl AgoraClientBuilder {
    /// Creates a new builder with default settings: localhost backend,
    /// in-memory credential store.
    pub fn new() -> Self {
        Self {
            api_config: ApiConfig::default(),
            session_config: SessionConfig::default(),
            store: None,
        }
    }

    /// Sets the backend base URL.
    pub fn base_url(mut self, url: &str) -> Self {
        self.api_config.base_url = url.to_string();
        self
    }

    /// Sets the per-request HTTP timeout in seconds.
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.api_config.timeout_secs = secs;
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Persists credentials to a JSON file at `path`, so sessions
    /// survive process restarts.
    pub fn credential_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = Some(Arc::new(FileStore::open(path)));
        self
    }

    /// Uses a caller-provided credential store.
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Assembles the client.
    ///
    /// The store is shared between the dispatcher (which reads the access
    /// token for the bearer header) and the session manager (the sole
    /// writer).
    pub fn build(self) -> AgoraClient {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));

        let dispatcher = Dispatcher::new(self.api_config, Arc::clone(&store));
        let backend = AuthApi::new(dispatcher);
        let session =
            SessionManager::new(backend, store, self.session_config);

        AgoraClient { session }
    }
}

impl Default for AgoraClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// An assembled Agora client.
///
/// A thin facade over the session manager. More involved consumers can
/// reach the manager directly through [`session()`](Self::session); the
/// delegates here cover the common lifecycle calls.
pub struct AgoraClient {
    session: SessionManager<AuthApi>,
}

impl AgoraClient {
    /// Creates a new builder.
    pub fn builder() -> AgoraClientBuilder {
        AgoraClientBuilder::new()
    }

    /// The underlying session manager.
    pub fn session(&self) -> &SessionManager<AuthApi> {
        &self.session
    }

    /// Determines the session on application start. See
    /// [`SessionManager::boot`].
    pub async fn boot(&self, location: BootLocation) {
        self.session.boot(location).await;
    }

    /// Logs in with the given credentials.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Identity, AgoraError> {
        let identity = self.session.login(username_or_email, password).await?;
        Ok(identity)
    }

    /// Logs out. Never fails observably.
    pub async fn logout(&self) {
        self.session.logout().await;
    }

    /// Abandons any in-flight session determination.
    pub fn shutdown(&self) {
        self.session.shutdown();
    }

    /// The current session snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Subscribes to session changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.session.subscribe()
    }
}
