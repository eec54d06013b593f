//! # Agora
//!
//! Client-side session lifecycle for the Agora forum backend.
//!
//! Agora manages the authenticated session of a forum client: restoring
//! it on startup from persisted tokens, renewing it silently when the
//! access token expires, and running explicit login/logout — while every
//! UI surface observes a single consistent snapshot of "who is logged in
//! right now".
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use agora::prelude::*;
//!
//! # async fn run() -> Result<(), AgoraError> {
//! let client = AgoraClient::builder()
//!     .base_url("https://forum.example.org/api")
//!     .credential_file("/tmp/agora-credentials.json")
//!     .build();
//!
//! // Determine the session once per application load.
//! client.boot(BootLocation::Elsewhere).await;
//!
//! if !client.snapshot().is_authenticated() {
//!     client.login("ann", "secret").await?;
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;

pub use client::{AgoraClient, AgoraClientBuilder};
pub use error::AgoraError;

/// Commonly used types, re-exported for a single-import experience.
pub mod prelude {
    pub use agora_api::{
        ApiConfig, ApiError, CredentialPair, Identity, Role, UserId,
    };
    pub use agora_session::{
        BootLocation, SessionConfig, SessionError, SessionSnapshot,
        SessionState,
    };
    pub use agora_store::{CredentialStore, FileStore, MemoryStore};

    pub use crate::{AgoraClient, AgoraClientBuilder, AgoraError};
}
