//! REST layer for Agora: the generic request dispatcher and the typed
//! session API client built on top of it.
//!
//! This crate defines the "language" the client speaks to the forum
//! backend:
//!
//! - **Types** ([`Identity`], [`Role`], [`CredentialPair`], request DTOs) —
//!   the JSON structures that travel over HTTP.
//! - **Dispatcher** ([`Dispatcher`]) — one wrapper that every API call in
//!   the application rides: it attaches the bearer token, serializes JSON,
//!   and normalizes every non-2xx response into a single error contract.
//! - **Session client** ([`AuthApi`]) — the four auth operations (login,
//!   refresh, fetch identity, logout) as thin typed calls.
//! - **Errors** ([`ApiError`]) — what can go wrong, with the HTTP status
//!   preserved so callers classify failures structurally instead of
//!   grepping message strings.
//!
//! # Architecture
//!
//! The API layer sits between the store (tokens) and the session layer
//! (state machine). It holds no mutable state of its own — the dispatcher
//! *reads* the credential store on every call but never writes it.
//!
//! ```text
//! Session Layer (state machine) → API Layer (this crate) → backend REST
//!                                        ↓ reads
//!                                  Store Layer (tokens)
//! ```

mod auth;
mod dispatch;
mod error;
mod types;

pub use auth::AuthApi;
pub use dispatch::{ApiConfig, Dispatcher};
pub use error::ApiError;
pub use types::{
    CredentialPair, Identity, LoginRequest, RefreshRequest, Role, UserId,
};
