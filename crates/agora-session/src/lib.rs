//! Session lifecycle management for Agora.
//!
//! This crate owns the one piece of the client with real state-machine and
//! race-condition concerns: establishing, persisting, silently renewing,
//! and tearing down the authenticated session.
//!
//! 1. **State** ([`SessionState`], [`SessionSnapshot`]) — an explicit
//!    tagged union of "don't know yet / logged in as X / logged out",
//!    published through a watch channel with one writer and many readers.
//! 2. **Transitions** ([`SessionManager`]) — boot, login, logout, and the
//!    refresh-and-retry sub-sequence, serialized so they can never
//!    interleave against the same session.
//! 3. **Backend seam** ([`AuthBackend`]) — the four auth operations as a
//!    trait, implemented by the real HTTP client in production and by
//!    scripted mocks in tests.
//!
//! # How it fits in the stack
//!
//! ```text
//! UI surfaces (above)  ← subscribe to snapshots, invoke login/logout
//!     ↕
//! Session Layer (this crate)  ← the state machine, sole credential writer
//!     ↕
//! API Layer (below)  ← typed calls, classified errors
//!     ↕
//! Store Layer (below)  ← two opaque strings on disk
//! ```

mod backend;
mod error;
mod manager;
mod session;

pub use backend::AuthBackend;
pub use error::SessionError;
pub use manager::SessionManager;
pub use session::{BootLocation, SessionConfig, SessionSnapshot, SessionState};
