//! Client-local credential storage for Agora.
//!
//! This crate is the bottom of the stack: a tiny synchronous key/value
//! surface that holds two opaque string credentials between page loads.
//! It has no business logic at all — it doesn't know what a token *means*,
//! only how to keep one around.
//!
//! # How it fits in the stack
//!
//! ```text
//! Session Layer (above)  ← the ONLY writer; decides when tokens live or die
//!     ↕
//! API Layer (above)      ← read-only; attaches the access token to requests
//!     ↕
//! Store Layer (this crate)  ← dumb persistence, nothing else
//! ```
//!
//! # Failure philosophy
//!
//! Storage can always be unavailable (permissions, full disk, corrupted
//! file). Per the storage contract, that is never an error the rest of the
//! application sees: a store that can't be read behaves as *empty*, and a
//! store that can't be written drops the write and logs a warning. Failing
//! open to "logged out" beats crashing the whole client over a token cache.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Well-known key for the short-lived access credential.
///
/// The literal value matches the layout the web client has always used in
/// browser storage, so a native client and a web client pointed at the same
/// profile directory stay interoperable.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Well-known key for the longer-lived refresh credential.
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// A synchronous key/value surface for opaque credential strings.
///
/// # Contract
///
/// - All three operations are synchronous and infallible from the caller's
///   point of view. Implementations swallow storage failures: `get` returns
///   `None`, `set`/`remove` become no-ops (with a log line).
/// - Values are opaque. Implementations must never parse or validate them.
/// - `Send + Sync + 'static` so the store can be shared behind an `Arc`
///   across async tasks — the API layer reads it from request paths while
///   the session layer writes it from transitions.
///
/// # Why a trait?
///
/// Same reason the session layer's backend is a trait: production wants a
/// file on disk, tests want an in-memory map they can inspect, and nothing
/// above this crate should care which one it got.
pub trait CredentialStore: Send + Sync + 'static {
    /// Returns the stored value for `key`, or `None` if absent
    /// (or if storage is unavailable).
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str);

    /// Removes the entry for `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str);
}
