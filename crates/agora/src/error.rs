//! Unified error type for the Agora client.

use agora_api::ApiError;
use agora_session::SessionError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `agora` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant auto-generates `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum AgoraError {
    /// A request-level error (network, HTTP status, malformed body).
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A session-level error (rejected credentials, unverified account,
    /// transient backend trouble).
    #[error(transparent)]
    Session(#[from] SessionError),
}
