//! Error taxonomy for the session layer.
//!
//! [`ApiError`] says what happened on the wire; [`SessionError`] says what
//! it *means* for the session. The two classifiers below are the only
//! place that translation happens, and both work from the HTTP status the
//! API layer preserves — never from message text. (The reference client
//! substring-matched error messages; that behavior is deliberately not
//! carried over.)

use agora_api::ApiError;

/// Session-level failures, as surfaced to consumers.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Login rejected. User-correctable; the carried message is the
    /// backend's own text, suitable for inline display.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Login rejected because the account's email is unconfirmed.
    /// Distinguished so the UI can offer a "resend verification" action.
    #[error("{0}")]
    UnverifiedAccount(String),

    /// The backend definitively rejected an access or refresh credential.
    /// The only classification that ever drives credential cleanup.
    #[error("session rejected by backend")]
    Unauthorized,

    /// Network or server failure with no verdict on credential validity.
    /// Must never trigger credential deletion.
    #[error("could not reach backend: {0}")]
    Transient(String),

    /// A success response whose body lacked required fields. Treated like
    /// an invalid-credentials failure for propagation purposes.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl SessionError {
    /// Classifies a failure of the login call itself.
    ///
    /// On login, 401 means "wrong credentials" (user-correctable, not a
    /// stored-session verdict) and 403 means "unverified account" — both
    /// structural, by status.
    pub fn classify_login(err: ApiError) -> Self {
        let unauthorized = err.is_unauthorized();
        let forbidden = err.is_forbidden();
        match err {
            ApiError::Http { message, .. } if unauthorized => {
                SessionError::InvalidCredentials(message)
            }
            ApiError::Http { message, .. } if forbidden => {
                SessionError::UnverifiedAccount(message)
            }
            ApiError::Malformed(message) => SessionError::Malformed(message),
            err if err.is_transient() => {
                SessionError::Transient(err.to_string())
            }
            // Remaining 4xx responses: the backend refused the request for
            // a reason the user can potentially correct.
            err => SessionError::InvalidCredentials(err.to_string()),
        }
    }

    /// Classifies a failure of any other session call (refresh, identity
    /// fetch, logout).
    pub fn classify(err: ApiError) -> Self {
        match err {
            err if err.is_unauthorized() => SessionError::Unauthorized,
            ApiError::Malformed(message) => SessionError::Malformed(message),
            // Everything else — network errors, 5xx, and odd 4xx — carries
            // no verdict on the stored credentials.
            err => SessionError::Transient(err.to_string()),
        }
    }
}
