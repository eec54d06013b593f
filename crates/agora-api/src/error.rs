//! Error contract for the REST layer.
//!
//! Each crate in the workspace defines its own error enum. An `ApiError`
//! always means "the HTTP exchange itself went wrong" — the session layer
//! translates it into session-level vocabulary.
//!
//! The one rule that shapes this type: **the HTTP status must survive**.
//! Callers classify failures by status (`401`? `5xx`?), never by matching
//! substrings of the backend's message text. The message is carried for
//! display only.

/// Errors that can occur while talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response: DNS, connect, TLS,
    /// timeout, or the response body broke off mid-read. No verdict on
    /// credential validity can be drawn from this.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The backend answered with a non-success status.
    ///
    /// `message` is extracted from the response body — the structured
    /// `message` field when present, the raw body otherwise, a generic
    /// string as the last resort — and is suitable for showing to the user
    /// verbatim. Classification happens on `status` alone.
    #[error("backend returned {status}: {message}")]
    Http { status: u16, message: String },

    /// A success status whose body lacks required fields — e.g. a login
    /// that "succeeded" without both tokens. Treated as a hard failure.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl ApiError {
    /// Returns `true` if the backend rejected the attached credential
    /// (HTTP 401). This is the only classification that may ever trigger
    /// credential cleanup upstream.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Http { status: 401, .. })
    }

    /// Returns `true` for HTTP 403. On the login call this means an
    /// unverified account; elsewhere it means "authenticated but not
    /// allowed", which the session layer treats as non-terminal.
    pub fn is_forbidden(&self) -> bool {
        matches!(self, ApiError::Http { status: 403, .. })
    }

    /// Returns `true` when the failure carries no verdict on credential
    /// validity: transport errors and 5xx responses. Transient failures
    /// must never cause stored credentials to be deleted.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Http { status, .. } => *status >= 500,
            ApiError::Malformed(_) => false,
        }
    }

    /// The HTTP status, when there was a response at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}
