//! The typed session API client: the four auth operations.
//!
//! Each method here is a thin shell over the [`Dispatcher`] — no local
//! state, no retry logic, no decisions. Deciding what a failure *means*
//! (clear credentials? retry? surface to the user?) is the session layer's
//! job; this crate only guarantees typed inputs, typed outputs, and a
//! classified error.

use crate::types::{LoginRequest, RawCredentialPair, RefreshRequest};
use crate::{ApiError, CredentialPair, Dispatcher, Identity};

/// Client for the backend's auth endpoints.
#[derive(Clone)]
pub struct AuthApi {
    dispatcher: Dispatcher,
}

impl AuthApi {
    /// Creates the auth client on top of an existing dispatcher.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// `POST /auth/login` — exchanges credentials for a token pair.
    ///
    /// # Errors
    /// - 401 → invalid credentials
    /// - 403 → account exists but the email is unverified
    /// - [`ApiError::Malformed`] if the 2xx body lacks either token
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<CredentialPair, ApiError> {
        let body = LoginRequest {
            username_or_email: username_or_email.to_string(),
            password: password.to_string(),
        };
        let raw: RawCredentialPair =
            self.dispatcher.post("/auth/login", &body).await?;
        raw.validate()
    }

    /// `POST /auth/refresh` — exchanges a refresh token for a new pair.
    ///
    /// # Errors
    /// - 401 → the refresh token itself is invalid or expired
    /// - network/5xx → transient, no verdict on the token
    pub async fn refresh(
        &self,
        refresh_token: &str,
    ) -> Result<CredentialPair, ApiError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let raw: RawCredentialPair =
            self.dispatcher.post("/auth/refresh", &body).await?;
        raw.validate()
    }

    /// `GET /user/me` — fetches the identity behind the current access
    /// token (which the dispatcher attaches from the store).
    ///
    /// # Errors
    /// - 401 → the access token was rejected
    pub async fn fetch_current_identity(&self) -> Result<Identity, ApiError> {
        self.dispatcher.get("/user/me").await
    }

    /// `POST /auth/logout` — tells the backend to revoke the session.
    ///
    /// Best-effort by contract: callers are expected to proceed with local
    /// cleanup whether or not this succeeds. The error is still returned so
    /// the caller can log it.
    pub async fn logout(&self) -> Result<(), ApiError> {
        self.dispatcher.post_empty("/auth/logout").await
    }
}
