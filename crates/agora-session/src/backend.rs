//! Backend seam for the session state machine.
//!
//! The manager doesn't talk HTTP — it talks to this trait. Production
//! hands it the real [`AuthApi`]; the test suite hands it a scripted mock
//! that fails in exactly the ways each scenario needs. The state machine
//! code is identical either way.

use agora_api::{ApiError, AuthApi, CredentialPair, Identity};

/// The four backend operations the session lifecycle depends on.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` — the manager is shared across async tasks
///   behind an `Arc`, so its backend must be too.
/// - Each method returns `impl Future + Send` (rather than plain
///   `async fn`) so the futures can be awaited from spawned tasks.
pub trait AuthBackend: Send + Sync + 'static {
    /// Exchanges credentials for a token pair.
    fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> impl std::future::Future<Output = Result<CredentialPair, ApiError>> + Send;

    /// Exchanges a refresh token for a new pair.
    fn refresh(
        &self,
        refresh_token: &str,
    ) -> impl std::future::Future<Output = Result<CredentialPair, ApiError>> + Send;

    /// Fetches the identity behind the currently attached access token.
    fn fetch_current_identity(
        &self,
    ) -> impl std::future::Future<Output = Result<Identity, ApiError>> + Send;

    /// Notifies the backend that the session is ending.
    fn logout(
        &self,
    ) -> impl std::future::Future<Output = Result<(), ApiError>> + Send;
}

impl AuthBackend for AuthApi {
    async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<CredentialPair, ApiError> {
        AuthApi::login(self, username_or_email, password).await
    }

    async fn refresh(
        &self,
        refresh_token: &str,
    ) -> Result<CredentialPair, ApiError> {
        AuthApi::refresh(self, refresh_token).await
    }

    async fn fetch_current_identity(&self) -> Result<Identity, ApiError> {
        AuthApi::fetch_current_identity(self).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        AuthApi::logout(self).await
    }
}
