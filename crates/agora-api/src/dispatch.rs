//! The generic request dispatcher.
//!
//! Every HTTP call in the application rides through [`Dispatcher`] — the
//! session client below, and all of the CRUD surfaces above. It does three
//! jobs, uniformly:
//!
//! 1. Attaches `Authorization: Bearer <accessToken>` when the credential
//!    store holds an access token (it *reads* the store, never writes it —
//!    the session layer is the store's sole writer).
//! 2. Serializes JSON request bodies and deserializes JSON responses.
//! 3. Converts every non-2xx response into [`ApiError::Http`] carrying the
//!    status and the best message the body offers.

use std::sync::Arc;
use std::time::Duration;

use agora_store::{ACCESS_TOKEN_KEY, CredentialStore};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ApiError;

// ---------------------------------------------------------------------------
// ApiConfig
// ---------------------------------------------------------------------------

/// Configuration for the dispatcher.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the backend, without a trailing slash
    /// (e.g. `https://forum.example/api`).
    pub base_url: String,

    /// Per-request timeout in seconds. Bounds every call so a hung backend
    /// resolves as a transient network error instead of pending forever.
    ///
    /// Default: 30 seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// The shared HTTP call wrapper.
///
/// Cheap to clone — `reqwest::Client` is an `Arc` internally and the store
/// is behind one explicitly — so every subsystem can hold its own copy.
#[derive(Clone)]
pub struct Dispatcher {
    http: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
}

impl Dispatcher {
    /// Creates a dispatcher for the given backend, reading access tokens
    /// from `store`.
    pub fn new(config: ApiConfig, store: Arc<dyn CredentialStore>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            // Building a client only fails if the TLS backend can't
            // initialize — unrecoverable at startup either way.
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            store,
        }
    }

    /// Sends a GET request and deserializes the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, ApiError> {
        let request = self.http.get(self.url(path));
        self.send_json(request).await
    }

    /// Sends a POST request with a JSON body and deserializes the JSON
    /// response.
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let request = self.http.post(self.url(path)).json(body);
        self.send_json(request).await
    }

    /// Sends a body-less POST request and discards the response body.
    ///
    /// For endpoints like logout that answer 204/empty — there is nothing
    /// to deserialize, only a status to check.
    pub async fn post_empty(&self, path: &str) -> Result<(), ApiError> {
        let request = self.authorize(self.http.post(self.url(path)));
        let response = request.send().await?;
        self.check_status(response).await?;
        Ok(())
    }

    // -- internals ---------------------------------------------------------

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Attaches the bearer token when the store has one. An anonymous call
    /// (empty store) goes out without an Authorization header at all.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = self.authorize(request).send().await?;
        let response = self.check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Converts any non-success status into the uniform error contract.
    async fn check_status(
        &self,
        response: Response,
    ) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // The body may or may not be JSON; read it as text and let the
        // extractor pick the best message out of whatever came back.
        let body = response.text().await.unwrap_or_default();
        let message = extract_message(status.as_u16(), &body);
        tracing::debug!(status = status.as_u16(), %message, "request failed");

        Err(ApiError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

/// Extracts a user-presentable message from an error response body.
///
/// Preference order: the backend's structured `message` field, then the raw
/// body, then a generic fallback naming the status. Never used for
/// classification — only for display.
fn extract_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            if !message.is_empty() {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("request failed with status {status}")
}

// =========================================================================
// Tests
// =========================================================================
