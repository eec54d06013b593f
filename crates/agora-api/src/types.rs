//! Wire types for the Agora REST API.
//!
//! Every struct here mirrors a JSON shape the backend defines. The backend
//! uses camelCase field names, so each type carries
//! `#[serde(rename_all = "camelCase")]` — a field named `display_name` in
//! Rust travels as `"displayName"` on the wire.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::ApiError;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a user account.
///
/// A newtype wrapper around `u64`: you can't accidentally pass a post ID
/// where a user ID is expected, and signatures like `fn block(user: UserId)`
/// read better than `fn block(user: u64)`.
///
/// `#[serde(transparent)]` makes this serialize as the bare number the
/// backend sends — `UserId(7)` is just `7` in JSON, not `{ "0": 7 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

/// A user's declared role, as reported by the backend.
///
/// This is a closed set — the client renders role-dependent UI from it, but
/// it never *enforces* anything: authorization decisions belong to the
/// backend, which re-checks the role on every privileged call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Role {
    /// An ordinary member. The default when nothing says otherwise.
    #[default]
    User,
    /// Can act on reports and moderate content.
    Moderator,
    /// Full administrative access.
    Admin,
}

impl Role {
    /// Returns `true` for moderators (admins are not moderators — the
    /// backend models the two as distinct roles, not a hierarchy).
    pub fn is_moderator(self) -> bool {
        matches!(self, Role::Moderator)
    }

    /// Returns `true` for admins.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Returns `true` for either privileged role. Most moderation UI
    /// gates on this.
    pub fn is_admin_or_moderator(self) -> bool {
        matches!(self, Role::Moderator | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "User"),
            Role::Moderator => write!(f, "Moderator"),
            Role::Admin => write!(f, "Admin"),
        }
    }
}

/// The authenticated user's profile, as returned by `GET /user/me`.
///
/// Held only in memory by the session layer — never persisted. It's
/// re-derived from the backend on every application load, so a role change
/// or deactivation takes effect on the next boot at the latest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable numeric identifier.
    pub id: UserId,
    /// Login name, unique per account.
    pub username: String,
    /// Name shown in the UI. Distinct from `username`; users change it freely.
    pub display_name: String,
    /// Declared role. See [`Role`] for what the client does (not) do with it.
    pub role: Role,
    /// Reference to the profile image, if one is set.
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// `false` for deactivated/banned accounts.
    pub active: bool,
}

// ---------------------------------------------------------------------------
// Credential pair
// ---------------------------------------------------------------------------

/// The two opaque credentials a successful login or refresh returns.
///
/// Both strings are opaque to the client — never parsed, never validated
/// locally, only stored and echoed back. The pair is indivisible: the
/// session layer persists both or neither, and this type enforces the
/// "complete pair" half of that bargain at construction time via
/// [`CredentialPair::from_parts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialPair {
    /// Short-lived token authorizing individual API calls.
    pub access_token: String,
    /// Longer-lived token used solely to obtain a new pair.
    pub refresh_token: String,
}

impl CredentialPair {
    /// Builds a pair from two optional halves, failing loudly if either is
    /// missing or empty.
    ///
    /// A backend response that "succeeds" without both tokens is a hard
    /// failure, not something to accept silently — half a pair stored
    /// locally is a stranded session waiting to happen.
    pub fn from_parts(
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Result<Self, ApiError> {
        match (access_token, refresh_token) {
            (Some(access), Some(refresh))
                if !access.is_empty() && !refresh.is_empty() =>
            {
                Ok(Self {
                    access_token: access,
                    refresh_token: refresh,
                })
            }
            (access, refresh) => Err(ApiError::Malformed(format!(
                "credential response incomplete (access: {}, refresh: {})",
                presence(&access),
                presence(&refresh),
            ))),
        }
    }
}

fn presence(token: &Option<String>) -> &'static str {
    match token.as_deref() {
        None => "missing",
        Some("") => "empty",
        Some(_) => "present",
    }
}

/// The raw shape of `/auth/login` and `/auth/refresh` responses.
///
/// Both fields are optional on purpose: a partial body must deserialize
/// cleanly so we can reject it as [`ApiError::Malformed`] with a precise
/// message, rather than surfacing a generic serde decode error.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawCredentialPair {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl RawCredentialPair {
    pub(crate) fn validate(self) -> Result<CredentialPair, ApiError> {
        CredentialPair::from_parts(self.access_token, self.refresh_token)
    }
}

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// The backend accepts either the username or the account email here.
    pub username_or_email: String,
    pub password: String,
}

/// Body of `POST /auth/refresh`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

// =========================================================================
// Tests
// =========================================================================
