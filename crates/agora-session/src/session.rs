//! Session state types: what the rest of the application reads.
//!
//! The reference client kept "who is logged in" as two loose values (an
//! optional user and a loading flag) branched on at every call site. Here
//! the state is an explicit tagged union — each consumer matches on what
//! the session *is*, not on which of two strings happens to be present.

use std::time::Duration;

use agora_api::Identity;

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

/// The current authentication state.
///
/// This is a state machine with one transient and two terminal states:
///
/// ```text
///              ┌──(boot: identity confirmed)──→ Authenticated
///   Unknown ───┤
///              └──(boot: no/rejected session)─→ Unauthenticated
///
///   Authenticated ──(logout)──→ Unauthenticated
///   Unauthenticated ──(login)──→ Authenticated
/// ```
///
/// - **Unknown**: no determination has been made yet. Consumers must not
///   render auth-dependent UI — show a splash/skeleton instead.
/// - **Authenticated**: a backend-confirmed identity. Never derived from
///   stored tokens alone; the identity is re-fetched on every boot.
/// - **Unauthenticated**: definitively logged out *for this load*. Stored
///   credentials may still exist if the verdict was ambiguous (see the
///   boot transition), and a future load may succeed with them.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No determination made yet.
    Unknown,
    /// A confirmed identity.
    Authenticated(Identity),
    /// No session for this load.
    Unauthenticated,
}

impl SessionState {
    /// Returns the identity when authenticated.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// What consumers observe: the state plus a loading flag.
///
/// Published through a `tokio::sync::watch` channel with exactly one writer
/// (the [`SessionManager`](crate::SessionManager)): UI surfaces either
/// borrow the latest snapshot or await changes — they never hold their own
/// copy of session state.
///
/// `loading` is `true` while the boot transition is still in flight, and
/// again briefly during an explicit login (without re-entering `Unknown` —
/// a failed login leaves the previous terminal state untouched).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// The current authentication state.
    pub state: SessionState,
    /// `true` while a state determination or explicit login is in flight.
    pub loading: bool,
}

impl SessionSnapshot {
    /// The snapshot before the boot transition has run.
    pub fn initial() -> Self {
        Self {
            state: SessionState::Unknown,
            loading: true,
        }
    }

    /// The authenticated identity, or `None`.
    pub fn current_identity(&self) -> Option<&Identity> {
        self.state.identity()
    }

    /// Returns `true` when a confirmed identity is present.
    pub fn is_authenticated(&self) -> bool {
        self.current_identity().is_some()
    }

    /// Returns `true` while a transition is in flight.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    // Derived role booleans, computed purely from the identity's declared
    // role. These are rendering hints only — the backend re-checks the
    // role on every privileged call.

    /// Authenticated as a moderator?
    pub fn is_moderator(&self) -> bool {
        self.current_identity()
            .is_some_and(|identity| identity.role.is_moderator())
    }

    /// Authenticated as an admin?
    pub fn is_admin(&self) -> bool {
        self.current_identity()
            .is_some_and(|identity| identity.role.is_admin())
    }

    /// Authenticated as either privileged role?
    pub fn is_admin_or_moderator(&self) -> bool {
        self.current_identity()
            .is_some_and(|identity| identity.role.is_admin_or_moderator())
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Configuration for session behavior.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on the silent refresh attempt during boot. A hung
    /// backend resolves as a transient failure (credentials preserved)
    /// instead of holding the UI in `Unknown` indefinitely.
    ///
    /// Default: 10 seconds.
    pub refresh_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_timeout: Duration::from_secs(10),
        }
    }
}

// ---------------------------------------------------------------------------
// BootLocation
// ---------------------------------------------------------------------------

/// Where the user landed when the application started.
///
/// The boot transition takes this as input: landing on the login surface
/// short-circuits straight to `Unauthenticated` with zero network calls,
/// so a stored-but-stale token can't kick off an identity fetch that races
/// the login form the user is about to submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootLocation {
    /// The login/registration surface.
    LoginSurface,
    /// Anywhere else in the application.
    Elsewhere,
}

// =========================================================================
// Tests
// =========================================================================
