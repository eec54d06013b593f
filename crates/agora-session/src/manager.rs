//! The session manager: owner of the session state machine.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Determining the session on application start (the boot transition)
//! - Silently renewing an expired access token (refresh-and-retry)
//! - Explicit user-initiated login and logout
//! - Keeping the credential store consistent (never half a pair)
//!
//! # Concurrency note
//!
//! Several asynchronous paths mutate the same session: the boot
//! determination, an explicit login, an explicit logout. Left unguarded,
//! an explicit logout racing a still-pending boot-time identity fetch
//! could resurrect a cleared session when the stale fetch resolves. The
//! manager prevents this with two mechanisms:
//!
//! - a `tokio::sync::Mutex` serializing transitions (only one runs at a
//!   time), and
//! - an epoch counter: boot captures the epoch when it starts and every
//!   one of its state/store writes is discarded if the epoch has moved —
//!   an explicit transition or a teardown bumps it *before* waiting for
//!   the lock, so an in-flight boot finishes inert.
//!
//! Login and logout are not cancellable: once started they run to
//! completion, because a partial credential write is worse than a
//! slightly stale UI.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use agora_api::{CredentialPair, Identity};
use agora_store::{ACCESS_TOKEN_KEY, CredentialStore, REFRESH_TOKEN_KEY};
use tokio::sync::{Mutex, watch};

use crate::{
    AuthBackend, BootLocation, SessionConfig, SessionError, SessionSnapshot,
    SessionState,
};

/// Outcome of the refresh-and-retry sub-sequence.
enum RefreshOutcome {
    /// New pair persisted and identity confirmed.
    Authenticated(Identity),
    /// The backend definitively rejected the refresh token (or the access
    /// token it had just issued). Stored credentials must be cleared.
    Rejected,
    /// No verdict — network trouble, server error, or timeout. Stored
    /// credentials must be preserved for a future load to retry.
    Inconclusive,
    /// The epoch moved mid-sequence; all writes were skipped.
    Cancelled,
}

/// Owns the current session state and runs its transitions.
///
/// One writer, many readers: every UI surface observes the session through
/// [`subscribe`](Self::subscribe)/[`snapshot`](Self::snapshot); only this
/// type writes the state, and only this type writes the credential store.
///
/// ## Lifecycle
///
/// ```text
/// boot() ──────────→ Authenticated ──→ logout() ──→ Unauthenticated
///   │                      ↑                              │
///   │ (no/rejected/        │                              │
///   │  ambiguous session)  └────────── login() ←──────────┘
///   ▼
/// Unauthenticated
/// ```
pub struct SessionManager<B: AuthBackend> {
    backend: B,
    store: Arc<dyn CredentialStore>,
    config: SessionConfig,

    /// The published state. `watch` keeps only the latest value, which is
    /// exactly the semantics consumers want: "what is the session *now*".
    state_tx: watch::Sender<SessionSnapshot>,

    /// Liveness / single-flight guard. Writes from a transition are valid
    /// only while the epoch still equals the value the transition captured
    /// at its start.
    epoch: AtomicU64,

    /// Serializes transitions. Held across each transition's awaits.
    transition: Mutex<()>,
}

impl<B: AuthBackend> SessionManager<B> {
    /// Creates a manager in the initial `Unknown` (loading) state.
    ///
    /// The manager becomes the store's sole writer for session purposes —
    /// nothing else in the application may mutate the credential entries.
    pub fn new(
        backend: B,
        store: Arc<dyn CredentialStore>,
        config: SessionConfig,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionSnapshot::initial());
        Self {
            backend,
            store,
            config,
            state_tx,
            epoch: AtomicU64::new(0),
            transition: Mutex::new(()),
        }
    }

    /// Subscribes to session changes. The receiver always starts with the
    /// latest snapshot; `changed().await` wakes on every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    /// Returns the current snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_tx.borrow().clone()
    }

    // =====================================================================
    // Transitions
    // =====================================================================

    /// The boot transition: determines the session once per application
    /// load, moving from `Unknown` to a terminal state.
    ///
    /// Landing on the login surface settles `Unauthenticated` with zero
    /// network calls. Otherwise the stored credentials decide the path:
    /// no credentials → `Unauthenticated`; an access token → identity
    /// fetch, falling back to refresh-and-retry on a 401; only a refresh
    /// token → refresh-and-retry directly.
    ///
    /// Failure asymmetry, deliberately: stored credentials are deleted
    /// *only* on a definitive 401 from the refresh call or the
    /// post-refresh identity fetch. Transient failures preserve them —
    /// a flaky network must never silently log a user out.
    ///
    /// Never returns an error: every failure settles into a state.
    pub async fn boot(&self, location: BootLocation) {
        let _guard = self.transition.lock().await;
        let epoch = self.begin_epoch();

        if location == BootLocation::LoginSurface {
            // The user is about to authenticate by hand. A speculative
            // identity fetch here would race the login form's submission.
            tracing::debug!("boot at login surface, skipping session restore");
            self.settle(epoch, SessionState::Unauthenticated);
            return;
        }

        let access = self.store.get(ACCESS_TOKEN_KEY);
        let refresh = self.store.get(REFRESH_TOKEN_KEY);

        match (access, refresh) {
            (None, None) => {
                tracing::debug!("no stored session");
                self.settle(epoch, SessionState::Unauthenticated);
            }

            // The dispatcher attaches the stored access token itself; the
            // value read here only decides which path we take.
            (Some(_), refresh) => {
                match self.backend.fetch_current_identity().await {
                    Ok(identity) => {
                        tracing::info!(user = %identity.id, "session restored");
                        self.settle(epoch, SessionState::Authenticated(identity));
                    }
                    Err(err) if err.is_unauthorized() => match refresh {
                        Some(token) => {
                            let outcome =
                                self.refresh_and_retry(epoch, &token).await;
                            self.finish_boot(epoch, outcome);
                        }
                        None => {
                            // Rejected access token and nothing to renew
                            // with. Clear the straggler entry so the store
                            // returns to its both-or-neither invariant.
                            tracing::warn!(
                                "access token rejected with no refresh token stored"
                            );
                            self.clear_pair_if_current(epoch);
                            self.settle(epoch, SessionState::Unauthenticated);
                        }
                    },
                    Err(err) => {
                        tracing::warn!(
                            error = %err,
                            "identity fetch failed, preserving stored session"
                        );
                        self.settle(epoch, SessionState::Unauthenticated);
                    }
                }
            }

            (None, Some(token)) => {
                let outcome = self.refresh_and_retry(epoch, &token).await;
                self.finish_boot(epoch, outcome);
            }
        }
    }

    /// Explicit login. Runs to completion once started.
    ///
    /// Order matters: any existing credentials are cleared *first* (a
    /// stale pair must not leak into the new session if login fails
    /// partway), the new pair is persisted only when complete, and the
    /// login counts as successful only once the identity is confirmed.
    /// If that confirmation fails, the freshly stored pair is rolled back
    /// and the error propagates — a failed login leaves no trace.
    pub async fn login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Identity, SessionError> {
        // Invalidate any in-flight boot before queueing for the lock: its
        // late writes must not land around this explicit transition.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _guard = self.transition.lock().await;
        self.begin_epoch();

        // Loading toggles for this transition only — the previous terminal
        // state stays visible (no re-entry into `Unknown`).
        let resting = self.snapshot().state;
        self.publish(SessionSnapshot {
            state: resting.clone(),
            loading: true,
        });

        match self.try_login(username_or_email, password).await {
            Ok(identity) => {
                tracing::info!(user = %identity.id, "logged in");
                self.publish(SessionSnapshot {
                    state: SessionState::Authenticated(identity.clone()),
                    loading: false,
                });
                Ok(identity)
            }
            Err(err) => {
                // A rejected explicit login is itself a determination:
                // a login attempted before boot has settled must not park
                // the session in `Unknown` with the loading flag down.
                let state = match resting {
                    SessionState::Unknown => SessionState::Unauthenticated,
                    settled => settled,
                };
                self.publish(SessionSnapshot {
                    state,
                    loading: false,
                });
                Err(err)
            }
        }
    }

    async fn try_login(
        &self,
        username_or_email: &str,
        password: &str,
    ) -> Result<Identity, SessionError> {
        self.clear_pair();

        let pair = self
            .backend
            .login(username_or_email, password)
            .await
            .map_err(SessionError::classify_login)?;
        self.store_pair(&pair);

        match self.backend.fetch_current_identity().await {
            Ok(identity) => Ok(identity),
            Err(err) => {
                // Login is not complete until the identity is confirmed.
                // Roll the pair back so a later boot can't half-finish a
                // login the user watched fail.
                tracing::warn!(
                    error = %err,
                    "identity fetch after login failed, rolling back credentials"
                );
                self.clear_pair();
                Err(SessionError::classify(err))
            }
        }
    }

    /// Explicit logout. Never fails observably.
    ///
    /// The in-memory state clears immediately — the UI reflects logged-out
    /// without waiting on the network. The backend notification is
    /// best-effort and needs the access token still in the store, so the
    /// local credential clear comes last and happens unconditionally.
    pub async fn logout(&self) {
        // As with login: a late-resolving boot fetch must not resurrect
        // the session being cleared.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        let _guard = self.transition.lock().await;
        self.begin_epoch();

        self.publish(SessionSnapshot {
            state: SessionState::Unauthenticated,
            loading: false,
        });

        if let Err(err) = self.backend.logout().await {
            tracing::debug!(
                error = %err,
                "backend logout failed, clearing locally anyway"
            );
        }
        self.clear_pair();
        tracing::info!("logged out");
    }

    /// Teardown: abandons any in-flight boot transition.
    ///
    /// After this call no state or store write from a pending boot can
    /// land. Stored credentials are untouched — teardown is not logout.
    pub fn shutdown(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("session manager shut down");
    }

    // =====================================================================
    // Refresh-and-retry
    // =====================================================================

    /// The single silent renewal attempt: refresh, persist the new pair,
    /// re-fetch the identity. Nothing is retried beyond this — repeated
    /// failure surfaces as "not authenticated" and requires a new explicit
    /// login.
    async fn refresh_and_retry(
        &self,
        epoch: u64,
        refresh_token: &str,
    ) -> RefreshOutcome {
        // Bounded so a hung backend can't hold the UI in `Unknown`.
        let refreshed = tokio::time::timeout(
            self.config.refresh_timeout,
            self.backend.refresh(refresh_token),
        )
        .await;

        let pair = match refreshed {
            Err(_) => {
                tracing::warn!("refresh timed out, preserving stored session");
                return RefreshOutcome::Inconclusive;
            }
            Ok(Err(err)) if err.is_unauthorized() => {
                tracing::info!("refresh token rejected");
                return RefreshOutcome::Rejected;
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    error = %err,
                    "refresh failed, preserving stored session"
                );
                return RefreshOutcome::Inconclusive;
            }
            Ok(Ok(pair)) => pair,
        };

        if !self.store_pair_if_current(epoch, &pair) {
            return RefreshOutcome::Cancelled;
        }

        match self.backend.fetch_current_identity().await {
            Ok(identity) => RefreshOutcome::Authenticated(identity),
            Err(err) if err.is_unauthorized() => {
                // The backend rejected the access token it just issued.
                // That's a definitive verdict on the whole session.
                tracing::warn!("identity fetch rejected after refresh");
                RefreshOutcome::Rejected
            }
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    "identity fetch failed after refresh, preserving session"
                );
                RefreshOutcome::Inconclusive
            }
        }
    }

    fn finish_boot(&self, epoch: u64, outcome: RefreshOutcome) {
        match outcome {
            RefreshOutcome::Authenticated(identity) => {
                tracing::info!(user = %identity.id, "session restored via refresh");
                self.settle(epoch, SessionState::Authenticated(identity));
            }
            RefreshOutcome::Rejected => {
                self.clear_pair_if_current(epoch);
                self.settle(epoch, SessionState::Unauthenticated);
            }
            RefreshOutcome::Inconclusive => {
                self.settle(epoch, SessionState::Unauthenticated);
            }
            RefreshOutcome::Cancelled => {}
        }
    }

    // =====================================================================
    // Guarded writes
    // =====================================================================

    fn begin_epoch(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn publish(&self, snapshot: SessionSnapshot) {
        // `send_replace` delivers even with zero subscribers.
        self.state_tx.send_replace(snapshot);
    }

    /// Publishes a terminal state, unless the transition was superseded.
    fn settle(&self, epoch: u64, state: SessionState) {
        if !self.is_current(epoch) {
            tracing::debug!("discarding stale transition result");
            return;
        }
        self.publish(SessionSnapshot {
            state,
            loading: false,
        });
    }

    /// Persists a complete pair. Two synchronous writes with no suspension
    /// point between them — atomic under cooperative scheduling.
    fn store_pair(&self, pair: &CredentialPair) {
        self.store.set(ACCESS_TOKEN_KEY, &pair.access_token);
        self.store.set(REFRESH_TOKEN_KEY, &pair.refresh_token);
    }

    fn clear_pair(&self) {
        self.store.remove(ACCESS_TOKEN_KEY);
        self.store.remove(REFRESH_TOKEN_KEY);
    }

    /// Epoch-guarded variant of [`store_pair`](Self::store_pair). Returns
    /// `false` (and writes nothing) when the transition was superseded.
    fn store_pair_if_current(&self, epoch: u64, pair: &CredentialPair) -> bool {
        if !self.is_current(epoch) {
            return false;
        }
        self.store_pair(pair);
        true
    }

    fn clear_pair_if_current(&self, epoch: u64) {
        if self.is_current(epoch) {
            self.clear_pair();
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the session state machine against a scripted mock
    //! backend.
    //!
    //! The mock is strict: every backend call pops a pre-scripted result,
    //! and an unscripted call panics. That makes "exactly these network
    //! calls, in this order" part of every assertion, which is most of
    //! what this state machine is about.
    //!
    //! Timing-dependent behavior (the refresh bound) runs under Tokio's
    //! paused clock; race tests sequence tasks with `Notify` gates rather
    //! than sleeps, so the suite is fast and deterministic.

    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use agora_api::{ApiError, Role, UserId};
    use agora_store::MemoryStore;
    use tokio::sync::Notify;

    use super::*;

    // -- Mock backend -----------------------------------------------------

    /// A gate pausing one backend operation: the operation signals
    /// `started`, then blocks until the test signals `release`.
    #[derive(Clone, Default)]
    struct Gate {
        started: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[derive(Default)]
    struct MockBackend {
        login_results: StdMutex<VecDeque<Result<CredentialPair, ApiError>>>,
        refresh_results: StdMutex<VecDeque<Result<CredentialPair, ApiError>>>,
        identity_results: StdMutex<VecDeque<Result<Identity, ApiError>>>,
        logout_results: StdMutex<VecDeque<Result<(), ApiError>>>,
        calls: StdMutex<Vec<&'static str>>,

        identity_gate: StdMutex<Option<Gate>>,
        logout_gate: StdMutex<Option<Gate>>,
        /// When set, `refresh` never resolves (for timeout tests).
        hang_refresh: std::sync::atomic::AtomicBool,
    }

    impl MockBackend {
        fn expect_login(&self, result: Result<CredentialPair, ApiError>) {
            self.login_results.lock().unwrap().push_back(result);
        }

        fn expect_refresh(&self, result: Result<CredentialPair, ApiError>) {
            self.refresh_results.lock().unwrap().push_back(result);
        }

        fn expect_identity(&self, result: Result<Identity, ApiError>) {
            self.identity_results.lock().unwrap().push_back(result);
        }

        fn expect_logout(&self, result: Result<(), ApiError>) {
            self.logout_results.lock().unwrap().push_back(result);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        /// Installs a gate on the next identity fetches.
        fn gate_identity(&self) -> Gate {
            let gate = Gate::default();
            *self.identity_gate.lock().unwrap() = Some(gate.clone());
            gate
        }

        fn gate_logout(&self) -> Gate {
            let gate = Gate::default();
            *self.logout_gate.lock().unwrap() = Some(gate.clone());
            gate
        }
    }

    impl AuthBackend for Arc<MockBackend> {
        async fn login(
            &self,
            _username_or_email: &str,
            _password: &str,
        ) -> Result<CredentialPair, ApiError> {
            self.calls.lock().unwrap().push("login");
            self.login_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected login call")
        }

        async fn refresh(
            &self,
            _refresh_token: &str,
        ) -> Result<CredentialPair, ApiError> {
            self.calls.lock().unwrap().push("refresh");
            if self.hang_refresh.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            self.refresh_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected refresh call")
        }

        async fn fetch_current_identity(&self) -> Result<Identity, ApiError> {
            self.calls.lock().unwrap().push("identity");
            let gate = self.identity_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.started.notify_one();
                gate.release.notified().await;
            }
            self.identity_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected identity call")
        }

        async fn logout(&self) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push("logout");
            let gate = self.logout_gate.lock().unwrap().clone();
            if let Some(gate) = gate {
                gate.started.notify_one();
                gate.release.notified().await;
            }
            self.logout_results
                .lock()
                .unwrap()
                .pop_front()
                .expect("unexpected logout call")
        }
    }

    // -- Helpers ----------------------------------------------------------

    fn pair(access: &str, refresh: &str) -> CredentialPair {
        CredentialPair {
            access_token: access.into(),
            refresh_token: refresh.into(),
        }
    }

    fn identity(id: u64, role: Role) -> Identity {
        Identity {
            id: UserId(id),
            username: format!("user{id}"),
            display_name: format!("User {id}"),
            role,
            avatar_url: None,
            active: true,
        }
    }

    fn unauthorized() -> ApiError {
        ApiError::Http {
            status: 401,
            message: "token expired".into(),
        }
    }

    fn server_error() -> ApiError {
        ApiError::Http {
            status: 500,
            message: "internal error".into(),
        }
    }

    fn manager(
        backend: &Arc<MockBackend>,
    ) -> (SessionManager<Arc<MockBackend>>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mgr = SessionManager::new(
            backend.clone(),
            store.clone() as Arc<dyn CredentialStore>,
            SessionConfig::default(),
        );
        (mgr, store)
    }

    fn seed_pair(store: &MemoryStore, access: &str, refresh: &str) {
        store.set(ACCESS_TOKEN_KEY, access);
        store.set(REFRESH_TOKEN_KEY, refresh);
    }

    /// The store invariant: both credential entries present, or neither.
    fn assert_pair_invariant(store: &MemoryStore) {
        let access = store.get(ACCESS_TOKEN_KEY);
        let refresh = store.get(REFRESH_TOKEN_KEY);
        assert_eq!(
            access.is_some(),
            refresh.is_some(),
            "store holds half a credential pair: access={access:?} refresh={refresh:?}"
        );
    }

    // =====================================================================
    // boot() — short circuits
    // =====================================================================

    #[tokio::test]
    async fn test_boot_login_surface_skips_network() {
        // Even with a stored session, landing on the login surface must
        // not trigger a speculative identity fetch.
        let backend = Arc::new(MockBackend::default());
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        mgr.boot(BootLocation::LoginSurface).await;

        let snap = mgr.snapshot();
        assert_eq!(snap.state, SessionState::Unauthenticated);
        assert!(!snap.is_loading());
        assert!(backend.calls().is_empty(), "no network calls expected");
        // Stored credentials are untouched — skipping is not logout.
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-1".into()));
    }

    #[tokio::test]
    async fn test_boot_empty_store_settles_unauthenticated_with_zero_calls() {
        let backend = Arc::new(MockBackend::default());
        let (mgr, store) = manager(&backend);

        mgr.boot(BootLocation::Elsewhere).await;

        let snap = mgr.snapshot();
        assert_eq!(snap.state, SessionState::Unauthenticated);
        assert!(!snap.is_loading());
        assert!(backend.calls().is_empty());
        assert!(store.is_empty());
    }

    // =====================================================================
    // boot() — identity-first path
    // =====================================================================

    #[tokio::test]
    async fn test_boot_valid_access_token_restores_identity() {
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Ok(identity(7, Role::User)));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        mgr.boot(BootLocation::Elsewhere).await;

        let snap = mgr.snapshot();
        assert!(snap.is_authenticated());
        assert_eq!(snap.current_identity().unwrap().id, UserId(7));
        assert!(!snap.is_admin());
        assert_eq!(backend.calls(), vec!["identity"]);
        // Nothing rewrote the stored pair.
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-1".into()));
    }

    #[tokio::test]
    async fn test_boot_expired_access_refreshes_and_retries() {
        // The silent renewal happy path: 401 on the first identity fetch,
        // successful refresh, successful second fetch.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Err(unauthorized()));
        backend.expect_refresh(Ok(pair("a-2", "r-2")));
        backend.expect_identity(Ok(identity(7, Role::User)));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        mgr.boot(BootLocation::Elsewhere).await;

        assert!(mgr.snapshot().is_authenticated());
        assert_eq!(backend.calls(), vec!["identity", "refresh", "identity"]);
        // The store now holds the renewed pair, written as a unit.
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-2".into()));
        assert_eq!(store.get(REFRESH_TOKEN_KEY), Some("r-2".into()));
    }

    #[tokio::test]
    async fn test_boot_rejected_refresh_clears_credentials() {
        // Both tokens expired: the refresh 401 is a definitive verdict,
        // so the stored pair is deleted.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Err(unauthorized()));
        backend.expect_refresh(Err(unauthorized()));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-old", "r-old");

        mgr.boot(BootLocation::Elsewhere).await;

        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert!(store.is_empty(), "both entries must be gone");
    }

    #[tokio::test]
    async fn test_boot_transient_refresh_failure_preserves_credentials() {
        // A 500 from the refresh endpoint says nothing about the tokens.
        // This load ends unauthenticated but the next one may succeed.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Err(unauthorized()));
        backend.expect_refresh(Err(server_error()));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        mgr.boot(BootLocation::Elsewhere).await;

        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-1".into()));
        assert_eq!(store.get(REFRESH_TOKEN_KEY), Some("r-1".into()));
    }

    #[tokio::test]
    async fn test_boot_transient_identity_failure_preserves_credentials() {
        // A non-auth failure on the first fetch doesn't even attempt a
        // refresh — there's nothing wrong with the tokens to fix.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Err(server_error()));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        mgr.boot(BootLocation::Elsewhere).await;

        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert_eq!(backend.calls(), vec!["identity"]);
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-1".into()));
    }

    #[tokio::test]
    async fn test_boot_identity_rejected_after_refresh_clears_credentials() {
        // The backend rejects the access token it just issued. Definitive:
        // clear the (freshly written) pair rather than loop.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Err(unauthorized()));
        backend.expect_refresh(Ok(pair("a-2", "r-2")));
        backend.expect_identity(Err(unauthorized()));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        mgr.boot(BootLocation::Elsewhere).await;

        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_boot_access_only_rejected_clears_straggler() {
        // Half a pair in the store (external tampering) whose access token
        // is rejected, with nothing to renew by: restore the invariant.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Err(unauthorized()));
        let (mgr, store) = manager(&backend);
        store.set(ACCESS_TOKEN_KEY, "a-only");

        mgr.boot(BootLocation::Elsewhere).await;

        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert!(store.is_empty());
        assert_eq!(backend.calls(), vec!["identity"]);
    }

    // =====================================================================
    // boot() — refresh-only path
    // =====================================================================

    #[tokio::test]
    async fn test_boot_refresh_only_store_refreshes_directly() {
        // Access token missing, refresh token present: skip the doomed
        // identity fetch and renew immediately.
        let backend = Arc::new(MockBackend::default());
        backend.expect_refresh(Ok(pair("a-2", "r-2")));
        backend.expect_identity(Ok(identity(3, Role::Moderator)));
        let (mgr, store) = manager(&backend);
        store.set(REFRESH_TOKEN_KEY, "r-1");

        mgr.boot(BootLocation::Elsewhere).await;

        let snap = mgr.snapshot();
        assert!(snap.is_authenticated());
        assert!(snap.is_moderator());
        assert!(snap.is_admin_or_moderator());
        assert_eq!(backend.calls(), vec!["refresh", "identity"]);
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-2".into()));
    }

    #[tokio::test]
    async fn test_boot_refresh_only_store_rejected_clears_both() {
        let backend = Arc::new(MockBackend::default());
        backend.expect_refresh(Err(unauthorized()));
        let (mgr, store) = manager(&backend);
        store.set(REFRESH_TOKEN_KEY, "r-stale");

        mgr.boot(BootLocation::Elsewhere).await;

        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_boot_hung_refresh_times_out_as_transient() {
        // The refresh call never resolves. The configured bound converts
        // that into a transient outcome: unauthenticated for this load,
        // credentials preserved. (Paused clock: the timeout fires without
        // real waiting.)
        let backend = Arc::new(MockBackend::default());
        backend.hang_refresh.store(true, Ordering::SeqCst);
        let (mgr, store) = manager(&backend);
        store.set(REFRESH_TOKEN_KEY, "r-1");

        mgr.boot(BootLocation::Elsewhere).await;

        let snap = mgr.snapshot();
        assert_eq!(snap.state, SessionState::Unauthenticated);
        assert!(!snap.is_loading());
        assert_eq!(store.get(REFRESH_TOKEN_KEY), Some("r-1".into()));
    }

    #[tokio::test]
    async fn test_boot_after_transient_failure_can_succeed_later() {
        // The preserved pair lets a subsequent load complete the restore.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Err(server_error()));
        backend.expect_identity(Ok(identity(7, Role::User)));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        mgr.boot(BootLocation::Elsewhere).await;
        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);

        mgr.boot(BootLocation::Elsewhere).await;
        assert!(mgr.snapshot().is_authenticated());
    }

    // =====================================================================
    // login()
    // =====================================================================

    #[tokio::test]
    async fn test_login_success_persists_pair_and_publishes_identity() {
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Ok(pair("a-1", "r-1")));
        backend.expect_identity(Ok(identity(9, Role::Admin)));
        let (mgr, store) = manager(&backend);

        let returned = mgr.login("ann", "secret").await.unwrap();

        assert_eq!(returned.id, UserId(9));
        let snap = mgr.snapshot();
        assert!(snap.is_authenticated());
        assert!(snap.is_admin());
        assert!(!snap.is_loading());
        assert_eq!(backend.calls(), vec!["login", "identity"]);
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-1".into()));
        assert_eq!(store.get(REFRESH_TOKEN_KEY), Some("r-1".into()));
    }

    #[tokio::test]
    async fn test_login_clears_stale_credentials_before_attempt() {
        // A leftover pair from an earlier session must be gone before the
        // new login runs, so a partial failure can't leak it forward.
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Err(ApiError::Http {
            status: 401,
            message: "Invalid username or password".into(),
        }));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-stale", "r-stale");

        let err = mgr.login("ann", "wrong").await.unwrap_err();

        assert!(matches!(
            err,
            SessionError::InvalidCredentials(ref m) if m == "Invalid username or password"
        ));
        assert!(store.is_empty(), "stale pair must not survive a failed login");
        // Failed login leaves the terminal state untouched.
        let snap = mgr.snapshot();
        assert!(!snap.is_loading());
        assert!(!snap.is_authenticated());
    }

    #[tokio::test]
    async fn test_login_malformed_pair_rejects_without_storing() {
        // Backend "succeeds" with only half a pair — surfaced by the API
        // layer as Malformed, and nothing reaches the store.
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Err(ApiError::Malformed(
            "credential response incomplete".into(),
        )));
        let (mgr, store) = manager(&backend);

        let err = mgr.login("bob", "secret").await.unwrap_err();

        assert!(matches!(err, SessionError::Malformed(_)));
        assert!(store.is_empty());
        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_login_failure_before_boot_settles_unauthenticated() {
        // Login straight from the initial `Unknown` state (nothing stops a
        // consumer calling login before boot). A rejected attempt is a
        // determination in its own right: the session must settle to
        // `Unauthenticated` rather than fall back to `Unknown` with the
        // loading flag down, which no later transition would ever resolve.
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Err(unauthorized()));
        let (mgr, _store) = manager(&backend);
        assert_eq!(mgr.snapshot().state, SessionState::Unknown);

        mgr.login("ann", "wrong").await.unwrap_err();

        let snap = mgr.snapshot();
        assert_eq!(snap.state, SessionState::Unauthenticated);
        assert!(!snap.is_loading());
    }

    #[tokio::test]
    async fn test_login_unverified_account_is_distinguishable() {
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Err(ApiError::Http {
            status: 403,
            message: "Please verify your email first".into(),
        }));
        let (mgr, _store) = manager(&backend);

        let err = mgr.login("bob", "secret").await.unwrap_err();

        // The UI keys a "resend verification" action off this variant.
        assert!(matches!(
            err,
            SessionError::UnverifiedAccount(ref m) if m == "Please verify your email first"
        ));
    }

    #[tokio::test]
    async fn test_login_identity_fetch_failure_rolls_back_credentials() {
        // Tokens arrive, but the confirmation fetch fails: the login fails
        // as a whole and the freshly stored pair is rolled back.
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Ok(pair("a-1", "r-1")));
        backend.expect_identity(Err(server_error()));
        let (mgr, store) = manager(&backend);

        let err = mgr.login("ann", "secret").await.unwrap_err();

        assert!(matches!(err, SessionError::Transient(_)));
        assert!(store.is_empty(), "pair must be rolled back");
        let snap = mgr.snapshot();
        assert!(snap.current_identity().is_none(), "no stale identity");
        assert!(!snap.is_loading());
    }

    #[tokio::test]
    async fn test_login_loading_toggles_without_entering_unknown() {
        // While a login is in flight the snapshot shows loading=true but
        // keeps the previous terminal state — never `Unknown`.
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Ok(pair("a-1", "r-1")));
        backend.expect_identity(Ok(identity(1, Role::User)));
        let gate = backend.gate_identity();
        let (mgr, _store) = manager(&backend);
        let mgr = Arc::new(mgr);
        mgr.boot(BootLocation::Elsewhere).await;

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.login("ann", "secret").await })
        };
        gate.started.notified().await;

        let snap = mgr.snapshot();
        assert!(snap.is_loading());
        assert_eq!(snap.state, SessionState::Unauthenticated);

        gate.release.notify_one();
        task.await.unwrap().unwrap();
        assert!(mgr.snapshot().is_authenticated());
    }

    // =====================================================================
    // logout()
    // =====================================================================

    #[tokio::test]
    async fn test_logout_clears_identity_and_storage() {
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Ok(pair("a-1", "r-1")));
        backend.expect_identity(Ok(identity(1, Role::User)));
        backend.expect_logout(Ok(()));
        let (mgr, store) = manager(&backend);
        mgr.login("ann", "secret").await.unwrap();

        mgr.logout().await;

        let snap = mgr.snapshot();
        assert_eq!(snap.state, SessionState::Unauthenticated);
        assert!(snap.current_identity().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_logout_succeeds_even_when_backend_call_fails() {
        // Logout never fails observably: backend trouble is logged and
        // local cleanup happens regardless.
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Ok(pair("a-1", "r-1")));
        backend.expect_identity(Ok(identity(1, Role::User)));
        backend.expect_logout(Err(server_error()));
        let (mgr, store) = manager(&backend);
        mgr.login("ann", "secret").await.unwrap();

        mgr.logout().await;

        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_logout_publishes_logged_out_before_network_completes() {
        // The UI must reflect logged-out immediately; the backend call and
        // the store clear follow. (The store still holds the token during
        // the call — the dispatcher needs it for the bearer header.)
        let backend = Arc::new(MockBackend::default());
        backend.expect_login(Ok(pair("a-1", "r-1")));
        backend.expect_identity(Ok(identity(1, Role::User)));
        backend.expect_logout(Ok(()));
        let gate = backend.gate_logout();
        let (mgr, store) = manager(&backend);
        let mgr = Arc::new(mgr);
        mgr.login("ann", "secret").await.unwrap();

        let task = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.logout().await })
        };
        gate.started.notified().await;

        // Mid-logout: state already cleared, token still stored.
        assert_eq!(mgr.snapshot().state, SessionState::Unauthenticated);
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-1".into()));

        gate.release.notify_one();
        task.await.unwrap();
        assert!(store.is_empty());
    }

    // =====================================================================
    // Races and cancellation
    // =====================================================================

    #[tokio::test]
    async fn test_logout_during_slow_boot_does_not_resurrect_session() {
        // The classic race this state machine exists to prevent: boot's
        // identity fetch is still in flight when the user logs out. The
        // stale fetch resolving with a valid identity must not overwrite
        // the logged-out state.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Ok(identity(7, Role::User)));
        backend.expect_logout(Ok(()));
        let gate = backend.gate_identity();
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");
        let mgr = Arc::new(mgr);

        let boot = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.boot(BootLocation::Elsewhere).await })
        };
        gate.started.notified().await;

        let logout = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.logout().await })
        };
        // Let the logout task invalidate the boot epoch and queue on the
        // transition lock before the boot fetch resolves.
        tokio::task::yield_now().await;

        gate.release.notify_one();
        boot.await.unwrap();
        logout.await.unwrap();

        assert_eq!(
            mgr.snapshot().state,
            SessionState::Unauthenticated,
            "stale boot result must not resurrect the session"
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_abandons_in_flight_boot() {
        // Teardown mid-boot: when the abandoned fetch resolves, no state
        // write may land.
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Ok(identity(7, Role::User)));
        let gate = backend.gate_identity();
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");
        let mgr = Arc::new(mgr);

        let boot = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.boot(BootLocation::Elsewhere).await })
        };
        gate.started.notified().await;

        mgr.shutdown();
        gate.release.notify_one();
        boot.await.unwrap();

        // Untouched since teardown: still the initial snapshot, and the
        // stored session is preserved for the next launch.
        let snap = mgr.snapshot();
        assert_eq!(snap.state, SessionState::Unknown);
        assert_eq!(store.get(ACCESS_TOKEN_KEY), Some("a-1".into()));
    }

    // =====================================================================
    // Store invariant across transition sequences
    // =====================================================================

    #[tokio::test]
    async fn test_store_never_holds_half_a_pair_across_sequences() {
        // Drive a representative sequence of transitions and check the
        // both-or-neither invariant after every step.
        let backend = Arc::new(MockBackend::default());
        let (mgr, store) = manager(&backend);

        // boot on empty store
        mgr.boot(BootLocation::Elsewhere).await;
        assert_pair_invariant(&store);

        // failed login (rejected credentials)
        backend.expect_login(Err(unauthorized()));
        mgr.login("ann", "wrong").await.unwrap_err();
        assert_pair_invariant(&store);

        // login that dies at the identity confirmation
        backend.expect_login(Ok(pair("a-1", "r-1")));
        backend.expect_identity(Err(server_error()));
        mgr.login("ann", "secret").await.unwrap_err();
        assert_pair_invariant(&store);

        // successful login
        backend.expect_login(Ok(pair("a-2", "r-2")));
        backend.expect_identity(Ok(identity(1, Role::User)));
        mgr.login("ann", "secret").await.unwrap();
        assert_pair_invariant(&store);

        // boot that renews the pair
        backend.expect_identity(Err(unauthorized()));
        backend.expect_refresh(Ok(pair("a-3", "r-3")));
        backend.expect_identity(Ok(identity(1, Role::User)));
        mgr.boot(BootLocation::Elsewhere).await;
        assert_pair_invariant(&store);

        // boot whose refresh is rejected outright
        backend.expect_identity(Err(unauthorized()));
        backend.expect_refresh(Err(unauthorized()));
        mgr.boot(BootLocation::Elsewhere).await;
        assert_pair_invariant(&store);
        assert!(store.is_empty());

        // logout from a logged-out state is still clean
        backend.expect_logout(Ok(()));
        mgr.logout().await;
        assert_pair_invariant(&store);
    }

    // =====================================================================
    // Observation
    // =====================================================================

    #[tokio::test]
    async fn test_subscribe_sees_transitions() {
        let backend = Arc::new(MockBackend::default());
        backend.expect_identity(Ok(identity(7, Role::User)));
        let (mgr, store) = manager(&backend);
        seed_pair(&store, "a-1", "r-1");

        let mut rx = mgr.subscribe();
        assert_eq!(rx.borrow().state, SessionState::Unknown);
        assert!(rx.borrow().is_loading());

        mgr.boot(BootLocation::Elsewhere).await;

        rx.changed().await.unwrap();
        let snap = rx.borrow_and_update().clone();
        assert!(snap.is_authenticated());
        assert!(!snap.is_loading());
    }
}
