// SPDX-FileCopyrightText: 2026 Haven Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Coalescing, rate-limited view of the current auth session.
//!
//! State machine: `Empty -> Refreshing -> Cached <-> Refreshing`, and
//! `Cached -> Empty` on sign-out.
//!
//! - At most one refresh is in flight per coordinator. Callers arriving while
//!   it runs await the same shared future and receive the same result.
//! - A session refreshed less than `cooldown` ago is served from cache with no
//!   auth call.
//! - A failed refresh leaves the cache and its timestamp untouched, is logged
//!   at warn, and is not retried. The next call past the cooldown tries again.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use haven_core::{AuthBackend, HavenError, Session};

use crate::listeners::{Callback, ListenerHandle, ListenerSet};

/// Cooldown applied when none is configured.
pub const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(10);

/// Outcome of a refresh, shared between every coalesced caller.
///
/// `Ok(None)` means the auth service reports no signed-in user.
pub type SessionResult = Result<Option<Session>, Arc<HavenError>>;

type PendingRefresh = Shared<BoxFuture<'static, SessionResult>>;

#[derive(Default)]
struct CacheState {
    current: Option<Session>,
    /// Start time of the refresh that produced `current`.
    refreshed_at: Option<Instant>,
    in_flight: Option<PendingRefresh>,
    /// Bumped by sign-in and sign-out so a refresh that started earlier
    /// cannot overwrite their result.
    epoch: u64,
}

struct Inner {
    auth: Arc<dyn AuthBackend>,
    cooldown: Duration,
    state: Mutex<CacheState>,
    listeners: Arc<ListenerSet>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn refresh(self: Arc<Self>) -> SessionResult {
        let (started, epoch) = {
            let state = self.state();
            (Instant::now(), state.epoch)
        };
        debug!("refreshing session");

        let result = self.auth.get_session().await;

        let changed = {
            let mut state = self.state();
            state.in_flight = None;
            match &result {
                Ok(session) if state.epoch == epoch => {
                    state.current = session.clone();
                    state.refreshed_at = Some(started);
                    true
                }
                Ok(_) => {
                    debug!("discarding refresh overtaken by sign-in or sign-out");
                    false
                }
                Err(_) => false,
            }
        };

        match result {
            Ok(session) => {
                if changed {
                    debug!(
                        signed_in = session.is_some(),
                        user_id = session.as_ref().map(|s| s.user_id().as_str()).unwrap_or(""),
                        "session refreshed"
                    );
                    self.listeners.notify(session.as_ref());
                }
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, transient = e.is_transient(), "session refresh failed");
                Err(Arc::new(e))
            }
        }
    }

    /// Replaces the cache outside of a refresh and notifies listeners.
    fn replace(&self, session: Option<Session>) {
        {
            let mut state = self.state();
            state.epoch += 1;
            state.refreshed_at = session.as_ref().map(|_| Instant::now());
            state.current = session.clone();
        }
        self.listeners.notify(session.as_ref());
    }
}

/// Single, de-duplicated view of "what is the current session".
///
/// Cheap to clone; clones share the cache, the pending refresh, and the
/// listener set. Construct one per application and pass it to whatever needs
/// the session.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<Inner>,
}

impl SessionCoordinator {
    /// Creates a coordinator with the default 10 second cooldown.
    pub fn new(auth: Arc<dyn AuthBackend>) -> Self {
        Self::with_cooldown(auth, DEFAULT_REFRESH_COOLDOWN)
    }

    pub fn with_cooldown(auth: Arc<dyn AuthBackend>, cooldown: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                auth,
                cooldown,
                state: Mutex::new(CacheState::default()),
                listeners: Arc::new(ListenerSet::default()),
            }),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.inner.cooldown
    }

    /// Returns the current session, refreshing at most once per cooldown.
    ///
    /// A cached session younger than the cooldown is returned directly. If a
    /// refresh is already running, this awaits it instead of starting another.
    pub async fn get_session(&self) -> SessionResult {
        let pending = {
            let mut state = self.inner.state();
            if let (Some(session), Some(at)) = (&state.current, state.refreshed_at) {
                if at.elapsed() < self.inner.cooldown {
                    return Ok(Some(session.clone()));
                }
            }
            match &state.in_flight {
                Some(pending) => pending.clone(),
                None => {
                    let pending = Inner::refresh(Arc::clone(&self.inner)).boxed().shared();
                    state.in_flight = Some(pending.clone());
                    pending
                }
            }
        };
        pending.await
    }

    /// Signs in with email and password, caching the new session.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, HavenError> {
        let session = self
            .inner
            .auth
            .sign_in_with_password(email, password)
            .await
            .inspect_err(|e| warn!(error = %e, "sign-in failed"))?;
        info!(user_id = %session.user_id(), "signed in");
        self.inner.replace(Some(session.clone()));
        Ok(session)
    }

    /// Signs out. The cache is cleared and listeners see `None` even when the
    /// backend call fails; the failure is still returned.
    pub async fn sign_out(&self) -> Result<(), HavenError> {
        let result = self.inner.auth.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "backend sign-out failed, clearing local session anyway");
        }
        self.inner.replace(None);
        info!("signed out");
        result
    }

    /// The cached session, without refreshing.
    pub fn current(&self) -> Option<Session> {
        self.inner.state().current.clone()
    }

    /// True while a refresh call is running.
    pub fn is_refreshing(&self) -> bool {
        self.inner.state().in_flight.is_some()
    }

    /// Registers a callback for every future session change.
    ///
    /// If a session is cached, the callback is first invoked with it before
    /// this returns.
    pub fn add_listener<F>(&self, callback: F) -> ListenerHandle
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let handle = self.inner.listeners.insert(Arc::clone(&callback));
        if let Some(session) = self.current() {
            callback(Some(&session));
        }
        handle
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state();
        f.debug_struct("SessionCoordinator")
            .field("cooldown", &self.inner.cooldown)
            .field("signed_in", &state.current.is_some())
            .field("refreshing", &state.in_flight.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use haven_core::types::AuthUser;
    use haven_core::{BackendAdapter, HealthStatus};
    use tokio::sync::Notify;

    use super::*;

    fn session(id: &str) -> Session {
        Session::new(
            AuthUser {
                id: id.into(),
                email: None,
            },
            None,
            format!("access-{id}"),
            format!("refresh-{id}"),
        )
    }

    /// Auth stub whose `get_session` waits on a gate when one is armed.
    struct GatedAuth {
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
        fail: bool,
    }

    impl GatedAuth {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                gate: None,
                fail: false,
            }
        }
    }

    #[async_trait]
    impl BackendAdapter for GatedAuth {
        fn name(&self) -> &str {
            "gated-auth"
        }

        async fn health_check(&self) -> Result<HealthStatus, HavenError> {
            Ok(HealthStatus::Healthy)
        }
    }

    #[async_trait]
    impl AuthBackend for GatedAuth {
        async fn get_session(&self) -> Result<Option<Session>, HavenError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if self.fail {
                return Err(HavenError::auth("refresh token revoked"));
            }
            Ok(Some(session("u1")))
        }

        async fn sign_in_with_password(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<Session, HavenError> {
            Ok(session("u2"))
        }

        async fn sign_out(&self) -> Result<(), HavenError> {
            Err(HavenError::backend("logout endpoint unavailable"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_refresh() {
        let gate = Arc::new(Notify::new());
        let auth = Arc::new(GatedAuth {
            gate: Some(Arc::clone(&gate)),
            ..GatedAuth::new()
        });
        let coordinator = SessionCoordinator::new(auth.clone());

        let callers: Vec<_> = (0..5)
            .map(|_| {
                let c = coordinator.clone();
                tokio::spawn(async move { c.get_session().await })
            })
            .collect();
        // Let every caller reach the pending refresh before releasing it.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(coordinator.is_refreshing());
        gate.notify_one();

        for caller in callers {
            let result = caller.await.unwrap().unwrap();
            assert_eq!(result, Some(session("u1")));
        }
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_refreshing());
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_serves_cache_then_expires() {
        let auth = Arc::new(GatedAuth::new());
        let coordinator = SessionCoordinator::new(auth.clone());

        coordinator.get_session().await.unwrap();
        tokio::time::advance(Duration::from_secs(9)).await;
        coordinator.get_session().await.unwrap();
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        coordinator.get_session().await.unwrap();
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failure_leaves_cache_and_listeners_alone() {
        let auth = Arc::new(GatedAuth {
            fail: true,
            ..GatedAuth::new()
        });
        let coordinator = SessionCoordinator::new(auth.clone());
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);
        let _handle = coordinator.add_listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let err = coordinator.get_session().await.unwrap_err();
        assert!(matches!(*err, HavenError::Auth { .. }));
        assert_eq!(coordinator.current(), None);
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert!(logs_contain("session refresh failed"));

        // No automatic retry, but the next call tries again.
        coordinator.get_session().await.unwrap_err();
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn listener_sees_cached_session_immediately() {
        let coordinator = SessionCoordinator::new(Arc::new(GatedAuth::new()));
        coordinator.get_session().await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = coordinator.add_listener(move |s| {
            sink.lock().unwrap().push(s.map(|s| s.user_id().clone()));
        });
        assert_eq!(*seen.lock().unwrap(), vec![Some("u1".into())]);
    }

    #[tokio::test]
    async fn sign_out_clears_even_when_backend_fails() {
        let coordinator = SessionCoordinator::new(Arc::new(GatedAuth::new()));
        coordinator.sign_in("a@example.com", "pw").await.unwrap();
        assert_eq!(coordinator.current(), Some(session("u2")));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _handle = coordinator.add_listener(move |s| {
            sink.lock().unwrap().push(s.is_some());
        });

        assert!(coordinator.sign_out().await.is_err());
        assert_eq!(coordinator.current(), None);
        assert_eq!(*seen.lock().unwrap(), vec![true, false]);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_overtaken_by_sign_out_does_not_restore_session() {
        let gate = Arc::new(Notify::new());
        let auth = Arc::new(GatedAuth {
            gate: Some(Arc::clone(&gate)),
            ..GatedAuth::new()
        });
        let coordinator = SessionCoordinator::new(auth);

        let c = coordinator.clone();
        let refresh = tokio::spawn(async move { c.get_session().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let _ = coordinator.sign_out().await;
        gate.notify_one();
        // The caller still gets what the backend returned.
        assert!(refresh.await.unwrap().unwrap().is_some());
        assert_eq!(coordinator.current(), None);
    }
}
