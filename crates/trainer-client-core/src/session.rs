use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use trainer_shared::{
    const_config::client::CLIENT_SESSION_REFRESH_MARGIN, id::UserId, session::Session,
};

use crate::{
    backend::{AuthChangeKind, AuthSubscription, Backend},
    cache::{CachedValue, FetchTicket, QueryCache, QueryKey},
    spawn::{spawn, BackgroundTask},
};

/// What the UI needs to know about who is signed in
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// `None` means nobody is signed in (or it is not known yet)
    pub session: Option<Arc<Session>>,
    /// Only `true` while there has never been an answer
    pub is_loading: bool,
}

impl SessionState {
    pub fn user_id(&self) -> Option<UserId> {
        self.session.as_ref().map(|session| session.user_id())
    }
}

/// Obtains and keeps the current session up to date
///
/// Owns one auth change subscription for as long as it (or any clone) is alive
#[derive(Debug, Clone)]
pub struct SessionResolver {
    backend: Arc<dyn Backend>,
    cache: QueryCache,
    subscription: Arc<Mutex<AuthSubscription>>,
}

impl SessionResolver {
    pub fn new(backend: Arc<dyn Backend>, cache: QueryCache) -> Self {
        let subscription = Arc::new(Mutex::new(backend.subscribe_auth_changes()));
        Self {
            backend,
            cache,
            subscription,
        }
    }

    /// Serves the cached session and starts a fetch in the background if there
    /// is no usable value
    pub fn get_session(&self) -> SessionState {
        self.apply_auth_events();
        if let Some(fetch) = self.fetch_if_needed() {
            spawn(fetch);
        }
        self.current()
    }

    /// Same as [`Self::get_session`] but waits for the fetch (if any) to finish
    pub async fn resolve(&self) -> SessionState {
        self.apply_auth_events();
        if let Some(fetch) = self.fetch_if_needed() {
            fetch.await;
            self.apply_auth_events();
        }
        // The fetched session may itself be about to expire
        if let Some(refresh) = self.fetch_if_needed() {
            refresh.await;
            self.apply_auth_events();
        }
        self.current()
    }

    /// Reads the cache without starting anything
    pub fn current(&self) -> SessionState {
        match self
            .cache
            .get(&QueryKey::Session)
            .and_then(CachedValue::into_session)
        {
            Some(session) => SessionState {
                session,
                is_loading: false,
            },
            None => SessionState {
                session: None,
                is_loading: true,
            },
        }
    }

    /// Writes every notification received so far into the cache in the order
    /// they were emitted. Returns how many were applied.
    pub fn apply_auth_events(&self) -> usize {
        let mut subscription = self.subscription.lock().expect("mutex poisoned");
        let mut count = 0;
        while let Some(event) = subscription.try_next_event() {
            info!(
                kind = ?event.kind,
                user_id = ?event.session.as_ref().map(|s| s.user_id()),
                "auth state changed"
            );
            if event.kind != AuthChangeKind::TokenRefreshed {
                // Who the user is may have changed
                self.cache.invalidate(&QueryKey::Organization);
            }
            self.cache
                .set(QueryKey::Session, CachedValue::Session(event.session));
            count += 1;
        }
        count
    }

    /// Forces the next read to ask the backend again
    pub fn invalidate(&self) {
        self.cache.invalidate(&QueryKey::Session);
    }

    /// Returns the fetch to run if one is needed and none is running.
    ///
    /// A cached session that is about to expire is refreshed instead of being
    /// served until the backend rejects it.
    pub fn fetch_if_needed(&self) -> Option<impl BackgroundTask> {
        let mode = if self.cache.needs_fetch(&QueryKey::Session, None) {
            FetchMode::Current
        } else if self.is_expiring() {
            FetchMode::Refresh
        } else {
            return None;
        };
        let ticket = self.cache.begin_fetch(&QueryKey::Session)?;
        Some(fetch_session(
            Arc::clone(&self.backend),
            self.cache.clone(),
            ticket,
            mode,
        ))
    }

    fn is_expiring(&self) -> bool {
        let refresh_from = self.cache.now() + CLIENT_SESSION_REFRESH_MARGIN;
        self.current()
            .session
            .is_some_and(|session| session.is_expired(refresh_from))
    }
}

#[derive(Debug, Clone, Copy)]
enum FetchMode {
    Current,
    Refresh,
}

#[tracing::instrument(skip(backend, cache))]
async fn fetch_session(
    backend: Arc<dyn Backend>,
    cache: QueryCache,
    ticket: FetchTicket,
    mode: FetchMode,
) {
    let session = match mode {
        FetchMode::Current => match backend.get_current_session().await {
            Ok(session) => session,
            Err(e) => {
                error!(?e, "failed to get the current session, treating as signed out");
                None
            }
        },
        FetchMode::Refresh => match backend.refresh_session().await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(?e, "session refresh failed, treating as signed out");
                None
            }
        },
    };
    cache.complete_fetch(ticket, CachedValue::Session(session));
}

#[cfg(test)]
mod tests {
    use crate::testing::{expired_session, fake_session, FakeBackend, FakeCall};

    use trainer_time::Timestamp;

    use super::*;

    fn resolver(backend: &Arc<FakeBackend>) -> SessionResolver {
        SessionResolver::new(backend.clone(), QueryCache::default())
    }

    #[tokio::test]
    async fn first_use_fetches_once() {
        let backend = Arc::new(FakeBackend::default());
        let resolver = resolver(&backend);

        let fetch = resolver.fetch_if_needed().expect("nothing cached yet");
        assert!(resolver.current().is_loading);
        assert!(resolver.fetch_if_needed().is_none(), "already running");
        fetch.await;

        let state = resolver.current();
        assert!(!state.is_loading);
        assert!(state.session.is_none(), "absent session is a normal value");
        assert!(resolver.fetch_if_needed().is_none());
        assert_eq!(backend.count_calls(|c| c == &FakeCall::GetCurrentSession), 1);
    }

    #[tokio::test]
    async fn stale_initial_fetch_is_discarded_after_logout_event() {
        let session = fake_session(1);
        let backend = Arc::new(FakeBackend::default().with_session(session));
        let resolver = resolver(&backend);

        // Starts before the sign out and still returns the old session
        let fetch = resolver.fetch_if_needed().unwrap();
        backend.notify(AuthChangeKind::SignedOut, None);
        resolver.apply_auth_events();
        fetch.await;

        assert!(resolver.current().session.is_none());
    }

    #[tokio::test]
    async fn notifications_last_write_wins() {
        let backend = Arc::new(FakeBackend::default());
        let resolver = resolver(&backend);
        let sessions: Vec<_> = (1..=4).map(fake_session).collect();

        for session in &sessions {
            backend.emit_signed_in(session.clone());
        }
        backend.emit_signed_out();
        backend.emit_signed_in(sessions[2].clone());
        assert_eq!(resolver.apply_auth_events(), 6);

        let state = resolver.current();
        assert_eq!(state.user_id(), Some(sessions[2].user_id()));
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn notification_needs_no_fetch() {
        let backend = Arc::new(FakeBackend::default());
        let resolver = resolver(&backend);

        backend.emit_signed_in(fake_session(7));
        resolver.resolve().await;

        assert_eq!(resolver.current().user_id(), Some(fake_session(7).user_id()));
        assert_eq!(backend.count_calls(|c| c == &FakeCall::GetCurrentSession), 0);
    }

    #[tokio::test]
    async fn invalidate_serves_old_value_while_refetching() {
        let first = fake_session(1);
        let backend = Arc::new(FakeBackend::default().with_session(first.clone()));
        let resolver = resolver(&backend);
        resolver.resolve().await;

        resolver.invalidate();
        backend.replace_session(Some(fake_session(2)));
        let fetch = resolver.fetch_if_needed().expect("invalidated");
        let state = resolver.current();
        assert!(!state.is_loading);
        assert_eq!(state.user_id(), Some(first.user_id()));

        fetch.await;
        assert_eq!(resolver.current().user_id(), Some(fake_session(2).user_id()));
    }

    #[tokio::test]
    async fn fetch_error_means_signed_out() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_get_session(true);
        let resolver = resolver(&backend);

        let state = resolver.resolve().await;

        assert!(state.session.is_none());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn expiring_session_is_refreshed() {
        let backend = Arc::new(FakeBackend::default().with_session(expired_session(1)));
        let mut events = backend.subscribe_auth_changes();
        let resolver = resolver(&backend);

        let state = resolver.resolve().await;

        let session = state.session.expect("refreshed, not signed out");
        assert!(!session.is_expired(Timestamp::now()));
        assert_eq!(backend.count_calls(|c| c == &FakeCall::RefreshSession), 1);
        let event = events.try_next_event().expect("refresh is announced");
        assert_eq!(event.kind, AuthChangeKind::TokenRefreshed);

        resolver.resolve().await;
        assert_eq!(
            backend.count_calls(|c| c == &FakeCall::RefreshSession),
            1,
            "fresh session is served from the cache"
        );
    }

    #[tokio::test]
    async fn failed_refresh_means_signed_out() {
        let backend = Arc::new(FakeBackend::default());
        let resolver = resolver(&backend);
        // The backend no longer has the session so refreshing fails
        backend.emit_signed_in(expired_session(2));
        backend.replace_session(None);

        let state = resolver.resolve().await;

        assert!(state.session.is_none());
        assert!(!state.is_loading);
    }

    #[test]
    fn dropping_resolver_unsubscribes() {
        let backend = Arc::new(FakeBackend::default());
        let resolver = resolver(&backend);
        let clone = resolver.clone();
        assert_eq!(backend.subscriber_count(), 1, "one subscription per resolver");

        drop(resolver);
        assert_eq!(backend.subscriber_count(), 1, "a clone is still alive");
        drop(clone);
        assert_eq!(backend.subscriber_count(), 0);
    }
}
