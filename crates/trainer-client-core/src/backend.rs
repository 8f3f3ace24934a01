//! The contract with the hosted backend. Everything the client knows about
//! accounts and organizations comes through [`Backend`].

use futures::channel::mpsc;
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};
use trainer_shared::{
    id::{OrgId, UserId},
    organization::{OrgName, Organization, OrganizationMembership, Role},
    profile::EmailAddress,
    req_args::{LoginReqArgs, OAuthProvider, OtpReqArgs, SignUpReqArgs},
    session::Session,
};

pub(crate) mod session_store;
mod supabase;

#[cfg(target_arch = "wasm32")]
pub use session_store::BrowserSessionStore;
#[cfg(not(target_arch = "wasm32"))]
pub use session_store::FileSessionStore;
pub use session_store::SessionStore;
pub use supabase::SupabaseBackend;

/// What caused the auth state to change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthChangeKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
}

/// Pushed to subscribers every time the backend's idea of the current session
/// changes
#[derive(Debug, Clone)]
pub struct AuthEvent {
    pub kind: AuthChangeKind,
    pub session: Option<Arc<Session>>,
}

/// Outcome of a registration
#[derive(Debug, Clone)]
pub enum SignUpOutcome {
    SignedIn(Arc<Session>),
    /// The account exists but the email must be confirmed before signing in
    ConfirmationRequired,
}

/// Receiving end of an auth state subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: mpsc::UnboundedReceiver<AuthEvent>,
}

/// Keeps the senders for all live subscriptions
#[derive(Debug, Default)]
pub struct AuthBroadcaster {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<AuthEvent>>>,
}

impl AuthSubscription {
    /// Returns the next event that has already arrived (never waits)
    pub fn try_next_event(&mut self) -> Option<AuthEvent> {
        match self.rx.try_next() {
            Ok(event) => event,
            Err(_) => None, // Nothing pending
        }
    }
}

impl AuthBroadcaster {
    pub fn subscribe(&self) -> AuthSubscription {
        let (tx, rx) = mpsc::unbounded();
        self.subscribers.lock().expect("mutex poisoned").push(tx);
        AuthSubscription { rx }
    }

    /// Delivers to every subscriber in order and forgets the ones that are gone
    #[tracing::instrument(skip(self, session))]
    pub fn emit(&self, kind: AuthChangeKind, session: Option<Arc<Session>>) {
        let event = AuthEvent { kind, session };
        self.subscribers
            .lock()
            .expect("mutex poisoned")
            .retain(|tx| tx.unbounded_send(event.clone()).is_ok());
    }

    /// Only counts subscribers that have not been dropped
    pub fn subscriber_count(&self) -> usize {
        let mut guard = self.subscribers.lock().expect("mutex poisoned");
        guard.retain(|tx| !tx.is_closed());
        guard.len()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub trait BackendBound: Send + Sync + 'static {}
#[cfg(not(target_arch = "wasm32"))]
impl<T> BackendBound for T where T: Send + Sync + 'static {}

#[cfg(target_arch = "wasm32")]
pub trait BackendBound: 'static {}
#[cfg(target_arch = "wasm32")]
impl<T> BackendBound for T where T: 'static {}

/// Logical operations offered by the backend, independent of wire format
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait Backend: BackendBound + Debug {
    /// `None` is a normal answer (nobody is signed in)
    async fn get_current_session(&self) -> anyhow::Result<Option<Arc<Session>>>;

    fn subscribe_auth_changes(&self) -> AuthSubscription;

    /// Returns the url to send the user to
    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> anyhow::Result<reqwest::Url>;

    async fn sign_in_with_otp(&self, args: &OtpReqArgs) -> anyhow::Result<()>;

    async fn sign_in_with_password(&self, args: &LoginReqArgs) -> anyhow::Result<Arc<Session>>;

    async fn sign_up(&self, args: &SignUpReqArgs) -> anyhow::Result<SignUpOutcome>;

    async fn sign_out(&self) -> anyhow::Result<()>;

    async fn create_organization(&self, name: &OrgName) -> anyhow::Result<Organization>;

    async fn invite_user(
        &self,
        email: &EmailAddress,
        org_id: OrgId,
        role: Role,
    ) -> anyhow::Result<()>;

    async fn user_has_organization(&self) -> anyhow::Result<bool>;

    async fn get_membership(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<OrganizationMembership>>;

    async fn get_organization(&self, org_id: OrgId) -> anyhow::Result<Option<Organization>>;

    /// Exchanges the refresh token for a new session
    async fn refresh_session(&self) -> anyhow::Result<Arc<Session>>;

    /// Establishes the session from the url the OAuth provider redirected to
    async fn session_from_oauth_callback(&self, callback_url: &str)
        -> anyhow::Result<Arc<Session>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_subscription_is_forgotten() {
        let broadcaster = AuthBroadcaster::default();
        let mut kept = broadcaster.subscribe();
        let dropped = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 2);

        drop(dropped);
        broadcaster.emit(AuthChangeKind::SignedOut, None);

        assert_eq!(broadcaster.subscriber_count(), 1);
        let event = kept.try_next_event().unwrap();
        assert_eq!(event.kind, AuthChangeKind::SignedOut);
        assert!(kept.try_next_event().is_none());
    }

    #[test]
    fn events_arrive_in_emission_order() {
        let broadcaster = AuthBroadcaster::default();
        let mut subscription = broadcaster.subscribe();

        broadcaster.emit(AuthChangeKind::SignedIn, None);
        broadcaster.emit(AuthChangeKind::TokenRefreshed, None);
        broadcaster.emit(AuthChangeKind::SignedOut, None);

        let kinds: Vec<_> = std::iter::from_fn(|| subscription.try_next_event())
            .map(|e| e.kind)
            .collect();
        assert_eq!(
            kinds,
            [
                AuthChangeKind::SignedIn,
                AuthChangeKind::TokenRefreshed,
                AuthChangeKind::SignedOut
            ]
        );
    }
}
