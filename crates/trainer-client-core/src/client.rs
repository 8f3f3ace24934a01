use futures::channel::oneshot;
use secrecy::SecretString;
use std::{
    future::Future,
    sync::{Arc, Mutex},
};
use tracing::debug;
use trainer_shared::{
    config::ClientConfig,
    errors::NotLoggedInError,
    organization::Organization,
    req_args::{OAuthProvider, SignUpReqArgs},
    session::Session,
};
use trainer_time::Seconds;

use crate::{
    auth::AuthOps,
    backend::{Backend, SignUpOutcome, SupabaseBackend},
    cache::QueryCache,
    flow::{PageFlow, PageFlowTracker},
    organization::{create_organization, OrgFlag, OrganizationGate, OrganizationState},
    session::{SessionResolver, SessionState},
    spawn::spawn,
    ClientError,
};

/// Everything the UI talks to. Cheap to clone, all clones share state.
///
/// NB: Natively a tokio runtime must be entered before any method is called
#[derive(Debug, Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive(Debug)]
struct ClientInner {
    backend: Arc<dyn Backend>,
    cache: QueryCache,
    resolver: SessionResolver,
    gate: OrganizationGate,
    auth: AuthOps,
    flow: Mutex<PageFlowTracker>,
}

impl Client {
    #[tracing::instrument(name = "NEW CLIENT-CORE", skip(config))]
    pub fn from_config(config: &ClientConfig) -> anyhow::Result<Self> {
        #[cfg(not(target_arch = "wasm32"))]
        let store = crate::backend::FileSessionStore::new(&config.backend.session_file);
        #[cfg(target_arch = "wasm32")]
        let store = crate::backend::BrowserSessionStore::new(
            trainer_shared::const_config::client::CLIENT_SESSION_STORAGE_KEY,
        );
        let backend = SupabaseBackend::new(&config.backend, Box::new(store))?;
        Ok(Self::new(
            Arc::new(backend),
            QueryCache::default(),
            config.cache.has_organization_stale_time(),
        ))
    }

    pub fn new(backend: Arc<dyn Backend>, cache: QueryCache, has_org_stale_after: Seconds) -> Self {
        let resolver = SessionResolver::new(Arc::clone(&backend), cache.clone());
        let gate = OrganizationGate::new(Arc::clone(&backend), cache.clone(), has_org_stale_after);
        let auth = AuthOps::new(Arc::clone(&backend), cache.clone());
        Self {
            inner: Arc::new(ClientInner {
                backend,
                cache,
                resolver,
                gate,
                auth,
                flow: Default::default(),
            }),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.inner.cache
    }

    pub fn session(&self) -> SessionState {
        self.inner.resolver.get_session()
    }

    pub fn has_organization(&self, session: &SessionState) -> OrgFlag {
        self.inner
            .gate
            .has_organization(session.user_id().as_ref())
    }

    /// Resolves session and organization and decides which screen to show
    pub fn page_flow(&self) -> PageFlow {
        let session = self.session();
        let org = self.has_organization(&session);
        self.inner
            .flow
            .lock()
            .expect("mutex poisoned")
            .update(&session, org)
    }

    /// `None` if nobody is signed in
    pub fn current_organization(&self) -> Option<OrganizationState> {
        let session = self.session().session?;
        Some(self.inner.gate.organization(&session))
    }

    /// Calls `wake` every time a cached value changes so the UI can redraw
    pub fn wake_on_change<F>(&self, wake: F)
    where
        F: Fn() + Send + 'static,
    {
        let mut subscription = self.inner.cache.subscribe();
        spawn(async move {
            while subscription.next_change().await.is_some() {
                wake();
            }
        });
    }

    #[tracing::instrument(skip(ui_notify))]
    pub fn login_oauth<F: UiCallBack>(
        &self,
        provider: OAuthProvider,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<reqwest::Url, ClientError>> {
        let auth = self.inner.auth.clone();
        run_for_ui(async move { auth.login_oauth(provider).await }, ui_notify)
    }

    #[tracing::instrument(skip(ui_notify))]
    pub fn login_otp<F: UiCallBack>(
        &self,
        email: String,
        should_create_user: bool,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<(), ClientError>> {
        let auth = self.inner.auth.clone();
        run_for_ui(
            async move { auth.login_otp(&email, should_create_user).await },
            ui_notify,
        )
    }

    #[tracing::instrument(skip(password, ui_notify))]
    pub fn login_password<F: UiCallBack>(
        &self,
        email: String,
        password: SecretString,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<Arc<Session>, ClientError>> {
        let auth = self.inner.auth.clone();
        run_for_ui(
            async move { auth.login_password(&email, password).await },
            ui_notify,
        )
    }

    #[tracing::instrument(skip(ui_notify))]
    pub fn register<F: UiCallBack>(
        &self,
        args: SignUpReqArgs,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<SignUpOutcome, ClientError>> {
        let auth = self.inner.auth.clone();
        run_for_ui(async move { auth.register(args).await }, ui_notify)
    }

    /// Resolves to the path to navigate to
    #[tracing::instrument(skip(ui_notify))]
    pub fn logout<F: UiCallBack>(&self, ui_notify: F) -> oneshot::Receiver<&'static str> {
        let auth = self.inner.auth.clone();
        run_for_ui(async move { auth.logout().await }, ui_notify)
    }

    /// Once created the membership flag is checked again before resolving so
    /// the UI can move on straight away
    #[tracing::instrument(skip(ui_notify))]
    pub fn create_organization<F: UiCallBack>(
        &self,
        name: String,
        invitee_emails: Vec<String>,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<Organization, ClientError>> {
        let client = self.clone();
        run_for_ui(
            async move {
                client
                    .create_organization_and_refetch(&name, &invitee_emails)
                    .await
            },
            ui_notify,
        )
    }

    async fn create_organization_and_refetch(
        &self,
        name: &str,
        invitee_emails: &[String],
    ) -> Result<Organization, ClientError> {
        let inner = &self.inner;
        let Some(user_id) = inner.resolver.resolve().await.user_id() else {
            return Err(NotLoggedInError.into());
        };
        let organization = create_organization(
            inner.backend.as_ref(),
            &inner.cache,
            name,
            invitee_emails.iter().map(String::as_str),
        )
        .await?;
        inner.gate.refetch(user_id).await;
        Ok(organization)
    }

    #[tracing::instrument(skip(callback_url, ui_notify))]
    pub fn complete_oauth_callback<F: UiCallBack>(
        &self,
        callback_url: String,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<Arc<Session>, ClientError>> {
        let auth = self.inner.auth.clone();
        run_for_ui(
            async move { auth.complete_oauth_callback(&callback_url).await },
            ui_notify,
        )
    }

    #[tracing::instrument(skip(ui_notify))]
    pub fn refresh_session<F: UiCallBack>(
        &self,
        ui_notify: F,
    ) -> oneshot::Receiver<Result<Arc<Session>, ClientError>> {
        let auth = self.inner.auth.clone();
        run_for_ui(async move { auth.refresh_session().await }, ui_notify)
    }
}

/// Runs `task` in the background and then calls `ui_notify` so the UI knows
/// to check the receiver
fn run_for_ui<T, Fut, F>(task: Fut, ui_notify: F) -> oneshot::Receiver<T>
where
    T: UiTaskOutput,
    Fut: UiTask<T>,
    F: UiCallBack,
{
    let (tx, rx) = oneshot::channel();
    spawn(async move {
        let msg = task.await;
        if tx.send(msg).is_err() {
            debug!("receiver dropped before the result was ready");
        }
        ui_notify();
    });
    rx
}

pub trait UiCallBack: 'static + Send + FnOnce() {}
impl<T> UiCallBack for T where T: 'static + Send + FnOnce() {}

#[cfg(not(target_arch = "wasm32"))]
pub trait UiTaskOutput: Send + 'static {}
#[cfg(not(target_arch = "wasm32"))]
impl<T> UiTaskOutput for T where T: Send + 'static {}
#[cfg(not(target_arch = "wasm32"))]
pub trait UiTask<T>: Future<Output = T> + Send + 'static {}
#[cfg(not(target_arch = "wasm32"))]
impl<T, F> UiTask<T> for F where F: Future<Output = T> + Send + 'static {}

#[cfg(target_arch = "wasm32")]
pub trait UiTaskOutput: 'static {}
#[cfg(target_arch = "wasm32")]
impl<T> UiTaskOutput for T where T: 'static {}
#[cfg(target_arch = "wasm32")]
pub trait UiTask<T>: Future<Output = T> + 'static {}
#[cfg(target_arch = "wasm32")]
impl<T, F> UiTask<T> for F where F: Future<Output = T> + 'static {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::testing::{expired_session, fake_session, FakeBackend, FakeCall};

    use super::*;

    fn client(backend: &Arc<FakeBackend>) -> Client {
        Client::new(backend.clone(), QueryCache::default(), Seconds::from_minutes(5))
    }

    /// Lets spawned tasks run on the current thread runtime
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn flow_from_signed_out_to_routed() {
        let backend = Arc::new(FakeBackend::default());
        let client = client(&backend);

        assert_eq!(client.page_flow(), PageFlow::ResolvingSession);
        settle().await;
        assert_eq!(client.page_flow(), PageFlow::Unauthenticated);

        let rx = client.login_password("me@example.com".into(), "pw".to_string().into(), || {});
        rx.await.unwrap().unwrap();
        assert_eq!(client.page_flow(), PageFlow::CheckingOrganization);
        settle().await;
        assert_eq!(client.page_flow(), PageFlow::Onboarding);

        let rx = client.create_organization(
            "Squad".into(),
            vec!["friend@example.com".into(), "".into()],
            || {},
        );
        rx.await.unwrap().unwrap();
        assert_eq!(client.page_flow(), PageFlow::Routed);
    }

    #[tokio::test]
    async fn ui_is_notified_after_result_is_sent() {
        let backend = Arc::new(FakeBackend::default());
        let client = client(&backend);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);

        let rx = client.logout(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(rx.await.unwrap(), "/auth");
        settle().await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn woken_when_session_changes() {
        let backend = Arc::new(FakeBackend::default());
        let client = client(&backend);
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        client.wake_on_change(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        client.session();
        settle().await;

        assert!(wakes.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn dropped_receiver_is_not_an_error() {
        let backend = Arc::new(FakeBackend::default());
        let client = client(&backend);
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&notified);

        drop(client.refresh_session(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        settle().await;

        assert_eq!(notified.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_while_rendering() {
        let backend = Arc::new(FakeBackend::default().with_session(expired_session(1)));
        let client = client(&backend);

        for _ in 0..50 {
            client.page_flow();
            settle().await;
        }

        let session = client.session().session.expect("still signed in");
        assert!(!session.is_expired(trainer_time::Timestamp::now()));
        assert_eq!(backend.count_calls(|c| c == &FakeCall::RefreshSession), 1);
        assert_eq!(backend.count_calls(|c| c == &FakeCall::GetCurrentSession), 1);
    }

    #[tokio::test]
    async fn creating_an_organization_needs_a_session() {
        let backend = Arc::new(FakeBackend::default());
        let client = client(&backend);

        let actual = client
            .create_organization("Squad".into(), vec![], || {})
            .await
            .unwrap()
            .unwrap_err();

        assert!(matches!(actual, ClientError::NotLoggedIn(_)), "{actual:?}");
        assert_eq!(
            backend.count_calls(|c| matches!(c, FakeCall::CreateOrganization(_))),
            0
        );
    }

    #[tokio::test]
    async fn current_organization_needs_a_session() {
        let backend = Arc::new(FakeBackend::default());
        let client = client(&backend);
        assert!(client.current_organization().is_none());

        backend.emit_signed_in(fake_session(3));
        let state = client.current_organization().unwrap();

        assert!(state.organization.is_none());
        assert!(state.is_loading);
        settle().await;
        let state = client.current_organization().unwrap();
        assert!(state.organization.is_none(), "user has no organization");
        assert!(!state.is_loading);
    }
}
