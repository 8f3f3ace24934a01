//! In memory [`Backend`] for tests. Records every call it receives.

use anyhow::bail;
use chrono::Utc;
use secrecy::SecretString;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use trainer_shared::{
    id::{OrgId, UserId},
    organization::{OrgName, Organization, OrganizationMembership, Role},
    profile::EmailAddress,
    req_args::{LoginReqArgs, OAuthProvider, OtpReqArgs, SignUpReqArgs},
    session::{OrganizationSummary, Session, User, UserMetadata},
};
use trainer_time::{Seconds, Timestamp};
use uuid::Uuid;

use crate::backend::{
    session_store::{session_from_json, session_to_json},
    AuthBroadcaster, AuthChangeKind, AuthSubscription, Backend, SessionStore, SignUpOutcome,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeCall {
    GetCurrentSession,
    SignInWithOAuth(OAuthProvider),
    SignInWithOtp(String),
    SignInWithPassword(String),
    SignUp(String),
    SignOut,
    CreateOrganization(String),
    InviteUser {
        email: String,
        org_id: OrgId,
        role: Role,
    },
    UserHasOrganization,
    GetMembership(UserId),
    GetOrganization(OrgId),
    RefreshSession,
    SessionFromOAuthCallback,
}

#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
    broadcaster: AuthBroadcaster,
}

#[derive(Debug, Default)]
struct FakeState {
    session: Option<Arc<Session>>,
    has_organization: bool,
    membership: Option<OrganizationMembership>,
    organization: Option<Organization>,
    failing_invites: HashSet<String>,
    fail_get_session: bool,
    fail_has_organization: bool,
    fail_create_organization: bool,
    fail_sign_out: bool,
    require_email_confirmation: bool,
    next_id: u128,
    calls: Vec<FakeCall>,
}

/// A signed in session whose user id is derived from `n`
pub fn fake_session(n: u128) -> Arc<Session> {
    Arc::new(session_for(
        Uuid::from_u128(n).into(),
        Some(format!("user{n}@example.com")),
        UserMetadata::default(),
    ))
}

/// Like [`fake_session`] but the backend embedded an organization in the
/// user's metadata
pub fn fake_session_with_org(n: u128, org_name: &str) -> Arc<Session> {
    let metadata = UserMetadata {
        organization: Some(OrganizationSummary {
            id: Uuid::from_u128(n + 1_000).into(),
            name: org_name.to_string(),
            role: Role::Admin,
            joined_at: Utc::now(),
        }),
        ..Default::default()
    };
    Arc::new(session_for(
        Uuid::from_u128(n).into(),
        Some(format!("user{n}@example.com")),
        metadata,
    ))
}

/// Like [`fake_session`] but already expired
pub fn expired_session(n: u128) -> Arc<Session> {
    let mut session = (*fake_session(n)).clone();
    session.expires_at = Timestamp::from_secs_since_epoch(1);
    Arc::new(session)
}

/// Keeps the serialized session in memory. Clones share what was saved.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    saved: Arc<Mutex<Option<String>>>,
}

impl MemorySessionStore {
    pub fn has_session(&self) -> bool {
        self.saved.lock().expect("mutex poisoned").is_some()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        let saved = self.saved.lock().expect("mutex poisoned");
        saved.as_deref().map(session_from_json).transpose()
    }

    fn save(&self, session: Option<&Session>) -> anyhow::Result<()> {
        let json = session.map(session_to_json).transpose()?;
        *self.saved.lock().expect("mutex poisoned") = json;
        Ok(())
    }
}

fn session_for(id: UserId, email: Option<String>, user_metadata: UserMetadata) -> Session {
    Session {
        access_token: SecretString::from(format!("access-{id}")),
        refresh_token: SecretString::from(format!("refresh-{id}")),
        expires_at: Timestamp::now() + Seconds::new(3600),
        user: User {
            id,
            email,
            user_metadata,
        },
    }
}

impl FakeBackend {
    pub fn with_session(self, session: Arc<Session>) -> Self {
        self.lock().session = Some(session);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("mutex poisoned")
    }

    fn record(&self, call: FakeCall) {
        self.lock().calls.push(call);
    }

    fn next_id(&self) -> Uuid {
        let mut guard = self.lock();
        guard.next_id += 1;
        // Offset keeps generated ids apart from the ones `fake_session` uses
        Uuid::from_u128(0xFA4E_0000 + guard.next_id)
    }

    fn establish(&self, session: Session, kind: AuthChangeKind) -> Arc<Session> {
        let session = Arc::new(session);
        self.lock().session = Some(Arc::clone(&session));
        self.broadcaster.emit(kind, Some(Arc::clone(&session)));
        session
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.lock().calls.clone()
    }

    pub fn count_calls<P: Fn(&FakeCall) -> bool>(&self, predicate: P) -> usize {
        self.lock().calls.iter().filter(|c| predicate(c)).count()
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    /// Changes what the backend has stored without telling anyone
    pub fn replace_session(&self, session: Option<Arc<Session>>) {
        self.lock().session = session;
    }

    /// Broadcasts without changing what is stored
    pub fn notify(&self, kind: AuthChangeKind, session: Option<Arc<Session>>) {
        self.broadcaster.emit(kind, session);
    }

    pub fn emit_signed_in(&self, session: Arc<Session>) {
        self.replace_session(Some(Arc::clone(&session)));
        self.notify(AuthChangeKind::SignedIn, Some(session));
    }

    pub fn emit_signed_out(&self) {
        self.replace_session(None);
        self.notify(AuthChangeKind::SignedOut, None);
    }

    pub fn set_has_organization(&self, value: bool) {
        self.lock().has_organization = value;
    }

    pub fn fail_invite_for(&self, email: &str) {
        self.lock().failing_invites.insert(email.to_string());
    }

    pub fn fail_get_session(&self, value: bool) {
        self.lock().fail_get_session = value;
    }

    pub fn fail_has_organization(&self, value: bool) {
        self.lock().fail_has_organization = value;
    }

    pub fn fail_create_organization(&self, value: bool) {
        self.lock().fail_create_organization = value;
    }

    pub fn fail_sign_out(&self, value: bool) {
        self.lock().fail_sign_out = value;
    }

    pub fn require_email_confirmation(&self, value: bool) {
        self.lock().require_email_confirmation = value;
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl Backend for FakeBackend {
    async fn get_current_session(&self) -> anyhow::Result<Option<Arc<Session>>> {
        self.record(FakeCall::GetCurrentSession);
        let guard = self.lock();
        if guard.fail_get_session {
            bail!("session lookup failed");
        }
        Ok(guard.session.clone())
    }

    fn subscribe_auth_changes(&self) -> AuthSubscription {
        self.broadcaster.subscribe()
    }

    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> anyhow::Result<reqwest::Url> {
        self.record(FakeCall::SignInWithOAuth(provider));
        Ok(reqwest::Url::parse_with_params(
            "https://auth.example.com/authorize",
            &[("provider", provider.as_ref())],
        )?)
    }

    async fn sign_in_with_otp(&self, args: &OtpReqArgs) -> anyhow::Result<()> {
        self.record(FakeCall::SignInWithOtp(args.email.to_string()));
        Ok(())
    }

    async fn sign_in_with_password(&self, args: &LoginReqArgs) -> anyhow::Result<Arc<Session>> {
        self.record(FakeCall::SignInWithPassword(args.email.to_string()));
        let session = session_for(
            self.next_id().into(),
            Some(args.email.to_string()),
            UserMetadata::default(),
        );
        Ok(self.establish(session, AuthChangeKind::SignedIn))
    }

    async fn sign_up(&self, args: &SignUpReqArgs) -> anyhow::Result<SignUpOutcome> {
        self.record(FakeCall::SignUp(args.email.to_string()));
        if self.lock().require_email_confirmation {
            return Ok(SignUpOutcome::ConfirmationRequired);
        }
        let metadata = UserMetadata {
            first_name: args.first_name.as_ref().map(ToString::to_string),
            last_name: args.last_name.as_ref().map(ToString::to_string),
            email: Some(args.email.to_string()),
            organization: None,
        };
        let session = session_for(self.next_id().into(), Some(args.email.to_string()), metadata);
        Ok(SignUpOutcome::SignedIn(
            self.establish(session, AuthChangeKind::SignedIn),
        ))
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        self.record(FakeCall::SignOut);
        self.emit_signed_out();
        if self.lock().fail_sign_out {
            bail!("logout request failed");
        }
        Ok(())
    }

    async fn create_organization(&self, name: &OrgName) -> anyhow::Result<Organization> {
        self.record(FakeCall::CreateOrganization(name.to_string()));
        if self.lock().fail_create_organization {
            bail!("organization could not be created");
        }
        let id: OrgId = self.next_id().into();
        let mut guard = self.lock();
        let created_by = match &guard.session {
            Some(session) => session.user_id(),
            None => bail!("not signed in"),
        };
        let organization = Organization {
            id,
            name: name.to_string(),
            created_by,
            created_at: Utc::now(),
        };
        guard.membership = Some(OrganizationMembership {
            org_id: id,
            user_id: created_by,
            role: Role::Admin,
            joined_at: organization.created_at,
        });
        guard.organization = Some(organization.clone());
        guard.has_organization = true;
        Ok(organization)
    }

    async fn invite_user(
        &self,
        email: &EmailAddress,
        org_id: OrgId,
        role: Role,
    ) -> anyhow::Result<()> {
        self.record(FakeCall::InviteUser {
            email: email.to_string(),
            org_id,
            role,
        });
        if self.lock().failing_invites.contains(email.as_ref()) {
            bail!("invitation to {email} failed");
        }
        Ok(())
    }

    async fn user_has_organization(&self) -> anyhow::Result<bool> {
        self.record(FakeCall::UserHasOrganization);
        let guard = self.lock();
        if guard.fail_has_organization {
            bail!("membership check failed");
        }
        Ok(guard.has_organization)
    }

    async fn get_membership(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<OrganizationMembership>> {
        self.record(FakeCall::GetMembership(user_id));
        Ok(self
            .lock()
            .membership
            .clone()
            .filter(|m| m.user_id == user_id))
    }

    async fn get_organization(&self, org_id: OrgId) -> anyhow::Result<Option<Organization>> {
        self.record(FakeCall::GetOrganization(org_id));
        Ok(self
            .lock()
            .organization
            .clone()
            .filter(|o| o.id == org_id))
    }

    async fn refresh_session(&self) -> anyhow::Result<Arc<Session>> {
        self.record(FakeCall::RefreshSession);
        let Some(current) = self.lock().session.clone() else {
            bail!("no session to refresh");
        };
        let mut session = (*current).clone();
        session.expires_at = Timestamp::now() + Seconds::new(3600);
        Ok(self.establish(session, AuthChangeKind::TokenRefreshed))
    }

    async fn session_from_oauth_callback(
        &self,
        _callback_url: &str,
    ) -> anyhow::Result<Arc<Session>> {
        self.record(FakeCall::SessionFromOAuthCallback);
        let id = self.next_id();
        let session = session_for(id.into(), Some(format!("{id}@oauth.example.com")), UserMetadata::default());
        Ok(self.establish(session, AuthChangeKind::SignedIn))
    }
}
