use secrecy::SecretString;
use std::sync::Arc;
use tracing::{info, warn};
use trainer_shared::{
    const_config::route::ROUTE_AUTH,
    req_args::{LoginReqArgs, OAuthProvider, OtpReqArgs, SignUpReqArgs},
    session::Session,
};

use crate::{
    backend::{Backend, SignUpOutcome},
    cache::{CachedValue, QueryCache, QueryKey},
    ClientError,
};

/// Sign in, registration and sign out
///
/// Every successful operation invalidates the cached session so the next read
/// reflects the new identity
#[derive(Debug, Clone)]
pub struct AuthOps {
    backend: Arc<dyn Backend>,
    cache: QueryCache,
}

impl AuthOps {
    pub fn new(backend: Arc<dyn Backend>, cache: QueryCache) -> Self {
        Self { backend, cache }
    }

    /// Returns where to send the user to sign in with `provider`
    #[tracing::instrument(skip(self))]
    pub async fn login_oauth(&self, provider: OAuthProvider) -> Result<reqwest::Url, ClientError> {
        Ok(self.backend.sign_in_with_oauth(provider).await?)
    }

    /// Sends a one time passcode / magic link to `email`
    #[tracing::instrument(skip(self))]
    pub async fn login_otp(&self, email: &str, should_create_user: bool) -> Result<(), ClientError> {
        let args = OtpReqArgs::from_form(email, should_create_user)?;
        self.backend.sign_in_with_otp(&args).await?;
        self.cache.invalidate(&QueryKey::Session);
        Ok(())
    }

    #[tracing::instrument(skip(self, password))]
    pub async fn login_password(
        &self,
        email: &str,
        password: SecretString,
    ) -> Result<Arc<Session>, ClientError> {
        let args = LoginReqArgs::from_form(email, password)?;
        let session = self.backend.sign_in_with_password(&args).await?;
        info!(user_id = %session.user_id(), "signed in");
        self.cache.invalidate(&QueryKey::Session);
        Ok(session)
    }

    /// Validation happens when building [`SignUpReqArgs`]
    #[tracing::instrument(skip(self))]
    pub async fn register(&self, args: SignUpReqArgs) -> Result<SignUpOutcome, ClientError> {
        let outcome = self.backend.sign_up(&args).await?;
        info!(
            confirmation_required = matches!(outcome, SignUpOutcome::ConfirmationRequired),
            "registered"
        );
        self.cache.invalidate(&QueryKey::Session);
        Ok(outcome)
    }

    /// Clears the local session first so the user is signed out even if the
    /// backend cannot be reached. Returns the path to navigate to.
    #[tracing::instrument(skip(self))]
    pub async fn logout(&self) -> &'static str {
        self.cache
            .set(QueryKey::Session, CachedValue::Session(None));
        self.cache
            .invalidate_where(|key| matches!(key, QueryKey::UserHasOrganization(_)));
        self.cache.invalidate(&QueryKey::Organization);
        match self.backend.sign_out().await {
            Ok(()) => self.cache.invalidate(&QueryKey::Session),
            Err(e) => warn!(?e, "logout request failed, signed out locally only"),
        }
        ROUTE_AUTH
    }

    /// Establishes the session from the url the OAuth provider redirected to
    #[tracing::instrument(skip(self, callback_url))]
    pub async fn complete_oauth_callback(
        &self,
        callback_url: &str,
    ) -> Result<Arc<Session>, ClientError> {
        let session = self.backend.session_from_oauth_callback(callback_url).await?;
        info!(user_id = %session.user_id(), "signed in with oauth");
        self.cache.invalidate(&QueryKey::Session);
        Ok(session)
    }

    #[tracing::instrument(skip(self))]
    pub async fn refresh_session(&self) -> Result<Arc<Session>, ClientError> {
        let session = self.backend.refresh_session().await?;
        self.cache.invalidate(&QueryKey::Session);
        Ok(session)
    }
}
