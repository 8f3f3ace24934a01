//! [`Backend`] implemented over HTTP against a Supabase style backend (GoTrue
//! for auth and PostgREST for data)

use anyhow::{anyhow, bail, Context as _};
use async_trait::async_trait;
use reqwest::{header::HeaderValue, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret as _, SecretString};
use std::{
    fmt::Debug,
    sync::{Arc, Mutex},
};
use tracing::{info, warn};
use trainer_shared::{
    config::BackendSettings,
    const_config::path::{
        PathSpec, PATH_AUTH_AUTHORIZE, PATH_AUTH_LOGOUT, PATH_AUTH_OTP, PATH_AUTH_SIGNUP,
        PATH_AUTH_TOKEN, PATH_AUTH_USER, PATH_REST_ORGANIZATIONS, PATH_REST_ORGANIZATION_MEMBERS,
        PATH_RPC_CREATE_ORGANIZATION, PATH_RPC_INVITE_USER, PATH_RPC_USER_HAS_ORGANIZATION,
    },
    id::{OrgId, UserId},
    organization::{OrgName, Organization, OrganizationMembership, Role},
    profile::EmailAddress,
    req_args::{LoginReqArgs, OAuthProvider, OtpReqArgs, SignUpReqArgs},
    session::{Session, User},
};
use trainer_time::{Seconds, Timestamp};

use super::{
    AuthBroadcaster, AuthChangeKind, AuthSubscription, Backend, SessionStore, SignUpOutcome,
};

pub struct SupabaseBackend {
    api_client: reqwest::Client,
    base_url: String,
    anon_key: SecretString,
    auth_callback_url: String,
    current: Mutex<Option<Arc<Session>>>,
    store: Box<dyn SessionStore>,
    broadcaster: AuthBroadcaster,
}

/// Body returned by the token and signup endpoints when a session is issued
#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: u64,
    #[serde(default)]
    expires_at: Option<u64>,
    user: User,
}

#[derive(serde::Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(TokenResponse),
    UserOnly(User),
}

impl TokenResponse {
    fn into_session(self, now: Timestamp) -> Session {
        let expires_at = self
            .expires_at
            .map(Timestamp::from_secs_since_epoch)
            .unwrap_or_else(|| now + Seconds::new(self.expires_in));
        Session {
            access_token: SecretString::from(self.access_token),
            refresh_token: SecretString::from(self.refresh_token),
            expires_at,
            user: self.user,
        }
    }
}

impl SupabaseBackend {
    /// Restores the session saved in `store` (if any)
    #[tracing::instrument(name = "NEW SUPABASE BACKEND", skip(settings, store), fields(url = %settings.url))]
    pub fn new(
        settings: &BackendSettings,
        store: Box<dyn SessionStore>,
    ) -> anyhow::Result<Self> {
        let builder = reqwest::Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        let builder = builder.timeout(settings.request_timeout().into());
        let api_client = builder.build().context("unable to create reqwest client")?;
        let restored = match store.load() {
            Ok(session) => session.map(Arc::new),
            Err(e) => {
                warn!(?e, "unable to restore the saved session, starting signed out");
                None
            }
        };
        info!(is_restored = restored.is_some(), "session store loaded");
        Ok(Self {
            api_client,
            base_url: settings.base_url().to_string(),
            anon_key: settings.anon_key.clone(),
            auth_callback_url: settings.auth_callback_url.clone(),
            current: Mutex::new(restored),
            store,
            broadcaster: Default::default(),
        })
    }

    fn path_to_url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        self.current.lock().expect("mutex poisoned").clone()
    }

    fn store_and_emit(&self, kind: AuthChangeKind, session: Option<Arc<Session>>) {
        *self.current.lock().expect("mutex poisoned") = session.clone();
        if let Err(e) = self.store.save(session.as_deref()) {
            warn!(?e, "failed to save the session, it will not survive a restart");
        }
        self.broadcaster.emit(kind, session);
    }

    /// Adds the api key and the bearer token (the session's if signed in,
    /// otherwise the public key)
    fn request(&self, path_spec: &PathSpec) -> RequestBuilder {
        let bearer = match self.current_session() {
            Some(session) => session.access_token.expose_secret().to_string(),
            None => self.anon_key.expose_secret().to_string(),
        };
        self.request_with_bearer(path_spec, &bearer)
    }

    fn request_with_bearer(&self, path_spec: &PathSpec, bearer: &str) -> RequestBuilder {
        let mut api_key = HeaderValue::from_str(self.anon_key.expose_secret())
            .unwrap_or_else(|_| HeaderValue::from_static(""));
        api_key.set_sensitive(true);
        self.api_client
            .request(path_spec.method.clone(), self.path_to_url(path_spec.path))
            .header("apikey", api_key)
            .bearer_auth(bearer)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
    ) -> anyhow::Result<Arc<Session>> {
        // An expired access token would be rejected so only the public key is sent
        let response = self
            .request_with_bearer(&PATH_AUTH_TOKEN, self.anon_key.expose_secret())
            .query(&[("grant_type", grant_type)])
            .json(&body)
            .send()
            .await;
        let token: TokenResponse = process_json_body(response).await?;
        Ok(Arc::new(token.into_session(Timestamp::now())))
    }

    async fn user_for_token(&self, access_token: &str) -> anyhow::Result<User> {
        let response = self
            .request_with_bearer(&PATH_AUTH_USER, access_token)
            .send()
            .await;
        process_json_body(response).await
    }

    async fn rpc<T>(&self, path_spec: &PathSpec, args: serde_json::Value) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.request(path_spec).json(&args).send().await;
        process_json_body(response).await
    }

    async fn select_first<T>(
        &self,
        path_spec: &PathSpec,
        filter: (&str, String),
    ) -> anyhow::Result<Option<T>>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .request(path_spec)
            .query(&[(filter.0, filter.1.as_str()), ("select", "*")])
            .send()
            .await;
        let rows: Vec<T> = process_json_body(response).await?;
        Ok(rows.into_iter().next())
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl Backend for SupabaseBackend {
    #[tracing::instrument(skip(self))]
    async fn get_current_session(&self) -> anyhow::Result<Option<Arc<Session>>> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        if !session.is_expired(Timestamp::now()) {
            return Ok(Some(session));
        }
        info!("session expired, attempting refresh");
        match self.refresh_session().await {
            Ok(session) => Ok(Some(session)),
            Err(e) => {
                warn!(?e, "refresh failed, treating as signed out");
                self.store_and_emit(AuthChangeKind::SignedOut, None);
                Ok(None)
            }
        }
    }

    fn subscribe_auth_changes(&self) -> AuthSubscription {
        self.broadcaster.subscribe()
    }

    #[tracing::instrument(skip(self), ret)]
    async fn sign_in_with_oauth(&self, provider: OAuthProvider) -> anyhow::Result<Url> {
        Url::parse_with_params(
            &self.path_to_url(PATH_AUTH_AUTHORIZE),
            &[
                ("provider", provider.as_ref()),
                ("redirect_to", self.auth_callback_url.as_str()),
            ],
        )
        .context("failed to build authorize url")
    }

    #[tracing::instrument(skip(self))]
    async fn sign_in_with_otp(&self, args: &OtpReqArgs) -> anyhow::Result<()> {
        let body = serde_json::json!({
            "email": args.email.as_ref(),
            "create_user": args.should_create_user,
        });
        let response = self.request(&PATH_AUTH_OTP).json(&body).send().await;
        process_empty(response).await
    }

    // WARNING: Must skip args as it contains the password
    #[tracing::instrument(skip(self, args), fields(email = %args.email))]
    async fn sign_in_with_password(&self, args: &LoginReqArgs) -> anyhow::Result<Arc<Session>> {
        let body = serde_json::json!({
            "email": args.email.as_ref(),
            "password": args.password.expose_secret(),
        });
        let session = self.token_grant("password", body).await?;
        self.store_and_emit(AuthChangeKind::SignedIn, Some(Arc::clone(&session)));
        Ok(session)
    }

    #[tracing::instrument(skip(self, args), fields(email = %args.email))]
    async fn sign_up(&self, args: &SignUpReqArgs) -> anyhow::Result<SignUpOutcome> {
        let body = serde_json::json!({
            "email": args.email.as_ref(),
            "password": args.password.expose_secret(),
            "data": args.profile_fields(),
        });
        let response = self.request(&PATH_AUTH_SIGNUP).json(&body).send().await;
        match process_json_body(response).await? {
            SignUpResponse::Session(token) => {
                let session = Arc::new(token.into_session(Timestamp::now()));
                self.store_and_emit(AuthChangeKind::SignedIn, Some(Arc::clone(&session)));
                Ok(SignUpOutcome::SignedIn(session))
            }
            SignUpResponse::UserOnly(user) => {
                info!(user_id = %user.id, "sign up requires email confirmation");
                Ok(SignUpOutcome::ConfirmationRequired)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn sign_out(&self) -> anyhow::Result<()> {
        let Some(session) = self.current_session() else {
            return Ok(());
        };
        // Local state is cleared even if the server call fails
        self.store_and_emit(AuthChangeKind::SignedOut, None);
        let response = self
            .request_with_bearer(&PATH_AUTH_LOGOUT, session.access_token.expose_secret())
            .send()
            .await;
        process_empty(response).await
    }

    #[tracing::instrument(skip(self))]
    async fn create_organization(&self, name: &OrgName) -> anyhow::Result<Organization> {
        self.rpc(
            &PATH_RPC_CREATE_ORGANIZATION,
            serde_json::json!({ "p_name": name.as_ref() }),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn invite_user(
        &self,
        email: &EmailAddress,
        org_id: OrgId,
        role: Role,
    ) -> anyhow::Result<()> {
        let args = serde_json::json!({
            "p_email": email.as_ref(),
            "p_org": org_id,
            "p_role": role,
        });
        let response = self.request(&PATH_RPC_INVITE_USER).json(&args).send().await;
        process_empty(response).await
    }

    #[tracing::instrument(skip(self), ret)]
    async fn user_has_organization(&self) -> anyhow::Result<bool> {
        self.rpc(&PATH_RPC_USER_HAS_ORGANIZATION, serde_json::json!({}))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_membership(
        &self,
        user_id: UserId,
    ) -> anyhow::Result<Option<OrganizationMembership>> {
        self.select_first(
            &PATH_REST_ORGANIZATION_MEMBERS,
            ("user_id", format!("eq.{user_id}")),
        )
        .await
    }

    #[tracing::instrument(skip(self))]
    async fn get_organization(&self, org_id: OrgId) -> anyhow::Result<Option<Organization>> {
        self.select_first(&PATH_REST_ORGANIZATIONS, ("id", format!("eq.{org_id}")))
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn refresh_session(&self) -> anyhow::Result<Arc<Session>> {
        let Some(current) = self.current_session() else {
            bail!("no session to refresh");
        };
        let body = serde_json::json!({
            "refresh_token": current.refresh_token.expose_secret(),
        });
        let session = self.token_grant("refresh_token", body).await?;
        self.store_and_emit(AuthChangeKind::TokenRefreshed, Some(Arc::clone(&session)));
        Ok(session)
    }

    // Skip the url, it carries the tokens
    #[tracing::instrument(skip(self, callback_url))]
    async fn session_from_oauth_callback(
        &self,
        callback_url: &str,
    ) -> anyhow::Result<Arc<Session>> {
        let params = CallbackParams::parse(callback_url)?;
        let user = self.user_for_token(params.access_token.expose_secret()).await?;
        let session = Arc::new(Session {
            access_token: params.access_token,
            refresh_token: params.refresh_token,
            expires_at: params.expires_at,
            user,
        });
        self.store_and_emit(AuthChangeKind::SignedIn, Some(Arc::clone(&session)));
        Ok(session)
    }
}

impl Debug for SupabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseBackend")
            .field("base_url", &self.base_url)
            .field("is_signed_in", &self.current_session().is_some())
            .finish_non_exhaustive()
    }
}

/// Tokens handed back by the OAuth redirect, either in the fragment or in the
/// query string
struct CallbackParams {
    access_token: SecretString,
    refresh_token: SecretString,
    expires_at: Timestamp,
}

impl CallbackParams {
    fn parse(callback_url: &str) -> anyhow::Result<Self> {
        let url = Url::parse(callback_url).context("callback is not a valid url")?;
        // Reuse the query parser for the fragment
        let params_source = match url.fragment() {
            Some(fragment) if !fragment.is_empty() => {
                Url::parse(&format!("http://callback.invalid/?{fragment}"))
                    .context("callback fragment is malformed")?
            }
            _ => url,
        };
        let mut access_token = None;
        let mut refresh_token = None;
        let mut expires_in = None;
        let mut expires_at = None;
        let mut error = None;
        let mut error_description = None;
        for (key, value) in params_source.query_pairs() {
            match key.as_ref() {
                "access_token" => access_token = Some(value.into_owned()),
                "refresh_token" => refresh_token = Some(value.into_owned()),
                "expires_in" => expires_in = value.parse::<u64>().ok(),
                "expires_at" => expires_at = value.parse::<u64>().ok(),
                "error" => error = Some(value.into_owned()),
                "error_description" => error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        if let Some(description) = error_description.or(error) {
            bail!("sign in was not completed: {description}");
        }
        let access_token = access_token.context("callback is missing the access token")?;
        let refresh_token = refresh_token.context("callback is missing the refresh token")?;
        let expires_at = match (expires_at, expires_in) {
            (Some(at), _) => Timestamp::from_secs_since_epoch(at),
            (None, Some(secs)) => Timestamp::now() + Seconds::new(secs),
            (None, None) => bail!("callback is missing the expiry"),
        };
        Ok(Self {
            access_token: SecretString::from(access_token),
            refresh_token: SecretString::from(refresh_token),
            expires_at,
        })
    }
}

#[tracing::instrument(err(Debug))]
async fn process_empty(response: reqwest::Result<reqwest::Response>) -> anyhow::Result<()> {
    let (response, status) = extract_response(response)?;
    if status.is_success() {
        Ok(())
    } else {
        Err(handle_error(response).await)
    }
}

#[tracing::instrument(err(Debug))]
async fn process_json_body<T>(response: reqwest::Result<reqwest::Response>) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let (response, status) = extract_response(response)?;
    if status.is_success() {
        Ok(response
            .json()
            .await
            .context("failed to parse result as json")?)
    } else {
        Err(handle_error(response).await)
    }
}

/// Prefers the backend's own message fields over the raw body
#[tracing::instrument(ret)]
async fn handle_error(response: reqwest::Response) -> anyhow::Error {
    let status = response.status();
    debug_assert!(
        !status.is_success(),
        "this is supposed to be an error, right? Status code is: {status}"
    );
    let Ok(body) = response.text().await else {
        return anyhow!("failed to get response body");
    };
    error_from_body(status, &body)
}

fn error_from_body(status: StatusCode, body: &str) -> anyhow::Error {
    if body.is_empty() {
        return anyhow!("request failed with status code: {status} and no body");
    }
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|field| json.get(field).and_then(|v| v.as_str()).map(String::from))
        });
    match message {
        Some(message) => anyhow!("{message} ({status})"),
        None => anyhow!("{body}"),
    }
}

/// Provides a way to standardize the error message
fn extract_response(
    response: reqwest::Result<reqwest::Response>,
) -> anyhow::Result<(reqwest::Response, StatusCode)> {
    if let Err(e) = &response {
        info!("Response is err: {e:#?}");
    }
    let response = response.context("failed to send request")?;
    let status = response.status();
    Ok((response, status))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use trainer_shared::config::ClientConfig;

    use crate::testing::{fake_session, MemorySessionStore};

    use super::*;

    fn backend_over(store: &MemorySessionStore) -> SupabaseBackend {
        let config = ClientConfig::new(
            "https://project.example.co/",
            SecretString::from("public-key"),
            "http://localhost:8080/auth/callback",
        );
        SupabaseBackend::new(&config.backend, Box::new(store.clone())).unwrap()
    }

    fn backend() -> SupabaseBackend {
        backend_over(&MemorySessionStore::default())
    }

    #[tokio::test]
    async fn oauth_url_includes_provider_and_redirect() {
        let url = backend()
            .sign_in_with_oauth(OAuthProvider::Github)
            .await
            .unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            [
                ("provider".to_string(), "github".to_string()),
                (
                    "redirect_to".to_string(),
                    "http://localhost:8080/auth/callback".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn no_session_without_sign_in() {
        let actual = backend().get_current_session().await.unwrap();
        assert!(actual.is_none());
    }

    #[tokio::test]
    async fn session_survives_a_restart() {
        let store = MemorySessionStore::default();
        let session = fake_session(9);
        let first = backend_over(&store);
        first.store_and_emit(AuthChangeKind::SignedIn, Some(Arc::clone(&session)));
        assert!(store.has_session());

        let restarted = backend_over(&store);
        let actual = restarted.get_current_session().await.unwrap().unwrap();

        assert_eq!(actual.user_id(), session.user_id());
        assert_eq!(
            actual.access_token.expose_secret(),
            session.access_token.expose_secret()
        );
    }

    #[tokio::test]
    async fn signed_out_session_is_forgotten() {
        let store = MemorySessionStore::default();
        let first = backend_over(&store);
        first.store_and_emit(AuthChangeKind::SignedIn, Some(fake_session(9)));

        first.store_and_emit(AuthChangeKind::SignedOut, None);

        assert!(!store.has_session());
        let actual = backend_over(&store).get_current_session().await.unwrap();
        assert!(actual.is_none());
    }

    #[tokio::test]
    async fn sign_out_without_session_is_a_no_op() {
        let backend = backend();
        let mut subscription = backend.subscribe_auth_changes();

        backend.sign_out().await.unwrap();

        assert!(subscription.try_next_event().is_none());
    }

    #[test]
    fn callback_tokens_read_from_fragment() {
        let actual = CallbackParams::parse(
            "http://localhost:8080/auth/callback#access_token=abc&refresh_token=def&expires_at=1700000000&token_type=bearer",
        )
        .unwrap();

        assert_eq!(actual.access_token.expose_secret(), "abc");
        assert_eq!(actual.refresh_token.expose_secret(), "def");
        assert_eq!(
            actual.expires_at,
            Timestamp::from_secs_since_epoch(1_700_000_000)
        );
    }

    #[rstest]
    #[case::provider_error(
        "http://localhost/cb#error=access_denied&error_description=User+cancelled",
        "User cancelled"
    )]
    #[case::missing_token("http://localhost/cb?refresh_token=def&expires_in=60", "access token")]
    #[case::missing_expiry("http://localhost/cb#access_token=a&refresh_token=b", "expiry")]
    fn bad_callbacks(#[case] url: &str, #[case] expected_fragment: &str) {
        let actual = CallbackParams::parse(url).err().unwrap().to_string();
        assert!(actual.contains(expected_fragment), "{actual}");
    }

    #[rstest]
    #[case::gotrue_msg(r#"{"code":400,"msg":"Invalid login credentials"}"#, "Invalid login credentials (400 Bad Request)")]
    #[case::postgrest_message(r#"{"message":"permission denied"}"#, "permission denied (400 Bad Request)")]
    #[case::plain_text("boom", "boom")]
    #[case::empty("", "request failed with status code: 400 Bad Request and no body")]
    fn error_messages(#[case] body: &str, #[case] expected: &str) {
        let actual = error_from_body(StatusCode::BAD_REQUEST, body);
        assert_eq!(actual.to_string(), expected);
    }

    #[test]
    fn token_response_without_expires_at_uses_expires_in() {
        let json = r#"{
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": {"id": "0b7a3f9d-1f2e-4c5d-8e9f-a0b1c2d3e4f5", "email": "a@b.com"}
        }"#;
        let token: TokenResponse = serde_json::from_str(json).unwrap();

        let session = token.into_session(Timestamp::from_secs_since_epoch(1_000));

        assert_eq!(session.expires_at, Timestamp::from_secs_since_epoch(4_600));
        assert_eq!(session.user.email.as_deref(), Some("a@b.com"));
    }

    #[test]
    fn sign_up_without_session_is_user_only() {
        let json = r#"{"id": "0b7a3f9d-1f2e-4c5d-8e9f-a0b1c2d3e4f5", "email": "a@b.com"}"#;
        let actual: SignUpResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(actual, SignUpResponse::UserOnly(_)));
    }
}
