//! Keeps the signed in session between runs so a restart (or a page reload)
//! does not sign the user out

use anyhow::Context as _;
use secrecy::{ExposeSecret as _, SecretString};
use std::fmt::Debug;
use trainer_shared::session::{Session, User};
use trainer_time::Timestamp;

pub trait SessionStore: Debug + Send + Sync + 'static {
    /// `Ok(None)` if nothing was saved
    fn load(&self) -> anyhow::Result<Option<Session>>;

    /// Saving `None` forgets the stored session
    fn save(&self, session: Option<&Session>) -> anyhow::Result<()>;
}

/// What gets written out. The tokens are only exposed for as long as it takes
/// to serialize them.
#[derive(serde::Serialize, serde::Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: String,
    expires_at: Timestamp,
    user: User,
}

impl From<&Session> for StoredSession {
    fn from(value: &Session) -> Self {
        Self {
            access_token: value.access_token.expose_secret().to_string(),
            refresh_token: value.refresh_token.expose_secret().to_string(),
            expires_at: value.expires_at,
            user: value.user.clone(),
        }
    }
}

impl From<StoredSession> for Session {
    fn from(value: StoredSession) -> Self {
        Self {
            access_token: SecretString::from(value.access_token),
            refresh_token: SecretString::from(value.refresh_token),
            expires_at: value.expires_at,
            user: value.user,
        }
    }
}

pub(crate) fn session_to_json(session: &Session) -> anyhow::Result<String> {
    serde_json::to_string(&StoredSession::from(session)).context("failed to serialize session")
}

pub(crate) fn session_from_json(json: &str) -> anyhow::Result<Session> {
    let stored: StoredSession =
        serde_json::from_str(json).context("stored session is not valid")?;
    Ok(stored.into())
}

/// Saves the session as json in a file (native only)
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FileSessionStore {
    pub fn new<P: Into<std::path::PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl SessionStore for FileSessionStore {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {:?}", self.path))?;
        session_from_json(&json).map(Some)
    }

    fn save(&self, session: Option<&Session>) -> anyhow::Result<()> {
        match session {
            Some(session) => std::fs::write(&self.path, session_to_json(session)?)
                .with_context(|| format!("failed to write {:?}", self.path)),
            None if self.path.exists() => std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {:?}", self.path)),
            None => Ok(()),
        }
    }
}

/// Saves the session in the browser's local storage
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone)]
pub struct BrowserSessionStore {
    key: String,
}

#[cfg(target_arch = "wasm32")]
impl BrowserSessionStore {
    pub fn new<S: Into<String>>(key: S) -> Self {
        Self { key: key.into() }
    }

    fn storage() -> anyhow::Result<web_sys::Storage> {
        web_sys::window()
            .context("no window found")?
            .local_storage()
            .map_err(|e| anyhow::anyhow!("local storage not accessible: {e:?}"))?
            .context("local storage not available")
    }
}

#[cfg(target_arch = "wasm32")]
impl SessionStore for BrowserSessionStore {
    fn load(&self) -> anyhow::Result<Option<Session>> {
        let json = Self::storage()?
            .get_item(&self.key)
            .map_err(|e| anyhow::anyhow!("failed to read local storage: {e:?}"))?;
        json.as_deref().map(session_from_json).transpose()
    }

    fn save(&self, session: Option<&Session>) -> anyhow::Result<()> {
        let storage = Self::storage()?;
        let result = match session {
            Some(session) => storage.set_item(&self.key, &session_to_json(session)?),
            None => storage.remove_item(&self.key),
        };
        result.map_err(|e| anyhow::anyhow!("failed to write local storage: {e:?}"))
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::fake_session_with_org;

    use super::*;

    #[test]
    fn tokens_and_user_survive_storage() {
        let session = fake_session_with_org(4, "Squad");

        let actual = session_from_json(&session_to_json(&session).unwrap()).unwrap();

        assert_eq!(
            actual.access_token.expose_secret(),
            session.access_token.expose_secret()
        );
        assert_eq!(
            actual.refresh_token.expose_secret(),
            session.refresh_token.expose_secret()
        );
        assert_eq!(actual.expires_at, session.expires_at);
        assert_eq!(actual.user, session.user);
    }

    #[test]
    fn corrupt_data_is_an_error() {
        assert!(session_from_json("{not json").is_err());
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn file_store_saves_and_forgets() {
        let path = std::env::temp_dir().join(format!("trainer-session-{}.json", std::process::id()));
        let store = FileSessionStore::new(&path);
        assert!(store.load().unwrap().is_none(), "nothing saved yet");

        let session = fake_session_with_org(5, "Squad");
        store.save(Some(&session)).unwrap();
        let actual = FileSessionStore::new(&path).load().unwrap().unwrap();
        assert_eq!(actual.user_id(), session.user_id());

        store.save(None).unwrap();
        assert!(!path.exists());
        assert!(store.load().unwrap().is_none());
    }
}
