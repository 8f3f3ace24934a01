//! Settings the client needs before it can talk to the backend
//!
//! Natively these are read from `configuration/base.toml` (optional) with
//! environment variable overrides using the prefix `APP` and `__` as the
//! separator. E.g. `APP_BACKEND__URL=https://x.supabase.co` sets
//! `ClientConfig.backend.url`. For the web build the same variables are read at
//! compile time.

use secrecy::{ExposeSecret as _, SecretString};
use serde_aux::field_attributes::deserialize_number_from_string;
use trainer_time::Seconds;

use crate::const_config::client::{
    CLIENT_DEFAULT_EDGE_SPACING, CLIENT_HAS_ORG_STALE_TIME, CLIENT_REQUEST_TIMEOUT,
    CLIENT_SESSION_FILE,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("required setting `{0}` is missing or empty")]
    Missing(&'static str),
    #[error("setting `{name}` is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
    #[error("failed to load configuration: {0}")]
    Load(String),
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct ClientConfig {
    pub backend: BackendSettings,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub ui: UiSettings,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct BackendSettings {
    pub url: String,
    /// Public (anon) key, sent with every request
    pub anon_key: SecretString,
    /// Where the OAuth provider sends the user back to
    pub auth_callback_url: String,
    #[serde(
        default = "default_request_timeout_secs",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub request_timeout_secs: u64,
    /// Where the native client keeps the session between runs (the web build
    /// uses local storage instead)
    #[serde(default = "default_session_file")]
    pub session_file: String,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct CacheSettings {
    #[serde(
        default = "default_has_organization_stale_secs",
        deserialize_with = "deserialize_number_from_string"
    )]
    pub has_organization_stale_secs: u64,
}

#[derive(serde::Deserialize, Clone, Debug)]
pub struct UiSettings {
    /// Space kept free on each side of the content column
    #[serde(default = "default_edge_spacing")]
    pub edge_spacing: f32,
}

fn default_edge_spacing() -> f32 {
    CLIENT_DEFAULT_EDGE_SPACING
}

impl Default for UiSettings {
    fn default() -> Self {
        Self {
            edge_spacing: default_edge_spacing(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    CLIENT_REQUEST_TIMEOUT.as_u64()
}

fn default_session_file() -> String {
    CLIENT_SESSION_FILE.to_string()
}

fn default_has_organization_stale_secs() -> u64 {
    CLIENT_HAS_ORG_STALE_TIME.as_u64()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            has_organization_stale_secs: default_has_organization_stale_secs(),
        }
    }
}

impl CacheSettings {
    pub fn has_organization_stale_time(&self) -> Seconds {
        Seconds::new(self.has_organization_stale_secs)
    }
}

impl BackendSettings {
    pub fn request_timeout(&self) -> Seconds {
        Seconds::new(self.request_timeout_secs)
    }

    /// Url without any trailing slash so paths can be appended directly
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

impl ClientConfig {
    pub fn new<S: Into<String>>(url: S, anon_key: SecretString, auth_callback_url: S) -> Self {
        Self {
            backend: BackendSettings {
                url: url.into(),
                anon_key,
                auth_callback_url: auth_callback_url.into(),
                request_timeout_secs: default_request_timeout_secs(),
                session_file: default_session_file(),
            },
            cache: Default::default(),
            ui: Default::default(),
        }
    }

    /// Missing settings are fatal so this should be called before anything
    /// else starts
    pub fn validate(self) -> Result<Self, ConfigError> {
        let backend = &self.backend;
        if backend.url.trim().is_empty() {
            return Err(ConfigError::Missing("backend.url"));
        }
        if !backend.url.starts_with("http") {
            return Err(ConfigError::Invalid {
                name: "backend.url",
                reason: format!("expected an http(s) url but got {:?}", backend.url),
            });
        }
        if backend.anon_key.expose_secret().trim().is_empty() {
            return Err(ConfigError::Missing("backend.anon_key"));
        }
        if backend.auth_callback_url.trim().is_empty() {
            return Err(ConfigError::Missing("backend.auth_callback_url"));
        }
        Ok(self)
    }

    /// Reads the settings baked in at compile time (used by the web build)
    pub fn from_build_env() -> Result<Self, ConfigError> {
        let url = option_env!("APP_BACKEND__URL").ok_or(ConfigError::Missing("backend.url"))?;
        let anon_key =
            option_env!("APP_BACKEND__ANON_KEY").ok_or(ConfigError::Missing("backend.anon_key"))?;
        let callback = option_env!("APP_BACKEND__AUTH_CALLBACK_URL")
            .ok_or(ConfigError::Missing("backend.auth_callback_url"))?;
        tracing::debug!(url, callback, "using configuration baked into the build");
        Self::new(url, SecretString::from(anon_key), callback).validate()
    }
}

/// Loads and validates the configuration from `configuration_directory` and
/// the environment
#[cfg(not(target_arch = "wasm32"))]
pub fn get_configuration(
    configuration_directory: &std::path::Path,
) -> Result<ClientConfig, ConfigError> {
    let settings = config::Config::builder()
        .add_source(
            config::File::from(configuration_directory.join("base.toml")).required(false),
        )
        // Add in settings from environment variables (with a prefix of APP and '__' as separator)
        // E.g. `APP_BACKEND__URL=https://... would set `ClientConfig.backend.url`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .map_err(|e| ConfigError::Load(e.to_string()))?;

    tracing::debug!(?configuration_directory, "loading configuration");
    settings
        .try_deserialize::<ClientConfig>()
        .map_err(|e| ConfigError::Load(e.to_string()))?
        .validate()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn config(url: &str, key: &str, callback: &str) -> ClientConfig {
        ClientConfig::new(url, SecretString::from(key), callback)
    }

    #[rstest]
    #[case::url(config("", "key", "http://cb"), "backend.url")]
    #[case::key(config("http://x", " ", "http://cb"), "backend.anon_key")]
    #[case::callback(config("http://x", "key", ""), "backend.auth_callback_url")]
    fn missing_settings_are_rejected(#[case] config: ClientConfig, #[case] expected: &str) {
        let actual = config.validate().unwrap_err();
        assert!(
            matches!(actual, ConfigError::Missing(name) if name == expected),
            "{actual:?}"
        );
    }

    #[test]
    fn non_http_url_is_rejected() {
        let actual = config("ftp://x", "key", "http://cb").validate().unwrap_err();
        assert!(matches!(actual, ConfigError::Invalid { .. }));
    }

    #[test]
    fn base_url_drops_trailing_slash() {
        let config = config("https://x.example.co/", "key", "http://cb");
        assert_eq!(config.backend.base_url(), "https://x.example.co");
    }

    #[test]
    fn defaults_applied() {
        let config = config("https://x", "key", "http://cb");
        assert_eq!(config.backend.request_timeout(), CLIENT_REQUEST_TIMEOUT);
        assert_eq!(config.backend.session_file, CLIENT_SESSION_FILE);
        assert_eq!(config.ui.edge_spacing, CLIENT_DEFAULT_EDGE_SPACING);
        assert_eq!(
            config.cache.has_organization_stale_time(),
            CLIENT_HAS_ORG_STALE_TIME
        );
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn loads_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("trainer-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("base.toml"),
            r#"
[backend]
url = "https://x.example.co"
anon_key = "public-key"
auth_callback_url = "http://localhost:8080/auth/callback"
request_timeout_secs = "12"

[ui]
edge_spacing = 12.0
"#,
        )
        .unwrap();

        let actual = get_configuration(&dir).unwrap();

        assert_eq!(actual.backend.url, "https://x.example.co");
        assert_eq!(actual.backend.request_timeout(), Seconds::new(12));
        assert_eq!(actual.ui.edge_spacing, 12.0);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
