//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [oauth]                  # Dropbox app overrides
//! [callback]               # redirect wait settings
//! [logging]                # JSON log file
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Seconds to wait for the browser redirect when nothing is configured.
pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All fields are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DbxAuthConfig {
    /// Dropbox app overrides.
    pub oauth: OAuthSection,

    /// Callback listener settings.
    pub callback: CallbackSection,

    /// Log file settings.
    pub logging: LoggingSection,
}

impl DbxAuthConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is per field: a layer that only sets `[oauth] client_id`
    /// keeps the redirect URI from the layer below.
    pub fn merge(&mut self, other: DbxAuthConfig) {
        self.oauth.merge(other.oauth);
        self.callback.merge(other.callback);
        self.logging.merge(other.logging);
    }
}

fn overlay<T>(base: &mut Option<T>, other: Option<T>) {
    if other.is_some() {
        *base = other;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [oauth]
// ─────────────────────────────────────────────────────────────────────────────

/// Overrides for the Dropbox app registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthSection {
    /// Dropbox app key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Redirect URI registered with the app; also where the listener binds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub authorize_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    /// `offline` requests a refresh token; `online` a short-lived token only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_access_type: Option<String>,
}

impl OAuthSection {
    fn merge(&mut self, other: OAuthSection) {
        overlay(&mut self.client_id, other.client_id);
        overlay(&mut self.redirect_uri, other.redirect_uri);
        overlay(&mut self.authorize_url, other.authorize_url);
        overlay(&mut self.token_url, other.token_url);
        overlay(&mut self.token_access_type, other.token_access_type);
    }

    /// Whether the redirect URI points somewhere the local listener can
    /// actually receive it.
    pub fn redirect_is_loopback(&self) -> bool {
        self.redirect_uri.as_deref().is_none_or(is_loopback_uri)
    }
}

/// Whether `uri` names `localhost` or a loopback IP address.
pub fn is_loopback_uri(uri: &str) -> bool {
    let Ok(url) = url::Url::parse(uri) else {
        return false;
    };
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// [callback]
// ─────────────────────────────────────────────────────────────────────────────

/// Callback listener settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallbackSection {
    /// Seconds to wait for the browser redirect. `0` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl CallbackSection {
    fn merge(&mut self, other: CallbackSection) {
        overlay(&mut self.timeout_secs, other.timeout_secs);
    }

    /// Effective wait, `None` meaning no limit.
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs.unwrap_or(DEFAULT_CALLBACK_TIMEOUT_SECS))
    }
}

/// Convert a seconds setting into a wait limit; `0` disables the limit.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

// ─────────────────────────────────────────────────────────────────────────────
// [logging]
// ─────────────────────────────────────────────────────────────────────────────

/// JSON log file settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Write a daily-rotated JSON log. Default: true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<bool>,

    /// Log directory. Default: `<config dir>/logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl LoggingSection {
    fn merge(&mut self, other: LoggingSection) {
        overlay(&mut self.file, other.file);
        overlay(&mut self.directory, other.directory);
    }

    pub fn file_enabled(&self) -> bool {
        self.file.unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = DbxAuthConfig::new();
        assert!(config.oauth.client_id.is_none());
        assert!(config.oauth.redirect_uri.is_none());
        assert!(config.callback.timeout_secs.is_none());
        assert!(config.logging.file_enabled());
    }

    #[test]
    fn test_parse_minimal() {
        let toml = r#"
[oauth]
client_id = "my-app-key"
"#;
        let config = DbxAuthConfig::from_toml(toml).unwrap();
        assert_eq!(config.oauth.client_id.as_deref(), Some("my-app-key"));
        assert!(config.oauth.token_url.is_none());
    }

    #[test]
    fn test_parse_full_example() {
        let toml = r#"
[oauth]
client_id = "key"
redirect_uri = "http://127.0.0.1:9999/done"
authorize_url = "https://example.test/authorize"
token_url = "https://example.test/token"
token_access_type = "online"

[callback]
timeout_secs = 60

[logging]
file = false
directory = "/tmp/dbxauth-logs"
"#;
        let config = DbxAuthConfig::from_toml(toml).unwrap();
        assert_eq!(
            config.oauth.redirect_uri.as_deref(),
            Some("http://127.0.0.1:9999/done")
        );
        assert_eq!(config.oauth.token_access_type.as_deref(), Some("online"));
        assert_eq!(config.callback.timeout(), Some(Duration::from_secs(60)));
        assert!(!config.logging.file_enabled());
        assert_eq!(
            config.logging.directory,
            Some(PathBuf::from("/tmp/dbxauth-logs"))
        );
    }

    #[test]
    fn test_timeout_defaults_and_zero() {
        let mut callback = CallbackSection::default();
        assert_eq!(
            callback.timeout(),
            Some(Duration::from_secs(DEFAULT_CALLBACK_TIMEOUT_SECS))
        );

        callback.timeout_secs = Some(0);
        assert_eq!(callback.timeout(), None);
    }

    #[test]
    fn test_merge_is_per_field() {
        let mut base = DbxAuthConfig::from_toml(
            r#"
[oauth]
client_id = "base-key"
redirect_uri = "http://localhost:8081/callback"

[callback]
timeout_secs = 30
"#,
        )
        .unwrap();
        let over = DbxAuthConfig::from_toml(
            r#"
[oauth]
client_id = "project-key"
"#,
        )
        .unwrap();

        base.merge(over);
        assert_eq!(base.oauth.client_id.as_deref(), Some("project-key"));
        assert_eq!(
            base.oauth.redirect_uri.as_deref(),
            Some("http://localhost:8081/callback")
        );
        assert_eq!(base.callback.timeout_secs, Some(30));
    }

    #[test]
    fn test_redirect_is_loopback() {
        let mut oauth = OAuthSection::default();
        assert!(oauth.redirect_is_loopback());

        oauth.redirect_uri = Some("http://127.0.0.1:8080/callback".to_string());
        assert!(oauth.redirect_is_loopback());

        oauth.redirect_uri = Some("http://[::1]:8080/callback".to_string());
        assert!(oauth.redirect_is_loopback());

        oauth.redirect_uri = Some("http://example.com/callback".to_string());
        assert!(!oauth.redirect_is_loopback());
    }

    #[test]
    fn test_is_loopback_uri() {
        assert!(is_loopback_uri("http://localhost:8080/callback"));
        assert!(is_loopback_uri("http://127.0.0.2:8080/callback"));
        assert!(is_loopback_uri("http://[::1]/cb"));
        assert!(!is_loopback_uri("http://0.0.0.0:8080/callback"));
        assert!(!is_loopback_uri("http://192.168.1.10:8080/callback"));
        assert!(!is_loopback_uri("not a url"));
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = DbxAuthConfig::new();
        config.oauth.client_id = Some("key".to_string());
        config.callback.timeout_secs = Some(0);

        let toml_str = config.to_toml().unwrap();
        assert!(!toml_str.contains("token_url"));
        let parsed = DbxAuthConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
