//! CLI command handlers.

use std::path::PathBuf;

use dbxauth_config::{DbxAuthConfig, LoadedConfig, OAuthSection};
use dbxauth_oauth::OAuthConfig;

pub mod config;
pub mod login;
pub mod pkce;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Resolved user config directory, if any.
    pub config_dir: Option<PathBuf>,
    /// Merged config file layers.
    pub loaded: LoadedConfig,
}

/// Compiled-in Dropbox values with the config file overrides applied.
pub fn oauth_config(section: &OAuthSection) -> OAuthConfig {
    let mut config = OAuthConfig::dropbox();
    if let Some(client_id) = &section.client_id {
        config.client_id = client_id.clone();
    }
    if let Some(redirect_uri) = &section.redirect_uri {
        config.redirect_uri = redirect_uri.clone();
    }
    if let Some(authorize_url) = &section.authorize_url {
        config.authorize_url = authorize_url.clone();
    }
    if let Some(token_url) = &section.token_url {
        config.token_url = token_url.clone();
    }
    if let Some(token_access_type) = &section.token_access_type {
        config.token_access_type = token_access_type.clone();
    }
    config
}

/// The merged config with every default spelled out.
pub fn effective_config(config: &DbxAuthConfig) -> DbxAuthConfig {
    let oauth = oauth_config(&config.oauth);
    let mut effective = config.clone();
    effective.oauth = OAuthSection {
        client_id: Some(oauth.client_id),
        redirect_uri: Some(oauth.redirect_uri),
        authorize_url: Some(oauth.authorize_url),
        token_url: Some(oauth.token_url),
        token_access_type: Some(oauth.token_access_type),
    };
    effective.callback.timeout_secs = Some(
        config
            .callback
            .timeout()
            .map(|t| t.as_secs())
            .unwrap_or_default(),
    );
    effective.logging.file = Some(config.logging.file_enabled());
    effective
}

/// Mask a secret for display, keeping four characters at each end.
pub fn mask_secret(value: &str) -> String {
    if value.is_ascii() && value.len() > 8 {
        format!("{}...{}", &value[..4], &value[value.len() - 4..])
    } else {
        "****".to_string()
    }
}
