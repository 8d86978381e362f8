//! Dropbox authorization URL and authorization-code token exchange.

use serde::Serialize;

use crate::error::{OAuthError, Result};

/// Dropbox app key baked into the binary.
pub const DEFAULT_CLIENT_ID: &str = "qb3joeqf66gltdt";
/// Redirect URI registered for [`DEFAULT_CLIENT_ID`].
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/callback";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.dropbox.com/oauth2/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";
/// `offline` asks Dropbox for a refresh token alongside the access token.
pub const DEFAULT_TOKEN_ACCESS_TYPE: &str = "offline";

/// OAuth configuration for the Dropbox app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub token_access_type: String,
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::dropbox()
    }
}

impl OAuthConfig {
    /// Create OAuth config with the compiled-in Dropbox values.
    pub fn dropbox() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
            token_access_type: DEFAULT_TOKEN_ACCESS_TYPE.to_string(),
        }
    }
}

/// Build the authorization URL the user opens in a browser.
pub fn build_authorization_url(config: &OAuthConfig, challenge: &str) -> String {
    let params = [
        ("client_id", config.client_id.as_str()),
        ("redirect_uri", config.redirect_uri.as_str()),
        ("response_type", "code"),
        ("code_challenge", challenge),
        ("code_challenge_method", "S256"),
        ("token_access_type", config.token_access_type.as_str()),
    ];

    let query = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");

    format!("{}?{}", config.authorize_url, query)
}

/// Form body of the authorization-code token request.
#[derive(Debug, Clone, Serialize)]
pub struct TokenExchangeRequest {
    pub code: String,
    pub grant_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub code_verifier: String,
}

impl TokenExchangeRequest {
    /// `verifier` is the PKCE secret itself; the server hashes it and
    /// compares against the challenge it saw during authorization.
    pub fn new(config: &OAuthConfig, code: &str, verifier: &str) -> Self {
        Self {
            code: code.to_string(),
            grant_type: "authorization_code".to_string(),
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            code_verifier: verifier.to_string(),
        }
    }

    /// Fields in submission order, for display.
    pub fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("code", self.code.as_str()),
            ("grant_type", self.grant_type.as_str()),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code_verifier", self.code_verifier.as_str()),
        ]
    }
}

/// Raw token endpoint response. The body is not interpreted.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub status: u16,
    pub body: String,
}

impl TokenResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Submit the token request and return whatever the endpoint answered.
///
/// Only transport failures are errors; an `invalid_grant` body comes back
/// as an ordinary [`TokenResponse`].
pub async fn exchange_code(
    config: &OAuthConfig,
    request: &TokenExchangeRequest,
) -> Result<TokenResponse> {
    let client = reqwest::Client::new();
    let response = client
        .post(&config.token_url)
        .form(request)
        .send()
        .await
        .map_err(|e| OAuthError::Network(format!("Token exchange request failed: {}", e)))?;

    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| OAuthError::Network(format!("Failed to read token response: {}", e)))?;

    let token_response = TokenResponse { status, body };
    if token_response.is_success() {
        tracing::info!(status, "Token endpoint accepted the authorization code");
    } else {
        tracing::warn!(status, "Token endpoint returned an error response");
    }

    Ok(token_response)
}
