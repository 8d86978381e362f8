//! Error types for the OAuth flow.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, OAuthError>;

/// Errors that can occur during the authorization-code exchange.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Network/HTTP error talking to the token endpoint.
    #[error("Network error: {0}")]
    Network(String),

    /// The callback listener could not bind its address.
    #[error("Failed to bind callback listener on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// The callback listener stopped without delivering an outcome.
    #[error("Callback listener error: {0}")]
    Callback(String),

    /// Invalid redirect URI or other configuration problem.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for OAuthError {
    fn from(e: reqwest::Error) -> Self {
        OAuthError::Network(e.to_string())
    }
}
