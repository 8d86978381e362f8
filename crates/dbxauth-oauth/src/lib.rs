//! OAuth 2.0 authorization-code flow with PKCE for Dropbox.
//!
//! # Components
//!
//! - [`pkce`]: verifier generation and S256 challenge derivation
//! - [`callback`]: one-shot localhost listener that captures the redirect
//! - [`oauth`]: authorization URL builder and code-for-token exchange
//!
//! Tokens are returned raw; storing or refreshing them is left to the caller.

pub mod callback;
pub mod error;
pub mod oauth;
pub mod pkce;

pub use callback::{CallbackEndpoint, CallbackListener, CallbackOutcome};
pub use error::{OAuthError, Result};
pub use oauth::{
    OAuthConfig, TokenExchangeRequest, TokenResponse, build_authorization_url, exchange_code,
};
pub use pkce::PkceChallenge;
