//! Login command - browser authorization and code-for-token exchange.

use std::process::ExitCode;

use anyhow::{Context as _, Result};
use clap::Args;

use dbxauth_config::{is_loopback_uri, timeout_from_secs};
use dbxauth_oauth::{
    CallbackEndpoint, CallbackListener, CallbackOutcome, OAuthConfig, PkceChallenge,
    TokenExchangeRequest, build_authorization_url, exchange_code,
};

use super::{Context, mask_secret, oauth_config};

/// Exit status when no authorization code was captured.
const EXIT_NO_CODE: u8 = 1;

/// Argument ids of [`LoginArgs`].
pub const ARG_IDS: [&str; 5] = ["client_id", "redirect_uri", "timeout", "no_browser", "redact"];

/// Arguments for the login command.
#[derive(Args, Debug, Default, Clone)]
pub struct LoginArgs {
    /// Dropbox app key (overrides config)
    #[arg(long, env = "DBXAUTH_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Redirect URI registered with the app; the listener binds its host and port
    #[arg(long, env = "DBXAUTH_REDIRECT_URI")]
    pub redirect_uri: Option<String>,

    /// Seconds to wait for the browser redirect (0 waits forever)
    #[arg(long, env = "DBXAUTH_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Print the authorization URL without opening a browser
    #[arg(long)]
    pub no_browser: bool,

    /// Mask the authorization code and verifier in the printed request
    #[arg(long)]
    pub redact: bool,
}

impl LoginArgs {
    fn apply(&self, mut config: OAuthConfig) -> OAuthConfig {
        if let Some(client_id) = &self.client_id {
            config.client_id = client_id.clone();
        }
        if let Some(redirect_uri) = &self.redirect_uri {
            config.redirect_uri = redirect_uri.clone();
        }
        config
    }
}

/// Run the login command.
pub async fn run(args: LoginArgs, ctx: &Context) -> Result<ExitCode> {
    let config = args.apply(oauth_config(&ctx.loaded.config.oauth));
    let timeout = match args.timeout {
        Some(secs) => timeout_from_secs(secs),
        None => ctx.loaded.config.callback.timeout(),
    };
    let endpoint = CallbackEndpoint::from_redirect_uri(&config.redirect_uri)?;
    if !is_loopback_uri(&config.redirect_uri) {
        tracing::warn!(
            redirect_uri = %config.redirect_uri,
            "Redirect URI is not a loopback address; the browser may not reach this listener"
        );
    }

    let pkce = PkceChallenge::generate();
    tracing::debug!(client_id = %config.client_id, "Generated PKCE pair");

    let listener = CallbackListener::bind(&endpoint).await?;
    tracing::info!(
        addr = %endpoint.authority(),
        path = %endpoint.path,
        ?timeout,
        "Waiting for authorization redirect"
    );
    let callback = listener.spawn(timeout);

    let auth_url = build_authorization_url(&config, &pkce.challenge);
    if args.no_browser {
        println!("Open this URL in your browser to authorize Dropbox access:");
        println!("URL: {}", auth_url);
    } else {
        println!("Opening browser to authorize Dropbox access...");
        println!("URL: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            tracing::warn!(error = %e, "Could not open browser");
            println!("(Could not open browser automatically; open the URL above)");
        }
    }

    let outcome = callback
        .await
        .context("callback listener task failed")??;

    let code = match outcome {
        CallbackOutcome::Code(code) => code,
        other => {
            println!("Authorization failed.");
            println!("Reason: {}", other);
            return Ok(ExitCode::from(EXIT_NO_CODE));
        }
    };

    let request = TokenExchangeRequest::new(&config, &code, &pkce.verifier);

    println!();
    println!("Exchanging code for token...");
    println!("URL: {}", config.token_url);
    println!("Data:");
    for (key, value) in request.fields() {
        let shown = if args.redact && matches!(key, "code" | "code_verifier") {
            mask_secret(value)
        } else {
            value.to_string()
        };
        println!("  {}: {}", key, shown);
    }

    let response = exchange_code(&config, &request).await?;

    println!();
    println!("Token response:");
    println!("{}", response.body);

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = LoginArgs {
            client_id: Some("cli-key".to_string()),
            redirect_uri: Some("http://127.0.0.1:9000/cb".to_string()),
            ..Default::default()
        };
        let config = args.apply(OAuthConfig::dropbox());
        assert_eq!(config.client_id, "cli-key");
        assert_eq!(config.redirect_uri, "http://127.0.0.1:9000/cb");
        assert_eq!(config.token_url, "https://api.dropboxapi.com/oauth2/token");
    }

    #[test]
    fn test_arg_ids_match_definitions() {
        use clap::CommandFactory;

        #[derive(clap::Parser)]
        #[allow(dead_code)]
        struct Wrapper {
            #[command(flatten)]
            login: LoginArgs,
        }

        let command = Wrapper::command();
        for id in ARG_IDS {
            assert!(
                command.get_arguments().any(|a| a.get_id() == id),
                "missing argument {}",
                id
            );
        }
        let defined = command
            .get_arguments()
            .filter(|a| a.get_id() != "help")
            .count();
        assert_eq!(defined, ARG_IDS.len());
    }

    #[test]
    fn test_no_args_keep_config() {
        let config = LoginArgs::default().apply(OAuthConfig::dropbox());
        assert_eq!(config, OAuthConfig::dropbox());
    }
}
