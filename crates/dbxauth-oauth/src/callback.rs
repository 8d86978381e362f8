//! One-shot localhost listener that captures the OAuth redirect.
//!
//! The listener binds the host and port named by the registered redirect
//! URI, waits for the first request on the callback path, answers it, hands
//! the parsed [`CallbackOutcome`] back over a oneshot channel, and shuts
//! down. Requests to any other path get a 404 and do not consume the slot.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use url::Url;

use crate::error::{OAuthError, Result};

const SUCCESS_HTML: &str = "<html><body><h1>Authorization complete. You can close this window.</h1></body></html>";
const MISSING_CODE_HTML: &str = "<html><body><h1>Missing code parameter</h1></body></html>";
const DENIED_HTML: &str =
    "<html><body><h1>Authorization was not granted.</h1><p>You can close this window.</p></body></html>";
const ALREADY_HANDLED_HTML: &str =
    "<html><body><h1>This authorization callback was already handled.</h1></body></html>";

/// Upper bound on draining the in-flight response after the outcome is known.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Host, port and path the browser is redirected to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackEndpoint {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl CallbackEndpoint {
    /// Derive the listener endpoint from a redirect URI such as
    /// `http://localhost:8080/callback`.
    pub fn from_redirect_uri(redirect_uri: &str) -> Result<Self> {
        let url = Url::parse(redirect_uri).map_err(|e| {
            OAuthError::Config(format!("Invalid redirect URI '{}': {}", redirect_uri, e))
        })?;

        if url.scheme() != "http" {
            return Err(OAuthError::Config(format!(
                "Redirect URI must use http://, got '{}'",
                url.scheme()
            )));
        }

        let host = url
            .host_str()
            .ok_or_else(|| {
                OAuthError::Config(format!("Redirect URI '{}' has no host", redirect_uri))
            })?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();

        // The router treats these segments as captures, not literals.
        if url
            .path_segments()
            .into_iter()
            .flatten()
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            return Err(OAuthError::Config(format!(
                "Redirect URI path '{}' has a segment starting with ':' or '*'",
                url.path()
            )));
        }

        Ok(Self {
            host,
            port: url.port_or_known_default().unwrap_or(80),
            path: url.path().to_string(),
        })
    }

    /// `host:port`, for messages.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// What the single callback request delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    /// The redirect carried an authorization code.
    Code(String),
    /// The callback path was hit without a `code` parameter.
    MissingCode,
    /// The authorization server redirected back with `error=...`.
    ProviderError {
        error: String,
        description: Option<String>,
    },
    /// No callback arrived before the wait expired.
    TimedOut,
}

impl CallbackOutcome {
    pub fn code(&self) -> Option<&str> {
        match self {
            CallbackOutcome::Code(code) => Some(code.as_str()),
            _ => None,
        }
    }

    pub fn into_code(self) -> Option<String> {
        match self {
            CallbackOutcome::Code(code) => Some(code),
            _ => None,
        }
    }
}

impl fmt::Display for CallbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackOutcome::Code(_) => write!(f, "authorization code received"),
            CallbackOutcome::MissingCode => {
                write!(f, "callback did not include an authorization code")
            }
            CallbackOutcome::ProviderError {
                error,
                description: Some(description),
            } => write!(f, "authorization server returned '{}': {}", error, description),
            CallbackOutcome::ProviderError { error, .. } => {
                write!(f, "authorization server returned '{}'", error)
            }
            CallbackOutcome::TimedOut => {
                write!(f, "timed out waiting for the browser redirect")
            }
        }
    }
}

/// Parse the query string of a callback request.
///
/// The first non-empty `code` wins. An `error` without a code is a provider
/// denial; anything else is a missing code.
pub fn parse_callback_query(query: Option<&str>) -> CallbackOutcome {
    let mut code: Option<String> = None;
    let mut error: Option<String> = None;
    let mut description: Option<String> = None;

    if let Some(query) = query {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "code" if code.is_none() && !value.is_empty() => code = Some(value.into_owned()),
                "error" if error.is_none() && !value.is_empty() => {
                    error = Some(value.into_owned())
                }
                "error_description" if description.is_none() => {
                    description = Some(value.into_owned())
                }
                _ => {}
            }
        }
    }

    match (code, error) {
        (Some(code), _) => CallbackOutcome::Code(code),
        (None, Some(error)) => CallbackOutcome::ProviderError { error, description },
        (None, None) => CallbackOutcome::MissingCode,
    }
}

/// Shared state for the callback route: the one-shot result slot.
struct CallbackState {
    sender: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
}

fn callback_router(path: &str, state: Arc<CallbackState>) -> Router {
    Router::new()
        .route(path, get(handle_callback))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Handle GET on the callback path.
async fn handle_callback(
    State(state): State<Arc<CallbackState>>,
    RawQuery(query): RawQuery,
) -> Response {
    let Some(sender) = state.sender.lock().take() else {
        tracing::debug!("Ignoring callback after the outcome was delivered");
        return (StatusCode::GONE, Html(ALREADY_HANDLED_HTML)).into_response();
    };

    let outcome = parse_callback_query(query.as_deref());
    let (status, body) = match &outcome {
        CallbackOutcome::Code(_) => {
            tracing::info!("Authorization code received");
            (StatusCode::OK, SUCCESS_HTML)
        }
        CallbackOutcome::ProviderError { error, .. } => {
            tracing::warn!(%error, "Authorization server reported an error");
            (StatusCode::BAD_REQUEST, DENIED_HTML)
        }
        _ => {
            tracing::warn!("Callback request is missing the code parameter");
            (StatusCode::BAD_REQUEST, MISSING_CODE_HTML)
        }
    };

    if sender.send(outcome).is_err() {
        tracing::debug!("Callback outcome dropped; nobody is waiting");
    }

    (status, [(header::CONNECTION, "close")], Html(body)).into_response()
}

/// A bound, not yet serving, callback listener.
#[derive(Debug)]
pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind the endpoint. Fails when the port is already taken.
    pub async fn bind(endpoint: &CallbackEndpoint) -> Result<Self> {
        let listener = TcpListener::bind((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|source| OAuthError::Bind {
                addr: endpoint.authority(),
                source,
            })?;

        tracing::debug!(
            addr = ?listener.local_addr().ok(),
            path = %endpoint.path,
            "Callback listener bound"
        );

        Ok(Self {
            listener,
            path: endpoint.path.clone(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| OAuthError::Callback(format!("local_addr failed: {}", e)))
    }

    /// Serve until the callback path is hit once, then stop.
    ///
    /// `timeout` of `None` waits indefinitely; expiry yields
    /// [`CallbackOutcome::TimedOut`].
    pub async fn wait_for_callback(self, timeout: Option<Duration>) -> Result<CallbackOutcome> {
        let Self { listener, path } = self;

        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let state = Arc::new(CallbackState {
            sender: Mutex::new(Some(outcome_tx)),
        });
        let router = callback_router(&path, state);

        let mut server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, outcome_rx).await.ok(),
            None => Some(outcome_rx.await),
        };

        let _ = shutdown_tx.send(());
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await {
            Ok(Ok(Err(e))) => tracing::warn!(error = %e, "Callback server stopped with an error"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Callback server task failed"),
            Ok(Ok(Ok(()))) => tracing::debug!("Callback server stopped"),
            Err(_) => {
                tracing::warn!("Callback server did not drain in time; aborting");
                server.abort();
            }
        }

        match received {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(_)) => Err(OAuthError::Callback(
                "listener stopped before a callback arrived".to_string(),
            )),
            None => {
                tracing::warn!(?timeout, "Timed out waiting for the authorization redirect");
                Ok(CallbackOutcome::TimedOut)
            }
        }
    }

    /// Run [`wait_for_callback`](Self::wait_for_callback) on its own task.
    pub fn spawn(self, timeout: Option<Duration>) -> JoinHandle<Result<CallbackOutcome>> {
        tokio::spawn(self.wait_for_callback(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_router() -> (Router, oneshot::Receiver<CallbackOutcome>) {
        let (tx, rx) = oneshot::channel();
        let state = Arc::new(CallbackState {
            sender: Mutex::new(Some(tx)),
        });
        (callback_router("/callback", state), rx)
    }

    async fn get(router: Router, uri: &str) -> (StatusCode, String, Option<String>) {
        let response = router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap(), content_type)
    }

    fn loopback() -> CallbackEndpoint {
        CallbackEndpoint {
            host: "127.0.0.1".to_string(),
            port: 0,
            path: "/callback".to_string(),
        }
    }

    #[test]
    fn test_endpoint_from_default_redirect_uri() {
        let endpoint = CallbackEndpoint::from_redirect_uri("http://localhost:8080/callback").unwrap();
        assert_eq!(endpoint.host, "localhost");
        assert_eq!(endpoint.port, 8080);
        assert_eq!(endpoint.path, "/callback");
        assert_eq!(endpoint.authority(), "localhost:8080");
    }

    #[test]
    fn test_endpoint_defaults_port_and_path() {
        let endpoint = CallbackEndpoint::from_redirect_uri("http://127.0.0.1").unwrap();
        assert_eq!(endpoint.port, 80);
        assert_eq!(endpoint.path, "/");
    }

    #[test]
    fn test_endpoint_ipv6_host() {
        let endpoint = CallbackEndpoint::from_redirect_uri("http://[::1]:9000/cb").unwrap();
        assert_eq!(endpoint.host, "::1");
        assert_eq!(endpoint.authority(), "[::1]:9000");
    }

    #[test]
    fn test_endpoint_rejects_https_and_garbage() {
        assert!(matches!(
            CallbackEndpoint::from_redirect_uri("https://localhost/callback"),
            Err(OAuthError::Config(_))
        ));
        assert!(matches!(
            CallbackEndpoint::from_redirect_uri("not a url"),
            Err(OAuthError::Config(_))
        ));
    }

    #[test]
    fn test_endpoint_rejects_capture_segments() {
        for uri in [
            "http://127.0.0.1:8080/:cb",
            "http://127.0.0.1:8080/oauth/*rest",
        ] {
            let err = CallbackEndpoint::from_redirect_uri(uri).unwrap_err();
            assert!(matches!(err, OAuthError::Config(_)), "{}", uri);
        }

        let endpoint = CallbackEndpoint::from_redirect_uri("http://127.0.0.1:8080/cb:x").unwrap();
        assert_eq!(endpoint.path, "/cb:x");
    }

    #[tokio::test]
    async fn test_router_accepts_every_parsed_path() {
        for uri in [
            "http://localhost:8080/callback",
            "http://localhost:8080/",
            "http://localhost:8080/oauth/done",
            "http://localhost:8080/cb:x",
        ] {
            let endpoint = CallbackEndpoint::from_redirect_uri(uri).unwrap();
            let (tx, _rx) = oneshot::channel();
            let state = Arc::new(CallbackState {
                sender: Mutex::new(Some(tx)),
            });
            let router = callback_router(&endpoint.path, state);
            let (status, _, _) = get(router, &format!("{}?code=x", endpoint.path)).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
        }
    }

    #[test]
    fn test_parse_query_with_code() {
        assert_eq!(
            parse_callback_query(Some("code=ABC123")),
            CallbackOutcome::Code("ABC123".to_string())
        );
        assert_eq!(
            parse_callback_query(Some("state=x&code=a%2Fb&code=second")),
            CallbackOutcome::Code("a/b".to_string())
        );
    }

    #[test]
    fn test_parse_query_missing_code() {
        assert_eq!(parse_callback_query(None), CallbackOutcome::MissingCode);
        assert_eq!(parse_callback_query(Some("")), CallbackOutcome::MissingCode);
        assert_eq!(
            parse_callback_query(Some("code=")),
            CallbackOutcome::MissingCode
        );
        assert_eq!(
            parse_callback_query(Some("state=abc")),
            CallbackOutcome::MissingCode
        );
    }

    #[test]
    fn test_parse_query_provider_error() {
        let outcome =
            parse_callback_query(Some("error=access_denied&error_description=user+said+no"));
        assert_eq!(
            outcome,
            CallbackOutcome::ProviderError {
                error: "access_denied".to_string(),
                description: Some("user said no".to_string()),
            }
        );
        assert!(outcome.to_string().contains("access_denied"));
        assert!(outcome.code().is_none());
    }

    #[tokio::test]
    async fn test_callback_with_code_responds_ok() {
        let (router, mut rx) = test_router();
        let (status, body, content_type) = get(router, "/callback?code=ABC123").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Authorization complete"));
        assert!(content_type.unwrap().starts_with("text/html"));
        assert_eq!(rx.try_recv().unwrap(), CallbackOutcome::Code("ABC123".to_string()));
    }

    #[tokio::test]
    async fn test_callback_without_code_responds_bad_request() {
        let (router, mut rx) = test_router();
        let (status, body, content_type) = get(router, "/callback").await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("Missing code parameter"));
        assert!(content_type.unwrap().starts_with("text/html"));
        assert_eq!(rx.try_recv().unwrap(), CallbackOutcome::MissingCode);
    }

    #[tokio::test]
    async fn test_second_callback_is_rejected() {
        let (router, _rx) = test_router();
        let (status, _, _) = get(router.clone(), "/callback?code=first").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body, _) = get(router, "/callback?code=second").await;
        assert_eq!(status, StatusCode::GONE);
        assert!(body.contains("already handled"));
    }

    #[tokio::test]
    async fn test_other_path_does_not_consume_slot() {
        let (router, mut rx) = test_router();
        let (status, _, _) = get(router, "/favicon.ico").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(matches!(
            rx.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_listener_captures_code_over_tcp() {
        let listener = CallbackListener::bind(&loopback()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = listener.spawn(Some(Duration::from_secs(10)));

        let favicon = reqwest::get(format!("http://{}/favicon.ico", addr))
            .await
            .unwrap();
        assert_eq!(favicon.status().as_u16(), 404);

        let response = reqwest::get(format!("http://{}/callback?code=ABC123", addr))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.into_code().as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn test_listener_reports_missing_code_over_tcp() {
        let listener = CallbackListener::bind(&loopback()).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = listener.spawn(None);

        let response = reqwest::get(format!("http://{}/callback", addr))
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome, CallbackOutcome::MissingCode);
        assert!(outcome.into_code().is_none());
    }

    #[tokio::test]
    async fn test_listener_times_out() {
        let listener = CallbackListener::bind(&loopback()).await.unwrap();
        let outcome = listener
            .wait_for_callback(Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(outcome, CallbackOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_bind_fails_when_port_taken() {
        let taken = CallbackListener::bind(&loopback()).await.unwrap();
        let port = taken.local_addr().unwrap().port();

        let endpoint = CallbackEndpoint {
            port,
            ..loopback()
        };
        let err = CallbackListener::bind(&endpoint).await.unwrap_err();
        assert!(matches!(err, OAuthError::Bind { .. }));
        assert!(err.to_string().contains(&port.to_string()));
    }
}
