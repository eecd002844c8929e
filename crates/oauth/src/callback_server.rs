//! Loopback server that receives implicit-grant redirects.
//!
//! The access token arrives in the URL fragment, which browsers never send
//! to a server. The callback page therefore posts `location.hash` back to
//! `/oauth/fragment`, where the [`CallbackHandler`] runs and the page gets a
//! [`CallbackReport`] to display before it moves on to the landing view.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode, header},
        response::{Html, IntoResponse, Response},
        routing::{get, post},
    },
    calbridge_common::CalendarProvider,
    tokio::sync::{Mutex, oneshot},
    tracing::{debug, error, info, warn},
};

use crate::{
    callback::{CallbackHandler, CallbackOutcome, CallbackReport, CallbackStatus},
    error::OAuthError,
    providers::ProviderHandler,
};

const CALLBACK_PAGE: &str = include_str!("assets/callback.html");
const LANDING_PAGE: &str = include_str!("assets/landing.html");

pub const FRAGMENT_PATH: &str = "/oauth/fragment";
const PROVIDER_CALLBACK_ROUTE: &str = "/oauth/{provider}/callback";

/// Title used on a callback page whose path names no provider.
const GENERIC_PROVIDER_NAME: &str = "your calendar";

struct ServerState {
    handler: Arc<CallbackHandler>,
    outcome_tx: Mutex<Option<oneshot::Sender<CallbackOutcome>>>,
    /// `host:port` values this server answers to.
    loopback_hosts: Vec<String>,
}

impl ServerState {
    fn is_loopback_host(&self, host: &str) -> bool {
        self.loopback_hosts
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(host))
    }

    /// Fragment posts must come from a page this server served. A request
    /// without an Origin header (curl, the CLI) is judged by Host alone.
    fn is_same_origin(&self, headers: &HeaderMap) -> bool {
        let host_ok = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|host| self.is_loopback_host(host));
        let origin_ok = match headers.get(header::ORIGIN) {
            None => true,
            Some(origin) => origin
                .to_str()
                .ok()
                .and_then(|o| o.strip_prefix("http://"))
                .is_some_and(|host| self.is_loopback_host(host)),
        };
        host_ok && origin_ok
    }
}

/// Whether `path` is already served by the per-provider callback route.
fn is_provider_callback_path(path: &str) -> bool {
    path.strip_prefix("/oauth/")
        .and_then(|rest| rest.strip_suffix("/callback"))
        .is_some_and(|segment| !segment.is_empty() && !segment.contains('/'))
}

/// A running callback server. Dropping it stops the server.
pub struct CallbackServer {
    local_addr: SocketAddr,
    outcome_rx: Option<oneshot::Receiver<CallbackOutcome>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl CallbackServer {
    /// Bind `addr` and start serving in the background. Callback pages are
    /// served at `/oauth/{provider}/callback`.
    pub async fn start(addr: SocketAddr, handler: Arc<CallbackHandler>) -> Result<Self, OAuthError> {
        Self::start_with_path(addr, None, handler).await
    }

    /// Like [`CallbackServer::start`], and additionally serves the callback
    /// page at `callback_path`, the path of the registered redirect URI.
    pub async fn start_with_path(
        addr: SocketAddr,
        callback_path: Option<&str>,
        handler: Arc<CallbackHandler>,
    ) -> Result<Self, OAuthError> {
        let landing_path = handler.landing_path().to_string();
        if !landing_path.starts_with('/') || landing_path == FRAGMENT_PATH {
            return Err(OAuthError::InvalidRequest(format!(
                "landing path must be an absolute path other than {FRAGMENT_PATH}: {landing_path}"
            )));
        }

        let custom_path = callback_path.filter(|path| !is_provider_callback_path(path));
        if let Some(path) = custom_path
            && (!path.starts_with('/') || path == FRAGMENT_PATH || path == landing_path)
        {
            return Err(OAuthError::InvalidRequest(format!(
                "callback path must be an absolute path other than {FRAGMENT_PATH} and {landing_path}: {path}"
            )));
        }

        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!(%addr, error = %e, "failed to bind OAuth callback server");
            OAuthError::CallbackServer(format!("failed to listen on {addr}: {e}"))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| OAuthError::CallbackServer(e.to_string()))?;

        let port = local_addr.port();
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let state = Arc::new(ServerState {
            handler,
            outcome_tx: Mutex::new(Some(outcome_tx)),
            loopback_hosts: vec![
                format!("127.0.0.1:{port}"),
                format!("localhost:{port}"),
                format!("[::1]:{port}"),
            ],
        });

        let mut app = Router::new()
            .route(PROVIDER_CALLBACK_ROUTE, get(callback_page))
            .route(FRAGMENT_PATH, post(receive_fragment))
            .route(&landing_path, get(landing_page));
        if let Some(path) = custom_path {
            debug!(path, "serving callback page at redirect URI path");
            app = app.route(path, get(generic_callback_page));
        }
        let app = app.with_state(state);

        info!(%local_addr, "OAuth callback server listening");

        tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                    debug!(%local_addr, "OAuth callback server shutdown requested");
                })
                .await;
            if let Err(e) = served {
                error!(error = %e, "OAuth callback server error");
            }
        });

        Ok(Self {
            local_addr,
            outcome_rx: Some(outcome_rx),
            shutdown_tx: Some(shutdown_tx),
        })
    }

    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    /// Wait for the first callback that carried an OAuth response.
    pub async fn wait(&mut self, timeout: Duration) -> Result<CallbackOutcome, OAuthError> {
        let outcome_rx = self
            .outcome_rx
            .take()
            .ok_or_else(|| OAuthError::CallbackServer("callback already received".into()))?;

        tokio::select! {
            outcome = outcome_rx => outcome
                .map_err(|_| OAuthError::CallbackServer("callback channel closed unexpectedly".into())),
            () = tokio::time::sleep(timeout) => {
                warn!(timeout_secs = timeout.as_secs(), "OAuth callback timed out");
                Err(OAuthError::CallbackTimeout(timeout.as_secs()))
            },
        }
    }

    /// Keep serving for `grace` so the browser can follow its redirect, then stop.
    pub async fn linger(mut self, grace: Duration) {
        tokio::time::sleep(grace).await;
        self.stop();
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
            info!(local_addr = %self.local_addr, "OAuth callback server stopped");
        }
    }
}

impl Drop for CallbackServer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Pages ────────────────────────────────────────────────────────────────────

fn render_callback_page(name: &str, provider: Option<CalendarProvider>) -> Html<String> {
    // `</` would end the inline script early.
    let initial = serde_json::to_string(&CallbackReport::loading(provider))
        .unwrap_or_else(|_| r#"{"status":"loading"}"#.to_string())
        .replace("</", "<\\/");
    Html(
        CALLBACK_PAGE
            .replace("{{provider_name}}", name)
            .replace("{{initial_report}}", &initial),
    )
}

async fn callback_page(Path(provider): Path<String>) -> Response {
    let Ok(provider) = provider.parse::<CalendarProvider>() else {
        return (StatusCode::NOT_FOUND, "unknown calendar provider").into_response();
    };
    render_callback_page(ProviderHandler::display_name(provider), Some(provider)).into_response()
}

async fn generic_callback_page() -> Html<String> {
    render_callback_page(GENERIC_PROVIDER_NAME, None)
}

async fn receive_fragment(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !state.is_same_origin(&headers) {
        warn!(
            origin = ?headers.get(header::ORIGIN),
            host = ?headers.get(header::HOST),
            "rejected OAuth fragment from a foreign origin"
        );
        let report = CallbackReport {
            status: CallbackStatus::Error,
            message: Some("Request did not come from the callback page.".to_string()),
            provider: None,
            redirect_to: None,
            redirect_after_ms: None,
        };
        return (StatusCode::FORBIDDEN, Json(report)).into_response();
    }

    let outcome = state.handler.handle(body.trim()).await;
    let report = outcome.report();

    if !matches!(outcome, CallbackOutcome::NoResponse)
        && let Some(tx) = state.outcome_tx.lock().await.take()
    {
        let _ = tx.send(outcome);
    }
    Json(report).into_response()
}

async fn landing_page() -> Html<&'static str> {
    Html(LANDING_PAGE)
}
