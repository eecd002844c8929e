use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    extract::State,
    http::{HeaderName, header},
    response::{IntoResponse, Json},
    routing::{delete, get},
};
use tower_http::{
    cors::{Any, CorsLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    trace::TraceLayer,
};
use tracing::info;

use calbridge_config::CalbridgeConfig;

use crate::{
    token_routes::{delete_token_handler, list_tokens_handler, store_token_handler},
    token_store::TokenStore,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<TokenStore>,
    /// Header the platform injects with the authenticated user id.
    pub identity_header: Arc<str>,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<calbridge_metrics::MetricsHandle>,
}

impl AppState {
    pub fn new(store: Arc<TokenStore>, identity_header: &str) -> Self {
        Self {
            store,
            identity_header: Arc::from(identity_header.to_ascii_lowercase()),
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        }
    }

    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn with_metrics(mut self, handle: calbridge_metrics::MetricsHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let sensitive: Arc<[HeaderName]> = Arc::new([header::AUTHORIZATION, header::COOKIE]);

    let router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/calendar/tokens",
            get(list_tokens_handler).post(store_token_handler),
        )
        .route("/api/calendar/tokens/{provider}", delete(delete_token_handler));

    #[cfg(feature = "metrics")]
    let router = router
        .route(
            "/metrics",
            get(crate::metrics_routes::prometheus_metrics_handler),
        )
        .layer(axum::middleware::from_fn(
            crate::metrics_routes::record_http_metrics,
        ));

    router
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::from_shared(sensitive))
        .layer(cors)
        .with_state(state)
}

/// Open the token database, creating the file and schema when missing.
pub async fn open_store(database_url: &str) -> anyhow::Result<TokenStore> {
    if let Some(path) = database_url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        .filter(|p| !p.is_empty() && !p.starts_with(':'))
        && let Some(parent) = std::path::Path::new(path).parent()
    {
        std::fs::create_dir_all(parent)?;
    }

    let pool = sqlx::SqlitePool::connect(database_url).await?;
    TokenStore::init(&pool).await?;
    Ok(TokenStore::new(pool))
}

/// Start the gateway HTTP server.
pub async fn start_gateway(config: &CalbridgeConfig) -> anyhow::Result<()> {
    let store = Arc::new(open_store(&config.database_url()).await?);

    #[allow(unused_mut)]
    let mut state = AppState::new(store, &config.gateway.identity_header);

    #[cfg(feature = "metrics")]
    {
        let handle = calbridge_metrics::init_metrics(calbridge_metrics::MetricsRecorderConfig {
            enabled: true,
            global_labels: vec![("service".into(), "calbridge-gateway".into())],
        })?;
        state = state.with_metrics(handle);
    }

    let identity_header = Arc::clone(&state.identity_header);
    let app = build_gateway_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let lines = [
        format!("calbridge gateway v{}", env!("CARGO_PKG_VERSION")),
        format!("listening on {addr}"),
        format!("token endpoint: http://{addr}/api/calendar/tokens"),
        format!("identity header: {identity_header}"),
    ];
    let width = lines.iter().map(|l| l.len()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "identityHeader": &*state.identity_header,
    }))
}
