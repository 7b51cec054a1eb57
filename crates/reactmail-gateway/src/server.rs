//! Gateway HTTP server: Axum-based webhook endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use reactmail_core::{EventPipeline, PipelineOutcome};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

const STATUS_PATH: &str = "/api/status";

/// Shared state for all requests
#[derive(Clone)]
pub struct GatewayState {
    pub pipeline: Arc<EventPipeline>,
    pub start_time: Instant,
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
    endpoint: String,
}

impl GatewayServer {
    /// Create a new gateway server serving webhooks on `endpoint`
    pub fn new(
        bind: SocketAddr,
        endpoint: impl Into<String>,
        pipeline: Arc<EventPipeline>,
    ) -> anyhow::Result<Self> {
        let endpoint = endpoint.into();
        let endpoint = if endpoint.starts_with('/') {
            endpoint
        } else {
            format!("/{}", endpoint)
        };
        validate_endpoint(&endpoint)?;
        let state = GatewayState {
            pipeline,
            start_time: Instant::now(),
        };
        Ok(Self {
            state,
            bind,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route(&self.endpoint, post(webhook_handler))
            .route(STATUS_PATH, get(status_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve until `shutdown` is cancelled
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}{}", self.bind, self.endpoint);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway stopped");
        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self, shutdown: CancellationToken) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

/// The webhook path must be a literal route that doesn't shadow the status endpoint
fn validate_endpoint(endpoint: &str) -> anyhow::Result<()> {
    if endpoint.contains(['{', '}']) {
        anyhow::bail!("Webhook endpoint {:?} must not contain '{{' or '}}'", endpoint);
    }
    if endpoint
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        anyhow::bail!(
            "Webhook endpoint {:?} has a path segment starting with ':' or '*'",
            endpoint
        );
    }
    if endpoint == STATUS_PATH {
        anyhow::bail!("Webhook endpoint {} is reserved for the status endpoint", STATUS_PATH);
    }
    Ok(())
}

// ── HTTP Handlers ──

async fn webhook_handler(State(state): State<GatewayState>, body: Bytes) -> Response {
    let span = info_span!("webhook", request_id = %Uuid::new_v4());
    let result = state.pipeline.handle(&body).instrument(span).await;

    match result {
        Ok(PipelineOutcome::Challenge(challenge)) => (StatusCode::OK, challenge).into_response(),
        Ok(outcome) => {
            debug!("Webhook finished: {:?}", outcome);
            StatusCode::OK.into_response()
        }
        // Failure details stay in the logs, never in the response body
        Err(e) => StatusCode::from_u16(e.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
    }
}

async fn status_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    let watched = state.pipeline.cache().len();

    axum::Json(serde_json::json!({
        "status": "ok",
        "watched_channels": watched,
        "uptime_secs": uptime,
    }))
}
