use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use futures_util::StreamExt;
use http::{Method, StatusCode, header};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{CoreResult, RelayError};
use crate::http_client::HttpClient;
use crate::model::{ChatStreamRequest, GenerationRequest};
use crate::normalizer::normalize_chat;
use crate::prompt::PromptComposer;
use crate::provider::GenerationProvider;
use crate::providers::ollama::Ollama;
use crate::session::RelaySession;
use crate::stream::BoxEventStream;

/// Everything a request handler needs to open a relay session.
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn GenerationProvider>,
    pub composer: PromptComposer,
    pub model: String,
    pub idle_timeout: Duration,
}

impl AppState {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        composer: PromptComposer,
        model: impl Into<String>,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            composer,
            model: model.into(),
            idle_timeout,
        }
    }

    pub fn from_config(cfg: &Config) -> CoreResult<Self> {
        let http = HttpClient::from_cfg(&cfg.http)?;
        let provider = Arc::new(Ollama::from_cfg(http, &cfg.upstream));
        Ok(Self::new(
            provider,
            PromptComposer::from_cfg(&cfg.prompt),
            cfg.upstream.model.clone(),
            Duration::from_millis(cfg.upstream.idle_timeout_ms),
        ))
    }

    /// Validate the request and build its session. Fails only on bad input.
    pub fn open_session(&self, req: ChatStreamRequest) -> CoreResult<RelaySession> {
        let req = normalize_chat(req)?;
        let context = req.context.as_deref().unwrap_or_default();
        let prompt = self.composer.compose(&req.prompt, context);
        Ok(RelaySession::new(
            self.provider.clone(),
            GenerationRequest::streaming(self.model.clone(), prompt),
            self.idle_timeout,
        ))
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("internal error")]
    Internal(RelayError),
}

impl From<RelayError> for AppError {
    fn from(e: RelayError) -> Self {
        match e {
            RelayError::Validation(msg) => AppError::BadRequest(msg),
            other => AppError::Internal(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(e) => {
                warn!(error = %e, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Deserialize)]
pub struct ChatStreamQuery {
    prompt: String,
    /// Comma-separated context items.
    #[serde(default)]
    context: Option<String>,
}

impl From<ChatStreamQuery> for ChatStreamRequest {
    fn from(q: ChatStreamQuery) -> Self {
        ChatStreamRequest {
            prompt: q.prompt,
            context: q
                .context
                .map(|c| c.split(',').map(str::to_string).collect()),
        }
    }
}

pub async fn chat_stream_post(
    State(state): State<AppState>,
    Json(payload): Json<ChatStreamRequest>,
) -> Result<Response, AppError> {
    let session = state.open_session(payload)?;
    info!(session.id = session.id(), "chat stream opened (POST)");
    Ok(sse_response(session.into_events()))
}

pub async fn chat_stream_get(
    State(state): State<AppState>,
    Query(query): Query<ChatStreamQuery>,
) -> Result<Response, AppError> {
    let session = state.open_session(query.into())?;
    info!(session.id = session.id(), "chat stream opened (GET)");
    Ok(sse_response(session.into_events()))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let upstream = match state.provider.health().await {
        Ok(()) => "reachable",
        Err(e) => {
            warn!(error = %e, "upstream health probe failed");
            "unreachable"
        }
    };
    Json(json!({
        "status": "ok",
        "model": state.model,
        "upstream": upstream,
    }))
}

fn sse_response(events: BoxEventStream) -> Response {
    let frames = events.map(|ev| Ok::<_, Infallible>(Bytes::from(ev.to_sse_frame())));
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(frames),
    )
        .into_response()
}

pub fn router(state: AppState, cors: bool) -> Router {
    let mut app = Router::new()
        .route("/api/chat-stream", post(chat_stream_post).get(chat_stream_get))
        .route("/api/health", get(health))
        .layer(TraceLayer::new_for_http());

    if cors {
        app = app.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE])
                .max_age(Duration::from_secs(60 * 60)),
        );
    }

    app.with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(cfg: &Config, shutdown: F) -> CoreResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let state = AppState::from_config(cfg)?;
    info!(
        model = %state.model,
        upstream = %cfg.upstream.base_url,
        "relay configured"
    );
    let app = router(state, cfg.server.cors);

    let address = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
