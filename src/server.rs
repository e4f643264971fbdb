//! axum routes for the chat endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio_stream::StreamExt;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::Result;
use crate::generator::GeminiGenerator;
use crate::models::{ChatRequest, GenerationConfig, StreamChunk};
use crate::orchestrator::Orchestrator;
use crate::search::TavilyRetriever;
use crate::stream::StreamEmitter;
use crate::transport::GeminiTransport;

/// Shared by every request; holds no per-request or mutable state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub emitter: StreamEmitter,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, emitter: StreamEmitter) -> Self {
        Self {
            orchestrator,
            emitter,
        }
    }

    /// Wire the Gemini and Tavily clients described by `cfg`.
    pub fn from_config(cfg: &Config) -> Result<Self> {
        let timeout = cfg.upstream_timeout();
        let transport = Arc::new(GeminiTransport::new(
            &cfg.gemini,
            timeout,
            cfg.upstream.max_attempts,
        )?);
        let generator = Arc::new(GeminiGenerator::new(
            transport,
            cfg.tavily.domain.clone(),
            GenerationConfig {
                temperature: cfg.gemini.temperature,
                max_output_tokens: cfg.gemini.max_output_tokens,
            },
        ));
        let retriever = Arc::new(TavilyRetriever::new(cfg.tavily.clone(), timeout)?);

        let orchestrator = Orchestrator::new(cfg.credentials(), generator, retriever, timeout);
        let emitter = StreamEmitter::new(cfg.stream.chunk_words, cfg.stream_delay());

        Ok(Self::new(Arc::new(orchestrator), emitter))
    }
}

pub enum ApiError {
    BadRequest(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat))
        .route("/health", get(|| async { "ok" }))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// POST /api/chat - answer one message as a stream of SSE chunks.
pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Response {
    let request = match serde_json::from_slice::<ChatRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            // Nothing usable arrived, so there is no message to key the fallback on.
            tracing::error!("Chat API error: {}", e);
            let text = state.orchestrator.fallback().respond("");
            return Json(json!({ "message": text })).into_response();
        }
    };

    let Some(message) = request.message().map(str::to_owned) else {
        tracing::info!("No message provided");
        return ApiError::BadRequest("Message is required").into_response();
    };

    tracing::info!(message_len = message.len(), "Received message");

    let fallback = state.orchestrator.fallback().respond(&message).to_string();
    let orchestrator = state.orchestrator.clone();
    let chunks = state.emitter.spawn(
        async move {
            let reply = orchestrator.respond(&message).await;
            tracing::info!(outcome = ?reply.outcome, "Response generated, starting stream");
            reply.text
        },
        fallback,
    );

    sse_response(chunks)
}

fn sse_response<S>(chunks: S) -> Response
where
    S: tokio_stream::Stream<Item = StreamChunk> + Send + 'static,
{
    let events = chunks.map(|chunk| Event::default().json_data(chunk));

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(events),
    )
        .into_response()
}
