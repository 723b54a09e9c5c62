use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{EventDescriptor, CREATE_UI_PATH, JAVASCRIPT_CONTENT_TYPE, PROCESS_EVENT_PATH},
};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod responder;

use config::{load_settings, Settings};
use responder::{CounterPage, ScriptResponder};

#[derive(Clone)]
struct AppState {
    responder: Arc<dyn ScriptResponder>,
    chunk_bytes: usize,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let responder = Arc::new(CounterPage::new(settings.page_title.clone()));
    let app = build_router(&settings, responder);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, base_path = %settings.base_path, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(settings: &Settings, responder: Arc<dyn ScriptResponder>) -> Router {
    let state = AppState {
        responder,
        chunk_bytes: settings.response_chunk_bytes.max(1),
    };
    let ui = Router::new()
        .route(&format!("/{CREATE_UI_PATH}"), get(create_ui))
        .route(
            &format!("/{PROCESS_EVENT_PATH}"),
            post(process_event).layer(RequestBodyLimitLayer::new(settings.max_event_body_bytes)),
        )
        .with_state(state);

    let router = Router::new().route("/healthz", get(healthz));
    // Nesting under an empty prefix is rejected, so the root mount merges.
    if settings.base_path.is_empty() {
        router.merge(ui)
    } else {
        router.nest(&settings.base_path, ui)
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn create_ui(State(state): State<AppState>) -> Response {
    let script = state.responder.creation_script();
    info!(bytes = script.len(), "serving creation script");
    script_response(script, state.chunk_bytes)
}

async fn process_event(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let descriptor: EventDescriptor = serde_json::from_slice(&body).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, e.to_string())),
        )
    })?;
    info!(
        control_id = %descriptor.control_id,
        event_name = %descriptor.event_name,
        "processing ui event"
    );

    let script = state.responder.handle_event(&descriptor).map_err(|e| {
        let status = match e.code {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Validation => StatusCode::BAD_REQUEST,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        warn!(control_id = %descriptor.control_id, error = %e, "ui event rejected");
        (status, Json(ApiError::from(e)))
    })?;
    Ok(script_response(script, state.chunk_bytes))
}

/// Splits on byte boundaries, so a multi-byte character may straddle chunks.
fn chunk_script(script: String, chunk_bytes: usize) -> Vec<Bytes> {
    let bytes = Bytes::from(script);
    let mut chunks = Vec::with_capacity(bytes.len() / chunk_bytes + 1);
    let mut offset = 0;
    while offset < bytes.len() {
        let end = (offset + chunk_bytes).min(bytes.len());
        chunks.push(bytes.slice(offset..end));
        offset = end;
    }
    chunks
}

fn script_response(script: String, chunk_bytes: usize) -> Response {
    let chunks = chunk_script(script, chunk_bytes);
    let stream = futures::stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(JAVASCRIPT_CONTENT_TYPE),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-store")),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
