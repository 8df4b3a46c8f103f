//! HTTP server for ney calibration
//!
//! # Endpoints
//!
//! - `POST /analyze` - Analyse the recording in multipart field `audio_data`
//! - `GET /health` - Liveness check
//! - `GET /` - Recording page

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use ney_core::{
    AnalysisError, AnalyzerConfig, AudioDecoder, ErrorKind, MissingInputKind, analyze_recording,
    messages,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Multipart field holding the recording.
const AUDIO_FIELD: &str = "audio_data";

const INDEX_HTML: &str = include_str!("../static/index.html");
const SCRIPT_JS: &str = include_str!("../static/script.js");

/// Shared, read-only state. Every request decodes into its own buffers and scratch
/// directory, so nothing here needs a lock.
pub struct AppState {
    pub config: AnalyzerConfig,
    pub decoder: AudioDecoder,
}

impl AppState {
    pub fn new(config: AnalyzerConfig) -> Self {
        let decoder = AudioDecoder::new(&config.decoder);
        Self { config, decoder }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// POST /analyze
///
/// A body that is not multipart form data carries no audio field, so it gets the
/// same 400 as a form without one.
async fn analyze(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    tracing::info!("Received request to /analyze");

    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            tracing::warn!("Request is not multipart form data: {}", rejection.body_text());
            return error_response(&state, &AnalysisError::MissingInput(MissingInputKind::NoFile));
        }
    };

    let bytes = match read_audio_field(&mut multipart).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            return error_response(&state, &AnalysisError::MissingInput(MissingInputKind::NoFile));
        }
        Err(rejection) => {
            tracing::error!("Malformed upload: {}", rejection.body_text());
            return (
                rejection.status(),
                Json(ErrorResponse {
                    error: rejection.body_text(),
                }),
            )
                .into_response();
        }
    };
    tracing::info!("Processing audio file ({} bytes)", bytes.len());

    let worker = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        analyze_recording(&bytes, &worker.decoder, &worker.config)
    })
    .await;

    match outcome {
        Ok(Ok(result)) => {
            tracing::info!("Analysis completed successfully: {}", result.note_actual);
            (StatusCode::OK, Json(result)).into_response()
        }
        Ok(Err(err)) => error_response(&state, &err),
        Err(join_error) => {
            error_response(&state, &AnalysisError::Internal(join_error.to_string()))
        }
    }
}

/// Returns the bytes of the audio field, or `None` if the form has no such field.
async fn read_audio_field(
    multipart: &mut Multipart,
) -> Result<Option<axum::body::Bytes>, MultipartError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some(AUDIO_FIELD) {
            return field.bytes().await.map(Some);
        }
    }
    Ok(None)
}

fn error_response(state: &AppState, err: &AnalysisError) -> Response {
    let status = match err.kind() {
        ErrorKind::UserInput => StatusCode::BAD_REQUEST,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!("Error processing audio: {}", err);
    (
        status,
        Json(ErrorResponse {
            error: messages::error_message(state.config.locale, err),
        }),
    )
        .into_response()
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn script() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], SCRIPT_JS)
}

/// Create the axum router
///
/// Requests above `max_upload_bytes` are rejected before analysis. Paths no route
/// matches are looked up in `static_dir` when one is given.
pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/", get(index))
        .route("/static/script.js", get(script))
        .route("/analyze", post(analyze))
        .route("/health", get(health));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn serve(
    state: Arc<AppState>,
    addr: SocketAddr,
    max_upload_bytes: usize,
    static_dir: Option<&Path>,
) -> std::io::Result<()> {
    let router = create_router(state, max_upload_bytes, static_dir);

    tracing::info!("Starting ney calibration server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
