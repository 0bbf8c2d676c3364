use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, FromRequestParts, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnResponse, TraceLayer};
use tracing::{Level, error, info};

mod metrics;

use lyricist::opts::{DEFAULT_MAX_CONCURRENT_SECTIONS, DEFAULT_MODEL, DEFAULT_TARGET_LANGUAGE};
use lyricist::{
    CompletionBackend, Error as LyricistError, Lyricist, MemoryStore, NewTranslation,
    OpenAiBackend, OpenAiConfig, Opts, SavedTranslation, Section, TranslationStore,
    TranslationUpdate,
};

use crate::metrics::MeteredBackend;

/// Header set by the fronting authentication layer with the caller's stable user id.
const USER_ID_HEADER: &str = "x-user-id";

#[derive(Parser, Debug)]
#[command(name = "lyricist-server")]
#[command(about = "HTTP server for section-by-section lyrics translation")]
struct Params {
    /// API key for the chat-completion provider.
    #[arg(long = "api-key", env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Chat-completion API root.
    #[arg(
        long = "base-url",
        env = "OPENAI_BASE_URL",
        default_value = lyricist::backends::openai::DEFAULT_BASE_URL
    )]
    base_url: String,

    /// Chat-completion model used for segmentation and translation.
    #[arg(short = 'm', long = "model", default_value = DEFAULT_MODEL)]
    model: String,

    /// Language sections are translated into.
    #[arg(long = "target-language", default_value = DEFAULT_TARGET_LANGUAGE)]
    target_language: String,

    /// Maximum section translation calls in flight per request.
    #[arg(long = "max-concurrent-sections", default_value_t = DEFAULT_MAX_CONCURRENT_SECTIONS)]
    max_concurrent_sections: usize,

    /// Timeout for each completion call (seconds).
    #[arg(long = "request-timeout-secs", default_value_t = 60)]
    request_timeout_secs: u64,

    /// Host interface to bind to.
    #[arg(long = "host", default_value = "127.0.0.1")]
    host: String,

    /// TCP port to listen on.
    #[arg(long = "port", default_value_t = 8080)]
    port: u16,

    /// Maximum request body size (bytes).
    #[arg(long = "max-bytes", default_value_t = 1024 * 1024)]
    max_bytes: usize,
}

struct AppState<B: CompletionBackend> {
    lyricist: Arc<Lyricist<B>>,
    store: Arc<MemoryStore>,
}

impl<B: CompletionBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            lyricist: Arc::clone(&self.lyricist),
            store: Arc::clone(&self.store),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranslateRequest {
    #[serde(default)]
    lyrics: Option<String>,
}

#[derive(Debug, Serialize)]
struct TranslateResponse {
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    title: String,
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(rename = "rawResponse", skip_serializing_if = "Option::is_none")]
    raw_response: Option<String>,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
    code: Option<&'static str>,
    details: Option<String>,
    raw_response: Option<String>,
}

impl AppError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: None,
            details: None,
            raw_response: None,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    /// Map a pipeline failure. Input problems keep their own message; everything else is
    /// reported as a failed translation with the cause in `details`.
    fn from_pipeline(err: LyricistError) -> Self {
        match err {
            LyricistError::InvalidInput(message) => Self {
                code: Some("invalid-input"),
                ..Self::bad_request(message)
            },
            err => Self {
                code: Some(err.code()),
                details: Some(err.to_string()),
                raw_response: err.raw_response().map(str::to_owned),
                ..Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to translate lyrics")
            },
        }
    }

    /// Map a persistence failure, using `action` as the user-facing message.
    fn from_store(err: LyricistError, action: &str) -> Self {
        let status = match &err {
            LyricistError::InvalidInput(_) | LyricistError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            LyricistError::NotFound(_) => StatusCode::NOT_FOUND,
            LyricistError::Unauthorized(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        Self {
            code: Some(err.code()),
            details: Some(err.to_string()),
            ..Self::new(status, action)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(
                status = %self.status,
                error = %self.message,
                details = self.details.as_deref().unwrap_or_default(),
                "request failed"
            );
        }

        let body = Json(ErrorBody {
            error: self.message,
            code: self.code,
            details: self.details,
            raw_response: self.raw_response,
        });
        (self.status, body).into_response()
    }
}

/// Caller identity established by the fronting authentication layer.
struct UserId(String);

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(|value| UserId(value.to_owned()))
            .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, "Not signed in"))
    }
}

#[tokio::main]
async fn main() {
    lyricist::init_logging();

    if let Err(err) = run().await {
        error!(error = ?err, "lyricist-server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let params = Params::parse();

    metrics::init();

    let addr: SocketAddr = format!("{}:{}", params.host, params.port)
        .parse()
        .context("invalid host/port bind address")?;

    let backend = OpenAiBackend::new(OpenAiConfig {
        api_key: params.api_key,
        base_url: params.base_url,
        timeout: Duration::from_secs(params.request_timeout_secs),
    })
    .context("failed to initialize completion backend")?;

    let opts = Opts {
        model: params.model,
        target_language: params.target_language,
        max_concurrent_sections: params.max_concurrent_sections,
        ..Opts::default()
    };

    let state = AppState {
        lyricist: Arc::new(Lyricist::new(MeteredBackend::new(backend), opts)),
        store: Arc::new(MemoryStore::new()),
    };

    let app = router(state)
        .layer(DefaultBodyLimit::max(params.max_bytes))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        );

    let listener = TcpListener::bind(addr).await.context("bind failed")?;
    info!(%addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

fn router<B: CompletionBackend + 'static>(state: AppState<B>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics::prometheus_metrics))
        .route(
            "/api/translate",
            post(translate::<B>).fallback(method_not_allowed),
        )
        .route(
            "/api/translations",
            get(list_translations::<B>).post(create_translation::<B>),
        )
        .route(
            "/api/translations/{id}",
            get(get_translation::<B>)
                .put(update_translation::<B>)
                .delete(delete_translation::<B>),
        )
        .route(
            "/api/translations/{id}/title",
            put(rename_translation::<B>),
        )
        .route_layer(from_fn(metrics::track_http_metrics))
        .with_state(state)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutting down");
    }
}

async fn root() -> &'static str {
    "lyricist-server: POST /api/translate (json body: {\"lyrics\": \"...\"})"
}

async fn healthz() -> &'static str {
    "ok"
}

async fn method_not_allowed() -> AppError {
    AppError::method_not_allowed()
}

async fn translate<B: CompletionBackend>(
    State(state): State<AppState<B>>,
    body: std::result::Result<Json<TranslateRequest>, JsonRejection>,
) -> std::result::Result<Json<TranslateResponse>, AppError> {
    let Json(request) = body.map_err(|err| AppError::bad_request(err.body_text()))?;

    let lyrics = request
        .lyrics
        .filter(|lyrics| !lyrics.is_empty())
        .ok_or_else(|| AppError::bad_request("No lyrics provided"))?;

    let sections = state
        .lyricist
        .translate(&lyrics)
        .await
        .map_err(AppError::from_pipeline)?;

    Ok(Json(TranslateResponse { sections }))
}

async fn list_translations<B: CompletionBackend>(
    State(state): State<AppState<B>>,
    UserId(owner): UserId,
) -> std::result::Result<Json<Vec<SavedTranslation>>, AppError> {
    let records = state
        .store
        .list(&owner)
        .await
        .map_err(|err| AppError::from_store(err, "Failed to load saved translations"))?;
    Ok(Json(records))
}

async fn create_translation<B: CompletionBackend>(
    State(state): State<AppState<B>>,
    UserId(owner): UserId,
    body: std::result::Result<Json<NewTranslation>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let Json(record) = body.map_err(|err| AppError::bad_request(err.body_text()))?;

    let id = state
        .store
        .create(&owner, record)
        .await
        .map_err(|err| AppError::from_store(err, "Failed to save translation"))?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn get_translation<B: CompletionBackend>(
    State(state): State<AppState<B>>,
    UserId(owner): UserId,
    Path(id): Path<String>,
) -> std::result::Result<Json<SavedTranslation>, AppError> {
    let record = state
        .store
        .get(&owner, &id)
        .await
        .map_err(|err| AppError::from_store(err, "Failed to load translation"))?;
    Ok(Json(record))
}

async fn update_translation<B: CompletionBackend>(
    State(state): State<AppState<B>>,
    UserId(owner): UserId,
    Path(id): Path<String>,
    body: std::result::Result<Json<TranslationUpdate>, JsonRejection>,
) -> std::result::Result<StatusCode, AppError> {
    let Json(update) = body.map_err(|err| AppError::bad_request(err.body_text()))?;

    state
        .store
        .update(&owner, &id, update)
        .await
        .map_err(|err| AppError::from_store(err, "Failed to update translation"))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn rename_translation<B: CompletionBackend>(
    State(state): State<AppState<B>>,
    UserId(owner): UserId,
    Path(id): Path<String>,
    body: std::result::Result<Json<RenameRequest>, JsonRejection>,
) -> std::result::Result<StatusCode, AppError> {
    let Json(request) = body.map_err(|err| AppError::bad_request(err.body_text()))?;

    state
        .store
        .rename(&owner, &id, &request.title)
        .await
        .map_err(|err| AppError::from_store(err, "Failed to rename translation"))?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_translation<B: CompletionBackend>(
    State(state): State<AppState<B>>,
    UserId(owner): UserId,
    Path(id): Path<String>,
) -> std::result::Result<StatusCode, AppError> {
    state
        .store
        .delete(&owner, &id)
        .await
        .map_err(|err| AppError::from_store(err, "Failed to delete translation"))?;
    Ok(StatusCode::NO_CONTENT)
}
