//! HTTP API server.
//!
//! Wraps the [`DocumentService`] in a JSON API. Every route except
//! `/health` requires `Authorization: Bearer <token>`; the verified user id
//! scopes all document access.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/documents` | Upload a PDF (multipart field `file`) |
//! | `GET`  | `/documents` | List the caller's documents (404 when none) |
//! | `GET`  | `/documents/summarized` | Documents that have a summary |
//! | `GET`  | `/documents/{id}` | Full document with chat log |
//! | `POST` | `/documents/{id}/summarize` | Summarize once, then serve the stored summary |
//! | `GET`  | `/documents/{id}/summary` | Read the stored summary |
//! | `POST` | `/documents/{id}/ask` | Ask a question, append the turn |
//! | `GET`  | `/documents/{id}/chat` | Full chat log in order |
//! | `GET`/`PUT` | `/profile` | Read or replace the caller's profile |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "document not found" } }
//! ```
//!
//! Error codes: `unauthorized` (401), `bad_request` (400), `not_found` (404),
//! `not_yet_summarized` (409), `payload_too_large` (413),
//! `extraction_failed` (422), `generation_failed` (502), `internal` (500).

use axum::{
    extract::{
        multipart::MultipartError, rejection::JsonRejection, DefaultBodyLimit, FromRequestParts,
        Multipart, Path, State,
    },
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use docchat_core::error::LifecycleError;
use docchat_core::models::{ChatTurn, Document, DocumentSummary, UserProfile};

use crate::app::{self, App};
use crate::auth::TokenGateway;
use crate::config::Config;
use crate::extract::MIME_PDF;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    app: App,
    gateway: Arc<TokenGateway>,
}

impl AppState {
    pub fn new(app: App, gateway: Arc<TokenGateway>) -> Self {
        Self { app, gateway }
    }
}

/// Starts the HTTP server with the configured store and adapters.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let app = app::build(config).await?;
    let gateway = Arc::new(TokenGateway::from_config(&config.auth)?);
    run_server_with_state(config, AppState::new(app, gateway)).await
}

/// Starts the HTTP server over pre-built state (custom adapters, tests).
pub async fn run_server_with_state(config: &Config, state: AppState) -> anyhow::Result<()> {
    let app = router(state, config.server.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "docchat server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/documents", post(handle_upload).get(handle_list))
        .route("/documents/summarized", get(handle_list_summarized))
        .route("/documents/{id}", get(handle_get))
        .route("/documents/{id}/summarize", post(handle_summarize))
        .route("/documents/{id}/summary", get(handle_get_summary))
        .route("/documents/{id}/ask", post(handle_ask))
        .route("/documents/{id}/chat", get(handle_chat))
        .route("/profile", get(handle_get_profile).put(handle_put_profile))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

/// Malformed or missing JSON bodies share the error contract.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|e| bad_request(format!("invalid JSON body: {}", e.body_text())))
}

fn upload_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::new(
            StatusCode::PAYLOAD_TOO_LARGE,
            "payload_too_large",
            "upload exceeds the configured size limit",
        );
    }
    bad_request(format!("invalid multipart body: {}", err.body_text()))
}

/// `application/pdf; name=x` -> `application/pdf`
fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn internal(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", message)
}

impl From<LifecycleError> for AppError {
    fn from(err: LifecycleError) -> Self {
        let status = match &err {
            LifecycleError::Unauthorized => StatusCode::UNAUTHORIZED,
            LifecycleError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            LifecycleError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            LifecycleError::GenerationFailed(_) => StatusCode::BAD_GATEWAY,
            LifecycleError::NotFoundOrForbidden => StatusCode::NOT_FOUND,
            LifecycleError::NotYetSummarized => StatusCode::CONFLICT,
            LifecycleError::Store(e) => {
                error!(error = %e, "store failure");
                return internal("internal storage error");
            }
        };
        AppError::new(status, err.code(), err.to_string())
    }
}

// ============ Caller identity ============

/// The authenticated user id, resolved from the bearer token.
pub struct Caller(pub String);

impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| state.gateway.verify_header(v))
            .map(Caller)
            .ok_or_else(|| AppError::from(LifecycleError::Unauthorized))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Documents ============

#[derive(Serialize)]
struct DocumentResponse {
    document: Document,
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<DocumentSummary>,
}

#[derive(Serialize)]
struct SummarizedDocument {
    id: String,
    filename: String,
    summary: String,
    created_at: i64,
}

#[derive(Serialize)]
struct SummarizedListResponse {
    documents: Vec<SummarizedDocument>,
}

/// `POST /documents`: reads the `file` field and ingests it.
async fn handle_upload(
    State(state): State<AppState>,
    Caller(owner): Caller,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<DocumentResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(upload_error)?
    {
        if field.name() != Some("file") {
            continue;
        }
        if let Some(ct) = field.content_type() {
            let essence = mime_essence(ct);
            if essence != MIME_PDF && essence != "application/octet-stream" {
                return Err(bad_request(format!(
                    "unsupported file type '{}': upload a PDF",
                    ct
                )));
            }
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(upload_error)?;

        let document = state.app.service.ingest(&owner, &filename, &bytes).await?;
        return Ok((StatusCode::CREATED, Json(DocumentResponse { document })));
    }

    Err(bad_request("no file uploaded: expected multipart field 'file'"))
}

/// `GET /documents`: 404 when the caller owns nothing.
async fn handle_list(
    State(state): State<AppState>,
    Caller(owner): Caller,
) -> Result<Json<ListResponse>, AppError> {
    let listing = state.app.service.list_documents(&owner).await?;
    if !listing.found {
        return Err(AppError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            "no documents found for this user",
        ));
    }
    Ok(Json(ListResponse {
        documents: listing.documents,
    }))
}

async fn handle_list_summarized(
    State(state): State<AppState>,
    Caller(owner): Caller,
) -> Result<Json<SummarizedListResponse>, AppError> {
    let docs = state.app.service.list_summarized(&owner).await?;
    let documents = docs
        .into_iter()
        .filter_map(|d| {
            d.summary.map(|summary| SummarizedDocument {
                id: d.id,
                filename: d.filename,
                summary,
                created_at: d.created_at,
            })
        })
        .collect();
    Ok(Json(SummarizedListResponse { documents }))
}

async fn handle_get(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> Result<Json<DocumentResponse>, AppError> {
    let document = state.app.service.get_document(&owner, &id).await?;
    Ok(Json(DocumentResponse { document }))
}

// ============ Summary ============

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    cached: bool,
}

#[derive(Serialize)]
struct SummaryResponse {
    summary: String,
}

async fn handle_summarize(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> Result<Json<SummarizeResponse>, AppError> {
    let outcome = state.app.service.summarize(&owner, &id).await?;
    Ok(Json(SummarizeResponse {
        summary: outcome.summary,
        cached: outcome.cache_hit,
    }))
}

async fn handle_get_summary(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> Result<Json<SummaryResponse>, AppError> {
    let summary = state.app.service.get_summary(&owner, &id).await?;
    Ok(Json(SummaryResponse { summary }))
}

// ============ Chat ============

#[derive(Deserialize)]
struct AskRequest {
    #[serde(default)]
    question: String,
}

#[derive(Serialize)]
struct ChatResponse {
    turns: Vec<ChatTurn>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
    body: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<ChatTurn>, AppError> {
    let req = json_body(body)?;
    let turn = state.app.service.ask(&owner, &id, &req.question).await?;
    Ok(Json(turn))
}

async fn handle_chat(
    State(state): State<AppState>,
    Caller(owner): Caller,
    Path(id): Path<String>,
) -> Result<Json<ChatResponse>, AppError> {
    let turns = state.app.service.chat_history(&owner, &id).await?;
    Ok(Json(ChatResponse { turns }))
}

// ============ Profile ============

async fn handle_get_profile(
    State(state): State<AppState>,
    Caller(owner): Caller,
) -> Result<Json<UserProfile>, AppError> {
    use docchat_core::adapters::ProfileProvider;

    let profile = state
        .app
        .profiles
        .get_profile(&owner)
        .await
        .map_err(|e| internal(e.to_string()))?
        .unwrap_or_default();
    Ok(Json(profile))
}

async fn handle_put_profile(
    State(state): State<AppState>,
    Caller(owner): Caller,
    body: Result<Json<UserProfile>, JsonRejection>,
) -> Result<Json<UserProfile>, AppError> {
    let profile = json_body(body)?;
    let stored = state
        .app
        .profiles
        .upsert(&owner, &profile)
        .await
        .map_err(|e| internal(e.to_string()))?;
    Ok(Json(stored))
}
