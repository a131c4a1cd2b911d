use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use common::agent::answer_question;
use common::llm::GenerationClient;
use common::session::SessionStore;
use common::table::load_dataset;
use common::TabchatError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state. The session store is the only mutable thing in
/// the process; the generation client is optional so the service can run
/// upload-only when no credential is supplied.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub client: Option<Arc<dyn GenerationClient>>,
}

pub fn build_router(state: AppState, upload_limit_bytes: usize) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/api/health", get(health_handler))
        .route("/api/sessions", post(create_session_handler))
        .route("/api/sessions/:session_id", delete(delete_session_handler))
        .route(
            "/api/sessions/:session_id/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route("/api/sessions/:session_id/chat", post(chat_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// request/response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatRequest {
    question: String,
}

#[derive(Debug, Serialize)]
struct ApiSuccess<T> {
    status: String,
    data: T,
}

impl<T> ApiSuccess<T> {
    fn new(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResult {
    session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResult {
    file_name: String,
    row_count: usize,
    columns: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ChatResult {
    answer: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    sessions: usize,
}

// ---------------------------------------------------------------------------
// error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ApiError {
    status: String,
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
}

struct ApiErrorResponse {
    status: StatusCode,
    error: ApiError,
}

impl ApiErrorResponse {
    fn new(status: StatusCode, error_type: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError {
                status: "error".to_string(),
                error: ErrorDetails {
                    message: message.into(),
                    error_type: error_type.to_string(),
                },
            },
        }
    }

    fn session_not_found(session_id: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            "SessionNotFound",
            format!("session '{}' does not exist", session_id),
        )
    }
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<TabchatError> for ApiErrorResponse {
    fn from(err: TabchatError) -> Self {
        match &err {
            TabchatError::UploadRejected(_) => {
                Self::new(StatusCode::BAD_REQUEST, "UploadRejected", err.to_string())
            }
            TabchatError::UploadParseFailed(_) => {
                Self::new(StatusCode::BAD_REQUEST, "UploadParseFailed", err.to_string())
            }
            TabchatError::PreconditionUnmet(_) => {
                Self::new(StatusCode::BAD_REQUEST, "PreconditionUnmet", err.to_string())
            }
            TabchatError::GenerationUnavailable(_) => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "GenerationUnavailable",
                err.to_string(),
            ),
            // everything else is unexpected and reported generically
            _ => {
                tracing::error!(error = %err, "unexpected pipeline failure");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "InternalError",
                    "an unexpected error occurred, please try again",
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// handlers
// ---------------------------------------------------------------------------

async fn root_handler() -> &'static str {
    "tabchat: POST /api/sessions, then POST /api/sessions/:id/upload and /api/sessions/:id/chat\n"
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        sessions: state.store.count().await,
    })
}

async fn create_session_handler(State(state): State<AppState>) -> Json<ApiSuccess<SessionResult>> {
    let session_id = state.store.create_session().await;
    Json(ApiSuccess::new(SessionResult { session_id }))
}

/// Deleting a session drops dataset, descriptor, and conversation log
/// together; none of the three can outlive the others.
async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiSuccess<()>>, ApiErrorResponse> {
    if state.store.remove(&session_id).await {
        Ok(Json(ApiSuccess::new(())))
    } else {
        Err(ApiErrorResponse::session_not_found(&session_id))
    }
}

async fn upload_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    multipart: Multipart,
) -> Result<Json<ApiSuccess<UploadResult>>, ApiErrorResponse> {
    let session = state
        .store
        .get(&session_id)
        .await
        .ok_or_else(|| ApiErrorResponse::session_not_found(&session_id))?;

    let (file_name, bytes) = read_upload(multipart).await?;
    tracing::info!(session = %session_id, file = %file_name, size = bytes.len(), "upload received");

    // parse before locking: a rejected upload must leave prior state intact
    let dataset = load_dataset(&file_name, &bytes)?;

    let row_count = dataset.row_count();
    let columns = dataset.column_names();

    let mut session = session.lock().await;
    session.install_dataset(dataset);

    Ok(Json(ApiSuccess::new(UploadResult {
        file_name,
        row_count,
        columns,
    })))
}

async fn chat_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ApiSuccess<ChatResult>>, ApiErrorResponse> {
    let session = state
        .store
        .get(&session_id)
        .await
        .ok_or_else(|| ApiErrorResponse::session_not_found(&session_id))?;

    if request.question.trim().is_empty() {
        return Err(TabchatError::PreconditionUnmet("question must not be empty".to_string()).into());
    }

    let client = state.client.as_ref().ok_or_else(|| {
        ApiErrorResponse::from(TabchatError::GenerationUnavailable(
            "the generation backend is not configured".to_string(),
        ))
    })?;

    // exclusive access to this session for the whole turn
    let mut session = session.lock().await;

    let (Some(dataset), Some(descriptor)) = (session.dataset(), session.descriptor()) else {
        return Err(TabchatError::PreconditionUnmet(
            "upload a dataset before asking questions".to_string(),
        )
        .into());
    };

    let outcome = answer_question(
        client.as_ref(),
        dataset,
        descriptor,
        session.log().recent(),
        &request.question,
    )
    .await?;

    session
        .log_mut()
        .append_exchange(request.question, outcome.generated);

    Ok(Json(ApiSuccess::new(ChatResult {
        answer: outcome.answer,
    })))
}

async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), ApiErrorResponse> {
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiErrorResponse::from(TabchatError::UploadRejected(format!(
            "could not read upload: {}",
            e
        )))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| {
                ApiErrorResponse::from(TabchatError::UploadRejected(
                    "upload is missing a file name".to_string(),
                ))
            })?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| {
                ApiErrorResponse::from(TabchatError::UploadRejected(format!(
                    "could not read file data: {}",
                    e
                )))
            })?
            .to_vec();

        file = Some((file_name, bytes));
    }

    file.ok_or_else(|| {
        ApiErrorResponse::from(TabchatError::UploadRejected(
            "no file selected".to_string(),
        ))
    })
}
