//! JSON endpoints under `/api`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatsync_core::{ChatError, ConversationController, DocumentStore};
use serde::Deserialize;
use serde_json::{Value, json};

pub const CLEARED_MESSAGE: &str = "對話已清除";
pub const CHAT_FAILED: &str = "處理請求時發生錯誤";
pub const STORAGE_FAILED: &str = "儲存失敗";

#[derive(Clone)]
pub struct AppState {
    controller: Arc<ConversationController>,
}

impl AppState {
    pub fn new(controller: Arc<ConversationController>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &ConversationController {
        &self.controller
    }

    pub fn documents(&self) -> &DocumentStore {
        self.controller.documents()
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Rendered as `{success:false, error[, details]}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{error}")]
    Internal {
        error: &'static str,
        details: Option<String>,
    },
}

impl ApiError {
    fn missing(field: &str) -> Self {
        ApiError::BadRequest(format!("缺少 {field}"))
    }

    fn storage() -> Self {
        ApiError::Internal {
            error: STORAGE_FAILED,
            details: None,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("請求格式錯誤：{}", rejection.body_text()))
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Validation(message) => ApiError::BadRequest(message.to_string()),
            other => ApiError::Internal {
                error: CHAT_FAILED,
                details: Some(other.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::BadRequest(error) => (
                StatusCode::BAD_REQUEST,
                json!({ "success": false, "error": error }),
            ),
            ApiError::Internal { error, details } => {
                let mut body = json!({ "success": false, "error": error });
                if let Some(details) = details {
                    body["details"] = json!(details);
                }
                (StatusCode::INTERNAL_SERVER_ERROR, body)
            }
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    message: Option<String>,
    session_id: Option<String>,
}

/// POST /api/chat
pub async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let message = request.message.unwrap_or_default();
    let session_id = request.session_id.unwrap_or_default();

    let reply = state
        .controller()
        .handle_message(&session_id, &message)
        .await?;
    Ok(Json(json!({ "success": true, "message": reply })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearRequest {
    session_id: Option<String>,
}

/// POST /api/clear
pub async fn clear(
    State(state): State<AppState>,
    payload: Result<Json<ClearRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let session_id = request.session_id.ok_or_else(|| ApiError::missing("sessionId"))?;

    state.controller().clear_session(&session_id);
    Ok(Json(json!({ "success": true, "message": CLEARED_MESSAGE })))
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// GET /api/admin-prompt
pub async fn admin_prompt(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "success": true, "prompt": state.documents().directive() }))
}

#[derive(Debug, Deserialize)]
pub struct AdminPromptRequest {
    prompt: Option<String>,
}

/// POST /api/admin-prompt
pub async fn set_admin_prompt(
    State(state): State<AppState>,
    payload: Result<Json<AdminPromptRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let prompt = request.prompt.ok_or_else(|| ApiError::missing("prompt"))?;

    if !state.documents().set_directive(prompt).await {
        return Err(ApiError::storage());
    }
    tracing::info!("directive updated");
    Ok(Json(json!({ "success": true })))
}

/// GET /api/user-data
pub async fn user_data(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "success": true, "data": state.documents().user_data() }))
}

#[derive(Debug, Deserialize)]
pub struct UserDataRequest {
    data: Option<String>,
}

/// POST /api/user-data
pub async fn set_user_data(
    State(state): State<AppState>,
    payload: Result<Json<UserDataRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    let data = request.data.ok_or_else(|| ApiError::missing("data"))?;

    if !state.documents().set_user_data(data).await {
        return Err(ApiError::storage());
    }
    tracing::info!("user data updated");
    Ok(Json(json!({ "success": true })))
}
