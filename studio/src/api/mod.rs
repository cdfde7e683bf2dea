//! HTTP API of the studio service.
//!
//! Thin handlers: validate the input, send one message to the right session
//! actor (or the store), translate the result. Validation failures never
//! reach an actor.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;

pub mod sessions;
pub mod surveys;

use crate::actors::session::SessionError;
use crate::app_state::AppState;

#[derive(Clone)]
pub struct ApiState {
    pub app_state: AppState,
}

/// Configure all API routes
pub fn router() -> Router<ApiState> {
    Router::new()
        .route("/health", get(health_check))
        // Editing session routes
        .route("/sessions", post(sessions::open_session))
        .route(
            "/sessions/{session_id}",
            get(sessions::get_draft).delete(sessions::close_session),
        )
        .route("/sessions/{session_id}/actions", post(sessions::dispatch_action))
        .route("/sessions/{session_id}/undo", post(sessions::undo))
        .route("/sessions/{session_id}/redo", post(sessions::redo))
        .route(
            "/sessions/{session_id}/generate-section",
            post(sessions::generate_section),
        )
        .route(
            "/sessions/{session_id}/generate-more",
            post(sessions::generate_more),
        )
        .route("/sessions/{session_id}/refine", post(sessions::refine_question))
        .route(
            "/sessions/{session_id}/refine-batch",
            post(sessions::refine_batch),
        )
        .route("/sessions/{session_id}/publish", post(sessions::publish))
        // Survey record routes
        .route("/surveys", get(surveys::list_surveys))
        .route("/surveys/{survey_id}", get(surveys::get_survey))
        // Public response-collection form, addressed by share token
        .route("/forms/{share_token}", get(surveys::get_public_form))
}

/// Health check endpoint
pub async fn health_check(State(_state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "studio",
            "version": "0.1.0"
        })),
    )
}

/// Machine-readable error codes for API responses.
#[derive(Debug, Clone, Copy)]
pub enum ApiErrorCode {
    InvalidInput,
    SessionNotFound,
    SurveyNotFound,
    FormUnavailable,
    FormExpired,
    GenerationFailed,
    StoreError,
    ActorError,
}

impl ApiErrorCode {
    fn as_str(&self) -> &'static str {
        match self {
            ApiErrorCode::InvalidInput => "INVALID_INPUT",
            ApiErrorCode::SessionNotFound => "SESSION_NOT_FOUND",
            ApiErrorCode::SurveyNotFound => "SURVEY_NOT_FOUND",
            ApiErrorCode::FormUnavailable => "FORM_UNAVAILABLE",
            ApiErrorCode::FormExpired => "FORM_EXPIRED",
            ApiErrorCode::GenerationFailed => "GENERATION_FAILED",
            ApiErrorCode::StoreError => "STORE_ERROR",
            ApiErrorCode::ActorError => "ACTOR_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ApiErrorCode::SessionNotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::SurveyNotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::FormUnavailable => StatusCode::NOT_FOUND,
            ApiErrorCode::FormExpired => StatusCode::GONE,
            ApiErrorCode::GenerationFailed => StatusCode::BAD_GATEWAY,
            ApiErrorCode::StoreError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiErrorCode::ActorError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

/// Create an error response
pub fn api_error(code: ApiErrorCode, message: impl Into<String>) -> axum::response::Response {
    let status = code.status_code();
    let body = Json(ApiErrorResponse {
        error: ApiErrorDetail {
            code: code.as_str().to_string(),
            message: message.into(),
        },
    });
    (status, body).into_response()
}

/// Map a session actor failure onto a status and error code.
pub fn session_error_response(error: SessionError) -> axum::response::Response {
    let code = match &error {
        SessionError::Generation(_) => ApiErrorCode::GenerationFailed,
        SessionError::Store(_) => ApiErrorCode::StoreError,
        SessionError::UnknownSection(_)
        | SessionError::UnknownQuestion { .. }
        | SessionError::EmptySelection
        | SessionError::EmptyDraft => ApiErrorCode::InvalidInput,
    };
    api_error(code, error.to_string())
}
