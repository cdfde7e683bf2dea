//! Editing session endpoints: open a session, dispatch actions, drive
//! generation and refinement, publish.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::actors::session::{DraftSessionMsg, DraftView};
use crate::api::{api_error, session_error_response, ApiErrorCode, ApiState};
use crate::editor::Action;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub user_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub language: Option<String>,
    /// Re-open an existing survey for editing.
    pub survey_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionResponse {
    pub session_id: String,
    pub draft: DraftView,
}

pub async fn open_session(
    State(state): State<ApiState>,
    Json(req): Json<OpenSessionRequest>,
) -> impl IntoResponse {
    if req.user_id.trim().is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "userId must not be empty");
    }
    if req.title.trim().is_empty() && req.survey_id.is_none() {
        return api_error(ApiErrorCode::InvalidInput, "title must not be empty");
    }

    let opened = state
        .app_state
        .open_session(
            req.user_id,
            req.title.trim().to_string(),
            req.description,
            req.language,
            req.survey_id,
        )
        .await;
    let (session_id, actor) = match opened {
        Ok(pair) => pair,
        Err(e) => {
            // The only not-found path here is a missing seed survey.
            if e.contains("not found") {
                return api_error(ApiErrorCode::SurveyNotFound, e);
            }
            return api_error(ApiErrorCode::ActorError, e);
        }
    };

    match ractor::call!(actor, |reply| DraftSessionMsg::GetView { reply }) {
        Ok(draft) => (
            StatusCode::CREATED,
            Json(OpenSessionResponse { session_id, draft }),
        )
            .into_response(),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}

pub async fn get_draft(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let Some(actor) = state.app_state.session(&session_id).await else {
        return api_error(ApiErrorCode::SessionNotFound, session_id);
    };
    match ractor::call!(actor, |reply| DraftSessionMsg::GetView { reply }) {
        Ok(draft) => (StatusCode::OK, Json(draft)).into_response(),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}

pub async fn close_session(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    if state.app_state.close_session(&session_id).await {
        (StatusCode::OK, Json(json!({ "closed": true }))).into_response()
    } else {
        api_error(ApiErrorCode::SessionNotFound, session_id)
    }
}

pub async fn dispatch_action(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
    Json(action): Json<Action>,
) -> impl IntoResponse {
    dispatch(&state, &session_id, action).await
}

pub async fn undo(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    dispatch(&state, &session_id, Action::Undo).await
}

pub async fn redo(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    dispatch(&state, &session_id, Action::Redo).await
}

async fn dispatch(state: &ApiState, session_id: &str, action: Action) -> axum::response::Response {
    let Some(actor) = state.app_state.session(session_id).await else {
        return api_error(ApiErrorCode::SessionNotFound, session_id.to_string());
    };
    match ractor::call!(actor, |reply| DraftSessionMsg::Dispatch {
        action: action.clone(),
        reply
    }) {
        Ok(draft) => (StatusCode::OK, Json(draft)).into_response(),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSectionRequest {
    pub name: String,
    pub description: String,
    pub question_count: Option<u32>,
}

pub async fn generate_section(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<GenerateSectionRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "section name must not be empty");
    }
    if req.description.trim().is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "description must not be empty");
    }
    let Some(actor) = state.app_state.session(&session_id).await else {
        return api_error(ApiErrorCode::SessionNotFound, session_id);
    };
    let name = req.name.trim().to_string();
    let description = req.description;
    let question_count = req.question_count;
    match ractor::call!(actor, |reply| DraftSessionMsg::GenerateSection {
        name: name.clone(),
        description: description.clone(),
        question_count,
        reply
    }) {
        Ok(Ok(draft)) => (StatusCode::OK, Json(draft)).into_response(),
        Ok(Err(e)) => session_error_response(e),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateMoreRequest {
    pub section: usize,
    pub description: String,
    pub question_count: Option<u32>,
}

pub async fn generate_more(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<GenerateMoreRequest>,
) -> impl IntoResponse {
    if req.description.trim().is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "description must not be empty");
    }
    let Some(actor) = state.app_state.session(&session_id).await else {
        return api_error(ApiErrorCode::SessionNotFound, session_id);
    };
    let description = req.description;
    let section = req.section;
    let question_count = req.question_count;
    match ractor::call!(actor, |reply| DraftSessionMsg::GenerateMore {
        section,
        description: description.clone(),
        question_count,
        reply
    }) {
        Ok(Ok(draft)) => (StatusCode::OK, Json(draft)).into_response(),
        Ok(Err(e)) => session_error_response(e),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineQuestionRequest {
    pub section: usize,
    pub question: usize,
    pub feedback: String,
}

pub async fn refine_question(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<RefineQuestionRequest>,
) -> impl IntoResponse {
    if req.feedback.trim().is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "feedback must not be empty");
    }
    let Some(actor) = state.app_state.session(&session_id).await else {
        return api_error(ApiErrorCode::SessionNotFound, session_id);
    };
    let (section, question, feedback) = (req.section, req.question, req.feedback);
    match ractor::call!(actor, |reply| DraftSessionMsg::RefineOne {
        section,
        question,
        feedback: feedback.clone(),
        reply
    }) {
        Ok(Ok(draft)) => (StatusCode::OK, Json(draft)).into_response(),
        Ok(Err(e)) => session_error_response(e),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefineBatchRequest {
    pub feedback: String,
}

pub async fn refine_batch(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<RefineBatchRequest>,
) -> impl IntoResponse {
    if req.feedback.trim().is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "feedback must not be empty");
    }
    let Some(actor) = state.app_state.session(&session_id).await else {
        return api_error(ApiErrorCode::SessionNotFound, session_id);
    };
    let feedback = req.feedback;
    match ractor::call!(actor, |reply| DraftSessionMsg::RefineBatch {
        feedback: feedback.clone(),
        reply
    }) {
        Ok(Ok(report)) => (
            StatusCode::OK,
            Json(json!({
                "succeeded": report.succeeded,
                "attempted": report.attempted,
                "message": report.to_string(),
            })),
        )
            .into_response(),
        Ok(Err(e)) => session_error_response(e),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PublishRequest {
    pub title: Option<String>,
}

pub async fn publish(
    Path(session_id): Path<String>,
    State(state): State<ApiState>,
    Json(req): Json<PublishRequest>,
) -> impl IntoResponse {
    if let Some(title) = &req.title {
        if title.trim().is_empty() {
            return api_error(ApiErrorCode::InvalidInput, "title must not be empty");
        }
    }
    let Some(actor) = state.app_state.session(&session_id).await else {
        return api_error(ApiErrorCode::SessionNotFound, session_id);
    };
    let title = req.title.map(|t| t.trim().to_string());
    match ractor::call!(actor, |reply| DraftSessionMsg::Publish {
        title: title.clone(),
        reply
    }) {
        Ok(Ok(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(Err(e)) => session_error_response(e),
        Err(e) => api_error(ApiErrorCode::ActorError, e.to_string()),
    }
}
