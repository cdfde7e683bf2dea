//! Survey record endpoints: owner listing and the public form fetch.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use survey_types::{Section, SurveyRecord, SurveyStatus};
use uuid::Uuid;

use crate::api::{api_error, ApiErrorCode, ApiState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSurveysQuery {
    pub user_id: String,
}

pub async fn list_surveys(
    Query(query): Query<ListSurveysQuery>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    if query.user_id.trim().is_empty() {
        return api_error(ApiErrorCode::InvalidInput, "userId must not be empty");
    }
    match state.app_state.store().list_for_user(&query.user_id).await {
        Ok(surveys) => (StatusCode::OK, Json(surveys)).into_response(),
        Err(e) => api_error(ApiErrorCode::StoreError, e.to_string()),
    }
}

pub async fn get_survey(
    Path(survey_id): Path<Uuid>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    match state.app_state.store().fetch(survey_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => api_error(ApiErrorCode::SurveyNotFound, survey_id.to_string()),
        Err(e) => api_error(ApiErrorCode::StoreError, e.to_string()),
    }
}

/// What a respondent sees: the form definition is the draft's `sections`
/// value unchanged.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicForm {
    pub title: String,
    pub description: String,
    pub language: String,
    pub sections: Vec<Section>,
}

pub async fn get_public_form(
    Path(share_token): Path<String>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    let record = match state.app_state.store().fetch_by_share_token(&share_token).await {
        Ok(Some(record)) => record,
        Ok(None) => return api_error(ApiErrorCode::FormUnavailable, "no such form"),
        Err(e) => return api_error(ApiErrorCode::StoreError, e.to_string()),
    };

    if !form_is_open(&record) {
        return api_error(ApiErrorCode::FormUnavailable, "form is not accepting responses");
    }
    if let Some(expires_at) = record.expires_at {
        if expires_at <= Utc::now() {
            let message = record
                .expired_message
                .unwrap_or_else(|| "This survey is no longer accepting responses".to_string());
            return api_error(ApiErrorCode::FormExpired, message);
        }
    }

    (
        StatusCode::OK,
        Json(PublicForm {
            title: record.title,
            description: record.description,
            language: record.language,
            sections: record.sections,
        }),
    )
        .into_response()
}

fn form_is_open(record: &SurveyRecord) -> bool {
    record.status == SurveyStatus::Published && record.is_active
}
