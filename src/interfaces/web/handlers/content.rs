use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::Value;

use super::parse_body;
use crate::core::errors::CoreError;
use crate::core::store::{BriefStore, ContentRecord};
use crate::core::workflow::{ReviewAction, ReviewSubmission};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::{Caller, ensure_client_access};
use crate::interfaces::web::error::ApiResult;

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub action: String,
    #[serde(default)]
    pub reviewer_notes: Option<String>,
    #[serde(default)]
    pub revision_requests: Option<Vec<String>>,
    #[serde(default)]
    pub review_time_minutes: Option<u32>,
}

pub async fn review_content(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(content_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<ContentRecord>> {
    let request: ReviewRequest = parse_body(body)?;
    let action = ReviewAction::parse(&request.action).ok_or_else(|| {
        CoreError::Validation(format!(
            "action must be 'approve' or 'revision', got '{}'",
            request.action
        ))
    })?;

    let content = state
        .store
        .get_content(&content_id)
        .await?
        .ok_or_else(|| CoreError::not_found("content", content_id.as_str()))?;
    ensure_client_access(&state, &caller, &content.client_id).await?;

    let updated = state
        .workflow
        .submit_review(ReviewSubmission {
            content_id,
            action,
            reviewer_notes: request.reviewer_notes,
            revision_requests: request.revision_requests,
            review_time_minutes: request.review_time_minutes,
        })
        .await?;
    Ok(Json(updated))
}
