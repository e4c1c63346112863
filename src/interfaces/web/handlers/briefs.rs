use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::Value;

use super::parse_body;
use crate::core::cache::keys;
use crate::core::errors::CoreError;
use crate::core::store::{BriefRecord, BriefStore};
use crate::core::workflow::BriefTransition;
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::{Caller, ensure_client_access};
use crate::interfaces::web::error::ApiResult;

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ListQuery {
    pub client_id: Option<String>,
}

pub async fn transition_brief(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(brief_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<BriefTransition>> {
    let request: TransitionRequest = parse_body(body)?;
    let brief = state
        .store
        .get_brief(&brief_id)
        .await?
        .ok_or_else(|| CoreError::not_found("brief", brief_id.as_str()))?;
    ensure_client_access(&state, &caller, &brief.client_id).await?;

    let moved = state
        .workflow
        .transition_brief_status(
            &brief.id,
            &request.status,
            caller.user_id.as_deref(),
            Some(&brief.status),
        )
        .await?;
    Ok(Json(moved))
}

/// Client brief listing, served through the cache so workflow changes are
/// visible once the engine invalidates it.
pub async fn list_briefs(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<BriefRecord>>> {
    let client_id = query
        .client_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CoreError::Validation("client_id is required".into()))?;
    ensure_client_access(&state, &caller, &client_id).await?;

    let key = keys::client_briefs(&client_id);
    let store = state.store.clone();
    let briefs = state
        .cache
        .get_or_fetch(&key, keys::CLIENT_BRIEFS_TTL, || async move {
            store.list_briefs(&client_id).await
        })
        .await?;
    Ok(Json(briefs))
}
