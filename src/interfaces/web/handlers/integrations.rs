use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde_json::{Value, json};

use super::json_body;
use crate::core::store::IntegrationStore;
use crate::core::sync::{SyncReport, SyncRequest};
use crate::interfaces::web::AppState;
use crate::interfaces::web::auth::{Caller, ensure_client_access};
use crate::interfaces::web::error::ApiResult;

pub async fn sync_client(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(client_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<SyncReport>> {
    ensure_client_access(&state, &caller, &client_id).await?;
    let request = SyncRequest::from_json(json_body(body)?)?;
    let report = state.sync.sync(&client_id, &request).await?;
    Ok(Json(report))
}

pub async fn get_health(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let providers = state.store.list_health().await?;
    Ok(Json(json!({ "providers": providers })))
}
