use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::AppState;
use super::error::ApiError;
use crate::core::errors::CoreError;
use crate::core::store::AccessStore;

/// Who is calling. `user_id` is `None` only in open loopback mode, where
/// client access checks are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<String>,
}

pub(crate) fn is_loopback(host: &str) -> bool {
    matches!(host, "127.0.0.1" | "::1" | "localhost")
}

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let any_tokens_exist = match state.store.has_any_api_tokens().await {
        Ok(exists) => exists,
        Err(e) => return ApiError::from(e).into_response(),
    };

    // No tokens issued yet: open access, but only while bound to loopback.
    if !any_tokens_exist {
        if is_loopback(&state.api_host) {
            req.extensions_mut().insert(Caller { user_id: None });
            return next.run(req).await;
        }
        return ApiError(CoreError::Unauthenticated).into_response();
    }

    let Some(raw_token) = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
    else {
        return ApiError(CoreError::Unauthenticated).into_response();
    };

    match state.store.resolve_api_token(&raw_token).await {
        Ok(Some(user_id)) => {
            req.extensions_mut().insert(Caller {
                user_id: Some(user_id),
            });
            next.run(req).await
        }
        Ok(None) => ApiError(CoreError::Unauthenticated).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Fails with 403 unless the caller may act on `client_id`.
pub(crate) async fn ensure_client_access(
    state: &AppState,
    caller: &Caller,
    client_id: &str,
) -> Result<(), ApiError> {
    let Some(user_id) = &caller.user_id else {
        return Ok(());
    };
    if state.store.has_client_access(user_id, client_id).await? {
        Ok(())
    } else {
        Err(CoreError::AccessDenied(format!("no access to client '{}'", client_id)).into())
    }
}
