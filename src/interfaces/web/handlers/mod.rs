pub mod briefs;
pub mod content;
pub mod integrations;

use axum::{Json, extract::rejection::JsonRejection};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::ApiError;
use crate::core::errors::CoreError;

/// Unwraps a JSON body, reporting both unparsable JSON and a wrong shape as
/// validation errors.
pub(crate) fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|e| CoreError::Validation(e.body_text()).into())
}

pub(crate) fn parse_body<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<T, ApiError> {
    serde_json::from_value(json_body(body)?)
        .map_err(|e| CoreError::Validation(e.to_string()).into())
}
