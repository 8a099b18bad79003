//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::policy_service::PolicyError;
use crate::service::run_service::RunError;
use crate::service::settings_service::SettingsError;
use crate::service::target_service::TargetError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    DatabaseError(sqlx::Error),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::DatabaseError(err) => {
                tracing::error!("Database error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<TargetError> for ApiError {
    fn from(err: TargetError) -> Self {
        match err {
            TargetError::NotFound(id) => ApiError::NotFound(format!("Target {} not found", id)),
            TargetError::ValidationError(msg) => ApiError::BadRequest(msg),
            TargetError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::NotFound(id) => ApiError::NotFound(format!("Run {} not found", id)),
            RunError::TargetNotFound(id) => ApiError::NotFound(format!("Target {} not found", id)),
            RunError::TargetBusy(id) => {
                ApiError::Conflict(format!("Target {} already has a backup in progress", id))
            }
            RunError::DatabaseError(err) => ApiError::DatabaseError(err),
            RunError::LaunchError(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::NotFound(id) => ApiError::NotFound(format!("Policy {} not found", id)),
            PolicyError::ValidationError(msg) => ApiError::BadRequest(msg),
            PolicyError::DatabaseError(err) => ApiError::DatabaseError(err),
            PolicyError::SchedulerError(err) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::ValidationError(msg) => ApiError::BadRequest(msg),
            SettingsError::DatabaseError(err) => ApiError::DatabaseError(err),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_busy_target_is_conflict() {
        let response = ApiError::from(RunError::TargetBusy(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_validation_is_bad_request() {
        let response =
            ApiError::from(PolicyError::ValidationError("bad".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_target_is_not_found() {
        let response = ApiError::from(TargetError::NotFound(Uuid::new_v4())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
