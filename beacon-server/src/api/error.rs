//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use beacon_engine::EngineError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    TooManyRequests(String),
    InternalError(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::NotFound(msg) | ApiError::BadRequest(msg) | ApiError::TooManyRequests(msg) => {
                msg
            }
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::NotFound(id) => ApiError::NotFound(format!("Run {} not found", id)),
            EngineError::UnknownPipeline(_) => ApiError::BadRequest(err.to_string()),
            EngineError::AtCapacity(_) => ApiError::TooManyRequests(err.to_string()),
            other => ApiError::InternalError(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::domain::run::RunId;

    #[test]
    fn test_engine_errors_map_to_status_codes() {
        let cases = [
            (
                EngineError::UnknownPipeline("nope".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (EngineError::NotFound(RunId::new()), StatusCode::NOT_FOUND),
            (EngineError::AtCapacity(4), StatusCode::TOO_MANY_REQUESTS),
            (
                EngineError::Persistence("disk full".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }
}
