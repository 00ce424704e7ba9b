use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use je_engine::EngineError;
use serde_json::json;

/// Maps engine and transport errors onto the HTTP surface's status codes (§6, §7).
pub struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        let status = match err {
            EngineError::Unauthorized => StatusCode::UNAUTHORIZED,
            EngineError::Forbidden => StatusCode::FORBIDDEN,
            EngineError::NotFound => StatusCode::NOT_FOUND,
            EngineError::Database(_) | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self(status, err.to_string())
    }
}
