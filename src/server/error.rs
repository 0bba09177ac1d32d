use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::error::{ErrorKind, HubError, IngestError};

pub type ApiResult<T> = Result<T, ApiError>;

/// Error surfaced to an HTTP caller
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, ErrorKind::NotFound, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "status": "error",
            "error": {
                "kind": self.kind.as_str(),
                "message": self.message,
            }
        }));

        (self.status, body).into_response()
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        let status = match err {
            IngestError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            IngestError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        Self::new(status, err.kind(), err.to_string())
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, err.kind(), err.to_string())
    }
}
