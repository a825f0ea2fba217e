use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use recall_core::{ErrorKind, RecallError};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Recall(#[from] RecallError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, Option<ErrorKind>) {
        match self {
            ApiError::Recall(e) => {
                let kind = e.kind();
                let (status, error_type) = match kind {
                    ErrorKind::InvalidIdentity
                    | ErrorKind::MissingSessionScope
                    | ErrorKind::InvalidTopK => (StatusCode::BAD_REQUEST, "invalid_request_error"),
                    ErrorKind::MemoryBackendUnavailable => {
                        (StatusCode::SERVICE_UNAVAILABLE, "service_unavailable")
                    },
                    ErrorKind::ModelInvocationError => (StatusCode::BAD_GATEWAY, "upstream_error"),
                    ErrorKind::Configuration | ErrorKind::Serialization => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
                    },
                };
                (status, error_type, Some(kind))
            },
            ApiError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, kind) = self.parts();

        let error_response = ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: kind.map(|k| k.as_str().to_string()),
            },
        };

        (status, Json(error_response)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
