use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;

use crate::engagement::EngagementError;

/// Handler-level error carrying the status and the `{"error": "..."}` body.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    pub fn catalog_unavailable() -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "catalog is not configured".to_string(),
        }
    }

    /// Logs the diagnostic server-side and returns a generic body.
    pub fn internal(err: anyhow::Error) -> Self {
        error!("Internal error: {:#}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "internal server error".to_string(),
        }
    }
}

impl From<EngagementError> for ApiError {
    fn from(err: EngagementError) -> Self {
        let status = match &err {
            EngagementError::Validation(_) => StatusCode::BAD_REQUEST,
            EngagementError::NotFound(_) => StatusCode::NOT_FOUND,
            EngagementError::NotOwner(_) => StatusCode::FORBIDDEN,
            EngagementError::Conflict(_) => StatusCode::CONFLICT,
            EngagementError::Storage(inner) => {
                error!("Storage error: {:#}", inner);
                return Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "internal server error".to_string(),
                };
            }
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}
