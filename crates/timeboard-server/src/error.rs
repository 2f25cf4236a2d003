use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use timeboard_core::ValidationError;
use timeboard_store::StoreError;

/// Everything a request can fail with, as seen by HTTP clients.
///
/// The body is always `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid intent")]
    InvalidIntent,

    #[error("{0}")]
    BadRequest(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(v) => Self::Validation(v),
            other => Self::Store(other),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InvalidIntent | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to the client. Storage details stay in the logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Log a storage fault at error level. Other variants are the caller's
/// problem and are not logged here.
pub fn log_store_failure(err: &ApiError) {
    if let ApiError::Store(e) = err {
        tracing::error!(error = %e, "store operation failed");
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.client_message() });
        (self.status(), Json(body)).into_response()
    }
}
