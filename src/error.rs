use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid BIND_ADDR {0:?}: expected host:port")]
    InvalidBindAddr(String),
}

/// Per-request failures of `/predict`.
#[derive(Debug, Error)]
pub enum PredictError {
    /// No model was loaded at startup. Retryable once health reports the model.
    #[error("model not loaded: {0}")]
    Unavailable(String),

    #[error("invalid telemetry: {0}")]
    Validation(String),

    #[error("prediction failed: {0}")]
    Computation(String),
}

impl PredictError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PredictError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PredictError::Validation(_) => StatusCode::BAD_REQUEST,
            PredictError::Computation(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}
