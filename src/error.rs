use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("Missing required parameters")]
    MissingParameters,

    #[error("Upstream returned status {0}")]
    Upstream(reqwest::StatusCode),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ProxyError>;

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidBody(_) | ProxyError::MissingParameters => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the caller. Internal detail stays in the server log.
    pub fn public_message(&self) -> &'static str {
        match self {
            ProxyError::InvalidBody(_) | ProxyError::MissingParameters => {
                "Missing required parameters"
            }
            _ => "Internal Server Error",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            ProxyError::InvalidBody(e) => tracing::debug!("Rejected prediction body: {}", e),
            ProxyError::MissingParameters => tracing::debug!("Rejected prediction: {}", self),
            ProxyError::Upstream(status) => {
                tracing::error!(upstream_status = %status, "Upstream prediction request failed")
            }
            ProxyError::Http(e) => tracing::error!("Upstream transport error: {}", e),
            ProxyError::Io(_) | ProxyError::Config(_) => tracing::error!("Proxy error: {}", self),
        }

        let body = Json(json!({ "error": self.public_message() }));
        (self.status_code(), body).into_response()
    }
}
