use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use conduit::{ConduitError, ErrorKind};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Missing or malformed Authorization header; expected a bearer token")]
    MissingBearer,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Conduit(#[from] ConduitError),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingBearer => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conduit(e) => status_for(e.kind()),
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        // Caller is authenticated but may not act downstream
        ErrorKind::Unauthorized => StatusCode::FORBIDDEN,
        ErrorKind::AgentFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (kind, message) = match &self {
            ApiError::MissingBearer => ("unauthorized", self.to_string()),
            ApiError::BadRequest(_) => ("invalid_request", self.to_string()),
            ApiError::Conduit(e) => {
                let kind = e.kind();
                if status.is_server_error() {
                    tracing::error!("Delegated call failed ({}): {}", kind, e);
                } else {
                    tracing::warn!("Delegated call refused ({}): {}", kind, e);
                }
                (kind.as_str(), e.user_message())
            }
            ApiError::Internal => {
                tracing::error!("Internal error: {}", self);
                ("internal", self.to_string())
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
