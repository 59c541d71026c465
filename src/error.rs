//! Typed error taxonomy for the core services.
//!
//! Every service operation returns one of these outcomes; the HTTP boundary
//! maps them to status codes in the single `IntoResponse` impl below. Server
//! errors keep their cause in the log and send a generic body to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("user not found: {0}")]
    NotFound(String),
    #[error("email already in use: {0}")]
    DuplicateEmail(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("{0}")]
    Validation(String),
    #[error("storage unavailable")]
    Storage(#[source] sqlx::Error),
    #[error("internal error")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        Error::Storage(e)
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::DuplicateEmail(_) => StatusCode::CONFLICT,
            Error::InvalidQuery(_) | Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::InvalidCredentials | Error::InvalidToken => StatusCode::UNAUTHORIZED,
            Error::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Display for Storage/Internal is already generic, so the body never
        // carries driver or stack detail; the source goes to the log only.
        if status.is_server_error() {
            error!(error = ?self, "request failed");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
