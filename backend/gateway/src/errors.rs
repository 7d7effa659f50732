//! Application-wide error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use donation_flow::FlowError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] FlowError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Donation {0} not found")]
    DonationNotFound(i64),

    #[error("Form {0} not found")]
    FormNotFound(i64),

    #[error("Form slug already in use: {0}")]
    SlugTaken(String),

    #[error("IPN verification rejected the message: {0}")]
    Unverified(String),

    #[error("IPN verification endpoint unavailable (HTTP {0})")]
    VerifierUnavailable(u16),

    #[error("Corrupt donation record {id}: {reason}")]
    CorruptRecord { id: i64, reason: String },

    #[error("Donation {0} kept changing underneath the update")]
    Contention(i64),
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPayload(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unverified(_) => StatusCode::FORBIDDEN,
            Self::DonationNotFound(_) | Self::FormNotFound(_) => StatusCode::NOT_FOUND,
            Self::SlugTaken(_) => StatusCode::CONFLICT,
            Self::Http(_) | Self::VerifierUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!("Request failed: {self}");
            match status {
                StatusCode::BAD_GATEWAY => "Upstream verification failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            warn!("Request rejected: {self}");
            self.to_string()
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
