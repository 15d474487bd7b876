use std::io;
use std::time::Duration;

use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String), // Contains the file name

    #[error("storage error: {0}")]
    StorageIo(String), // Contains a descriptive message

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    // Internal Errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Axum error: {0}")]
    AxumError(#[from] axum::Error),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Io(err) => err.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Multipart(err) => err.status(),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Io(err) if err.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::NotFound(_) | Self::BadRequest(_) | Self::Unauthorized(_) => self.to_string(),
            Self::Multipart(err) => format!("failed to receive file: {}", err.body_text()),
            Self::Timeout { operation, .. } => format!("{operation} timed out"),
            Self::Io(err) if err.kind() == io::ErrorKind::NotFound => "file not found".to_string(),
            _ => "an internal server error occurred".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!("Generating response for AppError: {:?}", self);

        let status_code = self.status_code();
        (status_code, Json(json!({ "error": self.public_message() }))).into_response()
    }
}
