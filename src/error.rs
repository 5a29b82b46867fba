use axum::{
    response::{IntoResponse, Response},
    http::StatusCode,
};
use serde_json::json;
use axum::Json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The uploaded bytes could not be decoded as a workbook at all.
    #[error("Malformed file: {0}")]
    MalformedFile(String),
    /// A decodable file with no usable rows, an empty submit or an export with nothing in it.
    #[error("Empty input: {0}")]
    EmptyInput(String),
    #[error("No matching records: {0}")]
    EmptySelection(String),
    #[error("Backend rejected request: {0}")]
    BackendRejected(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Import session not found: {0}")]
    SessionNotFound(String),
    #[error("Export error: {0}")]
    Export(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MalformedFile(_) => "malformed_file",
            AppError::EmptyInput(_) => "empty_input",
            AppError::EmptySelection(_) => "empty_selection",
            AppError::BackendRejected(_) => "backend_rejected",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::SessionNotFound(_) => "session_not_found",
            AppError::Export(_) => "export_failed",
            AppError::IoError(_) => "io",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::MalformedFile(_) => StatusCode::BAD_REQUEST,
            AppError::EmptyInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::EmptySelection(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BackendRejected(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for AppError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        AppError::Export(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        AppError::IoError(std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        let message = match &self {
            AppError::MalformedFile(msg)
            | AppError::EmptyInput(msg)
            | AppError::EmptySelection(msg)
            | AppError::BackendRejected(msg)
            | AppError::InvalidInput(msg)
            | AppError::SessionNotFound(msg)
            | AppError::Export(msg) => msg.clone(),
            AppError::IoError(err) => err.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "kind": self.kind(),
        }));

        (status, body).into_response()
    }
}
