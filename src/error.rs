use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::{storage::StorageError, tokens::TokenError};

/// Message returned for every 5xx. Details stay in the logs.
const GENERIC_SERVER_ERROR: &str = "Server error";

/// AppError
///
/// The single error type returned by handlers, the repository, and the gate.
/// Implements `IntoResponse` so every failure leaves the server as a JSON body
/// of the form `{ "message": ..., "code": ... }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    /// Duplicate admin username. Reported as 400 to match the existing client.
    #[error("{0}")]
    Conflict(String),

    /// Unknown user and wrong password share this variant on purpose.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    /// Upload body over `MAX_UPLOAD_BYTES`.
    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Request timed out")]
    Timeout,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn work_not_found() -> Self {
        AppError::NotFound("Work not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) | AppError::Conflict(_) | AppError::InvalidCredentials => {
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Timeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Token(TokenError::Invalid | TokenError::Expired) => StatusCode::UNAUTHORIZED,
            AppError::Token(TokenError::RefreshInvalid) => StatusCode::FORBIDDEN,
            AppError::Storage(StorageError::Unsupported(_)) => StatusCode::BAD_REQUEST,
            AppError::Token(TokenError::Signing(_))
            | AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::PayloadTooLarge(_) => "PAYLOAD_TOO_LARGE",
            AppError::Timeout => "REQUEST_TIMEOUT",
            AppError::Token(TokenError::Invalid) => "TOKEN_INVALID",
            AppError::Token(TokenError::Expired) => "TOKEN_EXPIRED",
            AppError::Token(TokenError::RefreshInvalid) => "REFRESH_INVALID",
            AppError::Storage(StorageError::Unsupported(_)) => "BAD_REQUEST",
            AppError::Token(TokenError::Signing(_))
            | AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            GENERIC_SERVER_ERROR.to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "message": message,
            "code": self.code(),
        });

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(rejection.body_text())
        } else {
            AppError::BadRequest(rejection.body_text())
        }
    }
}

/// Every path parameter is the id of a stored work or comment, so a value that
/// does not parse names nothing and is reported as absent.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match &rejection {
            PathRejection::FailedToDeserializePathParams(err)
                if err.status() == StatusCode::BAD_REQUEST =>
            {
                match err.kind() {
                    ErrorKind::DeserializeError { key, .. }
                    | ErrorKind::ParseErrorAtKey { key, .. }
                        if key == "comment_id" =>
                    {
                        AppError::NotFound("Comment not found".to_string())
                    }
                    _ => AppError::work_not_found(),
                }
            }
            _ => AppError::BadRequest(rejection.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(err.body_text())
        } else {
            AppError::BadRequest(err.body_text())
        }
    }
}
