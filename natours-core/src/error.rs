use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message returned to clients for unclassified failures in production.
const GENERIC_MESSAGE: &str = "Something went very wrong!";

/// Application error taxonomy.
///
/// Every variant except `Internal` is operational: the message is safe to
/// show to a client. `Internal` is logged in full and replaced by a generic
/// message before it leaves the process.
#[derive(Debug, Error)]
pub enum AppError {
    /// Schema or constraint violation on a write
    #[error("{0}")]
    Validation(String),

    /// Malformed identifier, unknown field or unparsable value in a query
    #[error("{0}")]
    Cast(String),

    /// Unique constraint violation
    #[error("Duplicate value for {0}. Please use another value!")]
    DuplicateKey(String),

    #[error("{0}")]
    NotFound(String),

    /// Missing, invalid, expired or stale credential
    #[error("{0}")]
    Unauthenticated(String),

    /// Valid credential, insufficient role or ownership
    #[error("{0}")]
    Forbidden(String),

    /// Payment callback could not be authenticated
    #[error("Webhook error: {0}")]
    InvalidSignature(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::Cast(_)
            | AppError::DuplicateKey(_)
            | AppError::InvalidSignature(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_operational(&self) -> bool {
        !matches!(self, AppError::Internal(_))
    }
}

/// Full error text attached to error responses as an extension.
///
/// Only surfaced to clients by [`expose_error_detail`], which is installed
/// in development mode.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

/// Error body of the response envelope.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: if status.is_client_error() { "fail" } else { "error" },
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let detail = format!("{:#}", self);

        let message = if self.is_operational() {
            self.to_string()
        } else {
            error!("Unhandled error: {:?}", self);
            GENERIC_MESSAGE.to_string()
        };

        let mut response = (status, Json(ErrorBody::new(status, message))).into_response();
        response.extensions_mut().insert(ErrorDetail(detail));
        response
    }
}

/// Rewrites error responses to carry the full error text.
///
/// Development-only response mapper; production keeps the sanitized body.
pub async fn expose_error_detail(response: Response) -> Response {
    match response.extensions().get::<ErrorDetail>().cloned() {
        Some(ErrorDetail(detail)) => {
            let status = response.status();
            (status, Json(ErrorBody::new(status, detail))).into_response()
        }
        None => response,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return AppError::NotFound("No document found with that ID".to_string());
        }
        match classify_database_error(&err) {
            Some(mapped) => mapped,
            None => AppError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid input data: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Cast(format!("Invalid ID: {}", rejection.body_text()))
    }
}

/// Maps Postgres SQLSTATE codes onto operational errors.
fn classify_database_error(err: &sqlx::Error) -> Option<AppError> {
    let db = err.as_database_error()?;
    let code = db.code()?;

    match code.as_ref() {
        "23505" => {
            let constraint = db.constraint().unwrap_or("a unique field");
            Some(AppError::DuplicateKey(
                constraint.trim_end_matches("_key").to_string(),
            ))
        }
        "22P02" => Some(AppError::Cast(format!("Invalid input: {}", db.message()))),
        "23514" => Some(AppError::Validation(format!(
            "Invalid input data: {}",
            db.constraint().unwrap_or(db.message())
        ))),
        "23503" => Some(AppError::NotFound(
            "Referenced document does not exist".to_string(),
        )),
        _ => None,
    }
}
