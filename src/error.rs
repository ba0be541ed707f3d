use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::schedule::ConflictCheck;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("Name too long: {0} characters (max 200)")]
    NameTooLong(usize),

    #[error("Invalid date {0:?}: expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("Invalid time {0:?}: expected HH:MM (24-hour)")]
    InvalidTime(String),

    #[error("Invalid duration {0}: must be between 1 and 1440 minutes")]
    InvalidDuration(i64),

    #[error("A lesson starting at {0} cannot last {1} minutes: it would run past midnight")]
    PastMidnight(String, i64),

    #[error("Invalid weekday {0}: must be between 0 (Monday) and 6 (Sunday)")]
    InvalidWeekday(i64),

    #[error("Exactly one of student_id or group_id must be set")]
    AmbiguousAttendee,

    #[error("Invalid date range: {0} is after {1}")]
    InvalidRange(String, String),

    #[error("Date range {0} to {1} is longer than {2} days")]
    RangeTooWide(String, String, i64),

    #[error("Invalid currency code {0:?}: expected three letters")]
    InvalidCurrency(String),

    #[error("Invalid status {0:?}")]
    InvalidStatus(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Error, Debug)]
pub enum RateError {
    #[error("No rate source configured")]
    NotConfigured,

    #[error("No rate from {0} to {1}")]
    UnknownCurrency(String, String),

    #[error("Rate source error: {0}")]
    Source(String),
}

impl From<reqwest::Error> for RateError {
    fn from(e: reqwest::Error) -> Self {
        RateError::Source(e.to_string())
    }
}

/// Error type returned by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Rates(#[from] RateError),

    #[error("Schedule conflict")]
    Conflict(ConflictCheck),

    #[error("Schedule could not be verified")]
    Unverified,

    #[error("{0}")]
    BadRequest(String),
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Validation(_) | ApiError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ApiError::Storage(StorageError::NotFound(..)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Storage(StorageError::Database(e)) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR")
            }
            ApiError::Rates(RateError::NotConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "RATES_UNAVAILABLE")
            }
            ApiError::Rates(RateError::UnknownCurrency(..)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Rates(RateError::Source(e)) => {
                tracing::error!("Rate source error: {}", e);
                (StatusCode::BAD_GATEWAY, "RATES_UNAVAILABLE")
            }
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "SCHEDULE_CONFLICT"),
            ApiError::Unverified => (StatusCode::SERVICE_UNAVAILABLE, "SCHEDULE_UNVERIFIED"),
        };

        // The conflict report doubles as the response body so clients can
        // highlight the clashing sessions.
        if let ApiError::Conflict(check) = self {
            return (status, Json(check)).into_response();
        }

        let message = match &self {
            ApiError::Storage(StorageError::Database(_)) => "Database error".to_string(),
            other => other.to_string(),
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
