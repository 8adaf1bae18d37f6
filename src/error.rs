use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use log::{debug, error};
use thiserror::Error;

pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("temporarily unavailable: {0}")]
    Transient(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("{0:#}")]
    Internal(anyhow::Error),
}

/// SQLITE_BUSY or SQLITE_LOCKED, extended codes included. Retrying may succeed.
fn is_contention(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .and_then(|e| e.code())
        .and_then(|code| code.parse::<i32>().ok())
        .map_or(false, |code| matches!(code & 0xff, 5 | 6))
}
impl From<sqlx::Error> for ExchangeError {
    fn from(e: sqlx::Error) -> Self {
        if is_contention(&e) {
            Self::Transient(format!("database busy: {}", e))
        } else {
            Self::Database(e)
        }
    }
}
impl From<anyhow::Error> for ExchangeError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast_ref::<sqlx::Error>() {
            Some(inner) if is_contention(inner) => Self::Transient(format!("database busy: {:#}", e)),
            _ => Self::Internal(e),
        }
    }
}
impl ExchangeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::InvalidState(_) => StatusCode::CONFLICT,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::InsufficientFunds(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            return (status, "internal server error".to_string()).into_response();
        }
        debug!("Request rejected: {}", self);
        (status, self.to_string()).into_response()
    }
}

macro_rules! not_found {
    ($($arg:tt)*) => { $crate::error::ExchangeError::NotFound(format!($($arg)*)) };
}
macro_rules! invalid_argument {
    ($($arg:tt)*) => { $crate::error::ExchangeError::InvalidArgument(format!($($arg)*)) };
}
macro_rules! invalid_state {
    ($($arg:tt)*) => { $crate::error::ExchangeError::InvalidState(format!($($arg)*)) };
}
pub(crate) use {invalid_argument, invalid_state, not_found};
