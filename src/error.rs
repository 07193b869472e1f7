use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use crate::types::api::ErrorBody;

pub type PasteResult<T> = std::result::Result<T, PasteError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the paste service to its callers.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum PasteError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("code already exists")]
    Conflict,
    #[error("paste not found")]
    NotFound,
    #[error("paste store unavailable")]
    Unavailable { source: StoreError },
}

/// Errors from a persistence store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("a live paste with this code already exists")]
    DuplicateKey,
    #[error("database error")]
    Database { source: sqlx::Error },
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// Errors from a cache backend. These never reach a caller of the paste service.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("redis error")]
    Redis {
        #[from]
        source: redis::RedisError,
    },
    #[error("malformed cache entry")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

impl PasteError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PasteError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PasteError::Conflict => StatusCode::CONFLICT,
            PasteError::NotFound => StatusCode::NOT_FOUND,
            PasteError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for PasteError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.to_string(),
        });
        (self.status_code(), body).into_response()
    }
}

impl From<StoreError> for PasteError {
    fn from(source: StoreError) -> Self {
        match source {
            StoreError::DuplicateKey => PasteError::Conflict,
            _ => PasteError::Unavailable { source },
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(source: sqlx::Error) -> Self {
        let is_unique_violation = match &source {
            sqlx::Error::Database(err) => matches!(
                err.code().as_deref(),
                // sqlite primary key / unique, postgres unique_violation
                Some("1555") | Some("2067") | Some("23505")
            ),
            _ => false,
        };
        if is_unique_violation {
            StoreError::DuplicateKey
        } else {
            StoreError::Database { source }
        }
    }
}
