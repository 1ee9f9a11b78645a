// src/error.rs
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(String),
    ValidationError(String),
    DatabaseError(sqlx::Error),
    /// One of the tree reads failed; nothing was evaluated.
    FetchError(String),
    /// The batched write failed; any subset of it may have landed.
    WriteError(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::DatabaseError(err) => write!(f, "Database Error: {}", err),
            ApiError::FetchError(msg) => write!(f, "Fetch Error: {}", msg),
            ApiError::WriteError(msg) => write!(f, "Write Error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        match self {
            ApiError::BadRequest(_) => HttpResponse::BadRequest().json(error_response),
            ApiError::NotFound(_) => HttpResponse::NotFound().json(error_response),
            ApiError::ValidationError(_) => HttpResponse::UnprocessableEntity().json(error_response),
            ApiError::DatabaseError(_) => HttpResponse::InternalServerError().json(error_response),
            ApiError::FetchError(_) => HttpResponse::ServiceUnavailable().json(error_response),
            ApiError::WriteError(_) => HttpResponse::InternalServerError().json(error_response),
            ApiError::InternalServerError(_) => HttpResponse::InternalServerError().json(error_response),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InternalServerError(format!("JSON error: {}", err))
    }
}

impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn record_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Damaged/lost record with ID '{}' not found", id))
    }

    pub fn invalid_path(path: &str) -> Self {
        ApiError::BadRequest(format!("Invalid tree path '{}'", path))
    }

    pub fn fetch_failed(collection: &str, cause: &ApiError) -> Self {
        ApiError::FetchError(format!("Failed to read '{}': {}", collection, cause))
    }

    pub fn write_failed(cause: &ApiError) -> Self {
        ApiError::WriteError(format!("Batched update failed: {}", cause))
    }

    pub fn store_unavailable() -> Self {
        ApiError::InternalServerError("Tree store is unreachable".to_string())
    }
}
