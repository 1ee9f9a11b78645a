// src/handlers.rs
use serde::Serialize;
use validator::Validate;

use crate::error::{ApiError, ApiResult};

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

/// Run `validator` rules on a request body.
pub fn validate_request<T: Validate>(request: &T) -> ApiResult<()> {
    request.validate().map_err(ApiError::from)
}

/// Path parameters become store path segments, so they must be usable as one.
pub fn path_segment(raw: &str, what: &str) -> ApiResult<String> {
    let trimmed = raw.trim();
    if crate::store::is_valid_path(trimmed) && !trimmed.contains('/') {
        Ok(trimmed.to_string())
    } else {
        Err(ApiError::BadRequest(format!("Invalid {} '{}'", what, raw)))
    }
}
