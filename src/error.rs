//! Structured error types for API responses.

use axum::http::StatusCode;
use serde::Serialize;
use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors
    MissingRequiredField,
    InvalidFieldValue,

    // Not found errors
    TaskNotFound,
    UserNotFound,

    // LLM generation errors
    LlmUnavailable,
    LlmParseError,

    // Internal errors
    DatabaseError,
    InvariantViolation,
    InternalError,
}

/// Structured error for API responses.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
            details: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("{} is required", field),
        )
        .with_field(field)
    }

    pub fn invalid_value(field: &str, reason: &str) -> Self {
        Self::new(ErrorCode::InvalidFieldValue, reason).with_field(field)
    }

    pub fn task_not_found(task_id: i64) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn user_not_found(username: &str) -> Self {
        Self::new(
            ErrorCode::UserNotFound,
            format!("User not found: {}", username),
        )
    }

    pub fn llm_unavailable(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::LlmUnavailable, err.to_string())
    }

    pub fn llm_parse(err: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::LlmParseError,
            "Failed to parse generated task data",
        )
        .with_details(err.to_string())
    }

    pub fn database(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::DatabaseError, err.to_string())
    }

    pub fn invariant(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InvariantViolation, err.to_string())
    }

    pub fn internal(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, err.to_string())
    }

    /// HTTP status the error maps to at the API boundary.
    pub fn status(&self) -> StatusCode {
        match self.code {
            ErrorCode::MissingRequiredField
            | ErrorCode::InvalidFieldValue
            | ErrorCode::LlmParseError => StatusCode::BAD_REQUEST,
            ErrorCode::TaskNotFound | ErrorCode::UserNotFound => StatusCode::NOT_FOUND,
            ErrorCode::LlmUnavailable => StatusCode::BAD_GATEWAY,
            ErrorCode::DatabaseError
            | ErrorCode::InvariantViolation
            | ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to ApiError first
        match err.downcast::<ApiError>() {
            Ok(api_err) => api_err,
            Err(err) => {
                if err.root_cause().downcast_ref::<rusqlite::Error>().is_some() {
                    ApiError::database(err)
                } else {
                    ApiError::internal(err)
                }
            }
        }
    }
}

/// Result type for API operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_by_code() {
        assert_eq!(
            ApiError::task_not_found(7).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::missing_field("title").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::llm_unavailable("connection refused").status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::database("disk I/O error").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn anyhow_round_trip_preserves_code() {
        let err: anyhow::Error = ApiError::task_not_found(3).into();
        let back = ApiError::from(err);
        assert_eq!(back.code, ErrorCode::TaskNotFound);
    }

    #[test]
    fn serializes_code_as_screaming_snake_case() {
        let json = serde_json::to_string(&ApiError::missing_field("title")).unwrap();
        assert!(json.contains("MISSING_REQUIRED_FIELD"));
        assert!(json.contains("\"field\":\"title\""));
    }
}
