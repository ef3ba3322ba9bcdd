use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};

/// Application-wide Result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Main application error type
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    /// Validation errors for business rules
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database operation errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Payment gateway errors (failed call, inconsistent amounts)
    #[error("Payment error: {0}")]
    Payment(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unauthorized access
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Conflict - uniqueness or state transition refused
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Invariant check failed; blocks persistence and is never swallowed
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// HTTP client errors
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();

        // Sanitize error messages to prevent information disclosure
        let error_message = match self {
            // Return detailed messages for client errors (4xx)
            AppError::Validation(msg) => msg.clone(),
            AppError::NotFound(msg) => msg.clone(),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::Conflict(msg) => msg.clone(),

            // Sanitize server errors (5xx) - don't expose internal details
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Integrity(_) => "An integrity check failed".to_string(),
            AppError::Configuration(_) => "A configuration error occurred".to_string(),
            AppError::Internal(_) => "An internal server error occurred".to_string(),

            // Gateway errors may contain sensitive API details
            AppError::Payment(_) => "A payment gateway error occurred".to_string(),
            AppError::HttpClient(_) => "An external service error occurred".to_string(),

            // JSON errors usually contain request details (safe to return)
            AppError::Json(err) => format!("Invalid JSON: {}", err),
        };

        // Log full error for debugging (with tracing)
        match self {
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database error occurred");
            }
            AppError::Payment(e) => {
                tracing::error!(error = %e, "Payment gateway error occurred");
            }
            AppError::Integrity(e) => {
                tracing::error!(error = %e, "Integrity check failed");
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "Internal error occurred");
            }
            _ => {}
        }

        HttpResponse::build(status_code).json(serde_json::json!({
            "error": {
                "message": error_message,
                "code": status_code.as_u16(),
            }
        }))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Payment(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Integrity(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Json(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Helper functions for common error scenarios
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        AppError::NotFound(resource.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::Unauthorized(msg.into())
    }

    pub fn payment(msg: impl Into<String>) -> Self {
        AppError::Payment(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        AppError::Integrity(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }

    /// Whether a failed operation may be retried with backoff.
    ///
    /// Validation, authorization, not-found and conflict (duplicate) failures
    /// are permanent: retrying them can never succeed. Gateway and transient
    /// infrastructure failures are fair game for the retry scheduler.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Validation(_)
            | AppError::Unauthorized(_)
            | AppError::NotFound(_)
            | AppError::Conflict(_)
            | AppError::Integrity(_)
            | AppError::Json(_)
            | AppError::Configuration(_) => false,
            AppError::Database(e) => !matches!(e, sqlx::Error::RowNotFound),
            AppError::Payment(_) | AppError::HttpClient(_) | AppError::Internal(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_not_retryable() {
        assert!(!AppError::validation("bad amount").is_retryable());
        assert!(!AppError::unauthorized("missing key").is_retryable());
        assert!(!AppError::not_found("invoice").is_retryable());
        assert!(!AppError::conflict("already finalized").is_retryable());
    }

    #[test]
    fn test_gateway_errors_are_retryable() {
        assert!(AppError::payment("gateway timeout").is_retryable());
        assert!(AppError::internal("pool exhausted").is_retryable());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::conflict("x").status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::payment("x").status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            AppError::integrity("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
