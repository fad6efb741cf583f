//! Error types module
//!
//! Every failure inside the pipeline is expressed as an `AppError`. The four pipeline
//! failure kinds (validation, storage, transform, not-found) map one-to-one onto variants;
//! the remaining variants cover the HTTP surface (unknown operation, wrong method, oversized
//! payload) and unexpected internal failures.

use std::io;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues and unprocessable inputs
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "VALIDATION_FAILURE")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failure: {0}")]
    ValidationFailure(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Transform failure: {0}")]
    TransformFailure(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation '{0}' is not implemented")]
    UnknownOperation(String),

    #[error("Method {method} is not allowed on operation '{operation}'")]
    MethodNotAllowed { method: String, operation: String },

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            AppError::NotFound(err.to_string())
        } else {
            AppError::StorageFailure(format!("IO error: {}", err))
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::ValidationFailure(format!("JSON parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::ValidationFailure(_) => (
            400,
            "VALIDATION_FAILURE",
            false,
            Some("Check request files and parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::StorageFailure(_) => (
            500,
            "STORAGE_FAILURE",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::TransformFailure(_) => (
            500,
            "TRANSFORM_FAILURE",
            false,
            Some("Check that the input file is valid for this operation"),
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("The file may have expired; submit the request again"),
            false,
            LogLevel::Debug,
        ),
        AppError::UnknownOperation(_) => (
            404,
            "UNKNOWN_OPERATION",
            false,
            Some("Check the operation id in the request path"),
            false,
            LogLevel::Debug,
        ),
        AppError::MethodNotAllowed { .. } => (
            405,
            "METHOD_NOT_ALLOWED",
            false,
            Some("Submit operations with POST"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::ValidationFailure(_) => "ValidationFailure",
            AppError::StorageFailure(_) => "StorageFailure",
            AppError::TransformFailure(_) => "TransformFailure",
            AppError::NotFound(_) => "NotFound",
            AppError::UnknownOperation(_) => "UnknownOperation",
            AppError::MethodNotAllowed { .. } => "MethodNotAllowed",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::ValidationFailure(_))
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::ValidationFailure(ref msg) => msg.clone(),
            AppError::StorageFailure(_) => "Failed to access storage".to_string(),
            AppError::TransformFailure(ref msg) => msg.clone(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::UnknownOperation(ref op) => {
                format!("Operation '{}' is not implemented", op)
            }
            AppError::MethodNotAllowed { .. } => self.to_string(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::Internal(_) => "Internal server error".to_string(),
            AppError::InternalWithSource { .. } => "Internal server error".to_string(),
        }
    }
}
