// Error types module

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::storage::StorageError;
use crate::version::VersionParseError;

/// Error type for the retrieval and upload paths
///
/// Each variant maps to one HTTP status and one stable `error-code` string.
#[derive(Error, Debug)]
pub enum ToolsError {
    /// Request could not be understood (bad version, content type, body)
    #[error("{0}")]
    MalformedRequest(String),

    /// No artifact locally and no candidate remotely
    #[error("{0}")]
    NotFound(String),

    /// Fetched bytes disagree with the expected size or hash
    #[error("{0}")]
    IntegrityFailure(String),

    /// Mutations are currently frozen
    #[error("{0}")]
    ChangeBlocked(String),

    /// Local store failed
    #[error("storage failure: {0}")]
    StorageFailure(#[source] StorageError),

    #[error("{0}")]
    MethodNotAllowed(String),

    /// Remote fetch failed in transit or returned a non-200 status
    #[error("cannot fetch agent binaries: {0}")]
    Transport(String),
}

impl ToolsError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ToolsError::MalformedRequest(_) | ToolsError::ChangeBlocked(_) => {
                StatusCode::BAD_REQUEST
            }
            ToolsError::NotFound(_) => StatusCode::NOT_FOUND,
            ToolsError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ToolsError::IntegrityFailure(_)
            | ToolsError::StorageFailure(_)
            | ToolsError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code reported in the `error-code` field
    pub fn error_code(&self) -> &'static str {
        match self {
            ToolsError::MalformedRequest(_) => "bad request",
            ToolsError::NotFound(_) => "not found",
            ToolsError::MethodNotAllowed(_) => "method not allowed",
            ToolsError::ChangeBlocked(_) => "operation is blocked",
            ToolsError::IntegrityFailure(_) => "integrity failure",
            ToolsError::StorageFailure(_) | ToolsError::Transport(_) => "internal error",
        }
    }
}

impl ToolsError {
    /// Attach a failure to release handles after this error already occurred.
    ///
    /// The variant (and so the status) is kept; the close error is appended
    /// to the message.
    pub fn with_close_failure(self, close_err: StorageError) -> Self {
        if let ToolsError::StorageFailure(first) = self {
            return ToolsError::StorageFailure(StorageError::CloseFailed {
                first: Box::new(first),
                second: Box::new(close_err),
            });
        }
        let also = |message: String| format!("{} (also: {})", message, close_err);
        match self {
            ToolsError::MalformedRequest(m) => ToolsError::MalformedRequest(also(m)),
            ToolsError::NotFound(m) => ToolsError::NotFound(also(m)),
            ToolsError::IntegrityFailure(m) => ToolsError::IntegrityFailure(also(m)),
            ToolsError::ChangeBlocked(m) => ToolsError::ChangeBlocked(also(m)),
            ToolsError::MethodNotAllowed(m) => ToolsError::MethodNotAllowed(also(m)),
            ToolsError::Transport(m) => ToolsError::Transport(also(m)),
            storage @ ToolsError::StorageFailure(_) => storage,
        }
    }
}

impl From<StorageError> for ToolsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(version) => {
                ToolsError::NotFound(format!("agent binaries {} not found", version))
            }
            other => ToolsError::StorageFailure(other),
        }
    }
}

impl From<VersionParseError> for ToolsError {
    fn from(err: VersionParseError) -> Self {
        ToolsError::MalformedRequest(err.to_string())
    }
}

impl IntoResponse for ToolsError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "Request rejected");
        }
        let body = serde_json::json!({
            "error": self.to_string(),
            "error-code": self.error_code(),
        });
        (status, axum::Json(body)).into_response()
    }
}
