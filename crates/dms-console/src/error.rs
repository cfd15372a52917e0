//! # Design
//!
//! - `ApiError` covers one round trip: transport, status and decoding failures.
//! - `ConsoleError` adds the client-side taxonomy (preconditions, gating,
//!   declined confirmations, session storage) on top of API failures.
//! - Display strings are what the operator sees, so backend `detail` text is
//!   surfaced verbatim.

use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

/// Fallback text when a failed response carries nothing readable.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred";

/// Result alias for single API calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result alias for console operations.
pub type ConsoleResult<T> = Result<T, ConsoleError>;

/// Errors produced by one REST round trip.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend answered 401; the session must be discarded.
    #[error("Unauthorized")]
    Unauthorized,
    /// Any other non-2xx response, with the extracted message.
    #[error("{message}")]
    Status {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Message extracted from the response body.
        message: String,
    },
    /// The login endpoint rejected the credentials.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The request never produced a response.
    #[error("network request failed: {source}")]
    Transport {
        /// Endpoint being called.
        endpoint: String,
        /// Underlying transport error.
        #[source]
        source: reqwest::Error,
    },
    /// The endpoint could not be combined with the base URL.
    #[error("invalid endpoint")]
    Endpoint {
        /// Endpoint being called.
        endpoint: String,
        /// Underlying URL error.
        #[source]
        source: url::ParseError,
    },
    /// A JSON body did not match the expected shape.
    #[error("unexpected response from server")]
    Decode {
        /// Endpoint being called.
        endpoint: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// A request body could not be serialised.
    #[error("failed to encode request body")]
    Encode {
        /// Endpoint being called.
        endpoint: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
    /// A JSON body was expected but the server returned text.
    #[error("expected a JSON response")]
    NotJson {
        /// Endpoint being called.
        endpoint: String,
    },
    /// Reading an upload or writing a download failed.
    #[error("file access failed for {}", path.display())]
    Io {
        /// Destination path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl ApiError {
    /// Whether the error requires a forced logout.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

/// Errors raised by persisting the session token.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the session file failed.
    #[error("session storage io failure")]
    Io {
        /// Session file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The session file is not valid JSON.
    #[error("session storage is corrupt")]
    Json {
        /// Session file path.
        path: PathBuf,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by console operations.
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// A client-side check failed before any request was issued.
    #[error("{0}")]
    Precondition(String),
    /// The operation needs an authenticated session.
    #[error("not logged in")]
    NotAuthenticated,
    /// The operation is reserved for administrators.
    #[error("Admin access required")]
    AdminRequired,
    /// The operator declined a destructive action.
    #[error("cancelled")]
    Declined,
    /// A REST call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The session token could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ConsoleError {
    /// Build a precondition failure.
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Whether the error came from a 401 response.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_display_backend_message() {
        let err = ApiError::Status {
            status: StatusCode::BAD_REQUEST,
            message: "Template with this name already exists".to_string(),
        };
        assert_eq!(err.to_string(), "Template with this name already exists");
    }

    #[test]
    fn unauthorized_is_detected_through_console_error() {
        let err = ConsoleError::from(ApiError::Unauthorized);
        assert!(err.is_unauthorized());
        assert_eq!(err.to_string(), "Unauthorized");
        assert!(!ConsoleError::Declined.is_unauthorized());
    }

    #[test]
    fn preconditions_display_their_message() {
        let err = ConsoleError::precondition("New passwords do not match");
        assert_eq!(err.to_string(), "New passwords do not match");
    }
}
