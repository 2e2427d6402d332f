//! Client error types.
//!
//! Every failed call from every service is normalised into [`Error`]:
//! a response with an error status becomes `Auth`, `NotFound` or `Server`;
//! a request that got no response becomes `Network`; a request that could
//! not be built becomes `Request`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message used for every request that received no response.
pub const NO_RESPONSE_MESSAGE: &str = "No response from server. Check your connection.";

/// Fallback message when an error response carries no `message`.
pub const DEFAULT_SERVER_MESSAGE: &str = "Server error";

/// Per-field error messages, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against `field`.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    /// Messages recorded for `field`.
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// `Ok(())` when empty, otherwise a validation error.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in self.iter() {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Client error type.
///
/// Cloneable so that a single failed fetch can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Client-side field constraints failed; nothing was sent.
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Server rejected the credentials or the session (401).
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    /// Referenced resource does not exist (404).
    #[error("Not found: {message}")]
    NotFound { message: String },

    /// The request was sent but no response arrived.
    #[error("{message}")]
    Network { message: String },

    /// Any other error status.
    #[error("Server error ({status}): {message}")]
    Server {
        status: u16,
        message: String,
        errors: Option<FieldErrors>,
    },

    /// Local session storage failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The request could not be built or the response could not be decoded.
    #[error("Request error: {0}")]
    Request(String),

    /// Invalid configuration or API misuse.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn network() -> Self {
        Error::Network {
            message: NO_RESPONSE_MESSAGE.to_string(),
        }
    }

    /// Build the error for a response with a non-success status.
    pub(crate) fn from_status(status: u16, body: Option<ErrorResponse>) -> Self {
        let body = body.unwrap_or_default();
        let message = body
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_MESSAGE.to_string());

        match status {
            401 => Error::Auth { message },
            404 => Error::NotFound { message },
            _ => Error::Server {
                status,
                message,
                errors: body.errors.filter(|e| !e.is_empty()),
            },
        }
    }

    /// HTTP status associated with the error, if a response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Auth { .. } => Some(401),
            Error::NotFound { .. } => Some(404),
            Error::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Field-level messages from validation or from the server.
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            Error::Validation(errors) => Some(errors),
            Error::Server {
                errors: Some(errors),
                ..
            } => Some(errors),
            _ => None,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Check if this is an authentication error.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Error::Auth { .. })
    }

    /// Check if this is a server error.
    pub fn is_server_error(&self) -> bool {
        matches!(self, Error::Server { status, .. } if *status >= 500)
    }

    /// Whether repeating the same request may succeed.
    ///
    /// True for missing responses, 5xx and 429.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network { .. } => true,
            Error::Server { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            Error::Request(e.to_string())
        } else if e.is_decode() {
            Error::Request(format!("invalid response body: {}", e))
        } else if let Some(status) = e.status() {
            Error::from_status(status.as_u16(), None)
        } else {
            tracing::debug!(error = %e, "Request got no response");
            Error::network()
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(e: url::ParseError) -> Self {
        Error::Request(format!("invalid URL: {}", e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Request(format!("JSON error: {}", e))
    }
}

impl From<educamais_store::StoreError> for Error {
    fn from(e: educamais_store::StoreError) -> Self {
        Error::Storage(e.to_string())
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error body returned by the server.
///
/// The body's `statusCode` is ignored in favour of the response status.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Option<FieldErrors>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: &str) -> Option<ErrorResponse> {
        Some(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_status_mapping() {
        assert!(Error::from_status(401, None).is_auth_error());
        assert!(Error::from_status(404, None).is_not_found());
        assert!(Error::from_status(503, None).is_server_error());
        assert_eq!(Error::from_status(422, None).status_code(), Some(422));
    }

    #[test]
    fn test_message_and_field_errors_extracted() {
        let err = Error::from_status(
            400,
            body(r#"{"message":"Invalid post","statusCode":400,"errors":{"titulo":["too short"]}}"#),
        );
        match &err {
            Error::Server {
                status, message, ..
            } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Invalid post");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.field_errors().unwrap().get("titulo"), ["too short"]);
    }

    #[test]
    fn test_missing_message_uses_fallback() {
        let err = Error::from_status(500, body("{}"));
        assert_eq!(err.to_string(), "Server error (500): Server error");
    }

    #[test]
    fn test_retryable() {
        assert!(Error::network().is_retryable());
        assert!(Error::from_status(502, None).is_retryable());
        assert!(Error::from_status(429, None).is_retryable());
        assert!(!Error::from_status(400, None).is_retryable());
        assert!(!Error::from_status(401, None).is_retryable());
        assert!(!Error::from_status(404, None).is_retryable());
        assert!(!Error::Validation(FieldErrors::new()).is_retryable());
    }

    #[test]
    fn test_network_message() {
        assert_eq!(Error::network().to_string(), NO_RESPONSE_MESSAGE);
    }

    #[test]
    fn test_field_errors_display() {
        let mut errors = FieldErrors::new();
        errors.add("email", "invalid email");
        errors.add("password", "too short");
        assert_eq!(
            errors.to_string(),
            "email: invalid email; password: too short"
        );
        assert!(errors.into_result().is_err());
        assert!(FieldErrors::new().into_result().is_ok());
    }
}
