//! Error types for jrmsg
//!
//! This module provides the two error shapes used throughout the workspace:
//!
//! - **Error**: Local failures raised while building, parsing or correlating
//!   messages (uses thiserror)
//! - **ErrorValue**: The `{code, message}` value carried inside a Response's
//!   `error` field
//!
//! # Error Kinds
//!
//! Every local failure is synchronous and aborts the operation that raised it,
//! with one exception: [`Error::Timeout`] is never returned from a call. It is
//! delivered later to the callback or future that was waiting for a response.
//!
//! # Standard Error Codes
//!
//! `ErrorValue` keeps the familiar JSON-RPC codes as factories:
//! - `-32700`: Parse error (undecodable text)
//! - `-32600`: Invalid request (payload matches no role)
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error
//!
//! # Examples
//!
//! ```rust
//! use jrmsg_core::{Error, ErrorValue};
//!
//! let error = Error::Validation("missing method".into());
//! assert_eq!(error.to_error_value().code, -32600);
//!
//! let value = ErrorValue::method_not_found("ping");
//! assert_eq!(value.to_string(), "[-32601] Method not found: ping");
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type for jrmsg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for jrmsg operations
///
/// There is no "unsupported operation" kind: an accessor that a role forbids
/// is simply not defined on that role's type.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// An argument passed to a constructor or setter has the wrong shape
    ///
    /// Raised for an id of zero, an empty resource or method, or params that
    /// are not a JSON object.
    #[error("Type constraint violated: {0}")]
    TypeConstraint(String),

    /// A payload does not satisfy its variant's predicate
    ///
    /// Raised during construction. No instance is produced.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Input text could not be decoded, or the decoded payload has no role
    #[error("Parse error: {0}")]
    Parse(String),

    /// No matching response arrived within the correlation window
    ///
    /// Delivered asynchronously to the registered callback or future.
    #[error("Request {id} timed out after {after:?}")]
    Timeout {
        /// The request id that was waiting
        id: u64,
        /// The window that elapsed
        after: Duration,
    },

    /// A pending request was removed before any response or timeout
    ///
    /// Seen by futures waiting on an entry that was explicitly removed or
    /// replaced by a newer registration for the same id.
    #[error("Request {0} was cancelled")]
    Cancelled(u64),

    /// A message could not be encoded to text
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A correlation timer was requested outside of a tokio runtime
    #[error("No tokio runtime available to arm the correlation timer")]
    NoRuntime,
}

impl Error {
    /// Lower this error into the value a Response would carry
    ///
    /// Useful when answering a malformed inbound message.
    pub fn to_error_value(&self) -> ErrorValue {
        match self {
            Error::Parse(_) => ErrorValue::parse_error(),
            Error::Validation(msg) | Error::TypeConstraint(msg) => {
                ErrorValue::invalid_request(msg.clone())
            }
            Error::Timeout { .. } => ErrorValue::request_timeout(),
            other => ErrorValue::internal_error(other.to_string()),
        }
    }
}

/// Error payload carried by a Response
///
/// Serializes as exactly `{"code": <int>, "message": <string>}`, which is the
/// only error shape the classifier accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ErrorValue {
    /// Numeric error code
    pub code: i64,
    /// Human-readable error message
    pub message: String,
}

impl ErrorValue {
    /// Create an error value with code and message
    ///
    /// ```rust
    /// use jrmsg_core::ErrorValue;
    ///
    /// let error = ErrorValue::new(-32000, "Database connection failed");
    /// assert_eq!(error.code, -32000);
    /// ```
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Parse error (-32700)
    pub fn parse_error() -> Self {
        Self::new(-32700, "Parse error")
    }

    /// Invalid request error (-32600)
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(-32600, msg)
    }

    /// Method not found error (-32601)
    pub fn method_not_found(method: impl Into<String>) -> Self {
        Self::new(-32601, format!("Method not found: {}", method.into()))
    }

    /// Invalid params error (-32602)
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::new(-32602, msg)
    }

    /// Internal error (-32603)
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::new(-32603, msg)
    }

    /// Request timeout (-32001)
    ///
    /// Used when a pending request expires before its response arrives.
    pub fn request_timeout() -> Self {
        Self::new(-32001, "Request timeout")
    }

    /// Try to read an error value out of a plain JSON object
    ///
    /// The object must have exactly the keys `code` (integer) and `message`
    /// (string). Anything else yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        if object.len() != 2 {
            return None;
        }
        let code = object.get("code")?.as_i64()?;
        let message = object.get("message")?.as_str()?;
        Some(Self::new(code, message))
    }

    /// Render as a JSON object
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code,
            "message": self.message,
        })
    }
}

impl std::fmt::Display for ErrorValue {
    /// Formats as "[code] message"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorValue {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_value_display() {
        let error = ErrorValue::method_not_found("unknownMethod");
        let display = format!("{}", error);

        assert!(display.contains("-32601"));
        assert!(display.contains("Method not found"));
    }

    #[test]
    fn test_all_standard_codes() {
        let errors = vec![
            (ErrorValue::parse_error(), -32700),
            (ErrorValue::invalid_request("test"), -32600),
            (ErrorValue::method_not_found("test"), -32601),
            (ErrorValue::invalid_params("test"), -32602),
            (ErrorValue::internal_error("test"), -32603),
            (ErrorValue::request_timeout(), -32001),
        ];

        for (error, expected_code) in errors {
            assert_eq!(error.code, expected_code);
            assert!(!error.message.is_empty());
        }
    }

    #[test]
    fn test_from_json_accepts_exact_shape() {
        let value = json!({"code": 1, "message": "msg"});
        let error = ErrorValue::from_json(&value).unwrap();
        assert_eq!(error, ErrorValue::new(1, "msg"));
    }

    #[test]
    fn test_from_json_rejects_bad_shapes() {
        assert!(ErrorValue::from_json(&json!({"code": 1, "message": 1})).is_none());
        assert!(ErrorValue::from_json(&json!({"code": "1", "message": "m"})).is_none());
        assert!(ErrorValue::from_json(&json!({"code": 1})).is_none());
        assert!(
            ErrorValue::from_json(&json!({"code": 1, "message": "m", "data": {}})).is_none()
        );
        assert!(ErrorValue::from_json(&json!("error")).is_none());
    }

    #[test]
    fn test_error_value_serialization() {
        let error = ErrorValue::new(-32000, "Custom error");
        let serialized = serde_json::to_string(&error).unwrap();
        assert_eq!(serialized, r#"{"code":-32000,"message":"Custom error"}"#);

        let deserialized: ErrorValue = serde_json::from_str(&serialized).unwrap();
        assert_eq!(deserialized, error);
    }

    #[test]
    fn test_error_lowering() {
        assert_eq!(Error::Parse("bad".into()).to_error_value().code, -32700);
        assert_eq!(Error::Validation("bad".into()).to_error_value().code, -32600);
        assert_eq!(
            Error::Timeout { id: 7, after: Duration::from_millis(1) }
                .to_error_value()
                .code,
            -32001
        );
        assert_eq!(Error::NoRuntime.to_error_value().code, -32603);
    }

    #[test]
    fn test_timeout_display() {
        let error = Error::Timeout {
            id: 9,
            after: Duration::from_millis(5),
        };
        assert!(error.to_string().contains("Request 9 timed out"));
    }
}
