//! Message model for the jrmsg RPC protocol
//!
//! jrmsg is a versioned, JSON-RPC-like protocol with three mutually
//! exclusive roles. This crate provides everything that does not need a
//! clock or a runtime:
//!
//! - **Classification**: pure predicates deciding a raw payload's role
//! - **Types**: `Request`, `Notification`, `Response` and the `Message` enum
//! - **Codec**: the `Serializer` collaborator and the `Parser` entry point
//! - **Ids**: monotonic request id counters
//! - **Error handling**: the crate `Error` and the `ErrorValue` payload
//! - **Observability**: tracing subscriber and OTLP export setup
//!
//! Matching responses to pending requests lives in `jrmsg-correlation`.
//!
//! # Example
//!
//! ```rust
//! use jrmsg_core::{Envelope, IdCounter, Message, Parser, Request};
//! use serde_json::json;
//!
//! let ids = IdCounter::new();
//! let request = Request::from_payload(json!({"resource": "math", "method": "add", "params": {"a": 1}}), &ids).unwrap();
//!
//! let text = request.to_string();
//! match Parser::new().parse_str(&text).unwrap() {
//!     Message::Request(parsed) => assert_eq!(parsed, request),
//!     other => panic!("unexpected {}", other.kind()),
//! }
//! ```

pub mod classify;
pub mod codec;
pub mod error;
pub mod id;
pub mod observability;
pub mod types;

pub use classify::{
    get_type, has_valid_syntax, is_valid_notification, is_valid_request, is_valid_response,
};
pub use codec::{Input, JsonSerializer, Parser, Serializer};
pub use error::{Error, ErrorValue, Result};
pub use id::IdCounter;
pub use observability::{init_telemetry, shutdown_telemetry, TelemetryConfig};
pub use types::{
    Envelope, Message, MessageType, Notification, Request, Response, DEFAULT_RESOURCE,
    SCHEMA_VERSION,
};
