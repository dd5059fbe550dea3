//! jrmsg - versioned JSON-RPC-style messages with response correlation
//!
//! This is the convenience crate that re-exports the jrmsg sub-crates.
//! Use it if you want a single dependency for both the message model and
//! the correlation layer.
//!
//! # Architecture
//!
//! - **jrmsg-core**: classification, message types, parser, errors, telemetry
//! - **jrmsg-correlation**: pending request registry, timeouts, `RpcContext`
//!
//! Transports are out of scope: jrmsg turns text into typed messages and
//! matches responses to requests, and you move the text.
//!
//! # Quick Start
//!
//! ```rust
//! use jrmsg::{Message, RpcContext};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jrmsg::core::Result<()> {
//! let ctx = RpcContext::new();
//!
//! let request = ctx.request_with_callback("users", "get", json!({"id": 42}), |outcome| {
//!     match outcome {
//!         Ok(response) => println!("user: {:?}", response.result()),
//!         Err(error) => eprintln!("lookup failed: {}", error),
//!     }
//! })?;
//! let outbound = ctx.encode(&request)?;
//! # let _ = outbound;
//!
//! let inbound = format!(r#"{{"version":"1.1.0","id":{},"result":{{"name":"ada"}}}}"#, request.id());
//! match ctx.receive(&inbound)? {
//!     Message::Response(response) => assert!(response.is_success()),
//!     other => panic!("unexpected {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

pub use jrmsg_core as core;
pub use jrmsg_correlation as correlation;

// Convenience re-exports of the most commonly used types
pub use jrmsg_core::{
    Envelope, Error, ErrorValue, Message, MessageType, Notification, Parser, Request, Response,
    Result,
};
pub use jrmsg_correlation::{CorrelationRegistry, Options, PendingResponse, RpcContext};
