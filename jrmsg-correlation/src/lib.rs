//! Request/response correlation for jrmsg
//!
//! This crate matches inbound Responses to the Requests that caused them,
//! using the shared numeric id, and expires requests nobody answered.
//!
//! # Core Features
//!
//! - **Callback style**: register a `FnOnce(Result<Response>)` per request id
//! - **Future style**: await a [`PendingResponse`] instead of a callback
//! - **Timeouts**: every entry carries its own timer (60 s by default)
//! - **Contexts**: [`RpcContext`] bundles a parser, a registry and
//!   [`Options`] into one independent correlation domain
//! - **Observability**: `tracing` events and optional OpenTelemetry metrics
//!
//! Timers run on the ambient tokio runtime; registering outside a runtime
//! fails with `Error::NoRuntime`.
//!
//! # Quick Start
//!
//! ```rust
//! use jrmsg_correlation::CorrelationRegistry;
//! use jrmsg_core::Response;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jrmsg_core::Result<()> {
//! let registry = CorrelationRegistry::new();
//! let id = registry.next_id();
//!
//! registry.register_with_timeout(
//!     id,
//!     |outcome| match outcome {
//!         Ok(response) => println!("answered: {}", response),
//!         Err(error) => eprintln!("failed: {}", error),
//!     },
//!     Duration::from_secs(5),
//! )?;
//!
//! assert!(registry.fire(&Response::success(id, json!("pong"))));
//! assert_eq!(registry.pending_count(), 0);
//! # Ok(())
//! # }
//! ```

mod context;
mod metrics;
mod options;
mod pending;
mod registry;

pub use context::{RpcContext, RpcContextBuilder};
pub use metrics::CorrelationMetrics;
pub use options::{Options, AUTO_FIRE_ENV, DEFAULT_CALLBACK_TIMEOUT, TIMEOUT_ENV};
pub use pending::PendingResponse;
pub use registry::{Callback, CorrelationRegistry};
