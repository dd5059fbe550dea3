//! Owning service for one correlation domain
//!
//! An [`RpcContext`] ties together a [`Parser`], a [`CorrelationRegistry`]
//! and the [`Options`] governing them. Everything that needs a shared id
//! counter or the pending map goes through a context, so independent
//! contexts (one per connection, say) never see each other's requests.
//!
//! Constructing a message never has side effects on its own. When
//! `auto_fire_callbacks` is on, the context delivers Responses it builds
//! or parses as an explicit step right after construction.
//!
//! # Examples
//!
//! ```rust
//! use jrmsg_correlation::RpcContext;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> jrmsg_core::Result<()> {
//! let ctx = RpcContext::new();
//!
//! let (request, pending) = ctx.request_future("math", "add", json!({"a": 1, "b": 2}))?;
//! let wire = ctx.encode(&request)?;
//! # let _ = wire;
//!
//! // ... later, when the peer answers ...
//! let reply = format!(r#"{{"version":"1.1.0","id":{},"result":3}}"#, request.id());
//! let message = ctx.receive(&reply)?;
//! assert!(message.is_response());
//!
//! let response = pending.await?;
//! assert_eq!(response.result(), Some(&json!(3)));
//! # Ok(())
//! # }
//! ```

use crate::metrics::CorrelationMetrics;
use crate::options::Options;
use crate::pending::PendingResponse;
use crate::registry::CorrelationRegistry;
use jrmsg_core::{
    Envelope, IdCounter, Input, JsonSerializer, Message, Notification, Parser, Request, Response,
    Result, Serializer,
};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;

/// Parser, registry and options for one correlation domain
///
/// Cheap to clone; clones share everything.
#[derive(Clone)]
pub struct RpcContext {
    parser: Parser,
    registry: CorrelationRegistry,
    options: Arc<RwLock<Options>>,
}

impl RpcContext {
    /// Context with default serializer and options read from the environment
    pub fn new() -> Self {
        RpcContextBuilder::new().build()
    }

    /// Start configuring a context
    pub fn builder() -> RpcContextBuilder {
        RpcContextBuilder::new()
    }

    /// Current options
    pub fn options(&self) -> Options {
        *self.options.read()
    }

    /// Replace the options
    ///
    /// Applies to every clone of this context, and to its registry, from the
    /// next call on. Entries already registered keep the timeout they were
    /// armed with.
    pub fn set_options(&self, options: Options) {
        {
            let mut current = self.options.write();
            *current = options;
            self.registry.set_default_timeout(options.default_timeout);
        }
        tracing::debug!(
            auto_fire = options.auto_fire_callbacks,
            timeout = ?options.default_timeout,
            "Options updated"
        );
    }

    /// The parser used by [`parse`](Self::parse) and [`encode`](Self::encode)
    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    /// The pending request registry
    pub fn registry(&self) -> &CorrelationRegistry {
        &self.registry
    }

    /// Issue the next request id
    pub fn next_id(&self) -> u64 {
        self.registry.next_id()
    }

    /// Build a request with a fresh id
    ///
    /// # Errors
    ///
    /// `TypeConstraint` for an empty resource or method, or params that are
    /// not an object.
    pub fn request(
        &self,
        resource: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> Result<Request> {
        let mut request = Request::new(self.registry.ids());
        request
            .set_resource(resource)?
            .set_method(method)?
            .set_params(params)?;
        Ok(request)
    }

    /// Build a request from a seed payload, filling absent fields
    pub fn request_from(&self, payload: Value) -> Result<Request> {
        Request::from_payload(payload, self.registry.ids())
    }

    /// Build a request and register `callback` for its response
    pub fn request_with_callback<F>(
        &self,
        resource: impl Into<String>,
        method: impl Into<String>,
        params: Value,
        callback: F,
    ) -> Result<Request>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        let request = self.request(resource, method, params)?;
        self.on_response(&request, callback)?;
        Ok(request)
    }

    /// Build a request and a future for its response
    pub fn request_future(
        &self,
        resource: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> Result<(Request, PendingResponse)> {
        let request = self.request(resource, method, params)?;
        let pending = self.track(&request)?;
        Ok((request, pending))
    }

    /// Register `callback` for the response to an existing request
    ///
    /// Uses the current default timeout. Replaces any earlier registration
    /// for the same id.
    pub fn on_response<F>(&self, request: &Request, callback: F) -> Result<()>
    where
        F: FnOnce(Result<Response>) + Send + 'static,
    {
        self.registry.register(request.id(), callback)
    }

    /// Future for the response to an existing request
    pub fn track(&self, request: &Request) -> Result<PendingResponse> {
        self.registry.track_default(request.id())
    }

    /// Build a notification
    pub fn notification(
        &self,
        resource: impl Into<String>,
        method: impl Into<String>,
        params: Value,
    ) -> Result<Notification> {
        let mut notification = Notification::new();
        notification
            .set_resource(resource)?
            .set_method(method)?
            .set_params(params)?;
        Ok(notification)
    }

    /// Build a response from a payload
    ///
    /// With auto-fire on, the response is delivered to its pending request
    /// before being returned.
    pub fn response(&self, payload: Value) -> Result<Response> {
        let response = Response::from_payload(payload)?;
        if self.options().auto_fire_callbacks {
            self.registry.fire(&response);
        }
        Ok(response)
    }

    /// Parse text or a payload
    ///
    /// With auto-fire on, a parsed Response is delivered to its pending
    /// request. With it off this has no side effects beyond id issuance.
    pub fn parse<'a>(&self, input: impl Into<Input<'a>>) -> Result<Message> {
        let message = self.parser.parse(input)?;
        if self.options().auto_fire_callbacks {
            if let Message::Response(response) = &message {
                self.registry.fire(response);
            }
        }
        Ok(message)
    }

    /// Parse inbound text and always deliver a Response it contains
    ///
    /// This is the explicit delivery path; it ignores `auto_fire_callbacks`.
    #[tracing::instrument(skip(self, text), fields(len = text.len()))]
    pub fn receive(&self, text: &str) -> Result<Message> {
        let message = self.parser.parse_str(text)?;
        if let Message::Response(response) = &message {
            let delivered = self.registry.fire(response);
            tracing::debug!(id = ?response.id(), delivered, "Response received");
        }
        Ok(message)
    }

    /// Deliver a response to its pending request
    pub fn deliver(&self, response: &Response) -> bool {
        self.registry.fire(response)
    }

    /// Give up waiting for a request's response
    pub fn cancel(&self, id: u64) -> bool {
        self.registry.remove(id)
    }

    /// Encode a message with this context's serializer
    pub fn encode(&self, message: &dyn Envelope) -> Result<String> {
        self.parser.encode(message)
    }
}

impl Default for RpcContext {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RpcContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcContext")
            .field("options", &self.options())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

/// Builder for configuring and creating an [`RpcContext`]
pub struct RpcContextBuilder {
    serializer: Option<Arc<dyn Serializer>>,
    ids: Option<Arc<IdCounter>>,
    options: Option<Options>,
    metrics: Option<Arc<CorrelationMetrics>>,
}

impl RpcContextBuilder {
    /// Create a new context builder
    pub fn new() -> Self {
        Self {
            serializer: None,
            ids: None,
            options: None,
            metrics: None,
        }
    }

    /// Encode and decode with a custom serializer (default: JSON)
    pub fn serializer(mut self, serializer: Arc<dyn Serializer>) -> Self {
        self.serializer = Some(serializer);
        self
    }

    /// Issue ids from a shared counter (default: a fresh one)
    pub fn ids(mut self, ids: Arc<IdCounter>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Start with these options instead of [`Options::default`]
    pub fn options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }

    /// Record correlation metrics on the given instruments
    pub fn with_metrics(mut self, metrics: Arc<CorrelationMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Record correlation metrics on the global meter provider
    pub fn with_default_metrics(mut self) -> Self {
        self.metrics = Some(Arc::new(CorrelationMetrics::new()));
        self
    }

    /// Build the context
    pub fn build(self) -> RpcContext {
        let options = self.options.unwrap_or_default();
        let ids = self.ids.unwrap_or_else(|| Arc::new(IdCounter::new()));
        let serializer = self
            .serializer
            .unwrap_or_else(|| Arc::new(JsonSerializer) as Arc<dyn Serializer>);

        let parser = Parser::with_serializer(serializer).with_ids(ids.clone());
        let registry = CorrelationRegistry::build(ids, options.default_timeout, self.metrics);

        RpcContext {
            parser,
            registry,
            options: Arc::new(RwLock::new(options)),
        }
    }
}

impl Default for RpcContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
