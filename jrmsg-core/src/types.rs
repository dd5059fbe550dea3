//! Typed message variants
//!
//! The protocol has three mutually exclusive roles:
//!
//! 1. **Request**: a call on `resource.method` that expects a response,
//!    identified by a positive integer `id`
//! 2. **Notification**: the same call shape without an `id`; no response
//!    is ever sent
//! 3. **Response**: carries exactly one of `result` or `error`, and the `id`
//!    of the request it answers when that id is known
//!
//! Each role is its own type and only exposes the fields valid for it. A
//! Notification has no `id()`, a Request has no `result()`, and so on. The
//! shared read-only surface is the [`Envelope`] trait.
//!
//! Construction from an untyped payload (`from_payload`) fills defaults for
//! absent fields, then re-checks the role predicate from [`crate::classify`].
//! A failed check produces no instance. Keys the role does not define are
//! kept in `extras()` and rendered again by `to_json`.

use crate::classify;
use crate::codec::Serializer;
use crate::error::{Error, ErrorValue, Result};
use crate::id::IdCounter;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Schema version carried by every message
pub const SCHEMA_VERSION: &str = "1.1.0";

/// Namespace used when a Request or Notification names no resource
pub const DEFAULT_RESOURCE: &str = "__global__";

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Expects a response
    Request,
    /// Answers a request
    Response,
    /// Fire-and-forget call
    Notification,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageType::Request => write!(f, "request"),
            MessageType::Response => write!(f, "response"),
            MessageType::Notification => write!(f, "notification"),
        }
    }
}

/// Read-only capabilities shared by every message role
pub trait Envelope {
    /// Which role this message plays
    fn kind(&self) -> MessageType;

    /// Render the message as its wire payload
    fn to_json(&self) -> Value;

    /// Schema version; fixed for the lifetime of the message
    fn version(&self) -> &str {
        SCHEMA_VERSION
    }

    /// Encode with the given serializer
    ///
    /// Fails with `Error::Validation` when the message is not yet valid for
    /// its role, for example a default-constructed Request with no method.
    fn encode(&self, serializer: &dyn Serializer) -> Result<String> {
        let payload = self.to_json();
        if classify::get_type(&payload) != Some(self.kind()) {
            return Err(Error::Validation(format!(
                "incomplete {} cannot be encoded: {}",
                self.kind(),
                payload
            )));
        }
        serializer.serialize(&payload)
    }
}

/// Request message
///
/// # Examples
///
/// ```rust
/// use jrmsg_core::{Envelope, IdCounter, Request, SCHEMA_VERSION};
/// use serde_json::json;
///
/// let ids = IdCounter::new();
/// let request = Request::from_payload(
///     json!({"resource": "ns", "method": "m", "params": {}}),
///     &ids,
/// )
/// .unwrap();
///
/// assert_eq!(request.id(), 1);
/// assert_eq!(
///     request.to_json(),
///     json!({"version": SCHEMA_VERSION, "id": 1, "resource": "ns", "method": "m", "params": {}})
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    id: u64,
    resource: String,
    method: String,
    params: Map<String, Value>,
    extras: Map<String, Value>,
}

impl Request {
    /// Create a request with every default filled in
    ///
    /// The method is left empty and must be set before the request is valid
    /// on the wire.
    pub fn new(ids: &IdCounter) -> Self {
        Self {
            id: ids.next_id(),
            resource: DEFAULT_RESOURCE.to_string(),
            method: String::new(),
            params: Map::new(),
            extras: Map::new(),
        }
    }

    /// Build a request from an untyped payload
    ///
    /// Absent `version`, `id`, `resource` and `params` are filled with their
    /// defaults, drawing a fresh id from `ids` when needed.
    ///
    /// # Errors
    ///
    /// - `Error::TypeConstraint` if the payload is not an object
    /// - `Error::Validation` if the merged payload is not a valid request
    pub fn from_payload(payload: Value, ids: &IdCounter) -> Result<Self> {
        let mut fields = into_fields(payload)?;
        fill_default(&mut fields, "version", || Value::from(SCHEMA_VERSION));
        fill_default(&mut fields, "id", || Value::from(ids.next_id()));
        fill_default(&mut fields, "resource", || Value::from(DEFAULT_RESOURCE));
        fill_default(&mut fields, "params", || Value::Object(Map::new()));

        if !classify::request_fields(&fields) {
            return Err(Error::Validation(format!(
                "not a valid request: {}",
                Value::Object(fields)
            )));
        }

        fields.remove("version");
        Ok(Self {
            id: take_u64(&mut fields, "id"),
            resource: take_string(&mut fields, "resource"),
            method: take_string(&mut fields, "method"),
            params: take_object(&mut fields, "params"),
            extras: fields,
        })
    }

    /// Request id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Resource namespace
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Method name; empty until set on a default-constructed request
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parameters object
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Keys from the parsed payload that no request field claims
    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Replace the id
    ///
    /// Does not move any pending correlation entry registered under the
    /// old id.
    pub fn set_id(&mut self, id: u64) -> Result<&mut Self> {
        self.id = check_id(id, "Request::set_id")?;
        Ok(self)
    }

    /// Replace the resource namespace
    pub fn set_resource(&mut self, resource: impl Into<String>) -> Result<&mut Self> {
        self.resource = check_name(resource.into(), "Request::set_resource", "resource")?;
        Ok(self)
    }

    /// Replace the method name
    pub fn set_method(&mut self, method: impl Into<String>) -> Result<&mut Self> {
        self.method = check_name(method.into(), "Request::set_method", "method")?;
        Ok(self)
    }

    /// Replace the parameters; must be a JSON object
    pub fn set_params(&mut self, params: Value) -> Result<&mut Self> {
        self.params = check_params(params, "Request::set_params")?;
        Ok(self)
    }
}

impl Envelope for Request {
    fn kind(&self) -> MessageType {
        MessageType::Request
    }

    fn to_json(&self) -> Value {
        let mut fields = self.extras.clone();
        fields.insert("version".into(), Value::from(SCHEMA_VERSION));
        fields.insert("id".into(), Value::from(self.id));
        fields.insert("resource".into(), Value::from(self.resource.clone()));
        if !self.method.is_empty() {
            fields.insert("method".into(), Value::from(self.method.clone()));
        }
        fields.insert("params".into(), Value::Object(self.params.clone()));
        Value::Object(fields)
    }
}

/// Notification message
///
/// Same call shape as a [`Request`] but never carries an id.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    resource: String,
    method: String,
    params: Map<String, Value>,
    extras: Map<String, Value>,
}

impl Notification {
    /// Create a notification with every default filled in
    ///
    /// The method is left empty and must be set before the notification is
    /// valid on the wire.
    pub fn new() -> Self {
        Self {
            resource: DEFAULT_RESOURCE.to_string(),
            method: String::new(),
            params: Map::new(),
            extras: Map::new(),
        }
    }

    /// Build a notification from an untyped payload
    ///
    /// Absent `version`, `resource` and `params` are filled with defaults.
    ///
    /// # Errors
    ///
    /// - `Error::TypeConstraint` if the payload is not an object
    /// - `Error::Validation` if the merged payload is not a valid notification
    pub fn from_payload(payload: Value) -> Result<Self> {
        let mut fields = into_fields(payload)?;
        fill_default(&mut fields, "version", || Value::from(SCHEMA_VERSION));
        fill_default(&mut fields, "resource", || Value::from(DEFAULT_RESOURCE));
        fill_default(&mut fields, "params", || Value::Object(Map::new()));

        if !classify::notification_fields(&fields) {
            return Err(Error::Validation(format!(
                "not a valid notification: {}",
                Value::Object(fields)
            )));
        }

        fields.remove("version");
        Ok(Self {
            resource: take_string(&mut fields, "resource"),
            method: take_string(&mut fields, "method"),
            params: take_object(&mut fields, "params"),
            extras: fields,
        })
    }

    /// Resource namespace
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Method name; empty until set on a default-constructed notification
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Parameters object
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Keys from the parsed payload that no notification field claims
    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Replace the resource namespace
    pub fn set_resource(&mut self, resource: impl Into<String>) -> Result<&mut Self> {
        self.resource = check_name(resource.into(), "Notification::set_resource", "resource")?;
        Ok(self)
    }

    /// Replace the method name
    pub fn set_method(&mut self, method: impl Into<String>) -> Result<&mut Self> {
        self.method = check_name(method.into(), "Notification::set_method", "method")?;
        Ok(self)
    }

    /// Replace the parameters; must be a JSON object
    pub fn set_params(&mut self, params: Value) -> Result<&mut Self> {
        self.params = check_params(params, "Notification::set_params")?;
        Ok(self)
    }
}

impl Default for Notification {
    fn default() -> Self {
        Self::new()
    }
}

impl Envelope for Notification {
    fn kind(&self) -> MessageType {
        MessageType::Notification
    }

    fn to_json(&self) -> Value {
        let mut fields = self.extras.clone();
        fields.insert("version".into(), Value::from(SCHEMA_VERSION));
        fields.insert("resource".into(), Value::from(self.resource.clone()));
        if !self.method.is_empty() {
            fields.insert("method".into(), Value::from(self.method.clone()));
        }
        fields.insert("params".into(), Value::Object(self.params.clone()));
        Value::Object(fields)
    }
}

/// Response message
///
/// Holds at most one of `result` or `error`; setting one clears the other.
/// A `null` result is a real result.
///
/// # Examples
///
/// ```rust
/// use jrmsg_core::{Envelope, ErrorValue, Response, SCHEMA_VERSION};
/// use serde_json::json;
///
/// let ok = Response::success(1, json!("x"));
/// assert_eq!(ok.to_json(), json!({"version": SCHEMA_VERSION, "id": 1, "result": "x"}));
///
/// let failed = Response::failure(2, ErrorValue::method_not_found("ping"));
/// assert_eq!(failed.error_code(), Some(-32601));
///
/// assert!(Response::from_payload(json!({"id": 1})).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    id: Option<u64>,
    result: Option<Value>,
    error: Option<ErrorValue>,
    extras: Map<String, Value>,
}

impl Response {
    /// Create an empty response carrying only the schema version
    ///
    /// Set a result or an error before sending it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Successful response to request `id`
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            ..Self::default()
        }
    }

    /// Failed response to request `id`
    pub fn failure(id: u64, error: ErrorValue) -> Self {
        Self {
            id: Some(id),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Build a response from an untyped payload
    ///
    /// Only `version` is defaulted; the id stays absent if the payload has
    /// none.
    ///
    /// # Errors
    ///
    /// - `Error::TypeConstraint` if the payload is not an object
    /// - `Error::Validation` if the merged payload is not a valid response
    pub fn from_payload(payload: Value) -> Result<Self> {
        let mut fields = into_fields(payload)?;
        fill_default(&mut fields, "version", || Value::from(SCHEMA_VERSION));

        if !classify::response_fields(&fields) {
            return Err(Error::Validation(format!(
                "not a valid response: {}",
                Value::Object(fields)
            )));
        }

        fields.remove("version");
        let id = fields.remove("id").and_then(|id| id.as_u64());
        let error = fields
            .remove("error")
            .and_then(|error| ErrorValue::from_json(&error));
        Ok(Self {
            id,
            result: fields.remove("result"),
            error,
            extras: fields,
        })
    }

    /// Id of the answered request, if known
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Result value, if this is a success
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    /// Error value, if this is a failure
    pub fn error(&self) -> Option<&ErrorValue> {
        self.error.as_ref()
    }

    /// Keys from the parsed payload that no response field claims
    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Error code shortcut
    pub fn error_code(&self) -> Option<i64> {
        self.error.as_ref().map(|e| e.code)
    }

    /// Error message shortcut
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    /// True when a result is present
    pub fn is_success(&self) -> bool {
        self.result.is_some()
    }

    /// True when an error is present
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Replace the id
    pub fn set_id(&mut self, id: u64) -> Result<&mut Self> {
        self.id = Some(check_id(id, "Response::set_id")?);
        Ok(self)
    }

    /// Set the result, dropping any error
    pub fn set_result(&mut self, result: Value) -> &mut Self {
        self.result = Some(result);
        self.error = None;
        self
    }

    /// Set the error, dropping any result
    pub fn set_error(&mut self, error: impl Into<ErrorValue>) -> &mut Self {
        self.error = Some(error.into());
        self.result = None;
        self
    }

    /// Set the error from a plain `{code, message}` object
    pub fn set_error_value(&mut self, error: Value) -> Result<&mut Self> {
        let error = ErrorValue::from_json(&error).ok_or_else(|| {
            Error::TypeConstraint(format!(
                "Response::set_error_value: error must be {{code, message}}, got {}",
                error
            ))
        })?;
        Ok(self.set_error(error))
    }

    /// Consume into the carried outcome
    ///
    /// An empty response yields an internal error value.
    pub fn into_outcome(self) -> std::result::Result<Value, ErrorValue> {
        match (self.result, self.error) {
            (Some(result), _) => Ok(result),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ErrorValue::internal_error("response carries no outcome")),
        }
    }
}

impl Envelope for Response {
    fn kind(&self) -> MessageType {
        MessageType::Response
    }

    fn to_json(&self) -> Value {
        let mut fields = self.extras.clone();
        fields.insert("version".into(), Value::from(SCHEMA_VERSION));
        if let Some(id) = self.id {
            fields.insert("id".into(), Value::from(id));
        }
        if let Some(result) = &self.result {
            fields.insert("result".into(), result.clone());
        }
        if let Some(error) = &self.error {
            fields.insert("error".into(), error.to_json());
        }
        Value::Object(fields)
    }
}

/// Any message, as produced by the parser
///
/// ```rust
/// use jrmsg_core::{IdCounter, Message, SCHEMA_VERSION};
/// use serde_json::json;
///
/// let ids = IdCounter::new();
/// let payload = json!({"version": SCHEMA_VERSION, "resource": "ns", "method": "m", "params": {}});
///
/// match Message::from_payload(payload, &ids).unwrap() {
///     Message::Notification(n) => assert_eq!(n.method(), "m"),
///     other => panic!("unexpected {:?}", other),
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A request
    Request(Request),
    /// A notification
    Notification(Notification),
    /// A response
    Response(Response),
}

impl Message {
    /// Classify a payload and build the matching variant
    ///
    /// # Errors
    ///
    /// `Error::Parse` if the payload matches no role, otherwise whatever the
    /// variant's constructor raises.
    pub fn from_payload(payload: Value, ids: &IdCounter) -> Result<Self> {
        match classify::get_type(&payload) {
            Some(MessageType::Request) => Request::from_payload(payload, ids).map(Message::Request),
            Some(MessageType::Response) => Response::from_payload(payload).map(Message::Response),
            Some(MessageType::Notification) => {
                Notification::from_payload(payload).map(Message::Notification)
            }
            None => Err(Error::Parse("unknown message type".into())),
        }
    }

    /// Request or response id, if any
    pub fn id(&self) -> Option<u64> {
        match self {
            Message::Request(r) => Some(r.id()),
            Message::Response(r) => r.id(),
            Message::Notification(_) => None,
        }
    }

    /// True for `Message::Request`
    pub fn is_request(&self) -> bool {
        matches!(self, Message::Request(_))
    }

    /// True for `Message::Response`
    pub fn is_response(&self) -> bool {
        matches!(self, Message::Response(_))
    }

    /// True for `Message::Notification`
    pub fn is_notification(&self) -> bool {
        matches!(self, Message::Notification(_))
    }
}

impl Envelope for Message {
    fn kind(&self) -> MessageType {
        match self {
            Message::Request(r) => r.kind(),
            Message::Notification(n) => n.kind(),
            Message::Response(r) => r.kind(),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Message::Request(r) => r.to_json(),
            Message::Notification(n) => n.to_json(),
            Message::Response(r) => r.to_json(),
        }
    }
}

impl From<Request> for Message {
    fn from(request: Request) -> Self {
        Message::Request(request)
    }
}

impl From<Notification> for Message {
    fn from(notification: Notification) -> Self {
        Message::Notification(notification)
    }
}

impl From<Response> for Message {
    fn from(response: Response) -> Self {
        Message::Response(response)
    }
}

// Display renders the compact JSON text of each message

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

fn into_fields(payload: Value) -> Result<Map<String, Value>> {
    match payload {
        Value::Object(fields) => Ok(fields),
        other => Err(Error::TypeConstraint(format!(
            "message must be an object, got {}",
            other
        ))),
    }
}

fn fill_default(fields: &mut Map<String, Value>, key: &str, default: impl FnOnce() -> Value) {
    match fields.get(key) {
        Some(value) if !value.is_null() => {}
        _ => {
            fields.insert(key.to_string(), default());
        }
    }
}

// The take_* helpers run after validation, so the fallbacks are unreachable

fn take_u64(fields: &mut Map<String, Value>, key: &str) -> u64 {
    fields
        .remove(key)
        .and_then(|value| value.as_u64())
        .unwrap_or_default()
}

fn take_string(fields: &mut Map<String, Value>, key: &str) -> String {
    match fields.remove(key) {
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn take_object(fields: &mut Map<String, Value>, key: &str) -> Map<String, Value> {
    match fields.remove(key) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

fn check_id(id: u64, context: &str) -> Result<u64> {
    if id == 0 {
        return Err(Error::TypeConstraint(format!(
            "{}: id must be a positive integer",
            context
        )));
    }
    Ok(id)
}

fn check_name(value: String, context: &str, field: &str) -> Result<String> {
    if value.is_empty() {
        return Err(Error::TypeConstraint(format!(
            "{}: {} must be a non-empty string",
            context, field
        )));
    }
    Ok(value)
}

fn check_params(params: Value, context: &str) -> Result<Map<String, Value>> {
    match params {
        Value::Object(map) => Ok(map),
        other => Err(Error::TypeConstraint(format!(
            "{}: params must be an object, got {}",
            context, other
        ))),
    }
}
