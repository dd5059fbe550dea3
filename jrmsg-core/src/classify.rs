//! Role classification over untyped payloads
//!
//! A payload's role is decided purely by which fields are present and how
//! they are shaped; there is no explicit type tag on the wire. The predicates
//! here operate on raw `serde_json::Value`s so they can be applied before (and
//! independently of) building a typed variant.
//!
//! | field    | Request          | Notification     | Response                  |
//! |----------|------------------|------------------|---------------------------|
//! | version  | = schema version | = schema version | = schema version          |
//! | id       | positive integer | absent           | positive integer or absent|
//! | resource | non-empty string | non-empty string | absent                    |
//! | method   | non-empty string | non-empty string | absent                    |
//! | params   | object           | object           | absent                    |
//! | result   | absent           | absent           | exactly one of the two    |
//! | error    | absent           | absent           | `{code, message}`         |
//!
//! A key that is present with a JSON `null` counts as present.
//!
//! Non-object input yields `false` from every predicate.

use crate::error::ErrorValue;
use crate::types::{MessageType, SCHEMA_VERSION};
use serde_json::{Map, Value};

/// Check that a payload is a valid request
pub fn is_valid_request(payload: &Value) -> bool {
    payload.as_object().is_some_and(request_fields)
}

/// Check that a payload is a valid response
pub fn is_valid_response(payload: &Value) -> bool {
    payload.as_object().is_some_and(response_fields)
}

/// Check that a payload is a valid notification
pub fn is_valid_notification(payload: &Value) -> bool {
    payload.as_object().is_some_and(notification_fields)
}

pub(crate) fn request_fields(fields: &Map<String, Value>) -> bool {
    if fields.contains_key("error") || fields.contains_key("result") {
        return false;
    }
    has_schema_version(fields)
        && fields.get("id").is_some_and(is_positive_integer)
        && fields.get("resource").is_some_and(is_non_empty_string)
        && fields.get("method").is_some_and(is_non_empty_string)
        && fields.get("params").is_some_and(Value::is_object)
}

pub(crate) fn response_fields(fields: &Map<String, Value>) -> bool {
    if fields.contains_key("method")
        || fields.contains_key("resource")
        || fields.contains_key("params")
    {
        return false;
    }
    if let Some(id) = fields.get("id") {
        if !is_positive_integer(id) {
            return false;
        }
    }
    if !has_schema_version(fields) {
        return false;
    }
    match (fields.get("result"), fields.get("error")) {
        (Some(_), None) => true,
        (None, Some(error)) => ErrorValue::from_json(error).is_some(),
        _ => false,
    }
}

pub(crate) fn notification_fields(fields: &Map<String, Value>) -> bool {
    if fields.contains_key("error") || fields.contains_key("result") || fields.contains_key("id")
    {
        return false;
    }
    has_schema_version(fields)
        && fields.get("resource").is_some_and(is_non_empty_string)
        && fields.get("method").is_some_and(is_non_empty_string)
        && fields.get("params").is_some_and(Value::is_object)
}

/// True when the payload satisfies any of the three role predicates
pub fn has_valid_syntax(payload: &Value) -> bool {
    is_valid_request(payload) || is_valid_response(payload) || is_valid_notification(payload)
}

/// Classify a payload
///
/// Predicates are tested in the order Request, Response, Notification and the
/// first match wins. Returns `None` for payloads that match no role.
///
/// ```rust
/// use jrmsg_core::{classify, MessageType, SCHEMA_VERSION};
/// use serde_json::json;
///
/// let payload = json!({"version": SCHEMA_VERSION, "id": 1, "result": "x"});
/// assert_eq!(classify::get_type(&payload), Some(MessageType::Response));
/// assert_eq!(classify::get_type(&json!({"incorrect": "string"})), None);
/// ```
pub fn get_type(payload: &Value) -> Option<MessageType> {
    if is_valid_request(payload) {
        Some(MessageType::Request)
    } else if is_valid_response(payload) {
        Some(MessageType::Response)
    } else if is_valid_notification(payload) {
        Some(MessageType::Notification)
    } else {
        None
    }
}

fn has_schema_version(fields: &Map<String, Value>) -> bool {
    fields.get("version").and_then(Value::as_str) == Some(SCHEMA_VERSION)
}

pub(crate) fn is_positive_integer(value: &Value) -> bool {
    value.as_u64().is_some_and(|n| n > 0)
}

pub(crate) fn is_non_empty_string(value: &Value) -> bool {
    value.as_str().is_some_and(|s| !s.is_empty())
}
