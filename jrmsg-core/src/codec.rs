//! Text encoding and parsing of messages
//!
//! The wire text format is a pluggable collaborator: anything implementing
//! [`Serializer`] can turn payloads into text and back. [`JsonSerializer`] is
//! the default and produces compact JSON.
//!
//! [`Parser`] ties a serializer to the classifier and the variant
//! constructors. It accepts either text or an already-decoded payload:
//!
//! 1. **Decode**: text goes through `Serializer::deserialize`
//! 2. **Classify**: the payload's role is decided by [`crate::classify::get_type`]
//! 3. **Construct**: the matching variant re-validates and builds itself
//!
//! Keys a role does not define are kept on the variant (`extras()`) and
//! written back out on encode. Encoding checks the role predicate first, so
//! the parser never emits text it would itself reject.
//!
//! # Errors
//!
//! Undecodable text and payloads that match no role both surface as
//! `Error::Parse`. Parsing never touches correlation state; delivering a
//! parsed response to a waiting request is a separate, explicit step.
//!
//! # Examples
//!
//! ```rust
//! use jrmsg_core::{Envelope, Parser, Response};
//! use serde_json::json;
//!
//! let parser = Parser::new();
//! let text = Response::success(1, json!("x")).to_string();
//!
//! let message = parser.parse_str(&text).unwrap();
//! assert!(message.is_response());
//! assert_eq!(message.to_string(), text);
//! ```

use crate::error::{Error, Result};
use crate::id::IdCounter;
use crate::types::{Envelope, Message};
use serde_json::Value;
use std::sync::Arc;

/// Text encoding strategy for message payloads
///
/// Implementations must round-trip every payload this crate produces.
pub trait Serializer: Send + Sync {
    /// Encode a payload to text
    fn serialize(&self, value: &Value) -> Result<String>;

    /// Decode text to a payload
    ///
    /// Malformed text must fail with `Error::Parse`.
    fn deserialize(&self, text: &str) -> Result<Value>;
}

/// Compact JSON serializer backed by serde_json
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::Serialization(e.to_string()))
    }

    fn deserialize(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|e| Error::Parse(e.to_string()))
    }
}

/// Parser input: encoded text or a decoded payload
#[derive(Debug, Clone)]
pub enum Input<'a> {
    /// Encoded text, decoded with the parser's serializer
    Text(&'a str),
    /// Already-decoded payload
    Payload(Value),
}

impl<'a> From<&'a str> for Input<'a> {
    fn from(text: &'a str) -> Self {
        Input::Text(text)
    }
}

impl<'a> From<&'a String> for Input<'a> {
    fn from(text: &'a String) -> Self {
        Input::Text(text.as_str())
    }
}

impl From<Value> for Input<'_> {
    fn from(payload: Value) -> Self {
        Input::Payload(payload)
    }
}

/// Single entry point from text or payload to a typed [`Message`]
#[derive(Clone)]
pub struct Parser {
    serializer: Arc<dyn Serializer>,
    ids: Arc<IdCounter>,
}

impl Parser {
    /// Parser using [`JsonSerializer`] and a fresh id domain
    pub fn new() -> Self {
        Self::with_serializer(Arc::new(JsonSerializer))
    }

    /// Parser using a custom serializer and a fresh id domain
    pub fn with_serializer(serializer: Arc<dyn Serializer>) -> Self {
        Self {
            serializer,
            ids: Arc::new(IdCounter::new()),
        }
    }

    /// Share an existing id domain
    ///
    /// Requests parsed without an id draw one from this counter.
    pub fn with_ids(mut self, ids: Arc<IdCounter>) -> Self {
        self.ids = ids;
        self
    }

    /// The serializer in use
    pub fn serializer(&self) -> &Arc<dyn Serializer> {
        &self.serializer
    }

    /// The id domain in use
    pub fn ids(&self) -> &Arc<IdCounter> {
        &self.ids
    }

    /// Parse text or a payload into a message
    pub fn parse<'a>(&self, input: impl Into<Input<'a>>) -> Result<Message> {
        match input.into() {
            Input::Text(text) => self.parse_str(text),
            Input::Payload(payload) => self.parse_value(payload),
        }
    }

    /// Decode and parse text
    #[tracing::instrument(skip(self, text), fields(len = text.len()))]
    pub fn parse_str(&self, text: &str) -> Result<Message> {
        let payload = self.serializer.deserialize(text).map_err(|e| match e {
            Error::Parse(msg) => Error::Parse(msg),
            other => Error::Parse(other.to_string()),
        })?;
        self.parse_value(payload)
    }

    /// Classify and construct from a decoded payload
    pub fn parse_value(&self, payload: Value) -> Result<Message> {
        let message = Message::from_payload(payload, &self.ids)?;
        tracing::trace!(kind = %message.kind(), id = ?message.id(), "Message parsed");
        Ok(message)
    }

    /// Encode any message with this parser's serializer
    pub fn encode(&self, message: &dyn Envelope) -> Result<String> {
        message.encode(self.serializer.as_ref())
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("last_issued_id", &self.ids.last_issued())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use crate::error::ErrorValue;
    use crate::types::{MessageType, Notification, Request, Response, SCHEMA_VERSION};
    use serde_json::json;

    #[test]
    fn test_parse_invalid_text() {
        let parser = Parser::new();
        let inputs = [
            "incorrect string",
            "",
            r#"{"incorrect": "string"}"#,
            "true",
            r#"{"version" : "1", "id" : 1, "resource" : "__global__", "method": "ping", "params" : {}}"#,
            r#"{"version" : "1.1.0", "id" : 1, "error" : {"code":1, "message":1}}"#,
        ];

        for input in inputs {
            assert!(
                matches!(parser.parse_str(input), Err(Error::Parse(_))),
                "expected parse failure for {:?}",
                input
            );
        }
    }

    #[test]
    fn test_parse_valid_text_round_trips() {
        let parser = Parser::new();
        let inputs = [
            format!(r#"{{"id":1,"result":null,"version":"{}"}}"#, SCHEMA_VERSION),
            format!(
                r#"{{"error":{{"code":1,"message":"msg"}},"id":1,"version":"{}"}}"#,
                SCHEMA_VERSION
            ),
            format!(
                r#"{{"id":1,"method":"ping","params":{{}},"resource":"__global__","version":"{}"}}"#,
                SCHEMA_VERSION
            ),
            format!(
                r#"{{"method":"ping","params":{{}},"resource":"__global__","version":"{}"}}"#,
                SCHEMA_VERSION
            ),
        ];

        for input in &inputs {
            let message = parser.parse(input).unwrap();
            let original: Value = serde_json::from_str(input).unwrap();
            let reencoded: Value = serde_json::from_str(&message.to_string()).unwrap();
            assert_eq!(reencoded, original);
        }
    }

    #[test]
    fn test_parse_payload() {
        let parser = Parser::new();
        let message = parser
            .parse(json!({"version": SCHEMA_VERSION, "resource": "ns", "method": "m", "params": {}}))
            .unwrap();
        assert_eq!(message.kind(), MessageType::Notification);

        assert!(matches!(
            parser.parse(json!({"version": SCHEMA_VERSION})),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_classify_after_serialize_matches_role() {
        let parser = Parser::new();
        let ids = IdCounter::new();

        let mut request = Request::new(&ids);
        request.set_method("someMethod").unwrap();
        let mut notification = Notification::new();
        notification.set_method("someMethod").unwrap();
        let response = Response::failure(3, ErrorValue::invalid_params("nope"));

        let messages: Vec<Box<dyn Envelope>> =
            vec![Box::new(request), Box::new(notification), Box::new(response)];
        for message in messages {
            let text = parser.encode(message.as_ref()).unwrap();
            let payload = parser.serializer().deserialize(&text).unwrap();
            assert_eq!(classify::get_type(&payload), Some(message.kind()));
            assert_eq!(parser.parse_str(&text).unwrap().to_json(), message.to_json());
        }
    }

    #[test]
    fn test_unknown_keys_survive_reencoding() {
        let parser = Parser::new();
        let inputs = [
            json!({"version": SCHEMA_VERSION, "id": 1, "resource": "r", "method": "m", "params": {}, "trace": "abc"}),
            json!({"version": SCHEMA_VERSION, "resource": "r", "method": "m", "params": {}, "origin": {"node": 2}}),
            json!({"version": SCHEMA_VERSION, "id": 1, "result": [1], "elapsed_ms": 4}),
        ];

        for input in inputs {
            let message = parser.parse(input.clone()).unwrap();
            let text = parser.encode(&message).unwrap();
            assert_eq!(parser.serializer().deserialize(&text).unwrap(), input);
        }

        match parser
            .parse(json!({"version": SCHEMA_VERSION, "id": 2, "result": 0, "trace": "t"}))
            .unwrap()
        {
            Message::Response(response) => {
                assert_eq!(response.extras().get("trace"), Some(&json!("t")));
                assert!(response.extras().get("id").is_none());
            }
            other => panic!("expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_rejects_incomplete_messages() {
        let parser = Parser::new();
        let ids = IdCounter::new();

        let request = Request::new(&ids);
        assert!(matches!(parser.encode(&request), Err(Error::Validation(_))));
        assert!(matches!(
            parser.encode(&Notification::new()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            parser.encode(&Response::new()),
            Err(Error::Validation(_))
        ));

        // Display still renders the partial payload for diagnostics
        assert!(!request.to_string().contains("method"));
    }

    #[test]
    fn test_shared_id_domain() {
        let ids = Arc::new(IdCounter::new());
        let parser = Parser::new().with_ids(Arc::clone(&ids));
        ids.next_id();
        assert_eq!(parser.ids().last_issued(), 1);
    }

    struct UpperCaseRejecting;

    impl Serializer for UpperCaseRejecting {
        fn serialize(&self, value: &Value) -> Result<String> {
            JsonSerializer.serialize(value)
        }

        fn deserialize(&self, text: &str) -> Result<Value> {
            if text.chars().any(|c| c.is_ascii_uppercase()) {
                return Err(Error::Serialization("uppercase not allowed".into()));
            }
            JsonSerializer.deserialize(text)
        }
    }

    #[test]
    fn test_custom_serializer_errors_become_parse_errors() {
        let parser = Parser::with_serializer(Arc::new(UpperCaseRejecting));
        assert!(matches!(parser.parse_str("{\"A\":1}"), Err(Error::Parse(_))));
    }
}
