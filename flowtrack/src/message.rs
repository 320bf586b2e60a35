//! Message envelope and identity.
//!
//! A message is a bag of named JSON fields plus a stable identifier. Derived
//! messages created by cloning keep the identifier, so work spawned across
//! stages stays attributable to the input that started it. The identifier is
//! not globally unique across unrelated inputs; producers own uniqueness, the
//! core only groups by identifier equality.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Opaque, comparable message identifier.
///
/// Serializes as a plain string; on the wire it appears as the message's
/// `_msgid` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Creates an identifier from an existing value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A message flowing through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The message identifier, stable across derivation.
    #[serde(rename = "_msgid")]
    id: MessageId,

    /// The remaining named fields (payload, topic, arbitrary metadata).
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Creates an empty message with a generated identifier.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: MessageId::generate(),
            fields: HashMap::new(),
        }
    }

    /// Creates an empty message with a specific identifier.
    #[must_use]
    pub fn with_id(id: impl Into<MessageId>) -> Self {
        Self {
            id: id.into(),
            fields: HashMap::new(),
        }
    }

    /// Sets the payload field.
    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<serde_json::Value>) -> Self {
        self.fields.insert("payload".to_string(), payload.into());
        self
    }

    /// Sets the topic field.
    #[must_use]
    pub fn with_topic(mut self, topic: impl Into<serde_json::Value>) -> Self {
        self.fields.insert("topic".to_string(), topic.into());
        self
    }

    /// Sets an arbitrary named field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Returns the message identifier.
    #[must_use]
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the payload field, if set.
    #[must_use]
    pub fn payload(&self) -> Option<&serde_json::Value> {
        self.fields.get("payload")
    }

    /// Returns the topic field, if set.
    #[must_use]
    pub fn topic(&self) -> Option<&serde_json::Value> {
        self.fields.get("topic")
    }

    /// Returns a named field, if set.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Sets a named field in place.
    pub fn set(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.fields.insert(key.into(), value);
    }

    /// Reassigns the identifier.
    ///
    /// Derivation normally preserves identity; this is the deliberate-reset
    /// escape hatch for producers that start a new unit of tracking.
    pub fn set_id(&mut self, id: impl Into<MessageId>) {
        self.id = id.into();
    }

    /// Replaces the identifier with a freshly generated one.
    pub fn regenerate_id(&mut self) {
        self.id = MessageId::generate();
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_message_generates_id() {
        let a = Message::new();
        let b = Message::new();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_message_builder() {
        let msg = Message::with_id("xyz")
            .with_payload("foo")
            .with_topic("bar")
            .with_field("meta", serde_json::json!({"k": 1}));

        assert_eq!(msg.id().as_str(), "xyz");
        assert_eq!(msg.payload(), Some(&serde_json::json!("foo")));
        assert_eq!(msg.topic(), Some(&serde_json::json!("bar")));
        assert_eq!(msg.get("meta"), Some(&serde_json::json!({"k": 1})));
    }

    #[test]
    fn test_clone_preserves_identity() {
        let msg = Message::with_id("abc").with_payload(1);
        let derived = msg.clone();
        assert_eq!(derived.id(), msg.id());
    }

    #[test]
    fn test_regenerate_id() {
        let mut msg = Message::with_id("abc");
        msg.regenerate_id();
        assert_ne!(msg.id().as_str(), "abc");
    }

    #[test]
    fn test_serializes_with_msgid_field() {
        let msg = Message::with_id("xyz").with_payload("foo").with_topic("bar");
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["_msgid"], serde_json::json!("xyz"));
        assert_eq!(json["payload"], serde_json::json!("foo"));
        assert_eq!(json["topic"], serde_json::json!("bar"));
    }

    #[test]
    fn test_deserializes_flattened_fields() {
        let msg: Message =
            serde_json::from_str(r#"{"_msgid": "m1", "payload": 42, "extra": true}"#).unwrap();

        assert_eq!(msg.id().as_str(), "m1");
        assert_eq!(msg.payload(), Some(&serde_json::json!(42)));
        assert_eq!(msg.get("extra"), Some(&serde_json::json!(true)));
    }
}
