use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ─── Well-known message attributes ────────────────────────────

/// Instance id of the calling process, set by the engine on outbound
/// messages so replies can be correlated back.
pub const ATTR_REFERENCE_ID: &str = "referenceId";
/// Message type, as stamped by the producer.
pub const ATTR_TYPE: &str = "type";
/// Message source, as stamped by the producer.
pub const ATTR_SOURCE: &str = "source";

// ─── Message ──────────────────────────────────────────────────

/// An inbound message: named attributes plus a business payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    attributes: BTreeMap<String, Value>,
    payload: Value,
}

impl Message {
    pub fn new(attributes: BTreeMap<String, Value>, payload: Value) -> Self {
        Self {
            attributes,
            payload,
        }
    }

    /// Payload-only message with no attributes.
    pub fn from_payload(payload: Value) -> Self {
        Self::new(BTreeMap::new(), payload)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }
}

// ─── CorrelationValue ─────────────────────────────────────────

/// Result of resolving a message attribute. Absence is an empty value,
/// never an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationValue(Value);

impl CorrelationValue {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn none() -> Self {
        Self(Value::Null)
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The value as a non-empty string, when it is one.
    pub fn as_string(&self) -> Option<&str> {
        match &self.0 {
            Value::String(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}

// ─── Resolver strategies ──────────────────────────────────────

/// Extracts one named value from a message without mutating anything.
/// Total: a missing attribute resolves to an empty value.
pub trait CorrelationResolver: Send + Sync {
    fn resolve(&self, message: &Message) -> CorrelationValue;
}

/// Resolves the calling-process reference id used to decide signal vs
/// start.
#[derive(Clone, Copy, Debug, Default)]
pub struct ReferenceIdResolver;

impl CorrelationResolver for ReferenceIdResolver {
    fn resolve(&self, message: &Message) -> CorrelationValue {
        message
            .attribute(ATTR_REFERENCE_ID)
            .cloned()
            .map(CorrelationValue::new)
            .unwrap_or_else(CorrelationValue::none)
    }
}

/// Resolves an arbitrary attribute by a fixed key (`type`, `source`, ...).
#[derive(Clone, Debug)]
pub struct AttributeResolver {
    key: String,
}

impl AttributeResolver {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl CorrelationResolver for AttributeResolver {
    fn resolve(&self, message: &Message) -> CorrelationValue {
        message
            .attribute(&self.key)
            .cloned()
            .map(CorrelationValue::new)
            .unwrap_or_else(CorrelationValue::none)
    }
}

/// Resolves the business payload, used as signal/start input.
#[derive(Clone, Copy, Debug, Default)]
pub struct PayloadResolver;

impl CorrelationResolver for PayloadResolver {
    fn resolve(&self, message: &Message) -> CorrelationValue {
        CorrelationValue::new(message.payload().clone())
    }
}
