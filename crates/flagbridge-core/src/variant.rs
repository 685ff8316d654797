use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::normalize::Attributes;

/// Variant key the assignment service returns for subjects outside the rollout.
pub const OFF_VARIANT_KEY: &str = "off";

/// Variants keyed by flag name, as returned by one assignment call.
pub type VariantSet = BTreeMap<String, Variant>;

/// Closed view of a variant payload, fixed when the payload leaves the wire format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Payload {
    #[default]
    Absent,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Value>),
    Mapping(Attributes),
}

impl Payload {
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Absent => "absent",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::from(self.clone())
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(flag) => Self::Bool(flag),
            Value::Number(number) => Self::Number(number),
            Value::String(text) => Self::String(text),
            Value::Array(items) => Self::Sequence(items),
            Value::Object(map) => Self::Mapping(map),
        }
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Absent => Value::Null,
            Payload::Bool(flag) => Value::Bool(flag),
            Payload::Number(number) => Value::Number(number),
            Payload::String(text) => Value::String(text),
            Payload::Sequence(items) => Value::Array(items),
            Payload::Mapping(map) => Value::Object(map),
        }
    }
}

/// One flag assignment returned by the assignment service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Payload::is_absent")]
    pub payload: Payload,
    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub metadata: Attributes,
}

impl Variant {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into(), ..Self::default() }
    }

    #[must_use]
    pub fn off() -> Self {
        Self::new(OFF_VARIANT_KEY)
    }

    #[must_use]
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = payload.into();
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Attributes) -> Self {
        self.metadata = metadata;
        self
    }

    #[must_use]
    pub fn is_off(&self) -> bool {
        self.key == OFF_VARIANT_KEY
    }
}
