use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::normalize::Attributes;
use crate::variant::{Payload, Variant};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    Resolved,
    Default,
    Error,
}

impl Reason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolved => "RESOLVED",
            Self::Default => "DEFAULT",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ProviderNotReady,
    FlagNotFound,
    InvalidContext,
    TypeMismatch,
    General,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProviderNotReady => "PROVIDER_NOT_READY",
            Self::FlagNotFound => "FLAG_NOT_FOUND",
            Self::InvalidContext => "INVALID_CONTEXT",
            Self::TypeMismatch => "TYPE_MISMATCH",
            Self::General => "GENERAL",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
#[error("{kind}: {message}")]
pub struct ResolutionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ResolutionError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    #[must_use]
    pub fn provider_not_ready() -> Self {
        Self::new(ErrorKind::ProviderNotReady, "provider is not ready")
    }

    #[must_use]
    pub fn flag_not_found(flag: &str) -> Self {
        Self::new(ErrorKind::FlagNotFound, format!("flag {flag} not found"))
    }

    #[must_use]
    pub fn invalid_context(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidContext, message)
    }

    #[must_use]
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeMismatch, message)
    }

    #[must_use]
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::General, message)
    }
}

/// Outcome of one typed evaluation. Exactly one shape is ever produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<T> {
    Resolved { value: T, variant: String, metadata: Attributes },
    DefaultedIntentionally { value: T },
    DefaultedOnError { value: T, error: ResolutionError },
}

impl<T> Resolution<T> {
    /// The single exit for every failed evaluation: echoes the caller's default.
    #[must_use]
    pub fn error(default: T, error: ResolutionError) -> Self {
        Self::DefaultedOnError { value: default, error }
    }

    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Resolved { value, .. }
            | Self::DefaultedIntentionally { value }
            | Self::DefaultedOnError { value, .. } => value,
        }
    }

    #[must_use]
    pub fn into_value(self) -> T {
        match self {
            Self::Resolved { value, .. }
            | Self::DefaultedIntentionally { value }
            | Self::DefaultedOnError { value, .. } => value,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Reason {
        match self {
            Self::Resolved { .. } => Reason::Resolved,
            Self::DefaultedIntentionally { .. } => Reason::Default,
            Self::DefaultedOnError { .. } => Reason::Error,
        }
    }

    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        match self {
            Self::Resolved { variant, .. } => Some(variant),
            Self::DefaultedIntentionally { .. } | Self::DefaultedOnError { .. } => None,
        }
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::DefaultedOnError { error, .. } => Some(error.kind),
            Self::Resolved { .. } | Self::DefaultedIntentionally { .. } => None,
        }
    }

    #[must_use]
    pub fn into_detail(self) -> ResolutionDetail<T> {
        match self {
            Self::Resolved { value, variant, metadata } => ResolutionDetail {
                value,
                variant: Some(variant),
                reason: Reason::Resolved,
                error_kind: None,
                error_message: None,
                metadata,
            },
            Self::DefaultedIntentionally { value } => ResolutionDetail {
                value,
                variant: None,
                reason: Reason::Default,
                error_kind: None,
                error_message: None,
                metadata: Attributes::new(),
            },
            Self::DefaultedOnError { value, error } => ResolutionDetail {
                value,
                variant: None,
                reason: Reason::Error,
                error_kind: Some(error.kind),
                error_message: Some(error.message),
                metadata: Attributes::new(),
            },
        }
    }
}

/// Flat view of a [`Resolution`] handed across the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionDetail<T> {
    pub value: T,
    pub variant: Option<String>,
    pub reason: Reason,
    pub error_kind: Option<ErrorKind>,
    pub error_message: Option<String>,
    pub metadata: Attributes,
}

/// Result of coercing one payload to a requested type.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced<T> {
    Value(T),
    Absent,
    Mismatch,
}

/// A type a flag can be evaluated as. `coerce` is total over [`Payload`].
pub trait FlagValue: Sized {
    const TYPE_NAME: &'static str;

    fn coerce(payload: &Payload) -> Coerced<Self>;
}

impl FlagValue for bool {
    const TYPE_NAME: &'static str = "boolean";

    /// Any assignment to a non-off variant counts as `true` unless the payload
    /// itself is a boolean.
    fn coerce(payload: &Payload) -> Coerced<Self> {
        match payload {
            Payload::Bool(flag) => Coerced::Value(*flag),
            Payload::Absent
            | Payload::Number(_)
            | Payload::String(_)
            | Payload::Sequence(_)
            | Payload::Mapping(_) => Coerced::Value(true),
        }
    }
}

impl FlagValue for String {
    const TYPE_NAME: &'static str = "string";

    fn coerce(payload: &Payload) -> Coerced<Self> {
        match payload {
            Payload::String(text) => Coerced::Value(text.clone()),
            Payload::Absent => Coerced::Absent,
            Payload::Bool(_) | Payload::Number(_) | Payload::Sequence(_) | Payload::Mapping(_) => {
                Coerced::Mismatch
            }
        }
    }
}

impl FlagValue for f64 {
    const TYPE_NAME: &'static str = "float";

    fn coerce(payload: &Payload) -> Coerced<Self> {
        match payload {
            Payload::Number(number) => number.as_f64().map_or(Coerced::Mismatch, Coerced::Value),
            Payload::String(text) => text.parse::<f64>().map_or(Coerced::Mismatch, Coerced::Value),
            Payload::Absent => Coerced::Absent,
            Payload::Bool(_) | Payload::Sequence(_) | Payload::Mapping(_) => Coerced::Mismatch,
        }
    }
}

impl FlagValue for i64 {
    const TYPE_NAME: &'static str = "integer";

    fn coerce(payload: &Payload) -> Coerced<Self> {
        match payload {
            Payload::Number(number) => number
                .as_i64()
                .or_else(|| number.as_f64().and_then(truncate_to_i64))
                .map_or(Coerced::Mismatch, Coerced::Value),
            Payload::String(text) => text.parse::<i64>().map_or(Coerced::Mismatch, Coerced::Value),
            Payload::Absent => Coerced::Absent,
            Payload::Bool(_) | Payload::Sequence(_) | Payload::Mapping(_) => Coerced::Mismatch,
        }
    }
}

/// Truncates toward zero; `None` when the value has no `i64` counterpart.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn truncate_to_i64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    if truncated.is_finite() && truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
        Some(truncated as i64)
    } else {
        None
    }
}

impl FlagValue for Value {
    const TYPE_NAME: &'static str = "object";

    fn coerce(payload: &Payload) -> Coerced<Self> {
        match payload {
            Payload::Absent => Coerced::Absent,
            Payload::Bool(_)
            | Payload::Number(_)
            | Payload::String(_)
            | Payload::Sequence(_)
            | Payload::Mapping(_) => Coerced::Value(payload.to_value()),
        }
    }
}

/// Turns the variant returned for `flag` into a typed [`Resolution`].
///
/// `variant` is `None` when the assignment call did not return the flag.
#[must_use]
pub fn resolve_variant<T: FlagValue>(
    flag: &str,
    default: T,
    variant: Option<&Variant>,
) -> Resolution<T> {
    let Some(variant) = variant else {
        return Resolution::error(default, ResolutionError::flag_not_found(flag));
    };
    if variant.is_off() {
        return Resolution::DefaultedIntentionally { value: default };
    }

    match T::coerce(&variant.payload) {
        Coerced::Value(value) => Resolution::Resolved {
            value,
            variant: variant.key.clone(),
            metadata: resolved_metadata(variant),
        },
        Coerced::Absent => Resolution::DefaultedIntentionally { value: default },
        Coerced::Mismatch => Resolution::error(
            default,
            ResolutionError::type_mismatch(format!(
                "flag {flag} has a {} payload, expected {}",
                variant.payload.kind(),
                T::TYPE_NAME
            )),
        ),
    }
}

fn resolved_metadata(variant: &Variant) -> Attributes {
    let mut metadata = variant.metadata.clone();
    metadata.insert("key".to_string(), Value::String(variant.key.clone()));
    if let Some(value) = &variant.value {
        metadata.insert("value".to_string(), Value::String(value.clone()));
    }
    metadata
}
