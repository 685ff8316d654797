use std::sync::Arc;

use flagbridge_core::{OccurrenceRecord, SubjectRecord};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
#[error("normalizer rejected the record: {0}")]
pub struct HookError(pub String);

impl HookError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Runs on every projected subject record before the assignment call.
pub type SubjectNormalizer =
    Arc<dyn Fn(SubjectRecord) -> Result<SubjectRecord, HookError> + Send + Sync>;

/// Runs on every occurrence record before it is validated and handed to the sink.
pub type EventNormalizer =
    Arc<dyn Fn(OccurrenceRecord) -> Result<OccurrenceRecord, HookError> + Send + Sync>;
