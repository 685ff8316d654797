use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use flagbridge_core::{
    normalize, AliasTable, Attributes, OccurrenceRecord, ProjectionError, RecordShape,
    SubjectRecord,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;
use ulid::Ulid;

use crate::hooks::HookError;

/// Event type recorded whenever an evaluation resolves to a variant.
pub const EXPOSURE_EVENT: &str = "$exposure";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum SinkError {
    #[error("event sink I/O failed: {0}")]
    Io(String),
    #[error("event could not be encoded: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum TrackError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Caller-supplied data attached to a tracked event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrackingDetails {
    /// Becomes `revenue` when non-zero.
    pub value: f64,
    pub attributes: Attributes,
}

impl TrackingDetails {
    #[must_use]
    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }
}

/// Receives finished occurrence records.
pub trait EventSink: Send + Sync {
    /// # Errors
    /// Returns [`SinkError`] when the event cannot be delivered.
    fn send(&self, event: &OccurrenceRecord) -> Result<(), SinkError>;
}

/// Appends one JSON object per line to a file.
#[derive(Debug)]
pub struct NdjsonEventSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl NdjsonEventSink {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }
}

impl EventSink for NdjsonEventSink {
    fn send(&self, event: &OccurrenceRecord) -> Result<(), SinkError> {
        let line = serde_json::to_string(event).map_err(|err| SinkError::Encode(err.to_string()))?;
        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| SinkError::Io(err.to_string()))?;
        writeln!(file, "{line}").map_err(|err| SinkError::Io(err.to_string()))
    }
}

/// Builds the occurrence record for a tracked event, before hooks and validation.
///
/// Detail attributes override context attributes of the same name.
///
/// # Errors
/// Returns [`ProjectionError::FieldType`] when an attribute has the wrong shape.
pub fn build_occurrence(
    event_name: &str,
    context: &Attributes,
    details: &TrackingDetails,
    aliases: &AliasTable,
) -> Result<OccurrenceRecord, ProjectionError> {
    let mut attributes = context.clone();
    attributes.extend(details.attributes.iter().map(|(name, value)| (name.clone(), value.clone())));

    let normalized = normalize(&attributes, aliases, RecordShape::Occurrence);
    let mut record = OccurrenceRecord::project(&normalized)?;
    record.event_type = Some(event_name.to_string());
    if has_revenue(details.value) {
        record.revenue = Some(details.value);
    }
    stamp(&mut record);
    Ok(record)
}

#[allow(clippy::float_cmp)]
fn has_revenue(value: f64) -> bool {
    value != 0.0
}

/// Occurrence recording that `subject` was served `variant` for `flag`.
#[must_use]
pub fn exposure_event(flag: &str, variant: &str, subject: &SubjectRecord) -> OccurrenceRecord {
    let mut event_properties = Attributes::new();
    event_properties.insert("flag_key".to_string(), Value::String(flag.to_string()));
    event_properties.insert("variant".to_string(), Value::String(variant.to_string()));

    let mut record = OccurrenceRecord {
        event_type: Some(EXPOSURE_EVENT.to_string()),
        user_id: subject.user_id.clone(),
        device_id: subject.device_id.clone(),
        event_properties,
        ..OccurrenceRecord::default()
    };
    stamp(&mut record);
    record
}

fn stamp(record: &mut OccurrenceRecord) {
    if record.time.is_none() {
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        record.time = i64::try_from(millis).ok();
    }
    if record.insert_id.is_none() {
        record.insert_id = Some(Ulid::new().to_string());
    }
}
