use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::keys::{CanonicalKey, RecordShape};
use crate::normalize::{Attributes, NormalizedRecord};

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ProjectionError {
    #[error("context has no identity: expected a non-empty targetingKey, user_id or device_id")]
    MissingIdentity,
    #[error("occurrence must carry a non-empty event_type")]
    MissingEventType,
    #[error("field {key} must be {expected}")]
    FieldType { key: CanonicalKey, expected: &'static str },
    #[error("normalized {found} record cannot be projected as a {expected} record")]
    ShapeMismatch { expected: &'static str, found: &'static str },
}

/// Identity and attributes sent to the assignment service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubjectRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub user_properties: Attributes,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub group_properties: Attributes,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub cohort_ids: BTreeSet<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub group_cohort_ids: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl SubjectRecord {
    /// Assigns every canonical field of a subject-shaped [`NormalizedRecord`] and
    /// moves its overflow bag into `user_properties`.
    ///
    /// # Errors
    /// Returns [`ProjectionError::FieldType`] when a value has the wrong JSON shape for
    /// its field, and [`ProjectionError::MissingIdentity`] when neither `user_id` nor
    /// `device_id` ends up non-empty.
    pub fn project(normalized: &NormalizedRecord) -> Result<Self, ProjectionError> {
        ensure_shape(normalized, RecordShape::Subject)?;

        let mut record = Self { user_properties: normalized.overflow.clone(), ..Self::default() };
        for (&key, value) in &normalized.canonical {
            if value.is_null() {
                continue;
            }
            match key {
                CanonicalKey::UserId => record.user_id = Some(string_field(key, value)?),
                CanonicalKey::DeviceId => record.device_id = Some(string_field(key, value)?),
                CanonicalKey::Country => record.country = Some(string_field(key, value)?),
                CanonicalKey::Region => record.region = Some(string_field(key, value)?),
                CanonicalKey::Dma => record.dma = Some(string_field(key, value)?),
                CanonicalKey::City => record.city = Some(string_field(key, value)?),
                CanonicalKey::Language => record.language = Some(string_field(key, value)?),
                CanonicalKey::Platform => record.platform = Some(string_field(key, value)?),
                CanonicalKey::Version => record.version = Some(string_field(key, value)?),
                CanonicalKey::Os => record.os = Some(string_field(key, value)?),
                CanonicalKey::DeviceManufacturer => {
                    record.device_manufacturer = Some(string_field(key, value)?);
                }
                CanonicalKey::DeviceBrand => record.device_brand = Some(string_field(key, value)?),
                CanonicalKey::DeviceModel => record.device_model = Some(string_field(key, value)?),
                CanonicalKey::Carrier => record.carrier = Some(string_field(key, value)?),
                CanonicalKey::Library => record.library = Some(string_field(key, value)?),
                CanonicalKey::UserProperties => {
                    let explicit = object_field(key, value)?;
                    for (name, entry) in explicit {
                        record.user_properties.entry(name).or_insert(entry);
                    }
                }
                CanonicalKey::GroupProperties => {
                    record.group_properties = object_field(key, value)?;
                }
                CanonicalKey::Groups => record.groups = groups_field(key, value)?,
                CanonicalKey::CohortIds => record.cohort_ids = id_set_field(key, value)?,
                CanonicalKey::GroupCohortIds => {
                    record.group_cohort_ids = group_cohort_ids_field(key, value)?;
                }
                other => {
                    record.user_properties.insert(other.name().to_string(), value.clone());
                }
            }
        }

        record.validate()?;
        Ok(record)
    }

    /// # Errors
    /// Returns [`ProjectionError::MissingIdentity`] when neither identity field is set.
    pub fn validate(&self) -> Result<(), ProjectionError> {
        if non_empty(self.user_id.as_deref()) || non_empty(self.device_id.as_deref()) {
            Ok(())
        } else {
            Err(ProjectionError::MissingIdentity)
        }
    }

    /// Lowercase hex SHA-256 of the record's JSON form.
    ///
    /// Equal records always produce equal digests; map fields serialize in key order.
    ///
    /// # Errors
    /// Returns the serializer error if the record cannot be encoded.
    pub fn content_digest(&self) -> Result<String, serde_json::Error> {
        let encoded = serde_json::to_vec(self)?;
        let mut hasher = Sha256::new();
        hasher.update(&encoded);
        let digest = hasher.finalize();
        Ok(format!("{digest:x}"))
    }
}

/// Identity, attributes and event data sent to the analytics service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OccurrenceRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insert_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub carrier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dma: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idfa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idfv: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revenue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(rename = "productId", skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(rename = "revenueType", skip_serializing_if = "Option::is_none")]
    pub revenue_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<String>,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub plan: Attributes,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub ingestion_metadata: Attributes,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub event_properties: Attributes,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub user_properties: Attributes,
    #[serde(skip_serializing_if = "Attributes::is_empty")]
    pub group_properties: Attributes,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: BTreeMap<String, Vec<String>>,
}

impl OccurrenceRecord {
    /// Assigns every canonical field of an occurrence-shaped [`NormalizedRecord`] and
    /// moves its overflow bag into `event_properties`.
    ///
    /// Identity and `event_type` are not checked here; tracking fills `event_type`
    /// after projection and calls [`OccurrenceRecord::validate`] last.
    ///
    /// # Errors
    /// Returns [`ProjectionError::FieldType`] when a value has the wrong JSON shape.
    pub fn project(normalized: &NormalizedRecord) -> Result<Self, ProjectionError> {
        ensure_shape(normalized, RecordShape::Occurrence)?;

        let mut record = Self { event_properties: normalized.overflow.clone(), ..Self::default() };
        for (&key, value) in &normalized.canonical {
            if value.is_null() {
                continue;
            }
            match key {
                CanonicalKey::EventType => record.event_type = Some(string_field(key, value)?),
                CanonicalKey::UserId => record.user_id = Some(string_field(key, value)?),
                CanonicalKey::DeviceId => record.device_id = Some(string_field(key, value)?),
                CanonicalKey::Time => record.time = Some(integer_field(key, value)?),
                CanonicalKey::InsertId => record.insert_id = Some(string_field(key, value)?),
                CanonicalKey::LocationLat => record.location_lat = Some(float_field(key, value)?),
                CanonicalKey::LocationLng => record.location_lng = Some(float_field(key, value)?),
                CanonicalKey::AppVersion => record.app_version = Some(string_field(key, value)?),
                CanonicalKey::VersionName => record.version_name = Some(string_field(key, value)?),
                CanonicalKey::Library => record.library = Some(string_field(key, value)?),
                CanonicalKey::Platform => record.platform = Some(string_field(key, value)?),
                CanonicalKey::OsName => record.os_name = Some(string_field(key, value)?),
                CanonicalKey::OsVersion => record.os_version = Some(string_field(key, value)?),
                CanonicalKey::DeviceBrand => record.device_brand = Some(string_field(key, value)?),
                CanonicalKey::DeviceManufacturer => {
                    record.device_manufacturer = Some(string_field(key, value)?);
                }
                CanonicalKey::DeviceModel => record.device_model = Some(string_field(key, value)?),
                CanonicalKey::Carrier => record.carrier = Some(string_field(key, value)?),
                CanonicalKey::Country => record.country = Some(string_field(key, value)?),
                CanonicalKey::Region => record.region = Some(string_field(key, value)?),
                CanonicalKey::City => record.city = Some(string_field(key, value)?),
                CanonicalKey::Dma => record.dma = Some(string_field(key, value)?),
                CanonicalKey::Idfa => record.idfa = Some(string_field(key, value)?),
                CanonicalKey::Idfv => record.idfv = Some(string_field(key, value)?),
                CanonicalKey::Adid => record.adid = Some(string_field(key, value)?),
                CanonicalKey::AndroidId => record.android_id = Some(string_field(key, value)?),
                CanonicalKey::Language => record.language = Some(string_field(key, value)?),
                CanonicalKey::Ip => record.ip = Some(string_field(key, value)?),
                CanonicalKey::Price => record.price = Some(float_field(key, value)?),
                CanonicalKey::Quantity => record.quantity = Some(integer_field(key, value)?),
                CanonicalKey::Revenue => record.revenue = Some(float_field(key, value)?),
                CanonicalKey::Currency => record.currency = Some(string_field(key, value)?),
                CanonicalKey::ProductId => record.product_id = Some(string_field(key, value)?),
                CanonicalKey::RevenueType => record.revenue_type = Some(string_field(key, value)?),
                CanonicalKey::EventId => record.event_id = Some(integer_field(key, value)?),
                CanonicalKey::SessionId => record.session_id = Some(integer_field(key, value)?),
                CanonicalKey::PartnerId => record.partner_id = Some(string_field(key, value)?),
                CanonicalKey::Plan => record.plan = object_field(key, value)?,
                CanonicalKey::IngestionMetadata => {
                    record.ingestion_metadata = object_field(key, value)?;
                }
                CanonicalKey::EventProperties => {
                    let explicit = object_field(key, value)?;
                    for (name, entry) in explicit {
                        record.event_properties.entry(name).or_insert(entry);
                    }
                }
                CanonicalKey::UserProperties => {
                    record.user_properties = object_field(key, value)?;
                }
                CanonicalKey::GroupProperties => {
                    record.group_properties = object_field(key, value)?;
                }
                CanonicalKey::Groups => record.groups = groups_field(key, value)?,
                other => {
                    record.event_properties.insert(other.name().to_string(), value.clone());
                }
            }
        }

        Ok(record)
    }

    /// # Errors
    /// Returns [`ProjectionError::MissingEventType`] or
    /// [`ProjectionError::MissingIdentity`] when the record cannot be sent.
    pub fn validate(&self) -> Result<(), ProjectionError> {
        if !non_empty(self.event_type.as_deref()) {
            return Err(ProjectionError::MissingEventType);
        }
        if !non_empty(self.user_id.as_deref()) && !non_empty(self.device_id.as_deref()) {
            return Err(ProjectionError::MissingIdentity);
        }
        Ok(())
    }
}

fn non_empty(value: Option<&str>) -> bool {
    value.is_some_and(|value| !value.is_empty())
}

fn ensure_shape(normalized: &NormalizedRecord, expected: RecordShape) -> Result<(), ProjectionError> {
    match normalized.shape {
        Some(found) if found != expected => Err(ProjectionError::ShapeMismatch {
            expected: expected.as_str(),
            found: found.as_str(),
        }),
        _ => Ok(()),
    }
}

fn string_field(key: CanonicalKey, value: &Value) -> Result<String, ProjectionError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or(ProjectionError::FieldType { key, expected: "a string" })
}

fn float_field(key: CanonicalKey, value: &Value) -> Result<f64, ProjectionError> {
    value.as_f64().ok_or(ProjectionError::FieldType { key, expected: "a number" })
}

#[allow(clippy::cast_possible_truncation)]
fn integer_field(key: CanonicalKey, value: &Value) -> Result<i64, ProjectionError> {
    if let Some(integer) = value.as_i64() {
        return Ok(integer);
    }
    value
        .as_f64()
        .map(|float| float.trunc() as i64)
        .ok_or(ProjectionError::FieldType { key, expected: "an integer" })
}

fn object_field(key: CanonicalKey, value: &Value) -> Result<Attributes, ProjectionError> {
    match value {
        Value::Object(map) => Ok(map.clone()),
        _ => Err(ProjectionError::FieldType { key, expected: "an object" }),
    }
}

fn string_list(key: CanonicalKey, value: &Value) -> Result<Vec<String>, ProjectionError> {
    let Value::Array(items) = value else {
        return Err(ProjectionError::FieldType { key, expected: "an object of string arrays" });
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(ProjectionError::FieldType { key, expected: "an object of string arrays" })
        })
        .collect()
}

fn groups_field(
    key: CanonicalKey,
    value: &Value,
) -> Result<BTreeMap<String, Vec<String>>, ProjectionError> {
    let Value::Object(map) = value else {
        return Err(ProjectionError::FieldType { key, expected: "an object of string arrays" });
    };
    map.iter().map(|(group_type, names)| Ok((group_type.clone(), string_list(key, names)?))).collect()
}

/// Cohort ids arrive either as a list or as a set-like object whose keys are the ids.
fn id_set_field(key: CanonicalKey, value: &Value) -> Result<BTreeSet<String>, ProjectionError> {
    const EXPECTED: &str = "a list of ids or an object keyed by id";
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or(ProjectionError::FieldType { key, expected: EXPECTED })
            })
            .collect(),
        Value::Object(map) => Ok(map.keys().cloned().collect()),
        _ => Err(ProjectionError::FieldType { key, expected: EXPECTED }),
    }
}

fn group_cohort_ids_field(
    key: CanonicalKey,
    value: &Value,
) -> Result<BTreeMap<String, BTreeMap<String, BTreeSet<String>>>, ProjectionError> {
    let Value::Object(by_type) = value else {
        return Err(ProjectionError::FieldType { key, expected: "an object of group cohort ids" });
    };
    let mut result = BTreeMap::new();
    for (group_type, by_name) in by_type {
        let Value::Object(by_name) = by_name else {
            return Err(ProjectionError::FieldType {
                key,
                expected: "an object of group cohort ids",
            });
        };
        let mut names = BTreeMap::new();
        for (group_name, ids) in by_name {
            names.insert(group_name.clone(), id_set_field(key, ids)?);
        }
        result.insert(group_type.clone(), names);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use serde_json::json;

    use super::*;
    use crate::alias::AliasTable;
    use crate::keys::{occurrence_only_keys, shared_keys, subject_only_keys};
    use crate::normalize::normalize;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture must be a JSON object, got {other}"),
        }
    }

    fn subject(value: Value) -> Result<SubjectRecord, ProjectionError> {
        SubjectRecord::project(&normalize(
            &attrs(value),
            &AliasTable::builtin(),
            RecordShape::Subject,
        ))
    }

    fn occurrence(value: Value) -> Result<OccurrenceRecord, ProjectionError> {
        OccurrenceRecord::project(&normalize(
            &attrs(value),
            &AliasTable::builtin(),
            RecordShape::Occurrence,
        ))
    }

    fn one_attribute() -> Attributes {
        attrs(json!({"k": "v"}))
    }

    fn ids(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|value| (*value).to_string()).collect()
    }

    fn serialized_field_names<T: Serialize>(record: &T) -> BTreeSet<String> {
        match serde_json::to_value(record) {
            Ok(Value::Object(map)) => map.keys().cloned().collect(),
            Ok(other) => panic!("record should serialize to an object, got {other}"),
            Err(err) => panic!("record should serialize: {err}"),
        }
    }

    fn names(keys: impl IntoIterator<Item = CanonicalKey>) -> BTreeSet<String> {
        keys.into_iter().map(|key| key.name().to_string()).collect()
    }

    // Struct literals list every field, so adding a field to either record type
    // fails to compile here until the registry and this fixture are updated.
    fn fully_populated_subject() -> SubjectRecord {
        let text = || Some("x".to_string());
        SubjectRecord {
            user_id: text(),
            device_id: text(),
            country: text(),
            region: text(),
            dma: text(),
            city: text(),
            language: text(),
            platform: text(),
            version: text(),
            os: text(),
            device_manufacturer: text(),
            device_brand: text(),
            device_model: text(),
            carrier: text(),
            library: text(),
            user_properties: one_attribute(),
            group_properties: one_attribute(),
            groups: BTreeMap::from([("org".to_string(), vec!["acme".to_string()])]),
            cohort_ids: ids(&["c1"]),
            group_cohort_ids: BTreeMap::from([(
                "org".to_string(),
                BTreeMap::from([("acme".to_string(), ids(&["c2"]))]),
            )]),
        }
    }

    fn fully_populated_occurrence() -> OccurrenceRecord {
        let text = || Some("x".to_string());
        OccurrenceRecord {
            event_type: text(),
            user_id: text(),
            device_id: text(),
            time: Some(1),
            insert_id: text(),
            location_lat: Some(1.0),
            location_lng: Some(1.0),
            app_version: text(),
            version_name: text(),
            library: text(),
            platform: text(),
            os_name: text(),
            os_version: text(),
            device_brand: text(),
            device_manufacturer: text(),
            device_model: text(),
            carrier: text(),
            country: text(),
            region: text(),
            city: text(),
            dma: text(),
            idfa: text(),
            idfv: text(),
            adid: text(),
            android_id: text(),
            language: text(),
            ip: text(),
            price: Some(1.0),
            quantity: Some(1),
            revenue: Some(1.0),
            currency: text(),
            product_id: text(),
            revenue_type: text(),
            event_id: Some(1),
            session_id: Some(1),
            partner_id: text(),
            plan: one_attribute(),
            ingestion_metadata: one_attribute(),
            event_properties: one_attribute(),
            user_properties: one_attribute(),
            group_properties: one_attribute(),
            groups: BTreeMap::from([("org".to_string(), vec!["acme".to_string()])]),
        }
    }

    #[test]
    fn registry_partitions_the_record_field_sets() {
        let subject_fields = serialized_field_names(&fully_populated_subject());
        let occurrence_fields = serialized_field_names(&fully_populated_occurrence());

        let actual_shared =
            subject_fields.intersection(&occurrence_fields).cloned().collect::<BTreeSet<_>>();
        let actual_subject_only =
            subject_fields.difference(&occurrence_fields).cloned().collect::<BTreeSet<_>>();
        let actual_occurrence_only =
            occurrence_fields.difference(&subject_fields).cloned().collect::<BTreeSet<_>>();

        assert_eq!(actual_shared, names(shared_keys()));
        assert_eq!(actual_subject_only, names(subject_only_keys()));
        assert_eq!(actual_occurrence_only, names(occurrence_only_keys()));
    }

    #[test]
    fn subject_projection_assigns_fields_and_overflow() {
        let record = match subject(json!({
            "targetingKey": "user-1",
            "deviceId": "device-1",
            "Country": "US",
            "os": "ios",
            "groups": {"org": ["acme"]},
            "cohort_ids": ["c1", "c2"],
            "tier": "gold"
        })) {
            Ok(record) => record,
            Err(err) => panic!("subject should project: {err}"),
        };
        assert_eq!(record.user_id.as_deref(), Some("user-1"));
        assert_eq!(record.device_id.as_deref(), Some("device-1"));
        assert_eq!(record.country.as_deref(), Some("US"));
        assert_eq!(record.os.as_deref(), Some("ios"));
        assert_eq!(record.groups.get("org"), Some(&vec!["acme".to_string()]));
        assert_eq!(record.cohort_ids, ids(&["c1", "c2"]));
        assert_eq!(record.user_properties.get("tier"), Some(&json!("gold")));
    }

    #[test]
    fn cohort_ids_accept_set_like_objects() {
        let record = match subject(json!({
            "user_id": "u",
            "cohortIDs": {"c1": {}, "c2": {}},
            "group_cohort_ids": {"org": {"acme": ["c3"]}}
        })) {
            Ok(record) => record,
            Err(err) => panic!("subject should project: {err}"),
        };
        assert_eq!(record.cohort_ids, ids(&["c1", "c2"]));
        assert_eq!(
            record.group_cohort_ids.get("org").and_then(|names| names.get("acme")),
            Some(&ids(&["c3"]))
        );
    }

    #[test]
    fn subject_without_identity_is_rejected() {
        assert_eq!(subject(json!({})), Err(ProjectionError::MissingIdentity));
        assert_eq!(
            subject(json!({"country": "US", "plan": "pro"})),
            Err(ProjectionError::MissingIdentity)
        );
        assert_eq!(subject(json!({"user_id": ""})), Err(ProjectionError::MissingIdentity));
    }

    #[test]
    fn device_id_alone_is_enough_identity() {
        assert!(subject(json!({"device-id": "d1"})).is_ok());
    }

    #[test]
    fn wrong_value_shapes_are_reported_with_the_field() {
        assert_eq!(
            subject(json!({"user_id": 42})),
            Err(ProjectionError::FieldType { key: CanonicalKey::UserId, expected: "a string" })
        );
        assert!(matches!(
            subject(json!({"user_id": "u", "groups": {"org": "acme"}})),
            Err(ProjectionError::FieldType { key: CanonicalKey::Groups, .. })
        ));
        assert!(matches!(
            occurrence(json!({"user_id": "u", "price": "cheap"})),
            Err(ProjectionError::FieldType { key: CanonicalKey::Price, .. })
        ));
    }

    #[test]
    fn null_values_are_treated_as_absent() {
        let record = match subject(json!({"user_id": "u", "country": null})) {
            Ok(record) => record,
            Err(err) => panic!("subject should project: {err}"),
        };
        assert_eq!(record.country, None);
    }

    #[test]
    fn occurrence_projection_maps_numbers_and_bags() {
        let record = match occurrence(json!({
            "user_id": "buyer",
            "event_type": "purchase",
            "price": 19.99,
            "quantity": 2.7,
            "revenueType": "subscription",
            "sessionId": 1_700_000_000_000_i64,
            "userProperties": {"tier": "gold"},
            "product_id": "SKU-1"
        })) {
            Ok(record) => record,
            Err(err) => panic!("occurrence should project: {err}"),
        };
        assert_eq!(record.price, Some(19.99));
        assert_eq!(record.quantity, Some(2));
        assert_eq!(record.revenue_type.as_deref(), Some("subscription"));
        assert_eq!(record.session_id, Some(1_700_000_000_000));
        assert_eq!(record.user_properties.get("tier"), Some(&json!("gold")));
        assert_eq!(record.event_properties.get("product_id"), Some(&json!("SKU-1")));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn occurrence_validation_requires_event_type_then_identity() {
        let mut record = OccurrenceRecord::default();
        assert_eq!(record.validate(), Err(ProjectionError::MissingEventType));
        record.event_type = Some("click".to_string());
        assert_eq!(record.validate(), Err(ProjectionError::MissingIdentity));
        record.device_id = Some("d1".to_string());
        assert_eq!(record.validate(), Ok(()));
    }

    #[test]
    fn projecting_the_wrong_shape_is_rejected() {
        let normalized = normalize(
            &attrs(json!({"user_id": "u"})),
            &AliasTable::builtin(),
            RecordShape::Occurrence,
        );
        assert!(matches!(
            SubjectRecord::project(&normalized),
            Err(ProjectionError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn content_digest_is_stable_and_content_sensitive() {
        let first = subject(json!({"user_id": "u", "tier": "gold", "country": "US"}));
        let second = subject(json!({"country": "US", "tier": "gold", "userId": "u"}));
        let other = subject(json!({"user_id": "u", "tier": "silver", "country": "US"}));
        let digest = |record: Result<SubjectRecord, ProjectionError>| match record {
            Ok(record) => match record.content_digest() {
                Ok(digest) => digest,
                Err(err) => panic!("digest should encode: {err}"),
            },
            Err(err) => panic!("subject should project: {err}"),
        };
        let first = digest(first);
        assert_eq!(first.len(), 64);
        assert_eq!(first, digest(second));
        assert_ne!(first, digest(other));
    }
}
