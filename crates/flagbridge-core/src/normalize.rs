use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::alias::AliasTable;
use crate::keys::{CanonicalKey, RecordShape};

/// Flat, loosely typed evaluation context supplied by the caller.
pub type Attributes = Map<String, Value>;

/// Result of routing an attribute map through the alias table.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRecord {
    pub shape: Option<RecordShape>,
    pub canonical: BTreeMap<CanonicalKey, Value>,
    pub overflow: Attributes,
}

impl NormalizedRecord {
    #[must_use]
    pub fn get(&self, key: CanonicalKey) -> Option<&Value> {
        self.canonical.get(&key)
    }

    /// Non-empty string value of `key`, if any.
    #[must_use]
    pub fn non_empty_str(&self, key: CanonicalKey) -> Option<&str> {
        self.get(key).and_then(Value::as_str).filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn has_identity(&self) -> bool {
        CanonicalKey::ALL
            .into_iter()
            .filter(|key| key.is_identity())
            .any(|key| self.non_empty_str(key).is_some())
    }
}

/// Splits `attributes` into canonical fields and an overflow bag.
///
/// Never fails. Keys that resolve to a canonical key the `shape` does not accept
/// go to the overflow bag under the caller's spelling, as do unknown keys. When two
/// spellings resolve to one canonical key the later one (in map order) wins.
///
/// An explicit overflow bag (`user_properties` for subjects, `event_properties` for
/// occurrences) is merged entry by entry; loose attributes take precedence over
/// entries of the same name inside it.
#[must_use]
pub fn normalize(
    attributes: &Attributes,
    aliases: &AliasTable,
    shape: RecordShape,
) -> NormalizedRecord {
    let overflow_key = shape.overflow_key();
    let mut canonical = BTreeMap::new();
    let mut loose = Attributes::new();
    let mut explicit_bags: Vec<(&str, &Value)> = Vec::new();

    for (key, value) in attributes {
        match aliases.resolve(key) {
            Some(resolved) if resolved == overflow_key => {
                explicit_bags.push((key.as_str(), value));
            }
            Some(resolved) if resolved.accepts(shape) => {
                canonical.insert(resolved, value.clone());
            }
            Some(_) | None => {
                loose.insert(key.clone(), value.clone());
            }
        }
    }

    let mut overflow = Attributes::new();
    for (key, bag) in explicit_bags {
        match bag {
            Value::Object(entries) => {
                overflow.extend(entries.iter().map(|(name, value)| (name.clone(), value.clone())));
            }
            Value::Null => {}
            other => {
                overflow.insert(key.to_string(), other.clone());
            }
        }
    }
    overflow.extend(loose);

    NormalizedRecord { shape: Some(shape), canonical, overflow }
}
