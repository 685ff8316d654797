use std::collections::HashMap;

use crate::keys::CanonicalKey;

/// OpenFeature's reserved attribute name for the evaluation subject.
pub const TARGETING_KEY: &str = "targetingKey";

/// Underscore form of [`TARGETING_KEY`] used to generate its aliases.
const TARGETING_KEY_STEM: &str = "targeting_key";

/// Every spelling a caller might reasonably use for an underscore-separated name.
///
/// The sequence may contain duplicates; callers registering the result in a map
/// get deduplication for free.
#[must_use]
pub fn permutations(value: &str) -> Vec<String> {
    let mut result = Vec::with_capacity(11);
    result.push(value.to_string());
    result.push(value.to_lowercase());
    result.push(value.to_uppercase());

    let camel = replace_word_breaks(value, |next| next.to_uppercase().collect());
    result.push(capitalize(&camel));
    if value.contains('_') {
        result.push(camel);
        result.push(replace_word_breaks(value, |next| {
            let mut replaced = String::from("-");
            replaced.extend(next.to_lowercase());
            replaced
        }));
    }

    // Both suffix handlers use the all-caps `ID` spelling; the `Id`/`Ids` spellings
    // come out of the camelCase pass above.
    if let Some(stem) = value.strip_suffix("_ids") {
        result.push(format!("{stem}IDs"));
        result.push(format!("{stem}-ids").to_lowercase());
        result.push(format!("{stem}ids").to_lowercase());
    }
    if let Some(stem) = value.strip_suffix("_id") {
        result.push(format!("{stem}ID"));
        result.push(format!("{stem}-id").to_lowercase());
        result.push(format!("{stem}id").to_lowercase());
    }

    result
}

/// Upper-cases the first character: `country` becomes `Country`, `userId` becomes `UserId`.
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rewrites every `_x` pair, scanning left to right without overlap.
/// A trailing `_` with nothing after it is kept as is.
fn replace_word_breaks(value: &str, replace: impl Fn(char) -> String) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '_' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some(next) => out.push_str(&replace(next)),
            None => out.push(ch),
        }
    }
    out
}

/// Read-only lookup from input spelling to canonical key.
///
/// Build it once with [`AliasTable::builtin`] (or from scratch with
/// [`AliasTable::empty`]) and share it; lookups are exact and case-sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: HashMap<String, CanonicalKey>,
}

impl AliasTable {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The default table: every permutation of every canonical key, plus the
    /// targeting key and its permutations mapped to `user_id`.
    ///
    /// Collisions are resolved by build order (last write wins).
    #[must_use]
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        for key in CanonicalKey::ALL {
            table.register_permutations(key.alias_stem(), key);
        }
        table.register_permutations(TARGETING_KEY_STEM, CanonicalKey::UserId);
        table.entries.insert(TARGETING_KEY.to_string(), CanonicalKey::UserId);
        table
    }

    fn register_permutations(&mut self, stem: &str, key: CanonicalKey) {
        for alias in permutations(stem) {
            self.entries.insert(alias, key);
        }
    }

    /// Adds (or overrides) a single alias.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>, key: CanonicalKey) -> Self {
        self.entries.insert(alias.into(), key);
        self
    }

    /// Adds every generated spelling of `stem` for `key`.
    #[must_use]
    pub fn with_permutations(mut self, stem: &str, key: CanonicalKey) -> Self {
        self.register_permutations(stem, key);
        self
    }

    #[must_use]
    pub fn resolve(&self, alias: &str) -> Option<CanonicalKey> {
        self.entries.get(alias).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted aliases currently registered for `key`.
    #[must_use]
    pub fn aliases_for(&self, key: CanonicalKey) -> Vec<&str> {
        let mut aliases = self
            .entries
            .iter()
            .filter(|(_, resolved)| **resolved == key)
            .map(|(alias, _)| alias.as_str())
            .collect::<Vec<_>>();
        aliases.sort_unstable();
        aliases
    }

}
