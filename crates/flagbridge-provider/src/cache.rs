use std::num::NonZeroUsize;

use flagbridge_core::VariantSet;
use lru::LruCache;
use parking_lot::Mutex;

/// Subjects kept by [`InMemoryVariantCache::new`].
pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
}

/// Variant sets keyed by the content digest of the subject they were fetched for.
///
/// Callers treat every error as a miss.
pub trait VariantCache: Send + Sync {
    /// # Errors
    /// Returns [`CacheError`] when the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<VariantSet>, CacheError>;

    /// # Errors
    /// Returns [`CacheError`] when the backend cannot be written.
    fn set(&self, key: &str, variants: &VariantSet) -> Result<(), CacheError>;
}

/// Bounded least-recently-used cache; a full cache evicts the subject read or
/// written longest ago.
#[derive(Debug)]
pub struct InMemoryVariantCache {
    entries: Mutex<LruCache<String, VariantSet>>,
}

impl Default for InMemoryVariantCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl InMemoryVariantCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.lock().cap().get()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl VariantCache for InMemoryVariantCache {
    fn get(&self, key: &str) -> Result<Option<VariantSet>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, variants: &VariantSet) -> Result<(), CacheError> {
        self.entries.lock().put(key.to_string(), variants.clone());
        Ok(())
    }
}
