use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flagbridge_core::{SubjectRecord, VariantSet};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::cache::VariantCache;
use crate::config::RemoteSettings;

const VARDATA_PATH: &str = "/sdk/v2/vardata?v=0";

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ClientError {
    #[error("assignment client has not been started")]
    NotStarted,
    #[error("failed to load variant snapshot {path}: {reason}")]
    Snapshot { path: String, reason: String },
    #[error("assignment request failed: {0}")]
    Transport(String),
    #[error("assignment service returned HTTP {0}")]
    Status(u16),
    #[error("assignment response could not be decoded: {0}")]
    Decode(String),
}

/// The assignment service as seen by the provider.
pub trait AssignmentClient: Send + Sync {
    /// # Errors
    /// Returns [`ClientError`] when the client cannot become ready.
    fn start(&self) -> Result<(), ClientError>;

    /// # Errors
    /// Returns [`ClientError`] when shutdown fails.
    fn stop(&self) -> Result<(), ClientError>;

    /// Variants for `flag_keys`, or for every flag when `flag_keys` is empty.
    ///
    /// # Errors
    /// Returns [`ClientError`] on transport, service or decoding failures.
    fn evaluate_flags(
        &self,
        subject: &SubjectRecord,
        flag_keys: &[String],
    ) -> Result<VariantSet, ClientError>;
}

fn select(variants: VariantSet, flag_keys: &[String]) -> VariantSet {
    if flag_keys.is_empty() {
        return variants;
    }
    variants.into_iter().filter(|(flag, _)| flag_keys.contains(flag)).collect()
}

/// Local mode: serves a fixed variant set, from memory or a JSON snapshot file.
///
/// Every subject receives the same assignments.
#[derive(Debug)]
pub struct StaticAssignmentClient {
    snapshot_path: Option<PathBuf>,
    initial: VariantSet,
    loaded: RwLock<Option<VariantSet>>,
}

impl StaticAssignmentClient {
    #[must_use]
    pub fn new(variants: VariantSet) -> Self {
        Self { snapshot_path: None, initial: variants, loaded: RwLock::new(None) }
    }

    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(path.into()),
            initial: VariantSet::new(),
            loaded: RwLock::new(None),
        }
    }

    fn read_snapshot(path: &Path) -> Result<VariantSet, ClientError> {
        let snapshot_error = |reason: String| ClientError::Snapshot {
            path: path.display().to_string(),
            reason,
        };
        let raw = std::fs::read_to_string(path).map_err(|err| snapshot_error(err.to_string()))?;
        serde_json::from_str(&raw).map_err(|err| snapshot_error(err.to_string()))
    }
}

impl AssignmentClient for StaticAssignmentClient {
    fn start(&self) -> Result<(), ClientError> {
        let variants = match &self.snapshot_path {
            Some(path) => Self::read_snapshot(path)?,
            None => self.initial.clone(),
        };
        debug!(flags = variants.len(), "variant snapshot loaded");
        *self.loaded.write() = Some(variants);
        Ok(())
    }

    fn stop(&self) -> Result<(), ClientError> {
        *self.loaded.write() = None;
        Ok(())
    }

    fn evaluate_flags(
        &self,
        _subject: &SubjectRecord,
        flag_keys: &[String],
    ) -> Result<VariantSet, ClientError> {
        let loaded = self.loaded.read();
        let variants = loaded.as_ref().ok_or(ClientError::NotStarted)?;
        Ok(select(variants.clone(), flag_keys))
    }
}

/// One round trip to the remote assignment service.
pub trait VariantFetcher: Send + Sync {
    /// # Errors
    /// Returns [`ClientError`] on transport, service or decoding failures.
    fn fetch(&self, subject: &SubjectRecord) -> Result<VariantSet, ClientError>;
}

/// Blocking HTTP fetcher for `POST {server_url}/sdk/v2/vardata`.
#[derive(Debug)]
pub struct HttpVariantFetcher {
    agent: ureq::Agent,
    url: String,
    authorization: String,
}

impl HttpVariantFetcher {
    #[must_use]
    pub fn new(remote: &RemoteSettings, deployment_key: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_millis(remote.timeout_ms))
            .build();
        Self {
            agent,
            url: format!("{}{VARDATA_PATH}", remote.server_url.trim_end_matches('/')),
            authorization: format!("Api-Key {deployment_key}"),
        }
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl VariantFetcher for HttpVariantFetcher {
    fn fetch(&self, subject: &SubjectRecord) -> Result<VariantSet, ClientError> {
        let response = self
            .agent
            .post(&self.url)
            .set("Authorization", &self.authorization)
            .set("Content-Type", "application/json")
            .send_json(subject)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => ClientError::Status(code),
                ureq::Error::Transport(transport) => ClientError::Transport(transport.to_string()),
            })?;
        response.into_json::<VariantSet>().map_err(|err| ClientError::Decode(err.to_string()))
    }
}

/// Remote mode: fetches every flag for the subject, optionally through a cache.
///
/// Cache failures are logged and fall through to a live fetch.
pub struct RemoteAssignmentClient {
    fetcher: Box<dyn VariantFetcher>,
    cache: Option<Arc<dyn VariantCache>>,
}

impl RemoteAssignmentClient {
    #[must_use]
    pub fn new(fetcher: Box<dyn VariantFetcher>, cache: Option<Arc<dyn VariantCache>>) -> Self {
        Self { fetcher, cache }
    }

    fn fetch_through_cache(&self, subject: &SubjectRecord) -> Result<VariantSet, ClientError> {
        let Some(cache) = self.cache.as_deref() else {
            return self.fetcher.fetch(subject);
        };
        let digest = match subject.content_digest() {
            Ok(digest) => digest,
            Err(err) => {
                warn!(error = %err, "subject digest failed; bypassing variant cache");
                return self.fetcher.fetch(subject);
            }
        };

        if let Some(variants) = cached(cache, &digest) {
            debug!(digest = %digest, "variant cache hit");
            return Ok(variants);
        }

        let variants = self.fetcher.fetch(subject)?;
        if let Err(err) = cache.set(&digest, &variants) {
            warn!(error = %err, "variant cache write failed");
        }
        Ok(variants)
    }
}

fn cached(cache: &dyn VariantCache, digest: &str) -> Option<VariantSet> {
    match cache.get(digest) {
        Ok(hit) => hit,
        Err(err) => {
            warn!(error = %err, "variant cache read failed; fetching live");
            None
        }
    }
}

impl AssignmentClient for RemoteAssignmentClient {
    fn start(&self) -> Result<(), ClientError> {
        Ok(())
    }

    fn stop(&self) -> Result<(), ClientError> {
        Ok(())
    }

    fn evaluate_flags(
        &self,
        subject: &SubjectRecord,
        flag_keys: &[String],
    ) -> Result<VariantSet, ClientError> {
        Ok(select(self.fetch_through_cache(subject)?, flag_keys))
    }
}

#[cfg(test)]
mod tests {
    use flagbridge_core::Variant;
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::cache::{CacheError, InMemoryVariantCache};

    fn subject(user_id: &str) -> SubjectRecord {
        SubjectRecord { user_id: Some(user_id.to_string()), ..SubjectRecord::default() }
    }

    fn variants() -> VariantSet {
        VariantSet::from([
            ("checkout".to_string(), Variant::new("on").with_payload(json!(true))),
            ("banner".to_string(), Variant::off()),
        ])
    }

    struct CountingFetcher {
        calls: Mutex<usize>,
        result: Result<VariantSet, ClientError>,
    }

    impl CountingFetcher {
        fn new(result: Result<VariantSet, ClientError>) -> Self {
            Self { calls: Mutex::new(0), result }
        }
    }

    impl VariantFetcher for Arc<CountingFetcher> {
        fn fetch(&self, _subject: &SubjectRecord) -> Result<VariantSet, ClientError> {
            *self.calls.lock() += 1;
            self.result.clone()
        }
    }

    struct BrokenCache;

    impl VariantCache for BrokenCache {
        fn get(&self, _key: &str) -> Result<Option<VariantSet>, CacheError> {
            Err(CacheError::Backend("read refused".to_string()))
        }

        fn set(&self, _key: &str, _variants: &VariantSet) -> Result<(), CacheError> {
            Err(CacheError::Backend("write refused".to_string()))
        }
    }

    #[test]
    fn static_client_requires_start() {
        let client = StaticAssignmentClient::new(variants());
        assert_eq!(client.evaluate_flags(&subject("u"), &[]), Err(ClientError::NotStarted));
        assert_eq!(client.start(), Ok(()));
        assert_eq!(client.evaluate_flags(&subject("u"), &[]), Ok(variants()));
        assert_eq!(client.stop(), Ok(()));
        assert_eq!(client.evaluate_flags(&subject("u"), &[]), Err(ClientError::NotStarted));
    }

    #[test]
    fn static_client_filters_requested_flags() {
        let client = StaticAssignmentClient::new(variants());
        assert_eq!(client.start(), Ok(()));
        let selected = match client.evaluate_flags(&subject("u"), &["checkout".to_string()]) {
            Ok(selected) => selected,
            Err(err) => panic!("static evaluation should succeed: {err}"),
        };
        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["checkout"]);
    }

    #[test]
    fn static_client_reports_unreadable_snapshot() {
        let client = StaticAssignmentClient::from_path("/nonexistent/flagbridge/snapshot.json");
        assert!(matches!(client.start(), Err(ClientError::Snapshot { .. })));
    }

    #[test]
    fn static_client_loads_snapshot_file() -> anyhow::Result<()> {
        let path = std::env::temp_dir()
            .join(format!("flagbridge-snapshot-{}.json", ulid::Ulid::new()));
        std::fs::write(&path, serde_json::to_string(&variants())?)?;
        let client = StaticAssignmentClient::from_path(&path);
        assert_eq!(client.start(), Ok(()));
        assert_eq!(client.evaluate_flags(&subject("u"), &[]), Ok(variants()));
        std::fs::remove_file(path)?;
        Ok(())
    }

    #[test]
    fn remote_client_serves_repeat_subjects_from_cache() {
        let fetcher = Arc::new(CountingFetcher::new(Ok(variants())));
        let cache = Arc::new(InMemoryVariantCache::new());
        let client = RemoteAssignmentClient::new(Box::new(Arc::clone(&fetcher)), Some(cache.clone()));

        for _ in 0..3 {
            assert_eq!(client.evaluate_flags(&subject("u"), &[]), Ok(variants()));
        }
        assert_eq!(*fetcher.calls.lock(), 1);
        assert_eq!(cache.len(), 1);

        assert!(client.evaluate_flags(&subject("other"), &[]).is_ok());
        assert_eq!(*fetcher.calls.lock(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn cache_errors_fall_through_to_live_fetch() {
        let fetcher = Arc::new(CountingFetcher::new(Ok(variants())));
        let client =
            RemoteAssignmentClient::new(Box::new(Arc::clone(&fetcher)), Some(Arc::new(BrokenCache)));
        assert_eq!(client.evaluate_flags(&subject("u"), &[]), Ok(variants()));
        assert_eq!(client.evaluate_flags(&subject("u"), &[]), Ok(variants()));
        assert_eq!(*fetcher.calls.lock(), 2);
    }

    #[test]
    fn fetch_errors_propagate_without_retry() {
        let fetcher = Arc::new(CountingFetcher::new(Err(ClientError::Status(503))));
        let client = RemoteAssignmentClient::new(Box::new(Arc::clone(&fetcher)), None);
        assert_eq!(client.evaluate_flags(&subject("u"), &[]), Err(ClientError::Status(503)));
        assert_eq!(*fetcher.calls.lock(), 1);
    }

    #[test]
    fn http_fetcher_targets_the_vardata_endpoint() {
        let remote = RemoteSettings {
            server_url: "https://flags.example.test/".to_string(),
            timeout_ms: 250,
        };
        let fetcher = HttpVariantFetcher::new(&remote, "server-key");
        assert_eq!(fetcher.url(), "https://flags.example.test/sdk/v2/vardata?v=0");
    }
}
