use std::fmt::{Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

use flagbridge_core::{AliasTable, VariantSet};
use serde::{Deserialize, Serialize};

use crate::cache::VariantCache;
use crate::hooks::{EventNormalizer, SubjectNormalizer};
use crate::tracking::EventSink;

pub const DEFAULT_SERVER_URL: &str = "https://api.lab.amplitude.com";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, thiserror::Error, Eq, PartialEq)]
pub enum ConfigError {
    #[error("deployment key must not be empty")]
    MissingDeploymentKey,
    #[error("local and remote evaluation are mutually exclusive")]
    ConflictingModes,
    #[error("remote server url must not be empty")]
    MissingServerUrl,
}

/// Serializable provider settings, typically read from a YAML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProviderSettings {
    pub deployment_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote: Option<RemoteSettings>,
    pub exposure_tracking: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LocalSettings {
    /// JSON file holding a variant set; read when the provider starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RemoteSettings {
    pub server_url: String,
    pub timeout_ms: u64,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self { server_url: DEFAULT_SERVER_URL.to_string(), timeout_ms: DEFAULT_TIMEOUT_MS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderMode {
    Local(LocalSettings),
    Remote(RemoteSettings),
}

impl ProviderSettings {
    #[must_use]
    pub fn new(deployment_key: impl Into<String>) -> Self {
        Self { deployment_key: deployment_key.into(), ..Self::default() }
    }

    #[must_use]
    pub fn with_local(mut self, local: LocalSettings) -> Self {
        self.local = Some(local);
        self
    }

    #[must_use]
    pub fn with_remote(mut self, remote: RemoteSettings) -> Self {
        self.remote = Some(remote);
        self
    }

    #[must_use]
    pub fn with_exposure_tracking(mut self, enabled: bool) -> Self {
        self.exposure_tracking = enabled;
        self
    }

    /// Validates the settings and picks the evaluation mode.
    ///
    /// Neither mode configured means local evaluation against an empty snapshot.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for an empty deployment key, both modes at once, or
    /// a remote mode without a server url.
    pub fn mode(&self) -> Result<ProviderMode, ConfigError> {
        if self.deployment_key.trim().is_empty() {
            return Err(ConfigError::MissingDeploymentKey);
        }
        match (&self.local, &self.remote) {
            (Some(_), Some(_)) => Err(ConfigError::ConflictingModes),
            (None, Some(remote)) if remote.server_url.trim().is_empty() => {
                Err(ConfigError::MissingServerUrl)
            }
            (None, Some(remote)) => Ok(ProviderMode::Remote(remote.clone())),
            (Some(local), None) => Ok(ProviderMode::Local(local.clone())),
            (None, None) => Ok(ProviderMode::Local(LocalSettings::default())),
        }
    }
}

/// Settings plus the runtime collaborators a provider is assembled from.
#[derive(Clone, Default)]
pub struct ProviderConfig {
    pub settings: ProviderSettings,
    pub aliases: Option<AliasTable>,
    pub snapshot: Option<VariantSet>,
    pub cache: Option<Arc<dyn VariantCache>>,
    pub subject_normalizer: Option<SubjectNormalizer>,
    pub event_normalizer: Option<EventNormalizer>,
    pub event_sink: Option<Arc<dyn EventSink>>,
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("settings", &self.settings)
            .field("custom_aliases", &self.aliases.is_some())
            .field("snapshot_flags", &self.snapshot.as_ref().map(VariantSet::len))
            .field("cache", &self.cache.is_some())
            .field("subject_normalizer", &self.subject_normalizer.is_some())
            .field("event_normalizer", &self.event_normalizer.is_some())
            .field("event_sink", &self.event_sink.is_some())
            .finish()
    }
}

impl ProviderConfig {
    #[must_use]
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings, ..Self::default() }
    }

    #[must_use]
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = Some(aliases);
        self
    }

    /// In-memory variant set served in local mode when no snapshot file is configured.
    #[must_use]
    pub fn with_snapshot(mut self, snapshot: VariantSet) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn VariantCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    #[must_use]
    pub fn with_subject_normalizer(mut self, normalizer: SubjectNormalizer) -> Self {
        self.subject_normalizer = Some(normalizer);
        self
    }

    #[must_use]
    pub fn with_event_normalizer(mut self, normalizer: EventNormalizer) -> Self {
        self.event_normalizer = Some(normalizer);
        self
    }

    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }
}
