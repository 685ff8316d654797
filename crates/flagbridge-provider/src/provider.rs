use std::sync::Arc;

use flagbridge_core::{
    normalize, resolve_variant, AliasTable, Attributes, FlagValue, NormalizedRecord,
    ProjectionError, RecordShape, Resolution, ResolutionDetail, ResolutionError, SubjectRecord,
};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{
    AssignmentClient, ClientError, HttpVariantFetcher, RemoteAssignmentClient,
    StaticAssignmentClient,
};
use crate::config::{ConfigError, ProviderConfig, ProviderMode, ProviderSettings};
use crate::hooks::{EventNormalizer, SubjectNormalizer};
use crate::tracking::{build_occurrence, exposure_event, EventSink, TrackError, TrackingDetails};

pub const PROVIDER_NAME: &str = "flagbridge";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    NotReady,
    Ready,
    Error,
}

impl ProviderState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::Ready => "ready",
            Self::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ProviderMetadata {
    pub name: String,
}

/// Evaluates flags for loosely typed contexts and never fails an evaluation call.
///
/// Every `evaluate_*` method returns the caller's default when anything goes wrong,
/// with the reason and error kind recorded in the returned detail.
pub struct Provider {
    settings: ProviderSettings,
    client: Arc<dyn AssignmentClient>,
    aliases: RwLock<Arc<AliasTable>>,
    state: RwLock<ProviderState>,
    subject_normalizer: Option<SubjectNormalizer>,
    event_normalizer: Option<EventNormalizer>,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl Provider {
    /// Builds a provider whose assignment client follows the configured mode.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the settings are invalid.
    pub fn new(config: ProviderConfig) -> Result<Self, ConfigError> {
        let client: Arc<dyn AssignmentClient> = match config.settings.mode()? {
            ProviderMode::Local(local) => match &local.snapshot_path {
                Some(path) => Arc::new(StaticAssignmentClient::from_path(path)),
                None => Arc::new(StaticAssignmentClient::new(
                    config.snapshot.clone().unwrap_or_default(),
                )),
            },
            ProviderMode::Remote(remote) => {
                let fetcher = HttpVariantFetcher::new(&remote, &config.settings.deployment_key);
                Arc::new(RemoteAssignmentClient::new(Box::new(fetcher), config.cache.clone()))
            }
        };
        Ok(Self::assemble(config, client))
    }

    /// Builds a provider around a caller-supplied assignment client.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when the settings are invalid.
    pub fn with_client(
        config: ProviderConfig,
        client: Arc<dyn AssignmentClient>,
    ) -> Result<Self, ConfigError> {
        config.settings.mode()?;
        Ok(Self::assemble(config, client))
    }

    fn assemble(config: ProviderConfig, client: Arc<dyn AssignmentClient>) -> Self {
        let aliases = config.aliases.unwrap_or_else(AliasTable::builtin);
        Self {
            settings: config.settings,
            client,
            aliases: RwLock::new(Arc::new(aliases)),
            state: RwLock::new(ProviderState::NotReady),
            subject_normalizer: config.subject_normalizer,
            event_normalizer: config.event_normalizer,
            event_sink: config.event_sink,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata { name: PROVIDER_NAME.to_string() }
    }

    #[must_use]
    pub fn state(&self) -> ProviderState {
        *self.state.read()
    }

    #[must_use]
    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Starts the assignment client. A failure leaves the provider in the error state.
    ///
    /// # Errors
    /// Returns the client's [`ClientError`].
    pub fn init(&self) -> Result<(), ClientError> {
        match self.client.start() {
            Ok(()) => {
                *self.state.write() = ProviderState::Ready;
                info!(provider = PROVIDER_NAME, "provider ready");
                Ok(())
            }
            Err(err) => {
                *self.state.write() = ProviderState::Error;
                warn!(provider = PROVIDER_NAME, error = %err, "provider failed to start");
                Err(err)
            }
        }
    }

    /// # Errors
    /// Returns the client's [`ClientError`]; the provider is not ready afterwards either way.
    pub fn shutdown(&self) -> Result<(), ClientError> {
        *self.state.write() = ProviderState::NotReady;
        info!(provider = PROVIDER_NAME, "provider shut down");
        self.client.stop()
    }

    /// Snapshot of the current alias table.
    #[must_use]
    pub fn alias_table(&self) -> Arc<AliasTable> {
        Arc::clone(&self.aliases.read())
    }

    /// Publishes a fully built alias table; evaluations already running keep the old one.
    pub fn replace_alias_table(&self, aliases: AliasTable) {
        *self.aliases.write() = Arc::new(aliases);
        debug!("alias table replaced");
    }

    /// Routes `context` into subject-shaped canonical fields and overflow.
    #[must_use]
    pub fn normalize(&self, context: &Attributes) -> NormalizedRecord {
        normalize(context, &self.alias_table(), RecordShape::Subject)
    }

    /// # Errors
    /// Returns [`ProjectionError`] when the context has no identity or a mistyped field.
    pub fn subject_record(&self, context: &Attributes) -> Result<SubjectRecord, ProjectionError> {
        SubjectRecord::project(&self.normalize(context))
    }

    #[must_use]
    pub fn evaluate_boolean(
        &self,
        flag: &str,
        default: bool,
        context: &Attributes,
    ) -> ResolutionDetail<bool> {
        self.evaluate(flag, default, context)
    }

    #[must_use]
    pub fn evaluate_string(
        &self,
        flag: &str,
        default: String,
        context: &Attributes,
    ) -> ResolutionDetail<String> {
        self.evaluate(flag, default, context)
    }

    #[must_use]
    pub fn evaluate_integer(
        &self,
        flag: &str,
        default: i64,
        context: &Attributes,
    ) -> ResolutionDetail<i64> {
        self.evaluate(flag, default, context)
    }

    #[must_use]
    pub fn evaluate_float(
        &self,
        flag: &str,
        default: f64,
        context: &Attributes,
    ) -> ResolutionDetail<f64> {
        self.evaluate(flag, default, context)
    }

    #[must_use]
    pub fn evaluate_object(
        &self,
        flag: &str,
        default: Value,
        context: &Attributes,
    ) -> ResolutionDetail<Value> {
        self.evaluate(flag, default, context)
    }

    /// Typed evaluation shared by every `evaluate_*` method.
    #[must_use]
    pub fn evaluate<T: FlagValue>(
        &self,
        flag: &str,
        default: T,
        context: &Attributes,
    ) -> ResolutionDetail<T> {
        let resolution = self.resolve(flag, default, context);
        match &resolution {
            Resolution::DefaultedOnError { error, .. } => debug!(
                flag,
                flag_type = T::TYPE_NAME,
                kind = %error.kind,
                error = %error.message,
                "flag defaulted on error"
            ),
            other => debug!(
                flag,
                flag_type = T::TYPE_NAME,
                reason = other.reason().as_str(),
                variant = ?other.variant(),
                "flag evaluated"
            ),
        }
        resolution.into_detail()
    }

    fn resolve<T: FlagValue>(&self, flag: &str, default: T, context: &Attributes) -> Resolution<T> {
        match self.state() {
            ProviderState::Ready => {}
            ProviderState::NotReady => {
                return Resolution::error(default, ResolutionError::provider_not_ready());
            }
            ProviderState::Error => {
                return Resolution::error(
                    default,
                    ResolutionError::general("provider is in an error state"),
                );
            }
        }

        let subject = match self.prepare_subject(context) {
            Ok(subject) => subject,
            Err(err) => return Resolution::error(default, err),
        };

        let variants = match self.client.evaluate_flags(&subject, &[flag.to_string()]) {
            Ok(variants) => variants,
            Err(err) => return Resolution::error(default, ResolutionError::general(err.to_string())),
        };

        let resolution = resolve_variant(flag, default, variants.get(flag));
        if let Resolution::Resolved { variant, .. } = &resolution {
            self.record_exposure(flag, variant, &subject);
        }
        resolution
    }

    fn prepare_subject(&self, context: &Attributes) -> Result<SubjectRecord, ResolutionError> {
        let subject = self
            .subject_record(context)
            .map_err(|err| ResolutionError::invalid_context(err.to_string()))?;
        match &self.subject_normalizer {
            Some(normalizer) => {
                normalizer(subject).map_err(|err| ResolutionError::invalid_context(err.to_string()))
            }
            None => Ok(subject),
        }
    }

    fn record_exposure(&self, flag: &str, variant: &str, subject: &SubjectRecord) {
        if !self.settings.exposure_tracking {
            return;
        }
        let Some(sink) = &self.event_sink else {
            return;
        };
        if let Err(err) = sink.send(&exposure_event(flag, variant, subject)) {
            warn!(flag, error = %err, "exposure event was not delivered");
        }
    }

    /// Sends an analytics event built from `context` and `details`.
    ///
    /// The record is built and validated even when no sink is configured.
    ///
    /// # Errors
    /// Returns [`TrackError`] when the record cannot be projected, a hook rejects it,
    /// it fails validation, or the sink fails.
    pub fn track(
        &self,
        event_name: &str,
        context: &Attributes,
        details: &TrackingDetails,
    ) -> Result<(), TrackError> {
        let mut record = build_occurrence(event_name, context, details, &self.alias_table())?;
        if let Some(normalizer) = &self.event_normalizer {
            record = normalizer(record)?;
        }
        record.validate()?;

        match &self.event_sink {
            Some(sink) => {
                sink.send(&record)?;
                debug!(event = event_name, "event tracked");
            }
            None => debug!(event = event_name, "no event sink configured; event dropped"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use flagbridge_core::{ErrorKind, OccurrenceRecord, Reason, Variant, VariantSet};
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;
    use crate::hooks::HookError;
    use crate::tracking::{SinkError, EXPOSURE_EVENT};

    struct RecordingClient {
        variants: VariantSet,
        fail_start: bool,
        fail_evaluate: bool,
        calls: Mutex<Vec<(SubjectRecord, Vec<String>)>>,
    }

    impl RecordingClient {
        fn new(variants: VariantSet) -> Arc<Self> {
            Arc::new(Self {
                variants,
                fail_start: false,
                fail_evaluate: false,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl AssignmentClient for RecordingClient {
        fn start(&self) -> Result<(), ClientError> {
            if self.fail_start {
                Err(ClientError::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        fn stop(&self) -> Result<(), ClientError> {
            Ok(())
        }

        fn evaluate_flags(
            &self,
            subject: &SubjectRecord,
            flag_keys: &[String],
        ) -> Result<VariantSet, ClientError> {
            self.calls.lock().push((subject.clone(), flag_keys.to_vec()));
            if self.fail_evaluate {
                return Err(ClientError::Status(500));
            }
            Ok(self.variants.clone())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<OccurrenceRecord>>,
        fail: bool,
    }

    impl EventSink for RecordingSink {
        fn send(&self, event: &OccurrenceRecord) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Io("disk full".to_string()));
            }
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            other => panic!("fixture must be a JSON object, got {other}"),
        }
    }

    fn variants() -> VariantSet {
        VariantSet::from([
            ("enabled".to_string(), Variant::new("on").with_payload(json!(true))),
            ("limit".to_string(), Variant::new("v").with_payload(json!("456"))),
            ("banner".to_string(), Variant::off()),
            ("theme".to_string(), Variant::new("dark").with_payload(json!({"bg": "#000"}))),
        ])
    }

    fn ready(config: ProviderConfig, client: Arc<RecordingClient>) -> Provider {
        let provider = match Provider::with_client(config, client) {
            Ok(provider) => provider,
            Err(err) => panic!("provider should build: {err}"),
        };
        if let Err(err) = provider.init() {
            panic!("provider should start: {err}");
        }
        provider
    }

    fn config() -> ProviderConfig {
        ProviderConfig::new(ProviderSettings::new("test-key"))
    }

    #[test]
    fn targeting_key_context_resolves_boolean_flag() {
        let client = RecordingClient::new(variants());
        let provider = ready(config(), Arc::clone(&client));

        let detail =
            provider.evaluate_boolean("enabled", false, &attrs(json!({"targeting_key": "user-1"})));
        assert!(detail.value);
        assert_eq!(detail.variant.as_deref(), Some("on"));
        assert_eq!(detail.reason, Reason::Resolved);
        assert_eq!(detail.error_kind, None);

        let calls = client.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.user_id.as_deref(), Some("user-1"));
        assert_eq!(calls[0].1, vec!["enabled".to_string()]);
    }

    #[test]
    fn typed_evaluations_follow_coercion_rules() {
        let provider = ready(config(), RecordingClient::new(variants()));
        let context = attrs(json!({"userId": "u"}));

        let limit = provider.evaluate_integer("limit", 0, &context);
        assert_eq!((limit.value, limit.reason), (456, Reason::Resolved));

        let banner = provider.evaluate_string("banner", "x".to_string(), &context);
        assert_eq!(banner.value, "x");
        assert_eq!(banner.reason, Reason::Default);
        assert_eq!(banner.variant, None);

        let theme = provider.evaluate_object("theme", json!({}), &context);
        assert_eq!(theme.value, json!({"bg": "#000"}));

        let ratio = provider.evaluate_float("limit", 0.0, &context);
        assert!((ratio.value - 456.0).abs() < f64::EPSILON);

        let mismatch = provider.evaluate_string("enabled", "d".to_string(), &context);
        assert_eq!(mismatch.error_kind, Some(ErrorKind::TypeMismatch));
    }

    #[test]
    fn empty_context_is_invalid() {
        let client = RecordingClient::new(variants());
        let provider = ready(config(), Arc::clone(&client));
        let detail = provider.evaluate_integer("limit", 9, &Attributes::new());
        assert_eq!(detail.value, 9);
        assert_eq!(detail.variant, None);
        assert_eq!(detail.reason, Reason::Error);
        assert_eq!(detail.error_kind, Some(ErrorKind::InvalidContext));
        assert!(client.calls.lock().is_empty());
    }

    #[test]
    fn evaluation_before_init_is_not_ready() {
        let provider = match Provider::with_client(config(), RecordingClient::new(variants())) {
            Ok(provider) => provider,
            Err(err) => panic!("provider should build: {err}"),
        };
        assert_eq!(provider.state(), ProviderState::NotReady);
        let detail = provider.evaluate_boolean("enabled", false, &attrs(json!({"user_id": "u"})));
        assert!(!detail.value);
        assert_eq!(detail.error_kind, Some(ErrorKind::ProviderNotReady));
    }

    #[test]
    fn failed_start_moves_to_error_state() {
        let client = Arc::new(RecordingClient {
            variants: variants(),
            fail_start: true,
            fail_evaluate: false,
            calls: Mutex::new(Vec::new()),
        });
        let provider = match Provider::with_client(config(), client) {
            Ok(provider) => provider,
            Err(err) => panic!("provider should build: {err}"),
        };
        assert!(provider.init().is_err());
        assert_eq!(provider.state(), ProviderState::Error);
        let detail = provider.evaluate_boolean("enabled", true, &attrs(json!({"user_id": "u"})));
        assert!(detail.value);
        assert_eq!(detail.error_kind, Some(ErrorKind::General));
    }

    #[test]
    fn shutdown_returns_to_not_ready() {
        let provider = ready(config(), RecordingClient::new(variants()));
        assert_eq!(provider.state(), ProviderState::Ready);
        assert!(provider.shutdown().is_ok());
        assert_eq!(provider.state(), ProviderState::NotReady);
    }

    #[test]
    fn missing_flag_and_client_errors_are_reported() {
        let provider = ready(config(), RecordingClient::new(variants()));
        let context = attrs(json!({"device_id": "d"}));
        let missing = provider.evaluate_boolean("unknown", true, &context);
        assert_eq!(missing.error_kind, Some(ErrorKind::FlagNotFound));

        let failing = Arc::new(RecordingClient {
            variants: variants(),
            fail_start: false,
            fail_evaluate: true,
            calls: Mutex::new(Vec::new()),
        });
        let provider = ready(config(), failing);
        let detail = provider.evaluate_float("limit", 1.5, &context);
        assert_eq!(detail.error_kind, Some(ErrorKind::General));
        assert!((detail.value - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn subject_normalizer_can_rewrite_or_reject() {
        let client = RecordingClient::new(variants());
        let normalizer: SubjectNormalizer = Arc::new(|mut subject: SubjectRecord| {
            if subject.user_id.as_deref() == Some("blocked") {
                return Err(HookError::new("blocked subject"));
            }
            subject.platform = Some("server".to_string());
            Ok(subject)
        });
        let provider =
            ready(config().with_subject_normalizer(normalizer), Arc::clone(&client));

        let ok = provider.evaluate_boolean("enabled", false, &attrs(json!({"user_id": "u"})));
        assert_eq!(ok.reason, Reason::Resolved);
        assert_eq!(client.calls.lock()[0].0.platform.as_deref(), Some("server"));

        let rejected =
            provider.evaluate_boolean("enabled", false, &attrs(json!({"user_id": "blocked"})));
        assert_eq!(rejected.error_kind, Some(ErrorKind::InvalidContext));
    }

    #[test]
    fn resolved_evaluations_emit_exposure_events() {
        let sink = Arc::new(RecordingSink::default());
        let settings = ProviderSettings::new("test-key").with_exposure_tracking(true);
        let provider = ready(
            ProviderConfig::new(settings).with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>),
            RecordingClient::new(variants()),
        );
        let context = attrs(json!({"user_id": "u"}));

        let _ = provider.evaluate_boolean("enabled", false, &context);
        let _ = provider.evaluate_boolean("banner", false, &context);

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some(EXPOSURE_EVENT));
        assert_eq!(events[0].event_properties.get("flag_key"), Some(&json!("enabled")));
        assert_eq!(events[0].event_properties.get("variant"), Some(&json!("on")));
    }

    #[test]
    fn exposure_sink_failures_do_not_change_the_result() {
        let sink = Arc::new(RecordingSink { events: Mutex::new(Vec::new()), fail: true });
        let settings = ProviderSettings::new("test-key").with_exposure_tracking(true);
        let provider = ready(
            ProviderConfig::new(settings).with_event_sink(sink),
            RecordingClient::new(variants()),
        );
        let detail = provider.evaluate_boolean("enabled", false, &attrs(json!({"user_id": "u"})));
        assert_eq!(detail.reason, Reason::Resolved);
    }

    #[test]
    fn track_normalizes_and_delivers_events() -> anyhow::Result<()> {
        let sink = Arc::new(RecordingSink::default());
        let event_normalizer: EventNormalizer = Arc::new(|mut event: OccurrenceRecord| {
            event.platform = Some("backend".to_string());
            Ok(event)
        });
        let provider = ready(
            config()
                .with_event_sink(Arc::clone(&sink) as Arc<dyn EventSink>)
                .with_event_normalizer(event_normalizer),
            RecordingClient::new(variants()),
        );

        provider.track(
            "checkout",
            &attrs(json!({"targetingKey": "buyer", "plan": {"tier": "pro"}})),
            &TrackingDetails::default().with_value(20.0),
        )?;

        let events = sink.events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type.as_deref(), Some("checkout"));
        assert_eq!(events[0].user_id.as_deref(), Some("buyer"));
        assert_eq!(events[0].revenue, Some(20.0));
        assert_eq!(events[0].platform.as_deref(), Some("backend"));
        assert_eq!(events[0].plan.get("tier"), Some(&json!("pro")));
        Ok(())
    }

    #[test]
    fn track_without_identity_fails() {
        let provider = ready(config(), RecordingClient::new(variants()));
        let result = provider.track("checkout", &Attributes::new(), &TrackingDetails::default());
        assert_eq!(result, Err(TrackError::Projection(ProjectionError::MissingIdentity)));
    }

    #[test]
    fn replaced_alias_table_is_used_for_later_evaluations() {
        let client = RecordingClient::new(variants());
        let provider = ready(config(), Arc::clone(&client));
        let context = attrs(json!({"account": "acct-1"}));

        assert_eq!(
            provider.evaluate_boolean("enabled", false, &context).error_kind,
            Some(ErrorKind::InvalidContext)
        );
        provider.replace_alias_table(
            AliasTable::builtin().with_alias("account", flagbridge_core::CanonicalKey::UserId),
        );
        let detail = provider.evaluate_boolean("enabled", false, &context);
        assert_eq!(detail.reason, Reason::Resolved);
        assert_eq!(client.calls.lock()[0].0.user_id.as_deref(), Some("acct-1"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn provider_can_be_shared_between_threads() {
        assert_send_sync::<Provider>();
        assert_send_sync::<Arc<Provider>>();
    }

    #[test]
    fn concurrent_evaluations_observe_one_whole_alias_table() {
        let provider = Arc::new(ready(config(), RecordingClient::new(variants())));
        let context = attrs(json!({"account_id": "acct-1", "Country": "NZ"}));
        let swapped = AliasTable::builtin()
            .with_permutations("account_id", flagbridge_core::CanonicalKey::UserId);

        let details = std::thread::scope(|scope| {
            let evaluators = (0..4)
                .map(|_| {
                    let provider = Arc::clone(&provider);
                    let context = &context;
                    scope.spawn(move || {
                        (0..250)
                            .map(|_| provider.evaluate_boolean("enabled", false, context))
                            .collect::<Vec<_>>()
                    })
                })
                .collect::<Vec<_>>();
            let publisher = Arc::clone(&provider);
            scope.spawn(move || publisher.replace_alias_table(swapped));

            evaluators
                .into_iter()
                .flat_map(|evaluator| match evaluator.join() {
                    Ok(details) => details,
                    Err(_) => panic!("evaluator thread panicked"),
                })
                .collect::<Vec<_>>()
        });

        assert_eq!(details.len(), 1000);
        for detail in details {
            match detail.reason {
                Reason::Resolved => {
                    assert!(detail.value);
                    assert_eq!(detail.variant.as_deref(), Some("on"));
                    assert_eq!(detail.error_kind, None);
                }
                Reason::Error => {
                    assert!(!detail.value);
                    assert_eq!(detail.error_kind, Some(ErrorKind::InvalidContext));
                }
                Reason::Default => panic!("unexpected intentional default: {detail:?}"),
            }
        }
        let after = provider.evaluate_boolean("enabled", false, &context);
        assert_eq!(after.reason, Reason::Resolved);
    }

    #[test]
    fn construction_rejects_invalid_settings() {
        let conflicting = ProviderSettings::new("key")
            .with_local(crate::config::LocalSettings::default())
            .with_remote(crate::config::RemoteSettings::default());
        assert!(matches!(
            Provider::new(ProviderConfig::new(conflicting)),
            Err(ConfigError::ConflictingModes)
        ));
        assert!(matches!(
            Provider::new(ProviderConfig::new(ProviderSettings::new(""))),
            Err(ConfigError::MissingDeploymentKey)
        ));
    }

    #[test]
    fn local_mode_serves_the_in_memory_snapshot() {
        let provider = match Provider::new(config().with_snapshot(variants())) {
            Ok(provider) => provider,
            Err(err) => panic!("provider should build: {err}"),
        };
        assert!(provider.init().is_ok());
        assert_eq!(provider.metadata().name, PROVIDER_NAME);
        let detail = provider.evaluate_integer("limit", 0, &attrs(json!({"user_id": "u"})));
        assert_eq!(detail.value, 456);
    }
}
