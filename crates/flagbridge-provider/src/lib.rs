//! OpenFeature-style provider around the flagbridge core.
//!
//! [`Provider`] owns the alias table, the assignment client and the optional
//! cache, hooks and event sink. Evaluation calls never fail; construction and
//! tracking report errors.

pub mod cache;
pub mod client;
pub mod config;
pub mod hooks;
pub mod provider;
pub mod tracking;

pub use cache::{CacheError, InMemoryVariantCache, VariantCache, DEFAULT_CACHE_CAPACITY};
pub use client::{
    AssignmentClient, ClientError, HttpVariantFetcher, RemoteAssignmentClient,
    StaticAssignmentClient, VariantFetcher,
};
pub use config::{
    ConfigError, LocalSettings, ProviderConfig, ProviderMode, ProviderSettings, RemoteSettings,
    DEFAULT_SERVER_URL, DEFAULT_TIMEOUT_MS,
};
pub use hooks::{EventNormalizer, HookError, SubjectNormalizer};
pub use provider::{Provider, ProviderMetadata, ProviderState, PROVIDER_NAME};
pub use tracking::{
    build_occurrence, exposure_event, EventSink, NdjsonEventSink, SinkError, TrackError,
    TrackingDetails, EXPOSURE_EVENT,
};
