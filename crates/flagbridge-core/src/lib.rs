//! Context normalization and typed flag evaluation.
//!
//! Everything here is synchronous and free of I/O. An [`AliasTable`] is built once
//! and shared read-only; every other value lives for a single evaluation.

pub mod alias;
pub mod evaluate;
pub mod keys;
pub mod normalize;
pub mod record;
pub mod variant;

pub use alias::{permutations, AliasTable, TARGETING_KEY};
pub use evaluate::{
    resolve_variant, Coerced, ErrorKind, FlagValue, Reason, Resolution, ResolutionDetail,
    ResolutionError,
};
pub use keys::{
    keys_for, occurrence_only_keys, shared_keys, subject_only_keys, CanonicalKey, Membership,
    RecordShape,
};
pub use normalize::{normalize, Attributes, NormalizedRecord};
pub use record::{OccurrenceRecord, ProjectionError, SubjectRecord};
pub use variant::{Payload, Variant, VariantSet, OFF_VARIANT_KEY};
