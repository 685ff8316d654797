use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// One semantic field of the subject (assignment) or occurrence (analytics) record.
///
/// The serialized form is the exact field name the external services use, which is
/// snake_case for every key except `productId` and `revenueType`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    UserId,
    DeviceId,
    Country,
    Region,
    Dma,
    City,
    Language,
    Platform,
    DeviceManufacturer,
    DeviceBrand,
    DeviceModel,
    Carrier,
    Library,
    UserProperties,
    GroupProperties,
    Groups,
    Version,
    Os,
    CohortIds,
    GroupCohortIds,
    Time,
    InsertId,
    LocationLat,
    LocationLng,
    AppVersion,
    VersionName,
    OsName,
    OsVersion,
    Idfa,
    Idfv,
    Adid,
    AndroidId,
    Ip,
    Price,
    Quantity,
    Revenue,
    Currency,
    #[serde(rename = "productId")]
    ProductId,
    #[serde(rename = "revenueType")]
    RevenueType,
    EventId,
    SessionId,
    PartnerId,
    Plan,
    IngestionMetadata,
    EventProperties,
    EventType,
}

/// Which record shapes accept a canonical key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Membership {
    SubjectOnly,
    OccurrenceOnly,
    Shared,
}

/// The two record shapes handed to external collaborators.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecordShape {
    Subject,
    Occurrence,
}

impl RecordShape {
    /// Canonical key whose contents collect every attribute without a canonical home.
    #[must_use]
    pub fn overflow_key(self) -> CanonicalKey {
        match self {
            Self::Subject => CanonicalKey::UserProperties,
            Self::Occurrence => CanonicalKey::EventProperties,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Occurrence => "occurrence",
        }
    }
}

impl CanonicalKey {
    pub const ALL: [Self; 46] = [
        Self::UserId,
        Self::DeviceId,
        Self::Country,
        Self::Region,
        Self::Dma,
        Self::City,
        Self::Language,
        Self::Platform,
        Self::DeviceManufacturer,
        Self::DeviceBrand,
        Self::DeviceModel,
        Self::Carrier,
        Self::Library,
        Self::UserProperties,
        Self::GroupProperties,
        Self::Groups,
        Self::Version,
        Self::Os,
        Self::CohortIds,
        Self::GroupCohortIds,
        Self::Time,
        Self::InsertId,
        Self::LocationLat,
        Self::LocationLng,
        Self::AppVersion,
        Self::VersionName,
        Self::OsName,
        Self::OsVersion,
        Self::Idfa,
        Self::Idfv,
        Self::Adid,
        Self::AndroidId,
        Self::Ip,
        Self::Price,
        Self::Quantity,
        Self::Revenue,
        Self::Currency,
        Self::ProductId,
        Self::RevenueType,
        Self::EventId,
        Self::SessionId,
        Self::PartnerId,
        Self::Plan,
        Self::IngestionMetadata,
        Self::EventProperties,
        Self::EventType,
    ];

    /// Field name used on the wire by the external record types.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::UserId => "user_id",
            Self::DeviceId => "device_id",
            Self::Country => "country",
            Self::Region => "region",
            Self::Dma => "dma",
            Self::City => "city",
            Self::Language => "language",
            Self::Platform => "platform",
            Self::DeviceManufacturer => "device_manufacturer",
            Self::DeviceBrand => "device_brand",
            Self::DeviceModel => "device_model",
            Self::Carrier => "carrier",
            Self::Library => "library",
            Self::UserProperties => "user_properties",
            Self::GroupProperties => "group_properties",
            Self::Groups => "groups",
            Self::Version => "version",
            Self::Os => "os",
            Self::CohortIds => "cohort_ids",
            Self::GroupCohortIds => "group_cohort_ids",
            Self::Time => "time",
            Self::InsertId => "insert_id",
            Self::LocationLat => "location_lat",
            Self::LocationLng => "location_lng",
            Self::AppVersion => "app_version",
            Self::VersionName => "version_name",
            Self::OsName => "os_name",
            Self::OsVersion => "os_version",
            Self::Idfa => "idfa",
            Self::Idfv => "idfv",
            Self::Adid => "adid",
            Self::AndroidId => "android_id",
            Self::Ip => "ip",
            Self::Price => "price",
            Self::Quantity => "quantity",
            Self::Revenue => "revenue",
            Self::Currency => "currency",
            Self::ProductId => "productId",
            Self::RevenueType => "revenueType",
            Self::EventId => "event_id",
            Self::SessionId => "session_id",
            Self::PartnerId => "partner_id",
            Self::Plan => "plan",
            Self::IngestionMetadata => "ingestion_metadata",
            Self::EventProperties => "event_properties",
            Self::EventType => "event_type",
        }
    }

    /// Underscore-separated spelling that alias generation starts from.
    ///
    /// Equal to [`CanonicalKey::name`] except for `revenueType`, whose external name
    /// breaks the snake_case convention.
    #[must_use]
    pub fn alias_stem(self) -> &'static str {
        match self {
            Self::RevenueType => "revenue_type",
            other => other.name(),
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.name() == value)
    }

    #[must_use]
    pub fn membership(self) -> Membership {
        match self {
            Self::UserId
            | Self::DeviceId
            | Self::Country
            | Self::Region
            | Self::Dma
            | Self::City
            | Self::Language
            | Self::Platform
            | Self::DeviceManufacturer
            | Self::DeviceBrand
            | Self::DeviceModel
            | Self::Carrier
            | Self::Library
            | Self::UserProperties
            | Self::GroupProperties
            | Self::Groups => Membership::Shared,
            Self::Version | Self::Os | Self::CohortIds | Self::GroupCohortIds => {
                Membership::SubjectOnly
            }
            Self::Time
            | Self::InsertId
            | Self::LocationLat
            | Self::LocationLng
            | Self::AppVersion
            | Self::VersionName
            | Self::OsName
            | Self::OsVersion
            | Self::Idfa
            | Self::Idfv
            | Self::Adid
            | Self::AndroidId
            | Self::Ip
            | Self::Price
            | Self::Quantity
            | Self::Revenue
            | Self::Currency
            | Self::ProductId
            | Self::RevenueType
            | Self::EventId
            | Self::SessionId
            | Self::PartnerId
            | Self::Plan
            | Self::IngestionMetadata
            | Self::EventProperties
            | Self::EventType => Membership::OccurrenceOnly,
        }
    }

    #[must_use]
    pub fn accepts(self, shape: RecordShape) -> bool {
        match (self.membership(), shape) {
            (Membership::Shared, _)
            | (Membership::SubjectOnly, RecordShape::Subject)
            | (Membership::OccurrenceOnly, RecordShape::Occurrence) => true,
            (Membership::SubjectOnly, RecordShape::Occurrence)
            | (Membership::OccurrenceOnly, RecordShape::Subject) => false,
        }
    }

    /// Keys that identify who a subject record is about.
    #[must_use]
    pub fn is_identity(self) -> bool {
        matches!(self, Self::UserId | Self::DeviceId)
    }
}

impl Display for CanonicalKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

fn keys_with(membership: Membership) -> Vec<CanonicalKey> {
    CanonicalKey::ALL.into_iter().filter(|key| key.membership() == membership).collect()
}

#[must_use]
pub fn shared_keys() -> Vec<CanonicalKey> {
    keys_with(Membership::Shared)
}

#[must_use]
pub fn subject_only_keys() -> Vec<CanonicalKey> {
    keys_with(Membership::SubjectOnly)
}

#[must_use]
pub fn occurrence_only_keys() -> Vec<CanonicalKey> {
    keys_with(Membership::OccurrenceOnly)
}

/// Every key a record of `shape` accepts, in registry order.
#[must_use]
pub fn keys_for(shape: RecordShape) -> Vec<CanonicalKey> {
    CanonicalKey::ALL.into_iter().filter(|key| key.accepts(shape)).collect()
}
