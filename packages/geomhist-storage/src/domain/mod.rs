//! Storage Domain Layer
//!
//! Port/Adapter pattern for storage backend abstraction

pub mod models;
pub mod ports;

pub use models::{
    BoundingBox, ChangesetId, ChangesetRecord, FeatureId, FeatureKind, FeatureVersion, ParseKindError,
    Timestamp,
};
pub use ports::{
    integrity_warnings, AppendOutcome, ChangesetStore, IntegrityWarning, StoreStats, VersionHead, VersionStore,
};
