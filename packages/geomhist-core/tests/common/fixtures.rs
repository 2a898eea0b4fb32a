//! Version and timestamp fixtures

use chrono::{TimeZone, Utc};
use geomhist_core::storage::{FeatureId, FeatureKind, FeatureVersion, InMemoryVersionStore, Timestamp};

/// Seconds after the epoch
pub fn ts(sec: i64) -> Timestamp {
    Utc.timestamp_opt(sec, 0).unwrap()
}

pub fn node(id: FeatureId, version: i64, sec: i64, lat: f64, lon: f64) -> FeatureVersion {
    FeatureVersion::new(id, FeatureKind::Node, version, ts(sec)).at(lat, lon)
}

pub fn way(id: FeatureId, version: i64, sec: i64, members: Vec<FeatureId>) -> FeatureVersion {
    FeatureVersion::new(id, FeatureKind::Way, version, ts(sec)).with_members(members)
}

pub fn relation(id: FeatureId, version: i64, sec: i64, members: Vec<FeatureId>) -> FeatureVersion {
    FeatureVersion::new(id, FeatureKind::Relation, version, ts(sec)).with_members(members)
}

pub fn memory_store(versions: Vec<FeatureVersion>) -> InMemoryVersionStore {
    InMemoryVersionStore::with_versions(versions).unwrap()
}
