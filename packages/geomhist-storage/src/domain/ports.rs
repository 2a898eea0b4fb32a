//! Storage Port (Trait Interface)
//!
//! Port/Adapter pattern for backend flexibility:
//! - Analysis runs: SQLite (persistent, survives between ingest and analyze)
//! - Testing: InMemory (fast unit tests)
//!
//! The store is append-only, single writer (the ingestor) and many readers.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::models::{ChangesetId, ChangesetRecord, FeatureId, FeatureKind, FeatureVersion, Timestamp};
use crate::Result;

/// Version Store Port (Primary Interface)
///
/// All storage backends must implement this trait. A successful `append`
/// is visible to every subsequent read.
pub trait VersionStore: Send + Sync {
    /// Durably write one version.
    ///
    /// Fails with `DuplicateVersion` when `(feature_id, version)` is already
    /// stored. Ordering anomalies do not fail the write; they are reported
    /// in the returned outcome.
    fn append(&self, version: &FeatureVersion) -> Result<AppendOutcome>;

    /// Write several versions, in order
    fn append_batch(&self, versions: &[FeatureVersion]) -> Result<Vec<AppendOutcome>> {
        versions.iter().map(|v| self.append(v)).collect()
    }

    /// All versions of a feature ordered by version ascending (empty if unknown)
    fn versions_of(&self, feature_id: FeatureId) -> Result<Vec<FeatureVersion>>;

    /// Whether at least one version of the feature is stored
    fn contains(&self, feature_id: FeatureId) -> Result<bool> {
        Ok(!self.versions_of(feature_id)?.is_empty())
    }

    /// Distinct feature ids, ascending
    fn feature_ids(&self) -> Result<Vec<FeatureId>>;

    /// Get storage statistics
    fn stats(&self) -> Result<StoreStats>;
}

impl<S: VersionStore + ?Sized> VersionStore for &S {
    fn append(&self, version: &FeatureVersion) -> Result<AppendOutcome> {
        (**self).append(version)
    }

    fn append_batch(&self, versions: &[FeatureVersion]) -> Result<Vec<AppendOutcome>> {
        (**self).append_batch(versions)
    }

    fn versions_of(&self, feature_id: FeatureId) -> Result<Vec<FeatureVersion>> {
        (**self).versions_of(feature_id)
    }

    fn contains(&self, feature_id: FeatureId) -> Result<bool> {
        (**self).contains(feature_id)
    }

    fn feature_ids(&self) -> Result<Vec<FeatureId>> {
        (**self).feature_ids()
    }

    fn stats(&self) -> Result<StoreStats> {
        (**self).stats()
    }
}

/// Changeset Store Port
///
/// Changesets are imported once from a changeset dump, independently of
/// the feature history, and joined to versions through
/// `FeatureVersion::changeset_id`.
pub trait ChangesetStore: Send + Sync {
    /// Write one changeset. Fails with `DuplicateChangeset` when the id is
    /// already stored.
    fn put_changeset(&self, changeset: &ChangesetRecord) -> Result<()>;

    /// Write several changesets, in order
    fn put_changesets(&self, changesets: &[ChangesetRecord]) -> Result<()> {
        changesets.iter().try_for_each(|c| self.put_changeset(c))
    }

    /// Look up one changeset (`None` if it was never imported)
    fn changeset(&self, changeset_id: ChangesetId) -> Result<Option<ChangesetRecord>>;

    /// Number of stored changesets
    fn changeset_count(&self) -> Result<usize>;
}

impl<S: ChangesetStore + ?Sized> ChangesetStore for &S {
    fn put_changeset(&self, changeset: &ChangesetRecord) -> Result<()> {
        (**self).put_changeset(changeset)
    }

    fn put_changesets(&self, changesets: &[ChangesetRecord]) -> Result<()> {
        (**self).put_changesets(changesets)
    }

    fn changeset(&self, changeset_id: ChangesetId) -> Result<Option<ChangesetRecord>> {
        (**self).changeset(changeset_id)
    }

    fn changeset_count(&self) -> Result<usize> {
        (**self).changeset_count()
    }
}

/// Result of a successful append
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppendOutcome {
    /// Data-quality findings against the feature's previously stored versions
    pub warnings: Vec<IntegrityWarning>,
}

impl AppendOutcome {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Version-sequence anomaly detected at append time
///
/// Not fatal to ingestion, but always surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// New version's timestamp does not exceed the latest stored one
    TimestampNotIncreasing {
        feature_id: FeatureId,
        version: i64,
        previous_version: i64,
    },

    /// New version number is lower than the latest stored one
    VersionNotIncreasing {
        feature_id: FeatureId,
        version: i64,
        previous_version: i64,
    },

    /// Feature changed structural kind between versions
    KindChanged {
        feature_id: FeatureId,
        version: i64,
        previous: FeatureKind,
        current: FeatureKind,
    },
}

impl fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityWarning::TimestampNotIncreasing {
                feature_id,
                version,
                previous_version,
            } => write!(
                f,
                "feature {}: timestamp of v{} does not exceed v{}",
                feature_id, version, previous_version
            ),
            IntegrityWarning::VersionNotIncreasing {
                feature_id,
                version,
                previous_version,
            } => write!(
                f,
                "feature {}: v{} appended after v{}",
                feature_id, version, previous_version
            ),
            IntegrityWarning::KindChanged {
                feature_id,
                version,
                previous,
                current,
            } => write!(
                f,
                "feature {}: v{} is a {} but earlier versions are {}",
                feature_id, version, current, previous
            ),
        }
    }
}

/// Latest stored version of a feature, as far as integrity checks need it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersionHead {
    pub kind: FeatureKind,
    pub version: i64,
    pub timestamp: Timestamp,
}

impl From<&FeatureVersion> for VersionHead {
    fn from(v: &FeatureVersion) -> Self {
        Self {
            kind: v.kind,
            version: v.version,
            timestamp: v.timestamp,
        }
    }
}

/// Compare an incoming version against the feature's latest stored version
pub fn integrity_warnings(head: &VersionHead, incoming: &FeatureVersion) -> Vec<IntegrityWarning> {
    let mut warnings = Vec::new();

    if incoming.version < head.version {
        warnings.push(IntegrityWarning::VersionNotIncreasing {
            feature_id: incoming.feature_id,
            version: incoming.version,
            previous_version: head.version,
        });
    }

    if incoming.timestamp <= head.timestamp {
        warnings.push(IntegrityWarning::TimestampNotIncreasing {
            feature_id: incoming.feature_id,
            version: incoming.version,
            previous_version: head.version,
        });
    }

    if incoming.kind != head.kind {
        warnings.push(IntegrityWarning::KindChanged {
            feature_id: incoming.feature_id,
            version: incoming.version,
            previous: head.kind,
            current: incoming.kind,
        });
    }

    warnings
}

/// Storage Statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total number of stored versions
    pub total_versions: usize,

    /// Number of distinct feature ids
    pub total_features: usize,

    /// Versions per kind
    pub node_versions: usize,
    pub way_versions: usize,
    pub relation_versions: usize,

    /// Highest assigned sequence id (`None` for an empty store)
    pub max_sequence_id: Option<i64>,
}

impl StoreStats {
    /// First sequence id to use when appending to this store
    pub fn next_sequence_id(&self) -> i64 {
        self.max_sequence_id.map_or(1, |max| max + 1)
    }

    pub(crate) fn count_kind(&mut self, kind: FeatureKind) {
        match kind {
            FeatureKind::Node => self.node_versions += 1,
            FeatureKind::Way => self.way_versions += 1,
            FeatureKind::Relation => self.relation_versions += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn ts(sec: i64) -> Timestamp {
        Utc.timestamp_opt(1_400_000_000 + sec, 0).unwrap()
    }

    #[test]
    fn test_in_order_version_is_clean() {
        let head = VersionHead {
            kind: FeatureKind::Node,
            version: 1,
            timestamp: ts(0),
        };
        let next = FeatureVersion::new(5, FeatureKind::Node, 2, ts(10));
        assert!(integrity_warnings(&head, &next).is_empty());
    }

    #[test]
    fn test_equal_timestamp_is_flagged() {
        let head = VersionHead {
            kind: FeatureKind::Way,
            version: 1,
            timestamp: ts(10),
        };
        let next = FeatureVersion::new(5, FeatureKind::Way, 2, ts(10));
        assert_eq!(
            integrity_warnings(&head, &next),
            vec![IntegrityWarning::TimestampNotIncreasing {
                feature_id: 5,
                version: 2,
                previous_version: 1,
            }]
        );
    }

    #[test]
    fn test_out_of_order_and_kind_change_both_reported() {
        let head = VersionHead {
            kind: FeatureKind::Way,
            version: 4,
            timestamp: ts(10),
        };
        let next = FeatureVersion::new(5, FeatureKind::Relation, 3, ts(20));
        let warnings = integrity_warnings(&head, &next);
        assert_eq!(warnings.len(), 2);
        assert!(matches!(warnings[0], IntegrityWarning::VersionNotIncreasing { .. }));
        assert!(matches!(
            warnings[1],
            IntegrityWarning::KindChanged {
                previous: FeatureKind::Way,
                current: FeatureKind::Relation,
                ..
            }
        ));
    }

    #[test]
    fn test_warning_display() {
        let w = IntegrityWarning::TimestampNotIncreasing {
            feature_id: 9,
            version: 3,
            previous_version: 2,
        };
        assert_eq!(w.to_string(), "feature 9: timestamp of v3 does not exceed v2");
    }

    #[test]
    fn test_next_sequence_id() {
        assert_eq!(StoreStats::default().next_sequence_id(), 1);
        let stats = StoreStats {
            max_sequence_id: Some(41),
            ..Default::default()
        };
        assert_eq!(stats.next_sequence_id(), 42);
    }
}
