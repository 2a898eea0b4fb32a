//! In-Memory Version Store (for testing)
//!
//! BTreeMap-based implementation for unit tests and small extracts.
//! Everything is lost when the store is dropped.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::domain::models::{ChangesetId, ChangesetRecord, FeatureId, FeatureVersion};
use crate::domain::ports::{
    integrity_warnings, AppendOutcome, ChangesetStore, StoreStats, VersionHead, VersionStore,
};
use crate::{Result, StorageError};

#[derive(Clone, Default)]
pub struct InMemoryVersionStore {
    /// Versions per feature, kept sorted by version
    history: Arc<RwLock<BTreeMap<FeatureId, Vec<FeatureVersion>>>>,
    changesets: Arc<RwLock<BTreeMap<ChangesetId, ChangesetRecord>>>,
}

impl InMemoryVersionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from already-assembled versions (test fixtures)
    pub fn with_versions(versions: impl IntoIterator<Item = FeatureVersion>) -> Result<Self> {
        let store = Self::new();
        for version in versions {
            store.append(&version)?;
        }
        Ok(store)
    }
}

impl VersionStore for InMemoryVersionStore {
    fn append(&self, version: &FeatureVersion) -> Result<AppendOutcome> {
        let mut history = self
            .history
            .write()
            .map_err(|_| StorageError::lock("history"))?;
        let versions = history.entry(version.feature_id).or_default();

        let slot = match versions.binary_search_by_key(&version.version, |v| v.version) {
            Ok(_) => {
                return Err(StorageError::duplicate_version(
                    version.feature_id,
                    version.version,
                ))
            }
            Err(slot) => slot,
        };

        let warnings = versions
            .iter()
            .max_by_key(|v| v.version)
            .map(|head| integrity_warnings(&VersionHead::from(head), version))
            .unwrap_or_default();

        versions.insert(slot, version.clone());
        Ok(AppendOutcome { warnings })
    }

    fn versions_of(&self, feature_id: FeatureId) -> Result<Vec<FeatureVersion>> {
        let history = self
            .history
            .read()
            .map_err(|_| StorageError::lock("history"))?;
        Ok(history.get(&feature_id).cloned().unwrap_or_default())
    }

    fn contains(&self, feature_id: FeatureId) -> Result<bool> {
        let history = self
            .history
            .read()
            .map_err(|_| StorageError::lock("history"))?;
        Ok(history.get(&feature_id).is_some_and(|v| !v.is_empty()))
    }

    fn feature_ids(&self) -> Result<Vec<FeatureId>> {
        let history = self
            .history
            .read()
            .map_err(|_| StorageError::lock("history"))?;
        Ok(history.keys().copied().collect())
    }

    fn stats(&self) -> Result<StoreStats> {
        let history = self
            .history
            .read()
            .map_err(|_| StorageError::lock("history"))?;

        let mut stats = StoreStats::default();
        let mut features = HashSet::new();
        for version in history.values().flatten() {
            features.insert(version.feature_id);
            stats.total_versions += 1;
            stats.count_kind(version.kind);
            stats.max_sequence_id = stats.max_sequence_id.max(Some(version.sequence_id));
        }
        stats.total_features = features.len();
        Ok(stats)
    }
}

impl ChangesetStore for InMemoryVersionStore {
    fn put_changeset(&self, changeset: &ChangesetRecord) -> Result<()> {
        let mut changesets = self
            .changesets
            .write()
            .map_err(|_| StorageError::lock("changesets"))?;
        if changesets.contains_key(&changeset.changeset_id) {
            return Err(StorageError::duplicate_changeset(changeset.changeset_id));
        }
        changesets.insert(changeset.changeset_id, changeset.clone());
        Ok(())
    }

    fn changeset(&self, changeset_id: ChangesetId) -> Result<Option<ChangesetRecord>> {
        let changesets = self
            .changesets
            .read()
            .map_err(|_| StorageError::lock("changesets"))?;
        Ok(changesets.get(&changeset_id).cloned())
    }

    fn changeset_count(&self) -> Result<usize> {
        let changesets = self
            .changesets
            .read()
            .map_err(|_| StorageError::lock("changesets"))?;
        Ok(changesets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FeatureKind, IntegrityWarning, Timestamp};
    use chrono::{TimeZone, Utc};

    fn ts(sec: i64) -> Timestamp {
        Utc.timestamp_opt(1_200_000_000 + sec, 0).unwrap()
    }

    fn node(seq: i64, id: FeatureId, version: i64, sec: i64) -> FeatureVersion {
        FeatureVersion::new(id, FeatureKind::Node, version, ts(sec))
            .with_sequence_id(seq)
            .at(60.0, 24.0)
    }

    #[test]
    fn test_versions_of_unknown_feature_is_empty() {
        let store = InMemoryVersionStore::new();
        assert!(store.versions_of(99).unwrap().is_empty());
        assert!(!store.contains(99).unwrap());
    }

    #[test]
    fn test_versions_are_returned_in_version_order() {
        let store = InMemoryVersionStore::new();
        store.append(&node(1, 10, 2, 20)).unwrap();
        store.append(&node(2, 10, 1, 10)).unwrap();
        store.append(&node(3, 10, 3, 30)).unwrap();

        let versions: Vec<i64> = store
            .versions_of(10)
            .unwrap()
            .iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_duplicate_version_is_rejected() {
        let store = InMemoryVersionStore::new();
        store.append(&node(1, 10, 1, 10)).unwrap();
        let err = store.append(&node(2, 10, 1, 10)).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(store.versions_of(10).unwrap().len(), 1);
    }

    #[test]
    fn test_out_of_order_append_is_warned_but_kept() {
        let store = InMemoryVersionStore::new();
        assert!(store.append(&node(1, 10, 2, 20)).unwrap().is_clean());

        let outcome = store.append(&node(2, 10, 1, 10)).unwrap();
        assert_eq!(
            outcome.warnings,
            vec![
                IntegrityWarning::VersionNotIncreasing {
                    feature_id: 10,
                    version: 1,
                    previous_version: 2,
                },
                IntegrityWarning::TimestampNotIncreasing {
                    feature_id: 10,
                    version: 1,
                    previous_version: 2,
                },
            ]
        );
        assert_eq!(store.versions_of(10).unwrap().len(), 2);
    }

    #[test]
    fn test_changesets_are_kept_apart_from_history() {
        let store = InMemoryVersionStore::new();
        store
            .put_changeset(&ChangesetRecord::new(4711).with_tag("source", "Bing"))
            .unwrap();

        assert_eq!(store.changeset(4711).unwrap().unwrap().source(), Some("Bing"));
        assert_eq!(store.changeset(1).unwrap(), None);
        assert_eq!(store.changeset_count().unwrap(), 1);
        assert_eq!(store.stats().unwrap().total_versions, 0);

        let err = store.put_changeset(&ChangesetRecord::new(4711)).unwrap_err();
        assert!(err.is_duplicate());
    }

    #[test]
    fn test_stats() {
        let store = InMemoryVersionStore::with_versions(vec![
            node(1, 10, 1, 10),
            node(2, 10, 2, 20),
            FeatureVersion::new(20, FeatureKind::Way, 1, ts(30))
                .with_sequence_id(3)
                .with_members(vec![10]),
        ])
        .unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_versions, 3);
        assert_eq!(stats.total_features, 2);
        assert_eq!(stats.node_versions, 2);
        assert_eq!(stats.way_versions, 1);
        assert_eq!(stats.relation_versions, 0);
        assert_eq!(stats.max_sequence_id, Some(3));
        assert_eq!(store.feature_ids().unwrap(), vec![10, 20]);
    }
}
