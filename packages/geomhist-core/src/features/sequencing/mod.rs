//! Per-feature modification sequences
//!
//! Walks a feature's version history pairwise and keeps every transition
//! that is not `Unchanged`. The number of kept `Changed` markers is the
//! feature's geometry modification count.

use geomhist_storage::{FeatureId, FeatureKind, VersionStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DetectorConfig;
use crate::errors::Result;
use crate::features::geometry::{DataIssue, GeometryChange, GeometryChangeDetector};

/// One recorded transition (or the absent-feature sentinel)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceMarker {
    Changed,
    DataError(DataIssue),
    /// The feature has no versions in the store
    FeatureAbsent,
}

/// Modification count of one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModificationCount {
    Modified(usize),
    /// At least one transition could not be classified
    Unanalyzable,
    Absent,
}

impl ModificationCount {
    /// Number of geometry modifications, if the feature was analysable
    pub fn modifications(&self) -> Option<usize> {
        match self {
            ModificationCount::Modified(n) => Some(*n),
            ModificationCount::Unanalyzable | ModificationCount::Absent => None,
        }
    }
}

/// Ordered non-`Unchanged` transitions of one feature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationSequence {
    pub feature_id: FeatureId,
    /// `None` when the feature is absent
    pub kind: Option<FeatureKind>,
    markers: Vec<SequenceMarker>,
}

impl ModificationSequence {
    fn absent(feature_id: FeatureId) -> Self {
        Self {
            feature_id,
            kind: None,
            markers: vec![SequenceMarker::FeatureAbsent],
        }
    }

    pub fn markers(&self) -> &[SequenceMarker] {
        &self.markers
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn is_absent(&self) -> bool {
        self.markers.contains(&SequenceMarker::FeatureAbsent)
    }

    pub fn is_unanalyzable(&self) -> bool {
        self.markers
            .iter()
            .any(|m| matches!(m, SequenceMarker::DataError(_)))
    }

    pub fn count(&self) -> ModificationCount {
        if self.is_absent() {
            ModificationCount::Absent
        } else if self.is_unanalyzable() {
            ModificationCount::Unanalyzable
        } else {
            ModificationCount::Modified(self.markers.len())
        }
    }
}

/// Count outcome for one feature of an analysed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureModificationRecord {
    pub feature_id: FeatureId,
    pub count: ModificationCount,
}

/// Builds modification sequences from a [`VersionStore`]
pub struct ModificationSequencer<'s, S: ?Sized> {
    store: &'s S,
    detector: GeometryChangeDetector<'s, S>,
}

impl<'s, S> ModificationSequencer<'s, S>
where
    S: VersionStore + ?Sized,
{
    pub fn new(store: &'s S, config: DetectorConfig) -> Self {
        Self {
            store,
            detector: GeometryChangeDetector::new(store, config),
        }
    }

    pub fn sequence_for(&self, feature_id: FeatureId) -> Result<ModificationSequence> {
        let versions = self.store.versions_of(feature_id)?;
        let Some(first) = versions.first() else {
            return Ok(ModificationSequence::absent(feature_id));
        };
        let kind = first.kind;

        let mut markers = Vec::new();
        for pair in versions.windows(2) {
            match self.detector.compare(&pair[0], &pair[1], kind)? {
                GeometryChange::Unchanged => {}
                GeometryChange::Changed => markers.push(SequenceMarker::Changed),
                GeometryChange::DataError(issue) => {
                    debug!(
                        "Feature {} v{} -> v{}: {}",
                        feature_id, pair[0].version, pair[1].version, issue
                    );
                    markers.push(SequenceMarker::DataError(issue));
                }
            }
        }

        Ok(ModificationSequence {
            feature_id,
            kind: Some(kind),
            markers,
        })
    }

    /// Analyse a caller-supplied feature set
    ///
    /// A data problem marks only its own feature unanalyzable; a store
    /// failure aborts the whole call.
    pub fn count_many<I>(&self, feature_ids: I) -> Result<Vec<FeatureModificationRecord>>
    where
        I: IntoIterator<Item = FeatureId>,
    {
        feature_ids
            .into_iter()
            .map(|feature_id| {
                let count = self.sequence_for(feature_id)?.count();
                if count == ModificationCount::Unanalyzable {
                    debug!("Feature {} is unanalyzable", feature_id);
                }
                Ok(FeatureModificationRecord { feature_id, count })
            })
            .collect()
    }
}
