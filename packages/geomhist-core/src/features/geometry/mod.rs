//! Geometry change detection between two versions of a feature

pub mod detector;

use std::fmt;

use geomhist_storage::{FeatureId, FeatureKind, Timestamp};
use serde::{Deserialize, Serialize};

pub use detector::GeometryChangeDetector;

/// Classification of one version-to-version transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryChange {
    Unchanged,
    Changed,
    /// Whether geometry changed cannot be determined
    DataError(DataIssue),
}

impl GeometryChange {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, GeometryChange::Unchanged)
    }
}

/// Why a comparison ended in `DataError`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIssue {
    /// A way or relation gained members it never had in the earlier version
    MembersMissingInEarlierVersion { feature_id: FeatureId },

    /// A member reference points at a feature with no stored versions
    ReferenceAbsent { reference: FeatureId },

    /// Every stored version of a member is younger than the referencing edit
    ReferenceUnresolvable { reference: FeatureId, cutoff: Timestamp },

    /// The member graph led back to a pair already being compared
    CycleDetected { feature_id: FeatureId },

    /// Relation nesting went deeper than the configured limit
    DepthLimitExceeded { limit: usize },

    /// A version of the compared feature is not of the feature's kind
    KindChanged {
        feature_id: FeatureId,
        version: i64,
        expected: FeatureKind,
        found: FeatureKind,
    },
}

impl fmt::Display for DataIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataIssue::MembersMissingInEarlierVersion { feature_id } => {
                write!(f, "feature {} has members only in the later version", feature_id)
            }
            DataIssue::ReferenceAbsent { reference } => {
                write!(f, "referenced feature {} is not in the store", reference)
            }
            DataIssue::ReferenceUnresolvable { reference, cutoff } => write!(
                f,
                "referenced feature {} has no version at or before {}",
                reference,
                cutoff.to_rfc3339()
            ),
            DataIssue::CycleDetected { feature_id } => {
                write!(f, "reference cycle through feature {}", feature_id)
            }
            DataIssue::DepthLimitExceeded { limit } => {
                write!(f, "member nesting deeper than {}", limit)
            }
            DataIssue::KindChanged {
                feature_id,
                version,
                expected,
                found,
            } => write!(
                f,
                "feature {} v{} is a {}, earlier versions are a {}",
                feature_id, version, found, expected
            ),
        }
    }
}
