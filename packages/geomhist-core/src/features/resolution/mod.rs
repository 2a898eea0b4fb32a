//! Temporal reference resolution
//!
//! Picks the version of a referenced feature that was in effect when the
//! referencing feature was edited.

use geomhist_storage::{FeatureVersion, Timestamp};

/// Outcome of resolving a reference at a cutoff instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Resolution<'a> {
    /// Latest version with `timestamp <= cutoff`
    Resolved(&'a FeatureVersion),
    /// Versions exist, but all of them are younger than the cutoff
    Unresolvable,
    /// No versions of the target are known
    Absent,
}

impl<'a> Resolution<'a> {
    pub fn resolved(self) -> Option<&'a FeatureVersion> {
        match self {
            Resolution::Resolved(version) => Some(version),
            Resolution::Unresolvable | Resolution::Absent => None,
        }
    }
}

/// Stateless resolver; never falls back to the oldest version.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalResolver;

impl TemporalResolver {
    /// Resolve among `versions` (any order) at `cutoff`
    ///
    /// Equal timestamps resolve to the higher version number.
    pub fn resolve(versions: &[FeatureVersion], cutoff: Timestamp) -> Resolution<'_> {
        if versions.is_empty() {
            return Resolution::Absent;
        }

        versions
            .iter()
            .filter(|v| v.timestamp <= cutoff)
            .max_by_key(|v| (v.timestamp, v.version))
            .map_or(Resolution::Unresolvable, Resolution::Resolved)
    }
}
