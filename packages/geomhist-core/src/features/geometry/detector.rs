//! Recursive geometry comparison over the version store
//!
//! Ways and relations are compared member by member: each member is resolved
//! to the version in effect at the referencing edit, then compared in turn.
//! Nesting is walked with an explicit frame stack, so deep or cyclic
//! relation graphs cost heap, not call stack.
//!
//! Rules for one pair `(a, b)` of the same kind:
//!
//! | kind          | condition                                   | result      |
//! |---------------|---------------------------------------------|-------------|
//! | node          | `b` has neither `lat` nor `lon`             | `Unchanged` |
//! | node          | both carry the same `lat` and `lon`         | `Unchanged` |
//! | node          | otherwise (including half positions)        | `Changed`   |
//! | way/relation  | `b` has no member list                      | `Unchanged` |
//! | way/relation  | only `b` has a member list                  | `DataError` |
//! | way/relation  | member counts differ                        | `Changed`   |
//! | way/relation  | otherwise                                   | scan members in order |
//!
//! The first non-`Unchanged` member outcome, at any depth, decides the
//! whole comparison. A top-level version whose kind differs from the
//! compared kind is `DataError(KindChanged)`.

use std::collections::HashSet;

use geomhist_storage::{FeatureId, FeatureKind, FeatureVersion, Timestamp, VersionStore};
use tracing::debug;

use super::{DataIssue, GeometryChange};
use crate::config::{CyclePolicy, DetectorConfig};
use crate::errors::Result;
use crate::features::resolution::{Resolution, TemporalResolver};

/// `(feature_id_a, feature_id_b, version_a, version_b)`
type PairKey = (FeatureId, FeatureId, i64, i64);

fn pair_key(a: &FeatureVersion, b: &FeatureVersion) -> PairKey {
    (a.feature_id, b.feature_id, a.version, b.version)
}

/// What the pair's own attributes already decide
enum Shallow {
    Decided(GeometryChange),
    /// Member lists of equal, non-zero length need a member scan
    ScanMembers,
}

fn shallow_compare(a: &FeatureVersion, b: &FeatureVersion, kind: FeatureKind) -> Shallow {
    match kind {
        FeatureKind::Node => {
            let erased = b.lat.is_none() && b.lon.is_none();
            if erased || (same_coordinate(a.lat, b.lat) && same_coordinate(a.lon, b.lon)) {
                Shallow::Decided(GeometryChange::Unchanged)
            } else {
                Shallow::Decided(GeometryChange::Changed)
            }
        }
        FeatureKind::Way | FeatureKind::Relation => match (&a.member_refs, &b.member_refs) {
            (_, None) => Shallow::Decided(GeometryChange::Unchanged),
            (None, Some(_)) => Shallow::Decided(GeometryChange::DataError(
                DataIssue::MembersMissingInEarlierVersion {
                    feature_id: a.feature_id,
                },
            )),
            (Some(refs_a), Some(refs_b)) if refs_a.len() != refs_b.len() => {
                Shallow::Decided(GeometryChange::Changed)
            }
            (Some(refs_a), Some(_)) if refs_a.is_empty() => Shallow::Decided(GeometryChange::Unchanged),
            (Some(_), Some(_)) => Shallow::ScanMembers,
        },
    }
}

/// A missing coordinate never equals anything, itself included
fn same_coordinate(a: Option<f64>, b: Option<f64>) -> bool {
    matches!((a, b), (Some(a), Some(b)) if a == b)
}

fn kind_mismatch(version: &FeatureVersion, kind: FeatureKind) -> Option<DataIssue> {
    (version.kind != kind).then(|| DataIssue::KindChanged {
        feature_id: version.feature_id,
        version: version.version,
        expected: kind,
        found: version.kind,
    })
}

/// A member scan in progress
struct Frame {
    a: FeatureVersion,
    b: FeatureVersion,
    next: usize,
    depth: usize,
}

impl Frame {
    /// Next member pair to compare, advancing the cursor
    fn advance(&mut self) -> Option<(FeatureId, FeatureId)> {
        let refs_a = self.a.member_refs.as_deref()?;
        let refs_b = self.b.member_refs.as_deref()?;
        let pair = (*refs_a.get(self.next)?, *refs_b.get(self.next)?);
        self.next += 1;
        Some(pair)
    }
}

/// Classifies version transitions against a [`VersionStore`]
///
/// No store results are cached between calls.
pub struct GeometryChangeDetector<'s, S: ?Sized> {
    store: &'s S,
    config: DetectorConfig,
}

impl<'s, S> GeometryChangeDetector<'s, S>
where
    S: VersionStore + ?Sized,
{
    pub fn new(store: &'s S, config: DetectorConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Compare `a` (earlier) with `b` (later) as features of `kind`
    ///
    /// `Err` is reserved for store failures; every data problem is a
    /// `GeometryChange::DataError`.
    pub fn compare(&self, a: &FeatureVersion, b: &FeatureVersion, kind: FeatureKind) -> Result<GeometryChange> {
        if let Some(issue) = kind_mismatch(a, kind).or_else(|| kind_mismatch(b, kind)) {
            return Ok(GeometryChange::DataError(issue));
        }
        if let Shallow::Decided(change) = shallow_compare(a, b, kind) {
            return Ok(change);
        }

        let mut active: HashSet<PairKey> = HashSet::new();
        let mut completed: HashSet<PairKey> = HashSet::new();
        active.insert(pair_key(a, b));

        let mut stack = vec![Frame {
            a: a.clone(),
            b: b.clone(),
            next: 0,
            depth: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some((ref_a, ref_b)) = frame.advance() else {
                // Every member at this level was unchanged
                if let Some(done) = stack.pop() {
                    let key = pair_key(&done.a, &done.b);
                    active.remove(&key);
                    completed.insert(key);
                }
                continue;
            };
            let depth = frame.depth;
            let cutoff_a = frame.a.timestamp;
            let cutoff_b = frame.b.timestamp;

            let history_a = self.store.versions_of(ref_a)?;
            let history_b = if ref_b == ref_a {
                None
            } else {
                Some(self.store.versions_of(ref_b)?)
            };
            let history_b = history_b.as_deref().unwrap_or(history_a.as_slice());

            let member_a = match resolve_member(ref_a, &history_a, cutoff_a) {
                Ok(version) => version,
                Err(issue) => return Ok(GeometryChange::DataError(issue)),
            };
            let member_b = match resolve_member(ref_b, history_b, cutoff_b) {
                Ok(version) => version,
                Err(issue) => return Ok(GeometryChange::DataError(issue)),
            };

            if member_a.kind != member_b.kind {
                return Ok(GeometryChange::Changed);
            }

            match shallow_compare(member_a, member_b, member_a.kind) {
                Shallow::Decided(GeometryChange::Unchanged) => continue,
                Shallow::Decided(change) => return Ok(change),
                Shallow::ScanMembers => {}
            }

            let key = pair_key(member_a, member_b);
            if completed.contains(&key) {
                continue;
            }
            if active.contains(&key) {
                match self.config.cycle_policy {
                    CyclePolicy::AssumeUnchanged => {
                        debug!(
                            "Reference cycle at feature {} v{} / {} v{}, assuming unchanged",
                            key.0, key.2, key.1, key.3
                        );
                        continue;
                    }
                    CyclePolicy::Flag => {
                        return Ok(GeometryChange::DataError(DataIssue::CycleDetected {
                            feature_id: member_a.feature_id,
                        }));
                    }
                }
            }

            if depth + 1 >= self.config.max_depth {
                return Ok(GeometryChange::DataError(DataIssue::DepthLimitExceeded {
                    limit: self.config.max_depth,
                }));
            }

            active.insert(key);
            stack.push(Frame {
                a: member_a.clone(),
                b: member_b.clone(),
                next: 0,
                depth: depth + 1,
            });
        }

        Ok(GeometryChange::Unchanged)
    }
}

fn resolve_member(
    reference: FeatureId,
    history: &[FeatureVersion],
    cutoff: Timestamp,
) -> std::result::Result<&FeatureVersion, DataIssue> {
    match TemporalResolver::resolve(history, cutoff) {
        Resolution::Resolved(version) => Ok(version),
        Resolution::Absent => Err(DataIssue::ReferenceAbsent { reference }),
        Resolution::Unresolvable => Err(DataIssue::ReferenceUnresolvable { reference, cutoff }),
    }
}
