//! Storage Domain Models
//!
//! One `FeatureVersion` per observed state of an OSM feature. Versions are
//! written once by the ingestor and never mutated or deleted afterwards.
//!
//! Every attribute the history file may omit is an `Option`: "never recorded"
//! must stay distinguishable from zero, empty, or erased.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OSM feature id. Not unique on its own: one row per version.
pub type FeatureId = i64;

/// Instant of an edit (UTC, second resolution in OSM dumps)
pub type Timestamp = DateTime<Utc>;

/// Structural kind of a feature. Immutable across a feature's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureKind {
    Node,
    Way,
    Relation,
}

impl FeatureKind {
    pub const ALL: [FeatureKind; 3] = [FeatureKind::Node, FeatureKind::Way, FeatureKind::Relation];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureKind::Node => "node",
            FeatureKind::Way => "way",
            FeatureKind::Relation => "relation",
        }
    }

    /// Ways and relations carry geometry through member references
    pub fn has_members(&self) -> bool {
        !matches!(self, FeatureKind::Node)
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown feature kind name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown feature kind '{0}' (expected node, way or relation)")]
pub struct ParseKindError(pub String);

impl FromStr for FeatureKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "node" => Ok(FeatureKind::Node),
            "way" => Ok(FeatureKind::Way),
            "relation" => Ok(FeatureKind::Relation),
            other => Err(ParseKindError(other.to_string())),
        }
    }
}

/// One observed state of one feature at one version number
///
/// # Examples
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use geomhist_storage::domain::{FeatureKind, FeatureVersion};
///
/// let ts = Utc.with_ymd_and_hms(2012, 3, 1, 10, 0, 0).unwrap();
/// let node = FeatureVersion::new(7, FeatureKind::Node, 1, ts).at(60.17, 24.94);
/// assert_eq!(node.lat, Some(60.17));
/// assert!(node.member_refs.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVersion {
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Identity
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    /// Row identity, strictly increasing in ingestion order across all features
    pub sequence_id: i64,

    /// Feature id (shared by all versions of the feature)
    pub feature_id: FeatureId,

    /// Node, way or relation
    pub kind: FeatureKind,

    /// Version number, unique within `feature_id`
    pub version: i64,

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Edit metadata
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    pub timestamp: Timestamp,

    pub editor_id: i64,

    pub editor_name: Option<String>,

    pub changeset_id: Option<i64>,

    /// `None` when the history file carried no `visible` attribute
    pub visible: Option<bool>,

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Geometry
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    /// Nodes only
    pub lat: Option<f64>,

    /// Nodes only
    pub lon: Option<f64>,

    /// Ways and relations only. `None` means no member was recorded,
    /// which is not the same as `Some(vec![])`.
    pub member_refs: Option<Vec<FeatureId>>,

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Descriptive attributes
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    pub extra_tags: Option<BTreeMap<String, String>>,
}

impl FeatureVersion {
    /// Create a bare version: no position, members, tags or editor details.
    ///
    /// `sequence_id` is 0 until the ingestor assigns one.
    pub fn new(feature_id: FeatureId, kind: FeatureKind, version: i64, timestamp: Timestamp) -> Self {
        Self {
            sequence_id: 0,
            feature_id,
            kind,
            version,
            timestamp,
            editor_id: 0,
            editor_name: None,
            changeset_id: None,
            visible: None,
            lat: None,
            lon: None,
            member_refs: None,
            extra_tags: None,
        }
    }

    pub fn with_sequence_id(mut self, sequence_id: i64) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    /// Set the node position
    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    pub fn with_members(mut self, members: Vec<FeatureId>) -> Self {
        self.member_refs = Some(members);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_tags
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_editor(mut self, editor_id: i64, editor_name: Option<String>) -> Self {
        self.editor_id = editor_id;
        self.editor_name = editor_name;
        self
    }

    pub fn with_changeset(mut self, changeset_id: i64) -> Self {
        self.changeset_id = Some(changeset_id);
        self
    }

    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = Some(visible);
        self
    }

    /// Number of recorded members (0 when none were recorded)
    pub fn member_count(&self) -> usize {
        self.member_refs.as_ref().map_or(0, Vec::len)
    }

    /// `(feature_id, version)` identity key
    pub fn key(&self) -> (FeatureId, i64) {
        (self.feature_id, self.version)
    }
}

/// OSM changeset id
pub type ChangesetId = i64;

/// Area touched by a changeset, in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lon: f64,
    pub max_lat: f64,
    pub max_lon: f64,
}

/// One changeset from a changeset dump
///
/// Changesets group the edits of one upload. Their tags carry the editor's
/// own account of the edit, most importantly the `source` of the data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangesetRecord {
    pub changeset_id: ChangesetId,
    pub created_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub open: Option<bool>,
    pub user: Option<String>,
    pub uid: Option<i64>,
    /// `None` for changesets without edits that carry a position
    pub bbox: Option<BoundingBox>,
    pub num_changes: Option<i64>,
    pub comments_count: Option<i64>,
    /// `None` when the changeset had no `<tag>` children
    pub tags: Option<BTreeMap<String, String>>,
}

impl ChangesetRecord {
    pub const SOURCE_TAG: &'static str = "source";

    pub fn new(changeset_id: ChangesetId) -> Self {
        Self {
            changeset_id,
            created_at: None,
            closed_at: None,
            open: None,
            user: None,
            uid: None,
            bbox: None,
            num_changes: None,
            comments_count: None,
            tags: None,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.as_ref()?.get(key).map(String::as_str)
    }

    /// Value of the `source` tag, if the editor reported one
    pub fn source(&self) -> Option<&str> {
        self.tag(Self::SOURCE_TAG)
    }
}
