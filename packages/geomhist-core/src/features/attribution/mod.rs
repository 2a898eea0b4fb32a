//! Data-source attribution through changesets
//!
//! Each feature version names the changeset it was uploaded in. The
//! changeset's `source` tag says where the uploaded data came from (survey,
//! imagery, an import, ...). Joining the two attributes every version to a
//! reported source without any network lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

use geomhist_storage::{ChangesetId, ChangesetStore, FeatureId, FeatureKind, FeatureVersion, VersionStore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{HistoryError, Result};

/// What the changeset of a version says about its data source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChangesetSource {
    /// The changeset carries a `source` tag
    Reported { source: String },
    /// The changeset is stored but has no `source` tag
    NotReported,
    /// The version names a changeset that was never imported
    ChangesetUnknown,
    /// The version records no changeset
    NoChangeset,
}

impl ChangesetSource {
    pub fn reported(&self) -> Option<&str> {
        match self {
            ChangesetSource::Reported { source } => Some(source),
            _ => None,
        }
    }
}

/// Source attribution of one feature version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttribution {
    pub feature_id: FeatureId,
    pub kind: FeatureKind,
    pub version: i64,
    pub changeset_id: Option<ChangesetId>,
    #[serde(flatten)]
    pub source: ChangesetSource,
}

/// Joins feature versions to their changesets' `source` tags
pub struct SourceAttributor<'s, S: ?Sized> {
    store: &'s S,
}

impl<'s, S> SourceAttributor<'s, S>
where
    S: VersionStore + ChangesetStore + ?Sized,
{
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    pub fn attribute(&self, version: &FeatureVersion) -> Result<SourceAttribution> {
        let source = match version.changeset_id {
            None => ChangesetSource::NoChangeset,
            Some(changeset_id) => match self.store.changeset(changeset_id)? {
                None => ChangesetSource::ChangesetUnknown,
                Some(changeset) => match changeset.source() {
                    Some(source) => ChangesetSource::Reported {
                        source: source.to_string(),
                    },
                    None => ChangesetSource::NotReported,
                },
            },
        };

        Ok(SourceAttribution {
            feature_id: version.feature_id,
            kind: version.kind,
            version: version.version,
            changeset_id: version.changeset_id,
            source,
        })
    }

    /// Attribution of the highest stored version (`None` for an absent feature)
    pub fn latest(&self, feature_id: FeatureId) -> Result<Option<SourceAttribution>> {
        let versions = self.store.versions_of(feature_id)?;
        versions.last().map(|latest| self.attribute(latest)).transpose()
    }

    /// Attribution of every stored version, in version order
    pub fn history(&self, feature_id: FeatureId) -> Result<Vec<SourceAttribution>> {
        self.store
            .versions_of(feature_id)?
            .iter()
            .map(|version| self.attribute(version))
            .collect()
    }

    /// Latest-version attribution of a feature set; absent features are skipped
    pub fn latest_many<I>(&self, feature_ids: I) -> Result<Vec<SourceAttribution>>
    where
        I: IntoIterator<Item = FeatureId>,
    {
        let mut attributions = Vec::new();
        for feature_id in feature_ids {
            match self.latest(feature_id)? {
                Some(attribution) => attributions.push(attribution),
                None => debug!("Feature {} is not in the store", feature_id),
            }
        }
        Ok(attributions)
    }
}

/// Counts of attributions per reported source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub total: usize,
    /// Reported `source` values and how often each occurs
    pub reported: BTreeMap<String, usize>,
    pub not_reported: usize,
    pub changeset_unknown: usize,
    pub no_changeset: usize,
}

impl SourceSummary {
    pub fn from_attributions<'a, I>(attributions: I) -> Self
    where
        I: IntoIterator<Item = &'a SourceAttribution>,
    {
        let mut summary = Self::default();
        for attribution in attributions {
            summary.total += 1;
            match &attribution.source {
                ChangesetSource::Reported { source } => {
                    *summary.reported.entry(source.clone()).or_default() += 1;
                }
                ChangesetSource::NotReported => summary.not_reported += 1,
                ChangesetSource::ChangesetUnknown => summary.changeset_unknown += 1,
                ChangesetSource::NoChangeset => summary.no_changeset += 1,
            }
        }
        summary
    }

    /// Reported sources, most frequent first (ties by name)
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked: Vec<(&str, usize)> = self
            .reported
            .iter()
            .map(|(source, count)| (source.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
    }
}

impl fmt::Display for SourceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data source attribution")?;
        writeln!(f, "Attributed versions: {}", self.total)?;
        for (source, count) in self.ranked() {
            writeln!(f, "  - {}: {}", source, count)?;
        }
        writeln!(f, "  - (no source tag): {}", self.not_reported)?;
        writeln!(f, "  - (changeset not imported): {}", self.changeset_unknown)?;
        write!(f, "  - (no changeset): {}", self.no_changeset)
    }
}

/// Write attributions as JSON Lines
pub fn write_attributions<W: Write>(mut writer: W, attributions: &[SourceAttribution]) -> Result<()> {
    for attribution in attributions {
        serde_json::to_writer(&mut writer, attribution).map_err(|e| {
            HistoryError::report(format!(
                "feature {} v{}: {}",
                attribution.feature_id, attribution.version, e
            ))
        })?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
