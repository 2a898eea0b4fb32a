//! Aggregation of per-feature modification counts
//!
//! Records are exchanged as JSON Lines, one [`FeatureModificationRecord`]
//! per line, so statistics can be recomputed without re-running analysis.

use std::fmt;
use std::io::{BufRead, Write};

use geomhist_storage::FeatureId;
use serde::Serialize;

use crate::errors::{HistoryError, Result};
use crate::features::sequencing::{FeatureModificationRecord, ModificationCount};

/// Descriptive statistics over an analysed feature set
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModificationStats {
    pub features: usize,
    /// Count > 0
    pub modified: usize,
    /// Count = 0
    pub unmodified: usize,
    pub unanalyzable: usize,
    pub absent: usize,
    /// Mean count over analysable features
    pub mean_modifications: Option<f64>,
    pub max_modifications: Option<usize>,
}

impl ModificationStats {
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a FeatureModificationRecord>,
    {
        let mut stats = Self::default();
        let mut total = 0usize;

        for record in records {
            stats.features += 1;
            match record.count {
                ModificationCount::Modified(0) => stats.unmodified += 1,
                ModificationCount::Modified(n) => {
                    stats.modified += 1;
                    total += n;
                    stats.max_modifications = stats.max_modifications.max(Some(n));
                }
                ModificationCount::Unanalyzable => stats.unanalyzable += 1,
                ModificationCount::Absent => stats.absent += 1,
            }
        }

        let analysable = stats.analysable();
        if analysable > 0 {
            stats.mean_modifications = Some(total as f64 / analysable as f64);
            stats.max_modifications = stats.max_modifications.or(Some(0));
        }
        stats
    }

    pub fn analysable(&self) -> usize {
        self.modified + self.unmodified
    }

    /// Share of all features, in percent, rounded to one decimal
    pub fn percent(&self, part: usize) -> f64 {
        if self.features == 0 {
            return 0.0;
        }
        round1(100.0 * part as f64 / self.features as f64)
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl fmt::Display for ModificationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Geometry modification statistics")?;
        writeln!(f, "Feature count: {}", self.features)?;
        writeln!(
            f,
            "  - {} underwent geometric modifications ({:.1} %)",
            self.modified,
            self.percent(self.modified)
        )?;
        writeln!(
            f,
            "  - {} have not been modified ({:.1} %)",
            self.unmodified,
            self.percent(self.unmodified)
        )?;
        writeln!(
            f,
            "  - {} could not be analysed ({:.1} %)",
            self.unanalyzable,
            self.percent(self.unanalyzable)
        )?;
        writeln!(
            f,
            "  - {} are absent from the store ({:.1} %)",
            self.absent,
            self.percent(self.absent)
        )?;
        match (self.mean_modifications, self.max_modifications) {
            (Some(mean), Some(max)) => {
                writeln!(f, "Average number of geometry modifications per feature: {:.1}", mean)?;
                write!(f, "Max number of geometry modifications: {}", max)
            }
            _ => write!(f, "No analysable features"),
        }
    }
}

/// Ids of features with at least one geometry modification
pub fn modified_feature_ids(records: &[FeatureModificationRecord]) -> Vec<FeatureId> {
    records
        .iter()
        .filter(|r| matches!(r.count, ModificationCount::Modified(n) if n > 0))
        .map(|r| r.feature_id)
        .collect()
}

pub fn write_records<W: Write>(mut writer: W, records: &[FeatureModificationRecord]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, record)
            .map_err(|e| HistoryError::report(format!("feature {}: {}", record.feature_id, e)))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<FeatureModificationRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line)
            .map_err(|e| HistoryError::report(format!("line {}: {}", idx + 1, e)))?;
        records.push(record);
    }
    Ok(records)
}

/// Read one feature id per line; blank lines and `#` comments are skipped
pub fn read_feature_ids<R: BufRead>(reader: R) -> Result<Vec<FeatureId>> {
    let mut ids = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let id = line
            .parse()
            .map_err(|e| HistoryError::report(format!("line {}: '{}': {}", idx + 1, line, e)))?;
        ids.push(id);
    }
    Ok(ids)
}

pub fn write_feature_ids<W: Write>(mut writer: W, ids: &[FeatureId]) -> Result<()> {
    for id in ids {
        writeln!(writer, "{}", id)?;
    }
    writer.flush()?;
    Ok(())
}
