//! Streaming history ingestor
//!
//! Folds the document-ordered element stream into complete
//! [`FeatureVersion`] records. Only the feature currently being assembled is
//! held in memory, so resident size is bounded by the largest single
//! feature, not by the log.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use geomhist_storage::{
    ChangesetRecord, ChangesetStore, FeatureId, FeatureKind, FeatureVersion, IntegrityWarning,
    VersionStore,
};
use tracing::{debug, info, warn};

use super::element::{FeatureHeader, LogElement, LogEntry};
use crate::config::IngestConfig;
use crate::errors::{HistoryError, Result};

/// Integrity warnings kept verbatim in [`IngestReport`]; the rest are only counted
pub const MAX_REPORTED_WARNINGS: usize = 10_000;

/// Turns edit-log element streams into feature versions
#[derive(Debug, Clone, Default)]
pub struct HistoryIngestor {
    config: IngestConfig,
}

impl HistoryIngestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Lazily assemble feature versions from `source`
    ///
    /// Each call starts over with a fresh sequence counter; the returned
    /// iterator consumes `source` and cannot be restarted.
    pub fn ingest<S>(&self, source: S) -> Ingest<S::IntoIter>
    where
        S: IntoIterator<Item = Result<LogEntry>>,
    {
        Ingest {
            source: source.into_iter(),
            next_sequence_id: self.config.first_sequence_id,
            in_progress: None,
            duplicates_discarded: 0,
            finished: false,
        }
    }

    /// Ingest `source` into `store`
    ///
    /// Any malformed element aborts the run. Versions completed before it are
    /// written first and stay written; there is no resume, so a failed run is
    /// repeated from the start against a fresh store.
    ///
    /// With the default `batch_size` of 1 every version is appended as soon
    /// as it is complete. Larger batches trade that for fewer store calls.
    pub fn run<S, V>(&self, source: S, store: &V) -> Result<IngestReport>
    where
        S: IntoIterator<Item = Result<LogEntry>>,
        V: VersionStore + ?Sized,
    {
        let started = Instant::now();
        let mut report = IngestReport::default();
        let mut versions = self.ingest(source);
        let mut batch = Vec::with_capacity(self.config.batch_size);

        info!(
            "Ingesting history (batch size {}, first sequence id {})",
            self.config.batch_size, self.config.first_sequence_id
        );

        for version in versions.by_ref() {
            match version {
                Ok(version) => batch.push(version),
                Err(err) => {
                    self.flush(store, &mut batch, &mut report)?;
                    return Err(err);
                }
            }
            if batch.len() >= self.config.batch_size {
                self.flush(store, &mut batch, &mut report)?;
            }
        }
        self.flush(store, &mut batch, &mut report)?;

        report.duplicates_discarded = versions.duplicates_discarded();
        report.elapsed = started.elapsed();

        info!(
            "Ingestion finished: {} versions in {:.2}s ({} duplicates discarded, {} integrity warnings)",
            report.versions_written,
            report.elapsed.as_secs_f64(),
            report.duplicates_discarded,
            report.warning_count
        );

        Ok(report)
    }

    /// Import a changeset dump into `store`
    ///
    /// Written in `batch_size` groups; the first malformed changeset or
    /// duplicate id aborts the import after flushing what came before it.
    pub fn import_changesets<S, C>(&self, source: S, store: &C) -> Result<ChangesetImportReport>
    where
        S: IntoIterator<Item = Result<ChangesetRecord>>,
        C: ChangesetStore + ?Sized,
    {
        let started = Instant::now();
        let mut report = ChangesetImportReport::default();
        let mut batch: Vec<ChangesetRecord> = Vec::with_capacity(self.config.batch_size);
        let interval = self.config.progress_interval;

        info!("Importing changesets (batch size {})", self.config.batch_size);

        let write = |batch: &mut Vec<ChangesetRecord>, report: &mut ChangesetImportReport| -> Result<()> {
            if batch.is_empty() {
                return Ok(());
            }
            store.put_changesets(batch)?;
            let before = report.changesets_written;
            report.changesets_written += batch.len() as u64;
            report.with_source += batch.iter().filter(|c| c.source().is_some()).count() as u64;
            if report.changesets_written / interval > before / interval {
                info!("Progress: {} changesets written", report.changesets_written);
            }
            batch.clear();
            Ok(())
        };

        for changeset in source {
            match changeset {
                Ok(changeset) => batch.push(changeset),
                Err(err) => {
                    write(&mut batch, &mut report)?;
                    return Err(err);
                }
            }
            if batch.len() >= self.config.batch_size {
                write(&mut batch, &mut report)?;
            }
        }
        write(&mut batch, &mut report)?;

        report.elapsed = started.elapsed();
        info!(
            "Changeset import finished: {} changesets in {:.2}s ({} with a source tag)",
            report.changesets_written,
            report.elapsed.as_secs_f64(),
            report.with_source
        );
        Ok(report)
    }

    fn flush<V>(&self, store: &V, batch: &mut Vec<FeatureVersion>, report: &mut IngestReport) -> Result<()>
    where
        V: VersionStore + ?Sized,
    {
        let outcomes = match batch.len() {
            0 => return Ok(()),
            1 => vec![store.append(&batch[0])?],
            _ => store.append_batch(batch)?,
        };

        for warning in outcomes.into_iter().flat_map(|outcome| outcome.warnings) {
            warn!("Integrity warning: {}", warning);
            report.record_warning(warning);
        }

        let before = report.versions_written;
        report.versions_written += batch.len() as u64;
        let interval = self.config.progress_interval;
        if report.versions_written / interval > before / interval {
            info!("Progress: {} versions written", report.versions_written);
        }

        batch.clear();
        Ok(())
    }
}

/// Summary of one ingestion run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub versions_written: u64,
    /// Re-presented `(feature_id, version)` headers that were dropped
    pub duplicates_discarded: u64,
    /// All integrity warnings seen, including those not kept below
    pub warning_count: u64,
    /// The first [`MAX_REPORTED_WARNINGS`] warnings
    pub integrity_warnings: Vec<IntegrityWarning>,
    pub elapsed: Duration,
}

impl IngestReport {
    fn record_warning(&mut self, warning: IntegrityWarning) {
        self.warning_count += 1;
        if self.integrity_warnings.len() < MAX_REPORTED_WARNINGS {
            self.integrity_warnings.push(warning);
        }
    }
}

/// Summary of one changeset import
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangesetImportReport {
    pub changesets_written: u64,
    /// Changesets carrying a `source` tag
    pub with_source: u64,
    pub elapsed: Duration,
}

/// The feature whose children are still being collected
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureInProgress {
    pub header: FeatureHeader,
    pub pending_member_refs: Vec<FeatureId>,
    pub pending_tags: BTreeMap<String, String>,
}

impl FeatureInProgress {
    fn start(header: FeatureHeader) -> Self {
        Self {
            header,
            pending_member_refs: Vec::new(),
            pending_tags: BTreeMap::new(),
        }
    }

    fn finish(self, sequence_id: i64) -> FeatureVersion {
        let FeatureInProgress {
            header,
            pending_member_refs,
            pending_tags,
        } = self;

        FeatureVersion {
            sequence_id,
            feature_id: header.feature_id,
            kind: header.kind,
            version: header.version,
            timestamp: header.timestamp,
            editor_id: header.editor_id,
            editor_name: header.editor_name,
            changeset_id: header.changeset_id,
            visible: header.visible,
            lat: header.lat,
            lon: header.lon,
            member_refs: (!pending_member_refs.is_empty()).then_some(pending_member_refs),
            extra_tags: (!pending_tags.is_empty()).then_some(pending_tags),
        }
    }
}

/// Iterator returned by [`HistoryIngestor::ingest`]
///
/// Yields `None` forever after the first error.
pub struct Ingest<S> {
    source: S,
    next_sequence_id: i64,
    in_progress: Option<FeatureInProgress>,
    duplicates_discarded: u64,
    finished: bool,
}

impl<S> Ingest<S> {
    pub fn duplicates_discarded(&self) -> u64 {
        self.duplicates_discarded
    }

    /// Feature currently being assembled, if any
    pub fn in_progress(&self) -> Option<&FeatureInProgress> {
        self.in_progress.as_ref()
    }

    fn emit(&mut self, feature: FeatureInProgress) -> FeatureVersion {
        let sequence_id = self.next_sequence_id;
        self.next_sequence_id += 1;
        feature.finish(sequence_id)
    }

    /// A header repeating the feature still being assembled
    fn is_representation(&self, header: &FeatureHeader) -> bool {
        self.in_progress
            .as_ref()
            .is_some_and(|current| current.header.key() == header.key())
    }

    fn fail(&mut self, err: HistoryError) -> Option<Result<FeatureVersion>> {
        self.finished = true;
        self.in_progress = None;
        Some(Err(err))
    }
}

impl<S> Iterator for Ingest<S>
where
    S: Iterator<Item = Result<LogEntry>>,
{
    type Item = Result<FeatureVersion>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            let entry = match self.source.next() {
                Some(Ok(entry)) => entry,
                Some(Err(err)) => return self.fail(err),
                None => {
                    self.finished = true;
                    let last = self.in_progress.take()?;
                    return Some(Ok(self.emit(last)));
                }
            };

            match entry.element {
                LogElement::Feature(header) => {
                    if self.is_representation(&header) {
                        self.duplicates_discarded += 1;
                        debug!(
                            "Discarding re-presented feature {} v{} at {}",
                            header.feature_id, header.version, entry.position
                        );
                        continue;
                    }
                    if let Some(done) = self.in_progress.replace(FeatureInProgress::start(header)) {
                        return Some(Ok(self.emit(done)));
                    }
                }
                LogElement::Member { reference } => {
                    let Some(current) = self.in_progress.as_mut() else {
                        return self.fail(HistoryError::malformed(
                            entry.position,
                            "member",
                            "orphan child: no feature announced yet",
                        ));
                    };
                    if current.header.kind == FeatureKind::Node {
                        let reason = format!(
                            "node {} v{} cannot have member references",
                            current.header.feature_id, current.header.version
                        );
                        return self.fail(HistoryError::malformed(entry.position, "member", reason));
                    }
                    current.pending_member_refs.push(reference);
                }
                LogElement::Tag { key, value } => {
                    let Some(current) = self.in_progress.as_mut() else {
                        return self.fail(HistoryError::malformed(
                            entry.position,
                            "tag",
                            "orphan child: no feature announced yet",
                        ));
                    };
                    // First occurrence of a key wins
                    current.pending_tags.entry(key).or_insert(value);
                }
            }
        }
    }
}

impl<S> std::iter::FusedIterator for Ingest<S> where S: Iterator<Item = Result<LogEntry>> {}
