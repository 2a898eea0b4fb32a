/*
 * geomhist-core - OSM history geometry analysis
 *
 * Pipeline:
 * - Ingestion: streamed .osh elements -> FeatureVersion records -> VersionStore
 * - Resolution: member version in effect at the referencing edit
 * - Geometry: recursive Unchanged / Changed / DataError classification
 * - Sequencing: per-feature modification sequence and count
 * - Reporting: aggregate statistics, JSONL records, id lists
 * - Attribution: changeset dump -> ChangesetStore, version -> reported data source
 */

pub mod config;
pub mod errors;
pub mod features;

// Re-exports
pub use config::{CyclePolicy, DetectorConfig, GeomhistConfig, IngestConfig};
pub use errors::{HistoryError, LogPosition, Result};
pub use features::attribution::{ChangesetSource, SourceAttribution, SourceAttributor, SourceSummary};
pub use features::geometry::{DataIssue, GeometryChange, GeometryChangeDetector};
pub use features::ingestion::{
    ChangesetImportReport, FeatureHeader, HistoryIngestor, IngestReport, LogElement, LogEntry,
    OsmChangesetSource, OsmXmlSource,
};
pub use features::reporting::{modified_feature_ids, ModificationStats};
pub use features::resolution::{Resolution, TemporalResolver};
pub use features::sequencing::{
    FeatureModificationRecord, ModificationCount, ModificationSequence, ModificationSequencer,
    SequenceMarker,
};

pub use geomhist_storage as storage;
