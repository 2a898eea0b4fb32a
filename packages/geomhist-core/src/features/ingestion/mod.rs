//! History ingestion: edit-log elements in, feature versions out.
//! Changeset dumps are read and imported alongside.

mod attributes;
pub mod changeset_source;
pub mod element;
pub mod ingestor;
pub mod xml_source;

pub use changeset_source::OsmChangesetSource;
pub use element::{from_elements, FeatureHeader, LogElement, LogEntry};
pub use ingestor::{
    ChangesetImportReport, FeatureInProgress, HistoryIngestor, Ingest, IngestReport,
    MAX_REPORTED_WARNINGS,
};
pub use xml_source::OsmXmlSource;
