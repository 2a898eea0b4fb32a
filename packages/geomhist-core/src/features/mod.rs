//! Pipeline stages, leaf-first: ingestion, resolution, geometry,
//! sequencing, reporting. Attribution joins versions to changesets.

pub mod attribution;
pub mod geometry;
pub mod ingestion;
pub mod reporting;
pub mod resolution;
pub mod sequencing;
