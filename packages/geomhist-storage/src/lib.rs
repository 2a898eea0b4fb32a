//! VersionStore - append-only history of OSM feature versions
//!
//! Every observed version of every node, way and relation is written once
//! and read many times by the geometry analysis. Changesets imported from a
//! separate dump live next to them behind [`ChangesetStore`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use geomhist_storage::{SqliteVersionStore, VersionStore};
//!
//! let store = SqliteVersionStore::open("history.sqlite")?;
//! store.append(&version)?;
//!
//! // Ordered by version, empty if the feature is unknown
//! let history = store.versions_of(4_220_138)?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    AppendOutcome, BoundingBox, ChangesetId, ChangesetRecord, ChangesetStore, FeatureId,
    FeatureKind, FeatureVersion, IntegrityWarning, StoreStats, Timestamp, VersionStore,
};

pub use infrastructure::InMemoryVersionStore;
#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteVersionStore;
