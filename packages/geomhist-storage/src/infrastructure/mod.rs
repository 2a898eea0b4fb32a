//! Storage Infrastructure Layer
//!
//! Storage backends for the VersionStore trait

pub mod memory_store;
pub use memory_store::InMemoryVersionStore;

#[cfg(feature = "sqlite")]
pub mod sqlite;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteVersionStore;
