//! SQLite Version Store
//!
//! File-based persistent storage using SQLite. One `history` table holds
//! every version; `(feature_id, version)` is unique. Imported changesets go
//! to a separate `changesets` table keyed by changeset id.
//!
//! Optional attributes map to SQL NULL. Member lists and tag maps are JSON
//! text, so an absent list (NULL) and an empty list (`[]`) stay distinct.

use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::domain::models::{
    BoundingBox, ChangesetId, ChangesetRecord, FeatureId, FeatureKind, FeatureVersion,
};
use crate::domain::ports::{
    integrity_warnings, AppendOutcome, ChangesetStore, StoreStats, VersionHead, VersionStore,
};
use crate::{Result, StorageError};

const SELECT_COLUMNS: &str = "sequence_id, feature_id, kind, version, timestamp_ms, editor_id,
     editor_name, changeset_id, visible, lat, lon, member_refs, extra_tags";

/// SQLite-based VersionStore implementation
#[derive(Clone)]
pub struct SqliteVersionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteVersionStore {
    /// Open (or create) a store at the given path
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)?;
        // Bulk ingestion writes one row per version; WAL keeps that cheap.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        debug!("Opened SQLite version store at {}", db_path.display());

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::lock("connection"))
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                sequence_id INTEGER PRIMARY KEY,
                feature_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                version INTEGER NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                editor_id INTEGER NOT NULL,
                editor_name TEXT,
                changeset_id INTEGER,
                visible INTEGER,
                lat REAL,
                lon REAL,
                member_refs TEXT,
                extra_tags TEXT,
                UNIQUE (feature_id, version)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS changesets (
                changeset_id INTEGER PRIMARY KEY,
                created_at_ms INTEGER,
                closed_at_ms INTEGER,
                open INTEGER,
                user TEXT,
                uid INTEGER,
                min_lat REAL,
                min_lon REAL,
                max_lat REAL,
                max_lon REAL,
                num_changes INTEGER,
                comments_count INTEGER,
                tags TEXT
            )",
            [],
        )?;

        Ok(())
    }
}

/// Insert one version on an open connection (or transaction)
fn append_on(conn: &Connection, version: &FeatureVersion) -> Result<AppendOutcome> {
    let exists: Option<i64> = conn
        .prepare_cached("SELECT 1 FROM history WHERE feature_id = ?1 AND version = ?2")?
        .query_row(params![version.feature_id, version.version], |row| row.get(0))
        .optional()?;
    if exists.is_some() {
        return Err(StorageError::duplicate_version(
            version.feature_id,
            version.version,
        ));
    }

    let head = conn
        .prepare_cached(
            "SELECT kind, version, timestamp_ms FROM history
             WHERE feature_id = ?1 ORDER BY version DESC LIMIT 1",
        )?
        .query_row(params![version.feature_id], |row| {
            Ok(VersionHead {
                kind: kind_column(row, 0)?,
                version: row.get(1)?,
                timestamp: timestamp_column(row, 2)?,
            })
        })
        .optional()?;

    let member_refs = version
        .member_refs
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let extra_tags = version
        .extra_tags
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    conn.prepare_cached(
        "INSERT INTO history
         (sequence_id, feature_id, kind, version, timestamp_ms, editor_id,
          editor_name, changeset_id, visible, lat, lon, member_refs, extra_tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?
    .execute(params![
        version.sequence_id,
        version.feature_id,
        version.kind.as_str(),
        version.version,
        version.timestamp.timestamp_millis(),
        version.editor_id,
        &version.editor_name,
        version.changeset_id,
        version.visible,
        version.lat,
        version.lon,
        member_refs,
        extra_tags,
    ])?;

    let warnings = head
        .map(|head| integrity_warnings(&head, version))
        .unwrap_or_default();
    Ok(AppendOutcome { warnings })
}

/// Insert one changeset on an open connection (or transaction)
fn put_changeset_on(conn: &Connection, changeset: &ChangesetRecord) -> Result<()> {
    let exists: Option<i64> = conn
        .prepare_cached("SELECT 1 FROM changesets WHERE changeset_id = ?1")?
        .query_row(params![changeset.changeset_id], |row| row.get(0))
        .optional()?;
    if exists.is_some() {
        return Err(StorageError::duplicate_changeset(changeset.changeset_id));
    }

    let tags = changeset.tags.as_ref().map(serde_json::to_string).transpose()?;
    let bbox = changeset.bbox;

    conn.prepare_cached(
        "INSERT INTO changesets
         (changeset_id, created_at_ms, closed_at_ms, open, user, uid,
          min_lat, min_lon, max_lat, max_lon, num_changes, comments_count, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
    )?
    .execute(params![
        changeset.changeset_id,
        changeset.created_at.map(|t| t.timestamp_millis()),
        changeset.closed_at.map(|t| t.timestamp_millis()),
        changeset.open,
        &changeset.user,
        changeset.uid,
        bbox.map(|b| b.min_lat),
        bbox.map(|b| b.min_lon),
        bbox.map(|b| b.max_lat),
        bbox.map(|b| b.max_lon),
        changeset.num_changes,
        changeset.comments_count,
        tags,
    ])?;
    Ok(())
}

fn conversion_error(idx: usize, ty: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(StorageError::serialization(message)))
}

fn kind_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<FeatureKind> {
    let kind: String = row.get(idx)?;
    kind.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn timestamp_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let millis: i64 = row.get(idx)?;
    chrono::DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        conversion_error(idx, Type::Integer, format!("timestamp {} out of range", millis))
    })
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|s| {
        serde_json::from_str(&s)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

fn optional_timestamp_column(
    row: &Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<chrono::DateTime<chrono::Utc>>> {
    match row.get::<_, Option<i64>>(idx)? {
        Some(_) => timestamp_column(row, idx).map(Some),
        None => Ok(None),
    }
}

fn row_to_changeset(row: &Row<'_>) -> rusqlite::Result<ChangesetRecord> {
    let corners: (Option<f64>, Option<f64>, Option<f64>, Option<f64>) =
        (row.get(6)?, row.get(7)?, row.get(8)?, row.get(9)?);
    let bbox = match corners {
        (Some(min_lat), Some(min_lon), Some(max_lat), Some(max_lon)) => Some(BoundingBox {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }),
        _ => None,
    };

    Ok(ChangesetRecord {
        changeset_id: row.get(0)?,
        created_at: optional_timestamp_column(row, 1)?,
        closed_at: optional_timestamp_column(row, 2)?,
        open: row.get(3)?,
        user: row.get(4)?,
        uid: row.get(5)?,
        bbox,
        num_changes: row.get(10)?,
        comments_count: row.get(11)?,
        tags: json_column::<BTreeMap<String, String>>(row, 12)?,
    })
}

fn row_to_version(row: &Row<'_>) -> rusqlite::Result<FeatureVersion> {
    Ok(FeatureVersion {
        sequence_id: row.get(0)?,
        feature_id: row.get(1)?,
        kind: kind_column(row, 2)?,
        version: row.get(3)?,
        timestamp: timestamp_column(row, 4)?,
        editor_id: row.get(5)?,
        editor_name: row.get(6)?,
        changeset_id: row.get(7)?,
        visible: row.get(8)?,
        lat: row.get(9)?,
        lon: row.get(10)?,
        member_refs: json_column::<Vec<FeatureId>>(row, 11)?,
        extra_tags: json_column::<BTreeMap<String, String>>(row, 12)?,
    })
}

impl VersionStore for SqliteVersionStore {
    fn append(&self, version: &FeatureVersion) -> Result<AppendOutcome> {
        let conn = self.lock()?;
        append_on(&conn, version)
    }

    fn append_batch(&self, versions: &[FeatureVersion]) -> Result<Vec<AppendOutcome>> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let mut outcomes = Vec::with_capacity(versions.len());
        for version in versions {
            outcomes.push(append_on(&tx, version)?);
        }

        tx.commit()?;
        Ok(outcomes)
    }

    fn versions_of(&self, feature_id: FeatureId) -> Result<Vec<FeatureVersion>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM history WHERE feature_id = ?1 ORDER BY version",
            SELECT_COLUMNS
        ))?;
        let versions = stmt
            .query_map(params![feature_id], row_to_version)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(versions)
    }

    fn contains(&self, feature_id: FeatureId) -> Result<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .prepare_cached("SELECT 1 FROM history WHERE feature_id = ?1 LIMIT 1")?
            .query_row(params![feature_id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    fn feature_ids(&self) -> Result<Vec<FeatureId>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT feature_id FROM history ORDER BY feature_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<FeatureId>>>()?;
        Ok(ids)
    }

    fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;

        let (total_versions, total_features, max_sequence_id): (i64, i64, Option<i64>) = conn
            .query_row(
                "SELECT COUNT(*), COUNT(DISTINCT feature_id), MAX(sequence_id) FROM history",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        let mut stats = StoreStats {
            total_versions: total_versions as usize,
            total_features: total_features as usize,
            max_sequence_id,
            ..Default::default()
        };

        let mut stmt = conn.prepare("SELECT kind, COUNT(*) FROM history GROUP BY kind")?;
        let per_kind = stmt
            .query_map([], |row| Ok((kind_column(row, 0)?, row.get::<_, i64>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        for (kind, count) in per_kind {
            match kind {
                FeatureKind::Node => stats.node_versions = count as usize,
                FeatureKind::Way => stats.way_versions = count as usize,
                FeatureKind::Relation => stats.relation_versions = count as usize,
            }
        }

        Ok(stats)
    }
}

impl ChangesetStore for SqliteVersionStore {
    fn put_changeset(&self, changeset: &ChangesetRecord) -> Result<()> {
        let conn = self.lock()?;
        put_changeset_on(&conn, changeset)
    }

    fn put_changesets(&self, changesets: &[ChangesetRecord]) -> Result<()> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;
        for changeset in changesets {
            put_changeset_on(&tx, changeset)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn changeset(&self, changeset_id: ChangesetId) -> Result<Option<ChangesetRecord>> {
        let conn = self.lock()?;
        let changeset = conn
            .prepare_cached(
                "SELECT changeset_id, created_at_ms, closed_at_ms, open, user, uid,
                        min_lat, min_lon, max_lat, max_lon, num_changes, comments_count, tags
                 FROM changesets WHERE changeset_id = ?1",
            )?
            .query_row(params![changeset_id], row_to_changeset)
            .optional()?;
        Ok(changeset)
    }

    fn changeset_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM changesets", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
