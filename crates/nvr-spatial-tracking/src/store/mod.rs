//! SQLite persistence gateway.
//!
//! Durable storage for maps, placements, transitions, tracks, segments and
//! pending handoffs, plus the aggregation queries behind analytics. Geometry
//! and list fields are stored as JSON text, embeddings as raw blobs and
//! timestamps as unix milliseconds.
//!
//! The connection is shared behind a mutex; every public call takes the lock
//! for the duration of one statement or one transaction.

mod analytics;
mod handoffs;
mod images;
mod maps;
mod placements;
mod schema;
mod tracks;
mod transitions;

pub use images::MAP_IMAGE_ROUTE;

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, Row};
use serde::de::DeserializeOwned;

/// Database file name inside the data directory
pub const DATABASE_FILE: &str = "spatial.db";

/// Errors from the persistence gateway
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON column encode/decode failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No row matched
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind
        entity: &'static str,
        /// Requested id
        id: String,
    },

    /// Uniqueness constraint violated
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rejected input
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl StoreError {
    /// Not-found error for an entity kind
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Map unique-constraint violations to [`StoreError::Conflict`].
    fn from_write(err: rusqlite::Error, what: impl FnOnce() -> String) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
                Self::Conflict(what())
            }
            _ => Self::Database(err),
        }
    }
}

/// Result alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Persistence gateway backed by SQLite.
#[derive(Clone)]
pub struct SpatialStore {
    conn: Arc<Mutex<Connection>>,
    data_dir: Option<PathBuf>,
}

impl SpatialStore {
    /// Open (or create) the store in `data_dir`.
    ///
    /// The database lives at `<data_dir>/spatial.db`; map images are written
    /// below `<data_dir>/maps`.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let conn = Connection::open(data_dir.join(DATABASE_FILE))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            data_dir: Some(data_dir),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory store. Map image uploads are unavailable.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            data_dir: None,
        };
        store.migrate()?;
        Ok(store)
    }

    /// Create tables and indexes if missing. Idempotent.
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(schema::SCHEMA)?;
        Ok(())
    }

    /// Cheap liveness check
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    /// Data directory, if file-backed
    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }
}

// ============================================================================
// Column codecs
// ============================================================================

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

fn conversion_error(idx: usize, ty: Type, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

pub(crate) fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    row.get::<_, i64>(idx).map(from_millis)
}

pub(crate) fn opt_time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    Ok(row.get::<_, Option<i64>>(idx)?.map(from_millis))
}

pub(crate) fn json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text).map_err(|e| conversion_error(idx, Type::Text, e))
}

pub(crate) fn opt_json_col<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) if !text.is_empty() => serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| conversion_error(idx, Type::Text, e)),
        _ => Ok(None),
    }
}

#[derive(Debug)]
struct InvalidEnum(String);

impl std::fmt::Display for InvalidEnum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for InvalidEnum {}

pub(crate) fn enum_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, Type::Text, InvalidEnum(e)))
}

pub(crate) fn opt_enum_col<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(text) if !text.is_empty() => text
            .parse()
            .map(Some)
            .map_err(|e| conversion_error(idx, Type::Text, InvalidEnum(e))),
        _ => Ok(None),
    }
}
