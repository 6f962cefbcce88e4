//! Persistent vector index using SQLite and sqlite-vec.
//!
//! Tuples of (id, embedding, document, metadata) are grouped into named
//! collections. Similarity is cosine distance via `vec_distance_cosine`.
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use thiserror::Error;
use tracing::info;

pub mod collections;
pub mod models;
pub mod search;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    dimensions INTEGER,
    created_at DATETIME NOT NULL
);

CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL,
    entry_id TEXT NOT NULL,
    document TEXT NOT NULL,
    metadata TEXT NOT NULL,
    embedding BLOB NOT NULL,
    UNIQUE(collection_id, entry_id),
    FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_collection ON entries(collection_id);
"#;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("collection '{0}' already exists")]
    CollectionExists(String),

    #[error("collection '{0}' not found")]
    CollectionNotFound(String),

    #[error("embedding dimension mismatch: collection has {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid vector: {0}")]
    InvalidVector(&'static str),

    #[error("id '{0}' already exists in collection")]
    DuplicateId(String),

    #[error("argument length mismatch: {ids} ids, {vectors} vectors, {documents} documents, {metadatas} metadatas")]
    LengthMismatch {
        ids: usize,
        vectors: usize,
        documents: usize,
        metadatas: usize,
    },

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("metadata encoding error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("failed to create index directory: {0}")]
    Io(#[from] std::io::Error),
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A SQLite connection initialized with sqlite-vec and the index schema.
pub struct Db {
    pub(crate) conn: Connection,
}

impl Db {
    /// Open (creating if needed) the index stored at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, IndexError> {
        let path = path.as_ref();
        info!("Opening vector index: {}", path.display());

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        init_sqlite_vec();
        let conn = Connection::open(path)?;
        // Readers keep working while another process rebuilds a collection
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        info!("journal mode: {mode}");
        Self::init(conn)
    }

    /// Open an in-memory index (useful for testing).
    pub fn open_in_memory() -> Result<Self, IndexError> {
        init_sqlite_vec();
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, IndexError> {
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }
}

/// Cosine distance is undefined for zero or non-finite vectors.
pub(crate) fn check_vector(vec: &[f32]) -> Result<(), IndexError> {
    if vec.iter().any(|v| !v.is_finite()) {
        return Err(IndexError::InvalidVector("non-finite component"));
    }
    if vec.iter().all(|v| *v == 0.0) {
        return Err(IndexError::InvalidVector("zero norm"));
    }
    Ok(())
}

/// Serialize a float32 vector into the little-endian blob sqlite-vec reads.
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}
