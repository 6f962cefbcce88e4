use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata stored alongside each chunk and returned unchanged by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// Path of the source file, relative to the corpus root.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionInfo {
    pub name: String,
    /// Established by the first `add`; `None` while the collection is empty.
    pub dimensions: Option<usize>,
    pub count: usize,
    pub created_at: DateTime<Utc>,
}

/// One nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMatch {
    pub id: String,
    pub document: String,
    pub metadata: Metadata,
    /// Cosine distance to the query vector; lower is more similar.
    pub distance: f64,
}
