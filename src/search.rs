//! Read path: embed a query and fetch its nearest chunks.
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex as TokioMutex, OnceCell};
use tracing::{debug, info};

use crate::db::models::QueryMatch;
use crate::db::{Db, IndexError};
use crate::embedder::{Embedder, EmbedderError};

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Query parameter is required")]
    EmptyQuery,

    #[error("k must be a positive integer")]
    InvalidK,

    #[error("collection '{0}' not found; run ingestion first")]
    CollectionNotFound(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbedderError),

    #[error("index error: {0}")]
    Index(IndexError),

    #[error("embedding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<IndexError> for SearchError {
    fn from(e: IndexError) -> Self {
        match e {
            IndexError::CollectionNotFound(name) => SearchError::CollectionNotFound(name),
            other => SearchError::Index(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<QueryMatch>,
}

pub struct SearchService {
    db: Arc<TokioMutex<Db>>,
    embedder: Arc<dyn Embedder>,
    collection_name: String,
    default_k: usize,
    /// Set once the collection has been seen to exist.
    opened: OnceCell<()>,
}

impl SearchService {
    pub fn new(
        db: Arc<TokioMutex<Db>>,
        embedder: Arc<dyn Embedder>,
        collection_name: impl Into<String>,
        default_k: usize,
    ) -> Self {
        Self {
            db,
            embedder,
            collection_name: collection_name.into(),
            default_k,
            opened: OnceCell::new(),
        }
    }

    /// First-use existence check, run before any model load. Nothing is cached
    /// beyond the fact that the collection was found; every query still looks
    /// the collection up by name, so a rebuild that swaps it is picked up. A
    /// failed check is not cached, so a query made before ingestion fails
    /// cleanly and later ones can succeed.
    async fn ensure_opened(&self) -> Result<(), SearchError> {
        self.opened
            .get_or_try_init(|| async {
                let db = self.db.lock().await;
                let info = db.get_collection(&self.collection_name)?;
                info!(
                    "Opened collection '{}' ({} chunks)",
                    info.name, info.count
                );
                Ok::<_, SearchError>(())
            })
            .await?;
        Ok(())
    }

    /// Return the `k` (default: configured top-k) chunks nearest to `query`.
    ///
    /// Blank queries are rejected; otherwise the query is embedded and echoed
    /// exactly as received.
    pub async fn search(&self, query: &str, k: Option<usize>) -> Result<SearchResponse, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        let k = k.unwrap_or(self.default_k);
        if k == 0 {
            return Err(SearchError::InvalidK);
        }

        self.ensure_opened().await?;

        // Embedding is CPU-bound and may trigger the first model load
        let embedder = self.embedder.clone();
        let text = query.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed(&text)).await??;

        // The scan is brute force over the collection, so keep it off the workers too
        let db = self.db.clone().lock_owned().await;
        let name = self.collection_name.clone();
        let results =
            tokio::task::spawn_blocking(move || db.query(&name, &query_vector, k)).await??;
        debug!("Query {query:?} returned {} results", results.len());

        Ok(SearchResponse {
            query: query.to_string(),
            results,
        })
    }
}
