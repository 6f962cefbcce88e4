use crate::config::Config;
use crate::db::models::Metadata;
use crate::db::{Db, IndexError, check_vector};
use crate::embedder::{Embedder, EmbedderError};
use crate::indexer::Chunk;
use crate::indexer::discovery::{self, SourceFile};
use crate::indexer::splitter::{ChunkerError, RecursiveSplitter};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("corpus directory not found: {0}")]
    CorpusNotFound(PathBuf),

    #[error("invalid document pattern: {0}")]
    Pattern(#[from] globset::Error),

    #[error("failed to walk corpus: {0}")]
    Walk(#[from] ignore::Error),

    #[error("invalid chunking configuration: {0}")]
    Chunker(#[from] ChunkerError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("{failed} of {found} files failed; collection '{collection}' left unchanged")]
    Incomplete {
        failed: usize,
        found: usize,
        collection: String,
    },
}

/// Why a single file could not be ingested. Logged and counted, never fatal.
#[derive(Error, Debug)]
enum FileError {
    #[error("read failed: {0}")]
    Read(#[from] std::io::Error),

    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedderError),

    #[error("embedder returned an unusable vector: {0}")]
    Vector(IndexError),

    #[error("embedder returned {actual} vectors for {expected} chunks")]
    VectorCount { expected: usize, actual: usize },
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_found: usize,
    pub files_indexed: usize,
    /// Files that produced no chunks.
    pub files_skipped: usize,
    pub files_failed: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub collection: String,
    pub patterns: Vec<String>,
    /// Swap the rebuilt collection in even if some files failed.
    pub allow_partial: bool,
}

/// Rebuilds one named collection from a corpus directory.
///
/// The new contents are written to a staging collection and swapped in only
/// once every file has been processed, so a failed run never disturbs the
/// collection currently being served.
pub struct Ingestor<'a, E: Embedder + ?Sized> {
    db: &'a mut Db,
    embedder: &'a E,
    splitter: RecursiveSplitter,
    options: IngestOptions,
}

impl<'a, E: Embedder + ?Sized> Ingestor<'a, E> {
    pub fn new(
        db: &'a mut Db,
        embedder: &'a E,
        splitter: RecursiveSplitter,
        options: IngestOptions,
    ) -> Self {
        Self {
            db,
            embedder,
            splitter,
            options,
        }
    }

    pub fn from_config(
        db: &'a mut Db,
        embedder: &'a E,
        config: &Config,
        allow_partial: bool,
    ) -> Result<Self, IngestError> {
        let splitter = RecursiveSplitter::from_config(&config.chunking)?;
        let options = IngestOptions {
            collection: config.collection_name.clone(),
            patterns: config.document_patterns.clone(),
            allow_partial,
        };
        Ok(Self::new(db, embedder, splitter, options))
    }

    /// Rebuild the collection from every matching file under `root`.
    pub fn ingest(&mut self, root: &Path) -> Result<IngestReport, IngestError> {
        if !root.is_dir() {
            return Err(IngestError::CorpusNotFound(root.to_path_buf()));
        }

        let patterns = discovery::build_globset(&self.options.patterns)?;
        let files = discovery::discover_files(root, &patterns)?;
        info!("Found {} files in {}", files.len(), root.display());

        let target = self.options.collection.clone();
        let prefix = staging_prefix(&target);
        for stale in self.db.list_collections()? {
            if stale.name.starts_with(&prefix) {
                self.db.delete_collection(&stale.name)?;
                warn!("Removed leftover staging collection '{}'", stale.name);
            }
        }
        let staging = staging_name(&target);
        self.db.create_collection(&staging)?;

        let report = match self.populate(&staging, &files) {
            Ok(report) => report,
            Err(e) => {
                self.discard(&staging);
                return Err(e);
            }
        };

        if report.files_failed > 0 && !self.options.allow_partial {
            self.discard(&staging);
            return Err(IngestError::Incomplete {
                failed: report.files_failed,
                found: report.files_found,
                collection: target,
            });
        }

        if let Err(e) = self.db.replace_collection(&staging, &target) {
            self.discard(&staging);
            return Err(e.into());
        }

        info!(
            "Ingested {} chunks from {} files into '{}' ({} skipped, {} failed)",
            report.chunks,
            report.files_indexed,
            target,
            report.files_skipped,
            report.files_failed
        );
        Ok(report)
    }

    fn populate(
        &mut self,
        staging: &str,
        files: &[SourceFile],
    ) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport {
            files_found: files.len(),
            ..IngestReport::default()
        };
        let mut next_id = 0usize;

        for file in files {
            let (chunks, vectors) = match self.prepare_file(file, next_id) {
                Ok(Some(prepared)) => prepared,
                Ok(None) => {
                    debug!("No chunks in {}, skipping", file.relative);
                    report.files_skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Failed to process {}: {e}", file.relative);
                    report.files_failed += 1;
                    continue;
                }
            };

            let count = chunks.len();
            let mut ids = Vec::with_capacity(count);
            let mut documents = Vec::with_capacity(count);
            let mut metadatas = Vec::with_capacity(count);
            for chunk in chunks {
                ids.push(chunk.id);
                documents.push(chunk.text);
                metadatas.push(Metadata {
                    source: chunk.source,
                });
            }

            // Index failures are not per-file problems; abort the run
            self.db
                .add(staging, &ids, &vectors, &documents, &metadatas)?;

            next_id += count;
            report.chunks += count;
            report.files_indexed += 1;
            info!("Processed {} -> {} chunks", file.relative, count);
        }

        Ok(report)
    }

    /// Read, chunk and embed one file. `None` when it yields no chunks.
    fn prepare_file(
        &self,
        file: &SourceFile,
        first_id: usize,
    ) -> Result<Option<(Vec<Chunk>, Vec<Vec<f32>>)>, FileError> {
        let text = std::fs::read_to_string(&file.path)?;

        let chunks: Vec<Chunk> = self
            .splitter
            .split_text(&text)
            .into_iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                id: Chunk::id_for(first_id + i),
                text,
                source: file.relative.clone(),
                sequence_index: i,
            })
            .collect();
        if chunks.is_empty() {
            return Ok(None);
        }

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(FileError::VectorCount {
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }
        if let Some(e) = vectors.iter().find_map(|v| check_vector(v).err()) {
            return Err(FileError::Vector(e));
        }

        Ok(Some((chunks, vectors)))
    }

    fn discard(&mut self, staging: &str) {
        if let Err(e) = self.db.delete_collection(staging) {
            error!("Failed to drop staging collection '{staging}': {e}");
        }
    }
}

fn staging_prefix(target: &str) -> String {
    format!("{target}__staging_")
}

fn staging_name(target: &str) -> String {
    format!("{}{}", staging_prefix(target), Utc::now().format("%Y%m%d%H%M%S%6f"))
}
