//! Write path: corpus discovery, chunking, and collection rebuilds.
pub mod core;
pub mod discovery;
pub mod splitter;

/// A bounded piece of a source document, the unit stored and retrieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Unique within one ingestion run (`chunk_<n>`).
    pub id: String,
    pub text: String,
    /// Source file path relative to the corpus root.
    pub source: String,
    /// Position of the chunk within its document.
    pub sequence_index: usize,
}

impl Chunk {
    /// Id for the `n`th chunk of a run.
    #[must_use]
    pub fn id_for(n: usize) -> String {
        format!("chunk_{n}")
    }
}
