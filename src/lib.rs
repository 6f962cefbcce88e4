//! # docrag: local documentation retrieval
//!
//! Splits a Markdown/MDX documentation corpus into overlapping chunks, embeds
//! them, and stores them in a persistent vector index. Queries are embedded the
//! same way and answered with the nearest chunks.
//!
//! ## Architecture
//!
//! - **[`config`]** - JSON configuration loading and validation
//! - **[`indexer`]** - Recursive chunking, corpus discovery, collection rebuilds
//! - **[`embedder`]** - Text embedding via ONNX Runtime (all-MiniLM-L6-v2), lazily loaded
//! - **[`db`]** - SQLite + sqlite-vec named collections with cosine search
//! - **[`search`]** - Query service over the active collection
//! - **[`api`]** - HTTP endpoint (`POST /search`) via axum

pub mod api;
pub mod config;
pub mod db;
pub mod embedder;
pub mod indexer;
pub mod search;
