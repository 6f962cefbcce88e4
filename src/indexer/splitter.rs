//! Recursive character splitter.
//!
//! Text is cut on the highest-priority separator it contains; any piece that is
//! still too long is cut again with the next separator, down to single
//! characters. Adjacent pieces are then merged back up to `chunk_size`, with
//! the tail of each chunk carried into the next one as overlap.
use std::collections::VecDeque;

use thiserror::Error;
use tracing::debug;

use crate::config::ChunkingConfig;

/// Separators tried in order, from Markdown section headings down to raw characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n## ", "\n### ", "\n#### ", "\n", " ", ""];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ChunkerError {
    #[error("chunk_size must be positive")]
    ZeroChunkSize,

    #[error("chunk_overlap ({overlap}) must be smaller than chunk_size ({size})")]
    OverlapTooLarge { overlap: usize, size: usize },

    #[error("at least one separator is required")]
    NoSeparators,
}

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl RecursiveSplitter {
    pub fn new(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ChunkerError> {
        if chunk_size == 0 {
            return Err(ChunkerError::ZeroChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkerError::OverlapTooLarge {
                overlap: chunk_overlap,
                size: chunk_size,
            });
        }
        if separators.is_empty() {
            return Err(ChunkerError::NoSeparators);
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, ChunkerError> {
        Self::new(
            config.chunk_size,
            config.chunk_overlap,
            config.separators.clone(),
        )
    }

    /// Split `text` into trimmed, non-empty chunks in document order.
    #[must_use]
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        self.split_recursive(text, &self.separators, &mut chunks);
        chunks
    }

    /// Each level consumes at least one separator, so the recursion depth is
    /// bounded by the separator count.
    fn split_recursive(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        let (separator, remaining) = pick_separator(text, separators);
        let pieces = split_keeping_separator(text, separator);

        let mut good: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                self.merge_pieces(&good, out);
                good.clear();
            }

            if remaining.is_empty() {
                debug!(
                    len = char_len(piece),
                    "piece exceeds chunk_size with no separators left"
                );
                push_trimmed(out, piece);
            } else {
                self.split_recursive(piece, remaining, out);
            }
        }

        if !good.is_empty() {
            self.merge_pieces(&good, out);
        }
    }

    /// Greedily pack pieces into chunks of at most `chunk_size` chars. When a
    /// chunk is emitted, pieces are dropped from the front of the window until
    /// what is left fits in `chunk_overlap` and leaves room for the next piece.
    fn merge_pieces(&self, pieces: &[&str], out: &mut Vec<String>) {
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                emit_window(out, &window);

                while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        emit_window(out, &window);
    }
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// First separator present in `text`, plus the lower-priority ones left for
/// recursion. The empty separator always matches and ends the recursion.
fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    let mut separator = separators.last().map_or("", String::as_str);
    let mut remaining: &[String] = &[];

    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() {
            separator = "";
            break;
        }
        if text.contains(sep.as_str()) {
            separator = sep;
            remaining = &separators[i + 1..];
            break;
        }
    }

    (separator, remaining)
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. An empty separator splits into single characters.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

fn emit_window(out: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    push_trimmed(out, &joined);
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}
