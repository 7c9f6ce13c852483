//! # Text Chunking Module
//!
//! This module splits the aggregated corpus into overlapping chunks that fit
//! a single completion request. Chunks are plain substrings of the corpus,
//! so the corpus can always be rebuilt from them.
//!
//! ## Key Components
//!
//! - `TextChunk`: A slice of the corpus with its position and byte offset
//! - `chunk_text`: Split any text with the given `ChunkOptions`
//! - `chunk_corpus`: `chunk_text` behind the minimum-length check
//!
//! ## Chunking Strategy
//!
//! For every chunk the chunker looks at a window of `chunk_size` characters
//! and cuts it at the last boundary it can find, trying in order:
//! 1. Paragraph breaks (`\n\n`)
//! 2. Sentence ends and line breaks
//! 3. Whitespace between words
//! 4. A hard cut at the window edge
//!
//! A boundary only counts when the chunk it produces is longer than the
//! overlap and at least 30% of the budget, otherwise the next level is
//! tried. The next chunk starts exactly `chunk_overlap` characters before
//! the end of the previous one.

use crate::processor::error::ProcessError;
use crate::processor::{ChunkOptions, ProcessorConfig};
use serde::Serialize;
use tracing::{debug, instrument};

/// Separators tried in order, coarsest first
const BOUNDARY_LEVELS: &[&[&str]] = &[
    &["\n\n"],
    &[". ", "! ", "? ", ".\n", "\n"],
    &[" ", "\t"],
];

/// A chunk of text with metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextChunk {
    /// The text of the chunk
    pub text: String,

    /// The position of the chunk in the original document
    pub position: usize,

    /// Byte offset of the chunk in the original document
    pub offset: usize,
}

impl TextChunk {
    /// Byte offset just past the end of the chunk in the original document
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }
}

/// Chunk the corpus, refusing corpora too short to be worth summarizing
///
/// # Arguments
///
/// * `corpus` - The aggregated corpus
/// * `config` - The processor configuration
///
/// # Returns
///
/// The chunks, or `ProcessError::CorpusTooShort` when the trimmed corpus has
/// fewer than `config.min_corpus_chars` characters
pub fn chunk_corpus(corpus: &str, config: &ProcessorConfig) -> Result<Vec<TextChunk>, ProcessError> {
    let len = corpus.trim().chars().count();
    if len < config.min_corpus_chars {
        debug!("Corpus of {} characters is below the minimum", len);
        return Err(ProcessError::CorpusTooShort {
            len,
            min: config.min_corpus_chars,
        });
    }
    chunk_text(corpus, &config.chunk_options)
}

/// Split text into overlapping chunks of at most `chunk_size` characters
///
/// # Arguments
///
/// * `text` - The text to chunk
/// * `options` - Chunking options
///
/// # Returns
///
/// A vector of text chunks in document order
#[instrument(skip(text), fields(len = text.len()))]
pub fn chunk_text(text: &str, options: &ChunkOptions) -> Result<Vec<TextChunk>, ProcessError> {
    if options.chunk_size == 0 {
        return Err(ProcessError::InvalidChunkOptions(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if options.chunk_overlap >= options.chunk_size {
        return Err(ProcessError::InvalidChunkOptions(format!(
            "chunk_overlap ({}) must be smaller than chunk_size ({})",
            options.chunk_overlap, options.chunk_size
        )));
    }

    let min_cut_chars = (options.chunk_overlap + 1).max(options.chunk_size * 3 / 10);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let rest = &text[start..];
        let window_end = byte_offset_of_char(rest, options.chunk_size);

        if window_end == rest.len() {
            chunks.push(TextChunk {
                text: rest.to_string(),
                position: chunks.len(),
                offset: start,
            });
            break;
        }

        let cut = find_split_point(&rest[..window_end], min_cut_chars).unwrap_or(window_end);
        let end = start + cut;
        let chunk = &text[start..end];
        chunks.push(TextChunk {
            text: chunk.to_string(),
            position: chunks.len(),
            offset: start,
        });

        // Every cut is longer than the overlap, so this always moves forward
        start = end - tail_byte_len(chunk, options.chunk_overlap);
    }

    debug!("Created {} chunks", chunks.len());
    Ok(chunks)
}

/// Find the last usable boundary in `window`
///
/// Returns the byte position just after the separator, so the separator
/// stays with the earlier chunk.
fn find_split_point(window: &str, min_chars: usize) -> Option<usize> {
    for separators in BOUNDARY_LEVELS {
        let candidate = separators
            .iter()
            .filter_map(|separator| window.rfind(separator).map(|pos| pos + separator.len()))
            .max();

        if let Some(cut) = candidate {
            if window[..cut].chars().count() >= min_chars {
                return Some(cut);
            }
        }
    }
    None
}

/// Byte offset of the `n`th character, or the length if there are fewer
fn byte_offset_of_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(pos, _)| pos)
        .unwrap_or(text.len())
}

/// Byte length of the last `n` characters
fn tail_byte_len(text: &str, n: usize) -> usize {
    if n == 0 {
        return 0;
    }
    text.char_indices()
        .rev()
        .nth(n - 1)
        .map(|(pos, _)| text.len() - pos)
        .unwrap_or(text.len())
}
