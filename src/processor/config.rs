//! # Processor Configuration Module
//!
//! This module provides configuration structures and builders for the
//! summarization stage of the pipeline. It controls how the corpus is cut
//! into chunks, which summarization strategy runs, and how many completion
//! requests may be in flight at once.
//!
//! ## Key Components
//!
//! - `ChunkOptions`: Controls the chunking behavior (size and overlap in characters)
//! - `SummaryStrategy`: `map_reduce`, `stuff` or `refine`
//! - `ProcessorConfig`: Complete configuration for the processor
//! - `ProcessorConfigBuilder`: Builder pattern implementation for easier configuration

use std::fmt;
use std::str::FromStr;

/// Configuration for chunking text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Maximum size of each chunk in characters
    pub chunk_size: usize,

    /// Characters shared between the end of a chunk and the start of the next
    pub chunk_overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 6000,
            chunk_overlap: 1000,
        }
    }
}

/// How chunks are turned into the final structured document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SummaryStrategy {
    /// Summarize every chunk independently, then combine the summaries
    #[default]
    MapReduce,
    /// Send all chunks in a single request
    Stuff,
    /// Walk the chunks in order, refining a running answer
    Refine,
}

impl SummaryStrategy {
    /// All strategies, in the order they are documented
    pub const ALL: [SummaryStrategy; 3] = [
        SummaryStrategy::MapReduce,
        SummaryStrategy::Stuff,
        SummaryStrategy::Refine,
    ];

    /// The name used on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStrategy::MapReduce => "map_reduce",
            SummaryStrategy::Stuff => "stuff",
            SummaryStrategy::Refine => "refine",
        }
    }
}

impl fmt::Display for SummaryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "map_reduce" | "map-reduce" => Ok(SummaryStrategy::MapReduce),
            "stuff" => Ok(SummaryStrategy::Stuff),
            "refine" => Ok(SummaryStrategy::Refine),
            other => Err(format!(
                "unknown summary strategy '{}', expected one of map_reduce, stuff, refine",
                other
            )),
        }
    }
}

/// Configuration for the processor
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// Options for chunking
    pub chunk_options: ChunkOptions,

    /// Summarization strategy
    pub strategy: SummaryStrategy,

    /// Maximum number of concurrent completion requests in the map stage
    pub concurrency: usize,

    /// Corpora with fewer characters than this are not summarized
    pub min_corpus_chars: usize,

    /// Partial summaries longer than this in total are collapsed before reduce
    pub reduce_input_chars: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            chunk_options: ChunkOptions::default(),
            strategy: SummaryStrategy::default(),
            concurrency: 5,
            min_corpus_chars: 30,
            reduce_input_chars: 12_000,
        }
    }
}

/// Builder for ProcessorConfig
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
        }
    }

    /// Set the chunk options
    pub fn chunk_options(mut self, chunk_options: ChunkOptions) -> Self {
        self.config.chunk_options = chunk_options;
        self
    }

    /// Set the chunk size
    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.config.chunk_options.chunk_size = chunk_size;
        self
    }

    /// Set the chunk overlap
    pub fn chunk_overlap(mut self, chunk_overlap: usize) -> Self {
        self.config.chunk_options.chunk_overlap = chunk_overlap;
        self
    }

    /// Set the summarization strategy
    pub fn strategy(mut self, strategy: SummaryStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    /// Set the map-stage concurrency
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the minimum corpus length
    pub fn min_corpus_chars(mut self, min_corpus_chars: usize) -> Self {
        self.config.min_corpus_chars = min_corpus_chars;
        self
    }

    /// Set the reduce input budget
    pub fn reduce_input_chars(mut self, reduce_input_chars: usize) -> Self {
        self.config.reduce_input_chars = reduce_input_chars;
        self
    }

    /// Build the configuration
    pub fn build(self) -> ProcessorConfig {
        self.config
    }
}

impl ProcessorConfig {
    /// Create a new builder
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }
}
