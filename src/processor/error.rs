//! Error types for the processor module

use std::fmt;

use rig::completion::CompletionError;
use thiserror::Error;

/// The model-backed pass a completion request belonged to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStage {
    /// Per-chunk summary
    Map,
    /// Re-summarizing partial summaries that do not fit the reduce budget
    Collapse,
    /// Combining partial summaries into the structured document
    Reduce,
    /// Single request over every chunk
    Stuff,
    /// Sequential refinement of a running answer
    Refine,
}

impl fmt::Display for SummaryStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SummaryStage::Map => "map",
            SummaryStage::Collapse => "collapse",
            SummaryStage::Reduce => "reduce",
            SummaryStage::Stuff => "stuff",
            SummaryStage::Refine => "refine",
        };
        f.write_str(name)
    }
}

/// Error type for processor operations
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The corpus is too short to be worth summarizing
    #[error("No text to summarize: corpus has {len} characters, at least {min} required")]
    CorpusTooShort {
        /// Characters in the trimmed corpus
        len: usize,
        /// Configured minimum
        min: usize,
    },

    /// Chunk size and overlap cannot produce chunks
    #[error("Invalid chunk options: {0}")]
    InvalidChunkOptions(String),

    /// A completion request failed
    #[error("{stage} stage completion failed: {source}")]
    Completion {
        /// Stage the request belonged to
        stage: SummaryStage,
        /// Underlying model error
        #[source]
        source: CompletionError,
    },

    /// Error during semaphore acquisition
    #[error("Semaphore acquisition error: {0}")]
    Semaphore(String),

    /// Error during task joining
    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl ProcessError {
    pub(crate) fn completion(stage: SummaryStage) -> impl FnOnce(CompletionError) -> Self {
        move |source| ProcessError::Completion { stage, source }
    }
}

impl From<tokio::sync::AcquireError> for ProcessError {
    fn from(err: tokio::sync::AcquireError) -> Self {
        Self::Semaphore(format!("Failed to acquire semaphore: {}", err))
    }
}

impl From<tokio::task::JoinError> for ProcessError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::TaskJoin(format!("Failed to join task: {}", err))
    }
}
