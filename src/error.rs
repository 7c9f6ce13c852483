//! Error types for the sitebrief crate

use std::fmt;

use thiserror::Error;

use crate::crawler::CrawlError;
use crate::processor::{ProcessError, SummaryStage};
use crate::profile::MalformedOutputError;

/// Result type for sitebrief operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Fetching the seed page and collecting its links
    LinkCollection,
    /// Splitting the corpus into chunks
    Chunking,
    /// One of the model-backed summarization passes
    Summarization(SummaryStage),
    /// Validating the reduced output against the profile schema
    Validation,
    /// Anything that is not tied to a single stage
    Internal,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::LinkCollection => f.write_str("link-collection"),
            Stage::Chunking => f.write_str("chunking"),
            Stage::Summarization(stage) => write!(f, "{}", stage),
            Stage::Validation => f.write_str("validation"),
            Stage::Internal => f.write_str("internal"),
        }
    }
}

/// Error type for sitebrief operations
#[derive(Debug, Error)]
pub enum Error {
    /// The seed page could not be fetched or parsed
    #[error("Crawl error: {0}")]
    Crawl(#[from] CrawlError),

    /// Chunking or summarization failed
    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    /// The model produced output that does not match the profile schema
    #[error("Malformed model output: {0}")]
    MalformedOutput(#[from] MalformedOutputError),
}

impl Error {
    /// The stage of the pipeline that failed
    pub fn stage(&self) -> Stage {
        match self {
            Error::Crawl(_) => Stage::LinkCollection,
            Error::Process(err) => match err {
                ProcessError::CorpusTooShort { .. } | ProcessError::InvalidChunkOptions(_) => {
                    Stage::Chunking
                }
                ProcessError::Completion { stage, .. } => Stage::Summarization(*stage),
                ProcessError::Semaphore(_) | ProcessError::TaskJoin(_) => Stage::Internal,
            },
            Error::MalformedOutput(_) => Stage::Validation,
        }
    }

    /// Whether the failure came from the network or the model provider and
    /// may succeed on a later run, as opposed to a structural problem with
    /// the input or the model output
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Crawl(err) => err.is_transport(),
            Error::Process(ProcessError::Completion { source, .. }) => {
                crate::model::is_transient(source)
            }
            _ => false,
        }
    }

    /// Whether the run stopped because there was no text to summarize
    pub fn is_nothing_to_summarize(&self) -> bool {
        matches!(self, Error::Process(ProcessError::CorpusTooShort { .. }))
    }

    /// Process exit code for a run that failed with this error
    ///
    /// 4 when there was nothing to summarize, 2 for network or provider
    /// failures, 3 for model output that does not match the profile schema
    /// and 1 for anything else.
    pub fn exit_code(&self) -> u8 {
        if self.is_nothing_to_summarize() {
            4
        } else if self.is_transient() {
            2
        } else if matches!(self, Error::MalformedOutput(_)) {
            3
        } else {
            1
        }
    }
}
