//! # sitebrief - Structured Company Profiles from Websites
//!
//! This crate crawls the internal pages linked from a website's home page,
//! aggregates their visible text and asks a large language model for a
//! structured company profile through a chunked map/reduce summarization
//! pipeline. The model output is only accepted once it validates against the
//! profile schema.
//!
//! ## Features
//!
//! - Same-site link discovery with normalization, deduplication and a link cap
//! - Concurrent page fetching that tolerates individual page failures
//! - Boundary-seeking, overlapping, UTF-8 safe text chunking
//! - `map_reduce`, `stuff` and `refine` summarization strategies
//! - Rate-limited Gemini and OpenAI completion with automatic retries
//! - Strict validation of the returned profile
//! - Async API with Tokio
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use sitebrief::crawler::HttpFetcher;
//! use sitebrief::model::{Client, ModelConfig};
//! use sitebrief::pipeline::{PipelineConfig, profile_website};
//! use url::Url;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::default();
//!     let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
//!     let client = Client::new_gemini("your-api-key", ModelConfig::default());
//!
//!     let seed = Url::parse("https://example.com/")?;
//!     let report = profile_website(fetcher, client, &seed, &config, None).await?;
//!
//!     println!("{}: {}", report.profile.company_name, report.profile.summary);
//!     Ok(())
//! }
//! ```

mod error;
pub mod model;

pub mod crawler;
pub mod pipeline;
pub mod processor;
pub mod profile;

pub use error::{Error, Result, Stage};

/// Re-export of types module for public use
pub mod prelude {
    pub use crate::crawler::{CrawlerConfig, Fetcher, HttpFetcher};
    pub use crate::error::{Error, Result, Stage};
    pub use crate::model::{Client, Completer, ModelConfig, Provider};
    pub use crate::pipeline::{PipelineConfig, PipelineEvent, ProfileReport, profile_website};
    pub use crate::processor::{ProcessorConfig, SummaryStrategy};
    pub use crate::profile::{CompanyProfile, Employee};
}
