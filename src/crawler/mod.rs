//! # Website Crawler Module
//!
//! This module gathers the raw material for a site profile. It is the first
//! stage of the pipeline: it reads the seed page, picks the same-site links
//! on it, and turns those pages into one plain-text corpus.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: Link cap, concurrency, timeout and extraction settings
//! - `Fetcher` / `HttpFetcher`: Page fetching seam and its `reqwest` implementation
//! - `collect_links`: First-N, deduplicated, same-site link discovery
//! - `aggregate`: Concurrent page fetch and text extraction into a `Corpus`
//!
//! ## Features
//!
//! - URL normalization (query and fragment stripped) and deduplication
//! - Registrable-domain filtering, subdomains included
//! - Per-page failures are logged and skipped, never fatal
//! - Page order in the corpus follows link order regardless of fetch timing
//!
//! ## Usage
//!
//! The corpus produced here feeds the processor module, which chunks and
//! summarizes it.

mod aggregate;
mod config;
mod content_extraction;
mod error;
mod fetch;
mod links;

pub use aggregate::{Corpus, aggregate, fetch_page_text};
pub use config::{CrawlerConfig, CrawlerConfigBuilder, DEFAULT_MAX_LINKS};
pub use content_extraction::{extract_hrefs, extract_text};
pub use error::CrawlError;
pub use fetch::{Fetcher, HttpFetcher};
pub use links::{LinkSet, collect_links, normalize_url, registrable_domain};
