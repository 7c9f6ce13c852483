//! # Crawler Configuration Module
//!
//! Configuration for link collection and page aggregation. It uses the same
//! builder pattern as the processor configuration.
//!
//! ## Key Components
//!
//! - `CrawlerConfig`: The main configuration struct with crawler parameters
//! - `CrawlerConfigBuilder`: Builder pattern implementation for easier configuration
//!
//! ## Features
//!
//! - First-N link cap for the seed page (9 links by default)
//! - Bounded concurrency for page fetches
//! - Per-request timeout and user-agent customization
//! - Exclusion selectors for markup that never carries visible text

use std::time::Duration;

/// Default number of links collected from the seed page
pub const DEFAULT_MAX_LINKS: usize = 9;

/// Configuration for the crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Maximum number of unique links collected from the seed page
    pub max_links: usize,

    /// Maximum number of pages fetched at the same time
    pub concurrency: usize,

    /// Timeout for a single HTTP request in milliseconds
    pub timeout_ms: u64,

    /// User agent to use for requests
    pub user_agent: String,

    /// CSS selectors for elements whose text is dropped during extraction
    pub exclude_selectors: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_links: DEFAULT_MAX_LINKS,
            concurrency: 4,
            timeout_ms: 30_000,
            user_agent: format!("sitebrief/{}", env!("CARGO_PKG_VERSION")),
            exclude_selectors: vec![
                "script".to_string(),
                "style".to_string(),
                "noscript".to_string(),
                "template".to_string(),
                "svg".to_string(),
            ],
        }
    }
}

/// Builder for CrawlerConfig
#[derive(Debug, Default)]
pub struct CrawlerConfigBuilder {
    config: CrawlerConfig,
}

impl CrawlerConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: CrawlerConfig::default(),
        }
    }

    /// Set the maximum number of links to collect
    pub fn max_links(mut self, max_links: usize) -> Self {
        self.config.max_links = max_links;
        self
    }

    /// Set the number of concurrent page fetches
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the request timeout in milliseconds
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.timeout_ms = timeout_ms;
        self
    }

    /// Set the user agent to use for requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the CSS selectors for elements to exclude
    pub fn exclude_selectors(mut self, exclude_selectors: Vec<String>) -> Self {
        self.config.exclude_selectors = exclude_selectors;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CrawlerConfig {
        self.config
    }
}

impl CrawlerConfig {
    /// Create a new builder
    pub fn builder() -> CrawlerConfigBuilder {
        CrawlerConfigBuilder::new()
    }

    /// Get the request timeout as a Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CrawlerConfig::default();
        assert_eq!(config.max_links, 9);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.user_agent.starts_with("sitebrief/"));
        assert!(config.exclude_selectors.contains(&"script".to_string()));
    }

    #[test]
    fn test_builder() {
        let config = CrawlerConfig::builder()
            .max_links(3)
            .concurrency(2)
            .timeout_ms(1500)
            .user_agent("test-agent")
            .exclude_selectors(vec!["nav".to_string()])
            .build();

        assert_eq!(config.max_links, 3);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.timeout(), Duration::from_millis(1500));
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.exclude_selectors, vec!["nav".to_string()]);
    }
}
