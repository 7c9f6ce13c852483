//! HTTP fetching for the crawler module
//!
//! The crawler only needs the body of a page, so fetching sits behind the
//! small [`Fetcher`] trait. [`HttpFetcher`] is the `reqwest` implementation
//! used by the CLI; tests substitute their own.

use std::future::Future;

use reqwest::Client as ReqwestClient;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::crawler::CrawlerConfig;
use crate::crawler::error::CrawlError;

/// Source of raw page bodies
pub trait Fetcher: Send + Sync {
    /// Fetch the body of `url`, failing on transport errors and non-2xx statuses
    fn fetch(&self, url: &Url) -> impl Future<Output = Result<String, CrawlError>> + Send;
}

/// Fetcher backed by a `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: ReqwestClient,
}

impl HttpFetcher {
    /// Create a fetcher using the timeout and user agent from `config`
    pub fn new(config: &CrawlerConfig) -> Result<Self, CrawlError> {
        let client = ReqwestClient::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Fetcher for HttpFetcher {
    #[instrument(skip(self, url), fields(url = %url), level = "debug")]
    async fn fetch(&self, url: &Url) -> Result<String, CrawlError> {
        debug!("Sending GET request");
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            warn!("{} returned {}", url, status);
            return Err(CrawlError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Fetched {} bytes", body.len());
        Ok(body)
    }
}
