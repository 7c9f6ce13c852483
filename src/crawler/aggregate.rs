//! Page aggregation: fetch every collected link and join the page texts

use std::sync::Arc;

use futures::future;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::crawler::content_extraction::extract_text;
use crate::crawler::error::CrawlError;
use crate::crawler::fetch::Fetcher;
use crate::crawler::{CrawlerConfig, LinkSet};

/// The concatenated text of every page that produced any
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    /// Page texts joined by single spaces, in link order
    pub text: String,

    /// Number of pages that contributed text
    pub pages_with_text: usize,

    /// Number of pages whose fetch or extraction failed
    pub pages_failed: usize,
}

impl Corpus {
    /// Length of the corpus in characters
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// The corpus text
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

/// Fetch one page and extract its visible text
#[instrument(skip(fetcher, config), fields(url = %url))]
pub async fn fetch_page_text<F: Fetcher>(
    fetcher: &F,
    url: &Url,
    config: &CrawlerConfig,
) -> Result<String, CrawlError> {
    let html = fetcher.fetch(url).await?;
    let text = extract_text(&html, &config.exclude_selectors)?;
    debug!("Extracted {} characters", text.len());
    Ok(text)
}

/// Fetch every link and concatenate the extracted texts
///
/// Pages are fetched concurrently, bounded by `config.concurrency`. A page
/// that fails for any reason is logged and contributes no text; the
/// aggregation itself never fails.
///
/// # Arguments
///
/// * `fetcher` - Source of page bodies
/// * `links` - The links to aggregate
/// * `config` - The crawler configuration
///
/// # Returns
///
/// The aggregated corpus
#[instrument(skip_all, fields(links = links.len()))]
pub async fn aggregate<F>(fetcher: Arc<F>, links: &LinkSet, config: &CrawlerConfig) -> Corpus
where
    F: Fetcher + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));

    let tasks = links
        .iter()
        .map(|url| {
            let permit = semaphore.clone().acquire_owned();
            let fetcher = fetcher.clone();
            let url = url.clone();
            let config = config.clone();

            tokio::spawn(async move {
                let _permit = permit.await?;
                Ok::<_, AggregateTaskError>(fetch_page_text(fetcher.as_ref(), &url, &config).await?)
            })
        })
        .collect::<Vec<_>>();

    let results = future::join_all(tasks).await;

    let mut corpus = Corpus::default();
    let mut texts = Vec::with_capacity(results.len());
    for (url, result) in links.iter().zip(results) {
        match result {
            Ok(Ok(text)) if !text.trim().is_empty() => {
                corpus.pages_with_text += 1;
                texts.push(text);
            }
            Ok(Ok(_)) => debug!("No text extracted from {}", url),
            Ok(Err(e)) => {
                warn!("Error fetching or parsing {}: {}", url, e);
                corpus.pages_failed += 1;
            }
            Err(e) => {
                warn!("Page task for {} failed: {}", url, e);
                corpus.pages_failed += 1;
            }
        }
    }
    corpus.text = texts.join(" ");

    info!(
        "Aggregated {} characters from {} pages ({} failed)",
        corpus.text.len(),
        corpus.pages_with_text,
        corpus.pages_failed
    );
    corpus
}

/// Failure inside a single page task
#[derive(Debug, thiserror::Error)]
enum AggregateTaskError {
    #[error(transparent)]
    Crawl(#[from] CrawlError),

    #[error("Semaphore acquisition error: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::collect_links;
    use crate::crawler::fetch::HttpFetcher;
    use mockito::Server;

    #[tokio::test]
    async fn test_aggregate_tolerates_failures_and_keeps_order() {
        let mut server = Server::new_async().await;
        let base = server.url();

        let seed_html = r#"<html><body>
            <a href="/one">1</a>
            <a href="/broken">2</a>
            <a href="/two">3</a>
            <a href="/empty">4</a>
        </body></html>"#;
        let _seed = server
            .mock("GET", "/")
            .with_status(200)
            .with_body(seed_html)
            .create_async()
            .await;
        let one = server
            .mock("GET", "/one")
            .with_status(200)
            .with_body("<p>First page</p>")
            .expect(1)
            .create_async()
            .await;
        let broken = server
            .mock("GET", "/broken")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;
        let two = server
            .mock("GET", "/two")
            .with_status(200)
            .with_body("<p>Second page</p>")
            .expect(1)
            .create_async()
            .await;
        let empty = server
            .mock("GET", "/empty")
            .with_status(200)
            .with_body("<script>only()</script>")
            .expect(1)
            .create_async()
            .await;

        let config = CrawlerConfig::builder().concurrency(2).build();
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        let seed = Url::parse(&format!("{}/", base)).unwrap();
        let links = collect_links(fetcher.as_ref(), &seed, &config).await.unwrap();
        assert_eq!(links.len(), 4);

        let corpus = aggregate(fetcher, &links, &config).await;

        assert_eq!(corpus.text, "First page Second page");
        assert_eq!(corpus.pages_with_text, 2);
        assert_eq!(corpus.pages_failed, 1);
        one.assert_async().await;
        broken.assert_async().await;
        two.assert_async().await;
        empty.assert_async().await;
    }

    #[tokio::test]
    async fn test_aggregate_empty_link_set() {
        let config = CrawlerConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
        let links = LinkSet::empty(Url::parse("https://example.com/").unwrap());

        let corpus = aggregate(fetcher, &links, &config).await;

        assert_eq!(corpus, Corpus::default());
        assert_eq!(corpus.char_len(), 0);
    }
}
