//! # Site Profiling Pipeline
//!
//! Runs the stages in order: link collection, page aggregation, chunking,
//! summarization and validation. Each stage fully builds its output before
//! the next one starts.
//!
//! Progress is reported as `PipelineEvent`s over an optional channel so a
//! caller can render it without the pipeline knowing about terminals.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc::Sender;
use tracing::{info, instrument, warn};
use url::Url;

use crate::crawler::{CrawlerConfig, Fetcher, LinkSet, aggregate, collect_links};
use crate::error::Result;
use crate::model::Completer;
use crate::processor::{ProcessorConfig, Summarizer, SummaryStrategy, chunk_corpus};
use crate::profile::{CompanyProfile, validate};

/// Configuration for a full pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// Link collection and page aggregation settings
    pub crawler: CrawlerConfig,

    /// Chunking and summarization settings
    pub processor: ProcessorConfig,

    /// Keep going with an empty link set when the seed page cannot be fetched
    pub continue_on_seed_failure: bool,
}

/// Progress notifications emitted while the pipeline runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// Fetching the seed page
    CollectingLinks { seed: String },
    /// The seed page failed and the run continues without links
    SeedFailed { error: String },
    /// Links collected from the seed page, in the order they will be fetched
    LinksCollected { links: Vec<Url> },
    /// Fetching and extracting the linked pages
    Aggregating { pages: usize },
    /// Corpus built
    Aggregated {
        pages_with_text: usize,
        pages_failed: usize,
        chars: usize,
    },
    /// Corpus split into chunks
    Chunked { chunks: usize },
    /// Model requests in flight
    Summarizing { strategy: SummaryStrategy },
    /// Checking the model output
    Validating,
    /// Profile accepted
    Finished,
}

impl fmt::Display for PipelineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineEvent::CollectingLinks { seed } => write!(f, "Collecting links from {}", seed),
            PipelineEvent::SeedFailed { error } => write!(f, "Seed page failed: {}", error),
            PipelineEvent::LinksCollected { links } => {
                write!(f, "Collected {} links", links.len())
            }
            PipelineEvent::Aggregating { pages } => write!(f, "Fetching {} pages", pages),
            PipelineEvent::Aggregated {
                pages_with_text,
                pages_failed,
                chars,
            } => write!(
                f,
                "Aggregated {} characters from {} pages ({} failed)",
                chars, pages_with_text, pages_failed
            ),
            PipelineEvent::Chunked { chunks } => write!(f, "Split corpus into {} chunks", chunks),
            PipelineEvent::Summarizing { strategy } => {
                write!(f, "Summarizing with the {} strategy", strategy)
            }
            PipelineEvent::Validating => f.write_str("Validating profile"),
            PipelineEvent::Finished => f.write_str("Done"),
        }
    }
}

/// Everything a run produced
#[derive(Debug, Clone)]
pub struct ProfileReport {
    /// Links the corpus was built from
    pub links: LinkSet,

    /// Pages that contributed text
    pub pages_with_text: usize,

    /// Pages whose fetch or extraction failed
    pub pages_failed: usize,

    /// Corpus length in characters
    pub corpus_chars: usize,

    /// Number of chunks summarized
    pub chunk_count: usize,

    /// The validated profile
    pub profile: CompanyProfile,
}

async fn emit(events: &Option<Sender<PipelineEvent>>, event: PipelineEvent) {
    if let Some(sender) = events {
        // A closed receiver only means nobody is watching
        let _ = sender.send(event).await;
    }
}

/// Crawl a website and summarize it into a validated `CompanyProfile`
///
/// # Arguments
///
/// * `fetcher` - Source of page bodies
/// * `completer` - Language model used by the summarizer
/// * `seed` - The page links are collected from
/// * `config` - Pipeline configuration
/// * `events` - Optional progress channel
///
/// # Returns
///
/// The report for the run, or the error of the first stage that failed
#[instrument(skip_all, fields(seed = %seed, strategy = %config.processor.strategy))]
pub async fn profile_website<F, C>(
    fetcher: Arc<F>,
    completer: C,
    seed: &Url,
    config: &PipelineConfig,
    events: Option<Sender<PipelineEvent>>,
) -> Result<ProfileReport>
where
    F: Fetcher + 'static,
    C: Completer + 'static,
{
    emit(
        &events,
        PipelineEvent::CollectingLinks {
            seed: seed.to_string(),
        },
    )
    .await;
    let links = match collect_links(fetcher.as_ref(), seed, &config.crawler).await {
        Ok(links) => links,
        Err(e) if config.continue_on_seed_failure => {
            warn!("Error fetching {}: {}", seed, e);
            emit(
                &events,
                PipelineEvent::SeedFailed {
                    error: e.to_string(),
                },
            )
            .await;
            LinkSet::empty(seed.clone())
        }
        Err(e) => return Err(e.into()),
    };
    emit(
        &events,
        PipelineEvent::LinksCollected {
            links: links.iter().cloned().collect(),
        },
    )
    .await;

    emit(&events, PipelineEvent::Aggregating { pages: links.len() }).await;
    let corpus = aggregate(fetcher, &links, &config.crawler).await;
    emit(
        &events,
        PipelineEvent::Aggregated {
            pages_with_text: corpus.pages_with_text,
            pages_failed: corpus.pages_failed,
            chars: corpus.char_len(),
        },
    )
    .await;

    let chunks = chunk_corpus(corpus.as_str(), &config.processor)?;
    emit(&events, PipelineEvent::Chunked { chunks: chunks.len() }).await;

    emit(
        &events,
        PipelineEvent::Summarizing {
            strategy: config.processor.strategy,
        },
    )
    .await;
    let summarizer = Summarizer::new(completer, config.processor.clone());
    let raw = summarizer.summarize_chunks(&chunks).await?;

    emit(&events, PipelineEvent::Validating).await;
    let profile = validate(&raw)?;
    emit(&events, PipelineEvent::Finished).await;

    info!(
        company = %profile.company_name,
        links = links.len(),
        chunks = chunks.len(),
        "Profile complete"
    );

    Ok(ProfileReport {
        pages_with_text: corpus.pages_with_text,
        pages_failed: corpus.pages_failed,
        corpus_chars: corpus.char_len(),
        chunk_count: chunks.len(),
        links,
        profile,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::HttpFetcher;
    use crate::error::{Error, Stage};
    use crate::model::mock_model::ScriptedCompleter;
    use crate::processor::SummaryStage;
    use mockito::{Server, ServerGuard};
    use rig::completion::CompletionError;
    use tokio::sync::mpsc;

    const PROFILE_JSON: &str = r#"{
        "title": "Acme Rockets",
        "summary": "Acme builds reusable rockets.",
        "company_name": "Acme",
        "industry": "Aerospace",
        "employees": [],
        "value_proposition": "Affordable launches",
        "competition": ["Rocket Lab"]
    }"#;

    fn is_map(prompt: &str) -> bool {
        prompt.starts_with("Summarize the following text")
    }

    fn is_combine(prompt: &str) -> bool {
        prompt.starts_with("Generate a summary")
    }

    fn profile_completer(reduce_output: &'static str) -> ScriptedCompleter {
        ScriptedCompleter::new(move |prompt| {
            if is_map(prompt) {
                Ok("Acme builds reusable rockets for small satellites.".to_string())
            } else {
                Ok(reduce_output.to_string())
            }
        })
    }

    async fn site(server: &mut ServerGuard) -> Vec<mockito::Mock> {
        let seed_html = r#"<html><body>
            <nav>
              <a href="/about">About</a>
              <a href="/team#leadership">Team</a>
              <a href="/contact?ref=nav">Contact</a>
              <a href="https://other.example.org/partner">Partner</a>
              <a href="/about">About again</a>
            </nav>
        </body></html>"#;
        let pages = [
            ("/about", "<h1>About</h1><p>Acme builds reusable rockets for small satellites.</p>"),
            ("/team", "<h1>Team</h1><p>Our engineers have flown forty missions.</p>"),
            ("/contact", "<h1>Contact</h1><p>Write to hello at acme dot example.</p>"),
        ];

        let mut mocks = vec![
            server
                .mock("GET", "/")
                .with_status(200)
                .with_body(seed_html)
                .expect(1)
                .create_async()
                .await,
        ];
        for (path, body) in pages {
            mocks.push(
                server
                    .mock("GET", path)
                    .with_status(200)
                    .with_body(format!("<html><body>{}</body></html>", body))
                    .expect(1)
                    .create_async()
                    .await,
            );
        }
        mocks
    }

    fn small_chunk_config() -> PipelineConfig {
        PipelineConfig {
            processor: ProcessorConfig::builder()
                .chunk_size(60)
                .chunk_overlap(10)
                .build(),
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_profile_website_end_to_end() {
        let mut server = Server::new_async().await;
        let mocks = site(&mut server).await;
        let config = small_chunk_config();
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
        let completer = profile_completer(PROFILE_JSON);
        let seed = Url::parse(&format!("{}/", server.url())).unwrap();

        let report = profile_website(fetcher, completer.clone(), &seed, &config, None)
            .await
            .unwrap();

        assert_eq!(report.links.len(), 3);
        assert!(!report.links.iter().any(|l| l.host_str() == Some("other.example.org")));
        assert_eq!(report.pages_with_text, 3);
        assert_eq!(report.pages_failed, 0);
        assert!(report.chunk_count > 1);

        let prompts = completer.prompts().await;
        let map_calls = prompts.iter().filter(|p| is_map(p)).count();
        let reduce_calls = prompts.iter().filter(|p| is_combine(p)).count();
        assert_eq!(map_calls, report.chunk_count);
        assert_eq!(reduce_calls, 1);

        assert_eq!(report.profile.company_name, "Acme");
        assert!(report.profile.employees.is_empty());
        assert_eq!(report.profile.competition, vec!["Rocket Lab"]);

        for mock in mocks {
            mock.assert_async().await;
        }
    }

    #[tokio::test]
    async fn test_profile_website_emits_events_in_order() {
        let mut server = Server::new_async().await;
        let _mocks = site(&mut server).await;
        let config = PipelineConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
        let seed = Url::parse(&format!("{}/", server.url())).unwrap();
        let (tx, mut rx) = mpsc::channel::<PipelineEvent>(32);

        profile_website(fetcher, profile_completer(PROFILE_JSON), &seed, &config, Some(tx))
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert!(matches!(events.first(), Some(PipelineEvent::CollectingLinks { .. })));
        let collected = events.iter().find_map(|event| match event {
            PipelineEvent::LinksCollected { links } => Some(links),
            _ => None,
        });
        let paths: Vec<&str> = collected.unwrap().iter().map(|l| l.path()).collect();
        assert_eq!(paths, vec!["/about", "/team", "/contact"]);
        assert!(events.contains(&PipelineEvent::Chunked { chunks: 1 }));
        assert_eq!(events.last(), Some(&PipelineEvent::Finished));
    }

    #[tokio::test]
    async fn test_seed_failure_aborts_by_default() {
        let mut server = Server::new_async().await;
        let _seed = server
            .mock("GET", "/")
            .with_status(503)
            .create_async()
            .await;
        let config = PipelineConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
        let completer = profile_completer(PROFILE_JSON);
        let seed = Url::parse(&format!("{}/", server.url())).unwrap();

        let err = profile_website(fetcher, completer.clone(), &seed, &config, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Crawl(_)));
        assert_eq!(err.stage(), Stage::LinkCollection);
        assert!(err.is_transient());
        assert_eq!(completer.calls().await, 0);
    }

    #[tokio::test]
    async fn test_seed_failure_can_continue_to_nothing_to_summarize() {
        let mut server = Server::new_async().await;
        let _seed = server
            .mock("GET", "/")
            .with_status(404)
            .create_async()
            .await;
        let config = PipelineConfig {
            continue_on_seed_failure: true,
            ..PipelineConfig::default()
        };
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
        let completer = profile_completer(PROFILE_JSON);
        let seed = Url::parse(&format!("{}/", server.url())).unwrap();

        let err = profile_website(fetcher, completer.clone(), &seed, &config, None)
            .await
            .unwrap_err();

        assert!(err.is_nothing_to_summarize());
        assert_eq!(err.stage(), Stage::Chunking);
        assert_eq!(completer.calls().await, 0);
    }

    #[tokio::test]
    async fn test_malformed_model_output_is_a_validation_failure() {
        let mut server = Server::new_async().await;
        let _mocks = site(&mut server).await;
        let config = PipelineConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
        let completer = profile_completer(r#"{"title": "Acme", "summary": "Rockets"}"#);
        let seed = Url::parse(&format!("{}/", server.url())).unwrap();

        let err = profile_website(fetcher, completer, &seed, &config, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MalformedOutput(_)));
        assert_eq!(err.stage(), Stage::Validation);
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_reduce_failure_names_its_stage() {
        let mut server = Server::new_async().await;
        let _mocks = site(&mut server).await;
        let config = PipelineConfig::default();
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler).unwrap());
        let completer = ScriptedCompleter::new(|prompt| {
            if is_map(prompt) {
                Ok("partial".to_string())
            } else {
                Err(CompletionError::ProviderError("503 overloaded".to_string()))
            }
        });
        let seed = Url::parse(&format!("{}/", server.url())).unwrap();

        let err = profile_website(fetcher, completer, &seed, &config, None)
            .await
            .unwrap_err();

        assert_eq!(err.stage(), Stage::Summarization(SummaryStage::Reduce));
        assert!(err.is_transient());
    }
}
