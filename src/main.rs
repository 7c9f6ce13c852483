//! # sitebrief CLI
//!
//! Crawls the internal pages linked from a company's home page and prints a
//! structured profile of the company.
//!
//! ## Features
//!
//! - Gemini or OpenAI models, key taken from `GEMINI_API_KEY` / `OPENAI_API_KEY`
//! - `map_reduce`, `stuff` and `refine` summarization strategies
//! - Progress spinner on stderr, results on stdout
//! - Both JSON and text output formats
//! - Optional OTLP telemetry
//!
//! Exit codes: 0 on success, 2 for network or provider failures, 3 when the
//! model output does not match the profile schema, 4 when the site yields no
//! text to summarize and 1 for anything else.

mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use sitebrief::crawler::{CrawlerConfig, DEFAULT_MAX_LINKS, HttpFetcher};
use sitebrief::model::{Client, Completer, ModelConfig, Provider};
use sitebrief::pipeline::{PipelineConfig, PipelineEvent, ProfileReport, profile_website};
use sitebrief::processor::{ProcessorConfig, SummaryStrategy};
use tokio::sync::mpsc;
use tracing::{error, instrument};
use url::Url;

const RULE: &str = "-----------------------------------------------------";

#[derive(Parser, Debug)]
#[command(author, version, about = "Summarize a company website into a structured profile", long_about = None)]
struct Cli {
    /// Home page of the website to profile
    #[arg(required = true)]
    url: String,

    /// Model provider (gemini|openai)
    #[arg(long, default_value = "gemini")]
    provider: Provider,

    /// Model name (default: gemini-2.0-flash or gpt-3.5-turbo)
    #[arg(short, long)]
    model: Option<String>,

    /// Sampling temperature
    #[arg(long, default_value = "0.1")]
    temperature: f64,

    /// Maximum tokens per model response
    #[arg(long, default_value = "4000")]
    max_tokens: u64,

    /// Summarization strategy (map_reduce|stuff|refine)
    #[arg(short, long, default_value = "map_reduce")]
    strategy: SummaryStrategy,

    /// Chunk size in characters
    #[arg(long, default_value = "6000")]
    chunk_size: usize,

    /// Chunk overlap in characters
    #[arg(long, default_value = "1000")]
    chunk_overlap: usize,

    /// Maximum number of links to follow from the home page
    #[arg(short = 'l', long, default_value_t = DEFAULT_MAX_LINKS)]
    max_links: usize,

    /// Number of concurrent page fetches and model requests
    #[arg(short, long, default_value = "5")]
    concurrency: usize,

    /// Output format (text|json)
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Summarize whatever is available when the home page cannot be fetched
    #[arg(long)]
    continue_on_seed_failure: bool,

    /// Export traces and metrics over OTLP
    #[arg(long)]
    otel: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let _otel = match telemetry::init_tracing_subscriber(cli.otel) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(report_failure(&e)),
    }
}

/// Print the diagnostic for a failed run and return its exit code
fn report_failure(err: &anyhow::Error) -> u8 {
    let Some(err) = err.downcast_ref::<sitebrief::Error>() else {
        eprintln!("error: {:#}", err);
        return 1;
    };

    if err.is_nothing_to_summarize() {
        eprintln!("No text to summarize");
    } else {
        error!(stage = %err.stage(), "{}", err);
        eprintln!("error in {} stage: {}", err.stage(), err);
    }
    err.exit_code()
}

#[instrument(skip(cli), fields(url = %cli.url))]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let seed = Url::parse(&cli.url).with_context(|| format!("Invalid URL '{}'", cli.url))?;

    let config = PipelineConfig {
        crawler: CrawlerConfig::builder()
            .max_links(cli.max_links)
            .concurrency(cli.concurrency)
            .build(),
        processor: ProcessorConfig::builder()
            .chunk_size(cli.chunk_size)
            .chunk_overlap(cli.chunk_overlap)
            .strategy(cli.strategy)
            .concurrency(cli.concurrency)
            .build(),
        continue_on_seed_failure: cli.continue_on_seed_failure,
    };

    let model_config = ModelConfig {
        provider: cli.provider,
        model_name: cli.model.clone(),
        temperature: cli.temperature,
        max_output_tokens: cli.max_tokens,
        ..ModelConfig::default()
    };
    let api_key = std::env::var(cli.provider.api_key_var()).with_context(|| {
        format!(
            "{} environment variable must be set",
            cli.provider.api_key_var()
        )
    })?;

    let fetcher = Arc::new(HttpFetcher::new(&config.crawler).map_err(sitebrief::Error::from)?);

    // JSON output carries the links in the final document instead
    let show_links = cli.format != "json";
    let report = match cli.provider {
        Provider::Gemini => {
            let client = Client::new_gemini(&api_key, model_config);
            profile_with_progress(fetcher, client, &seed, &config, show_links).await?
        }
        Provider::OpenAi => {
            let client = Client::new_openai(&api_key, model_config);
            profile_with_progress(fetcher, client, &seed, &config, show_links).await?
        }
    };

    match cli.format.as_str() {
        "json" => print_json(&report)?,
        _ => print_text(&report),
    }
    Ok(())
}

/// Run the pipeline while a spinner shows the current stage
///
/// With `show_links` the collected links are printed as soon as they are
/// known, so they are visible even when a later stage fails.
async fn profile_with_progress<C>(
    fetcher: Arc<HttpFetcher>,
    completer: C,
    seed: &Url,
    config: &PipelineConfig,
    show_links: bool,
) -> anyhow::Result<ProfileReport>
where
    C: Completer + 'static,
{
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner} [{elapsed_precise}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));

    let (progress_sender, mut progress_receiver) = mpsc::channel::<PipelineEvent>(100);
    let progress_handle = tokio::spawn({
        let spinner = spinner.clone();
        async move {
            while let Some(event) = progress_receiver.recv().await {
                if let PipelineEvent::LinksCollected { links } = &event {
                    if show_links {
                        spinner.suspend(|| print!("{}", format_links(links)));
                    }
                }
                spinner.set_message(event.to_string());
            }
        }
    });

    let result = profile_website(fetcher, completer, seed, config, Some(progress_sender)).await;

    // Ends once the pipeline has dropped its sender
    let _ = progress_handle.await;
    spinner.finish_and_clear();

    Ok(result?)
}

fn format_links(links: &[Url]) -> String {
    let mut out = String::from("Links:\n");
    if links.is_empty() {
        out.push_str("  (none found)\n");
    }
    for link in links {
        out.push_str(&format!("  {}\n", link));
    }
    out
}

fn print_text(report: &ProfileReport) {
    let profile = &report.profile;

    println!("{}", RULE);
    println!("{}", profile.title);

    println!("{}", RULE);
    println!("Company: {}", profile.company_name);
    if let Some(industry) = &profile.industry {
        println!("Industry: {}", industry);
    }
    println!("Summary: {}", profile.summary);
    if let Some(value_proposition) = &profile.value_proposition {
        println!("Value proposition: {}", value_proposition);
    }
    if !profile.competition.is_empty() {
        println!("Competition:");
        for competitor in &profile.competition {
            println!("  - {}", competitor);
        }
    }

    println!("{}", RULE);
    println!("Employees:");
    if profile.employees.is_empty() {
        println!("  (none found)");
    }
    for employee in &profile.employees {
        let details: Vec<&str> = [&employee.title, &employee.position, &employee.location]
            .into_iter()
            .filter_map(|field| field.as_deref())
            .collect();
        if details.is_empty() {
            println!("  - {}", employee.name);
        } else {
            println!("  - {} ({})", employee.name, details.join(", "));
        }
    }
}

fn print_json(report: &ProfileReport) -> anyhow::Result<()> {
    let json_response = serde_json::json!({
        "links": report.links.iter().map(|link| link.as_str()).collect::<Vec<_>>(),
        "pages_with_text": report.pages_with_text,
        "pages_failed": report.pages_failed,
        "corpus_chars": report.corpus_chars,
        "chunks": report.chunk_count,
        "profile": report.profile,
    });
    println!("{}", serde_json::to_string_pretty(&json_response)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["sitebrief", "https://example.com"]).unwrap();

        assert_eq!(cli.url, "https://example.com");
        assert_eq!(cli.provider, Provider::Gemini);
        assert_eq!(cli.strategy, SummaryStrategy::MapReduce);
        assert_eq!(cli.max_links, DEFAULT_MAX_LINKS);
        assert_eq!(cli.chunk_size, 6000);
        assert_eq!(cli.chunk_overlap, 1000);
        assert_eq!(cli.format, "text");
        assert!(!cli.continue_on_seed_failure);
    }

    #[test]
    fn test_cli_rejects_unknown_format() {
        let result = Cli::try_parse_from(["sitebrief", "https://example.com", "--format", "xml"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_links() {
        let links = vec![
            Url::parse("https://example.com/about").unwrap(),
            Url::parse("https://example.com/team").unwrap(),
        ];

        assert_eq!(
            format_links(&links),
            "Links:\n  https://example.com/about\n  https://example.com/team\n"
        );
        assert_eq!(format_links(&[]), "Links:\n  (none found)\n");
    }

    #[test]
    fn test_report_failure_for_non_pipeline_error() {
        let err = anyhow::anyhow!("GEMINI_API_KEY environment variable must be set");
        assert_eq!(report_failure(&err), 1);
    }

    #[test]
    fn test_report_failure_for_pipeline_errors() {
        let err = anyhow::Error::from(sitebrief::Error::from(
            sitebrief::profile::MalformedOutputError::NotAnObject,
        ));
        assert_eq!(report_failure(&err), 3);
    }
}
