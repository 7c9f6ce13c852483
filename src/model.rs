//! # LLM Client Module
//!
//! This module provides the completion client used by the summarizer, with
//! built-in rate limiting to prevent API quota exhaustion and retries for
//! transient provider failures.
//!
//! ## Key Components
//!
//! - `Completer`: The `complete(prompt) -> text` seam the summarizer depends on
//! - `Client`: A `Completer` over any `rig` completion model
//! - `ModelConfig`: Provider, model name, sampling and retry settings
//! - `RateLimitedCompletionModel`: A wrapper that adds rate limiting to any completion model
//!
//! ## Features
//!
//! - Gemini and OpenAI providers through the `rig` framework
//! - Configurable requests-per-minute quota
//! - Exponential backoff on timeouts, connection errors, 429 and 5xx responses
//! - Instrumentation with tracing spans for monitoring

use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use governor::{Quota, RateLimiter};
use ratelimited_completion::RateLimitedCompletionModel;
use rig::{
    completion::{CompletionError, CompletionModel},
    message::AssistantContent,
    providers::{gemini, openai},
};
use tracing::{debug, instrument, warn};

pub mod mock_model;
pub mod ratelimited_completion;

/// Default Gemini model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Default OpenAI model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

const PREAMBLE: &str = "You are a careful analyst. You describe companies using only facts stated in the text you are given.";

/// Anything that can turn a prompt into completion text
pub trait Completer: Send + Sync {
    /// Send a single prompt and return the text of the response
    fn complete(&self, prompt: &str) -> impl Future<Output = Result<String, CompletionError>> + Send;
}

/// Supported model providers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Provider {
    /// Google Gemini
    #[default]
    Gemini,
    /// OpenAI
    OpenAi,
}

impl Provider {
    /// Environment variable holding the provider's API key
    pub fn api_key_var(&self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Model used when none is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => DEFAULT_GEMINI_MODEL,
            Provider::OpenAi => DEFAULT_OPENAI_MODEL,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Gemini => f.write_str("gemini"),
            Provider::OpenAi => f.write_str("openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" => Ok(Provider::Gemini),
            "openai" => Ok(Provider::OpenAi),
            other => Err(format!(
                "unknown provider '{}', expected gemini or openai",
                other
            )),
        }
    }
}

/// Settings for completion requests
#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Model provider
    pub provider: Provider,

    /// Model name, the provider default when `None`
    pub model_name: Option<String>,

    /// Sampling temperature
    pub temperature: f64,

    /// Maximum tokens in a single response
    pub max_output_tokens: u64,

    /// Retries after the first attempt for transient failures
    pub max_retries: u32,

    /// Delay before the first retry; doubled for every further one
    pub retry_base_delay: Duration,

    /// Request quota
    pub requests_per_minute: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model_name: None,
            temperature: 0.1,
            max_output_tokens: 4000,
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            requests_per_minute: 2000,
        }
    }
}

impl ModelConfig {
    /// The configured model name or the provider default
    pub fn model_name(&self) -> &str {
        self.model_name
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    fn quota(&self) -> Quota {
        Quota::per_minute(NonZeroU32::new(self.requests_per_minute).unwrap_or(NonZeroU32::MIN))
    }
}

/// A rate limited, retrying completion client
#[derive(Debug, Clone)]
pub struct Client<C>
where
    C: CompletionModel,
{
    completion_model: C,
    config: ModelConfig,
}

impl Client<RateLimitedCompletionModel<gemini::completion::CompletionModel>> {
    /// Create a Gemini client
    pub fn new_gemini(api_key: &str, config: ModelConfig) -> Self {
        let gemini_client = gemini::Client::new(api_key);
        let limiter = RateLimiter::direct(config.quota());
        let completion_model = RateLimitedCompletionModel::new(
            gemini_client.completion_model(config.model_name()),
            limiter,
        );
        Self::new(completion_model, config)
    }
}

impl Client<RateLimitedCompletionModel<openai::CompletionModel>> {
    /// Create an OpenAI client
    pub fn new_openai(api_key: &str, config: ModelConfig) -> Self {
        let openai_client = openai::Client::new(api_key);
        let limiter = RateLimiter::direct(config.quota());
        let completion_model = RateLimitedCompletionModel::new(
            openai_client.completion_model(config.model_name()),
            limiter,
        );
        Self::new(completion_model, config)
    }
}

impl<C> Client<C>
where
    C: CompletionModel,
{
    /// Wrap an existing completion model
    pub fn new(completion_model: C, config: ModelConfig) -> Self {
        Self {
            completion_model,
            config,
        }
    }

    pub fn completion(&self) -> &C {
        &self.completion_model
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn complete_once(&self, prompt: &str) -> Result<String, CompletionError> {
        let response = self
            .completion_model
            .completion_request(prompt.to_string())
            .preamble(PREAMBLE.to_string())
            .temperature(self.config.temperature)
            .max_tokens(self.config.max_output_tokens)
            .send()
            .await?;

        let text = response
            .choice
            .iter()
            .filter_map(|c| match c {
                AssistantContent::Text(t) => Some(t.text.clone()),
                _ => {
                    warn!(tool_call = ?c, "Model returned a non-text response");
                    None
                }
            })
            .collect::<Vec<String>>()
            .join("\n");
        Ok(text)
    }
}

impl<C> Completer for Client<C>
where
    C: CompletionModel,
{
    #[instrument(skip_all, fields(prompt_len = prompt.len(), model = %self.config.model_name()))]
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let mut attempt = 0;
        loop {
            match self.complete_once(prompt).await {
                Ok(text) => {
                    debug!("Completion returned {} characters", text.len());
                    return Ok(text);
                }
                Err(e) if attempt < self.config.max_retries && is_transient(&e) => {
                    let delay = self.config.retry_base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient completion failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Whether a completion error is worth retrying
pub fn is_transient(err: &CompletionError) -> bool {
    match err {
        CompletionError::HttpError(e) => {
            e.is_timeout()
                || e.is_connect()
                || e.status()
                    .map(|status| status.as_u16() == 429 || status.as_u16() >= 500)
                    .unwrap_or(false)
        }
        CompletionError::ProviderError(message) => {
            let message = message.to_ascii_lowercase();
            ["429", "too many requests", "resource_exhausted", "503", "overloaded", "unavailable"]
                .iter()
                .any(|needle| message.contains(needle))
        }
        _ => false,
    }
}
