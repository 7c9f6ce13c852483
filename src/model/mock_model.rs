//! # Test Doubles for Completion
//!
//! Provides two fakes that stand in for a real provider:
//!
//! - `MockCompletionModel` implements the `rig` `CompletionModel` trait and
//!   replays a queue of responses or errors, for testing `Client` itself.
//! - `ScriptedCompleter` implements `Completer` directly and answers every
//!   prompt through a closure, recording the prompts it received.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use rig::{
    completion::{
        AssistantContent, CompletionError, CompletionModel, CompletionRequest, CompletionResponse,
    },
    one_or_many::OneOrMany,
};
use tokio::sync::Mutex;

use super::Completer;

/// A mock completion model for testing purposes.
/// It pops the next queued response or error every time `completion` is called.
#[derive(Debug, Clone, Default)]
pub struct MockCompletionModel {
    queue: Arc<Mutex<VecDeque<Result<String, CompletionError>>>>,
    calls: Arc<Mutex<usize>>,
}

impl MockCompletionModel {
    /// Creates a new mock model that returns empty text until something is queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a text response.
    pub async fn push_text(&self, text: &str) {
        self.queue.lock().await.push_back(Ok(text.to_string()));
    }

    /// Queue an error.
    pub async fn push_error(&self, error: CompletionError) {
        self.queue.lock().await.push_back(Err(error));
    }

    /// Number of completion calls received so far.
    pub async fn calls(&self) -> usize {
        *self.calls.lock().await
    }
}

impl CompletionModel for MockCompletionModel {
    type Response = String;

    async fn completion(
        &self,
        _completion_request: CompletionRequest,
    ) -> Result<CompletionResponse<Self::Response>, CompletionError> {
        *self.calls.lock().await += 1;
        let next = self.queue.lock().await.pop_front();
        let text = match next {
            Some(result) => result?,
            None => String::new(),
        };
        Ok(CompletionResponse {
            choice: OneOrMany::one(AssistantContent::text(&text)),
            raw_response: text,
        })
    }
}

type Responder = Arc<dyn Fn(&str) -> Result<String, CompletionError> + Send + Sync>;
type Latency = Arc<dyn Fn(&str) -> Duration + Send + Sync>;

/// A `Completer` that answers prompts with a closure
#[derive(Clone)]
pub struct ScriptedCompleter {
    responder: Responder,
    latency: Option<Latency>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedCompleter {
    /// Answer every prompt with `responder`
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, CompletionError> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            latency: None,
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Delay each answer by the duration `latency` returns for its prompt
    pub fn with_latency<F>(mut self, latency: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.latency = Some(Arc::new(latency));
        self
    }

    /// Every prompt received so far, in arrival order
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    /// Number of prompts received so far
    pub async fn calls(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

impl Completer for ScriptedCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        self.prompts.lock().await.push(prompt.to_string());
        if let Some(latency) = &self.latency {
            tokio::time::sleep(latency(prompt)).await;
        }
        (self.responder)(prompt)
    }
}
