//! Content processor module for site summarization
//!
//! This module turns the aggregated corpus into the raw text of a structured
//! company profile: chunking, the map pass over every chunk, an optional
//! collapse pass, and the final reduce pass. The `stuff` and `refine`
//! strategies are provided as alternatives to map/reduce.

mod chunking;
mod config;
mod error;
mod prompt;

pub use chunking::{TextChunk, chunk_corpus, chunk_text};
pub use config::{ChunkOptions, ProcessorConfig, ProcessorConfigBuilder, SummaryStrategy};
pub use error::{ProcessError, SummaryStage};
pub use prompt::{combine_prompt, map_prompt, refine_prompt};

use crate::model::Completer;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

/// Separator between partial summaries and between chunks in a single prompt
pub const PARTIAL_SEPARATOR: &str = "\n\n";

/// Runs the summarization passes against a `Completer`
#[derive(Debug)]
pub struct Summarizer<C> {
    completer: Arc<C>,
    config: ProcessorConfig,
}

impl<C> Clone for Summarizer<C> {
    fn clone(&self) -> Self {
        Self {
            completer: self.completer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<C> Summarizer<C>
where
    C: Completer + 'static,
{
    /// Create a summarizer
    pub fn new(completer: C, config: ProcessorConfig) -> Self {
        Self {
            completer: Arc::new(completer),
            config,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Chunk and summarize a corpus
    ///
    /// # Arguments
    ///
    /// * `corpus` - The aggregated corpus
    ///
    /// # Returns
    ///
    /// The raw text of the final pass, not yet validated
    #[instrument(skip_all, fields(len = corpus.len(), strategy = %self.config.strategy))]
    pub async fn summarize(&self, corpus: &str) -> Result<String, ProcessError> {
        let chunks = chunk_corpus(corpus, &self.config)?;
        self.summarize_chunks(&chunks).await
    }

    /// Summarize already chunked text with the configured strategy
    #[instrument(skip_all, fields(chunks = chunks.len(), strategy = %self.config.strategy))]
    pub async fn summarize_chunks(&self, chunks: &[TextChunk]) -> Result<String, ProcessError> {
        if chunks.is_empty() {
            return Err(ProcessError::CorpusTooShort {
                len: 0,
                min: self.config.min_corpus_chars,
            });
        }

        match self.config.strategy {
            SummaryStrategy::MapReduce => {
                let partials = self.map_stage(chunks).await?;
                let partials = self.collapse_stage(partials).await?;
                self.reduce_stage(&partials).await
            }
            SummaryStrategy::Stuff => self.stuff(chunks).await,
            SummaryStrategy::Refine => self.refine(chunks).await,
        }
    }

    /// Summarize every chunk independently
    ///
    /// Returns one partial summary per chunk, in chunk order. Any failure
    /// fails the whole stage.
    pub async fn map_stage(&self, chunks: &[TextChunk]) -> Result<Vec<String>, ProcessError> {
        let prompts = chunks.iter().map(|chunk| map_prompt(&chunk.text)).collect();
        let partials = self.complete_all(prompts, SummaryStage::Map).await?;
        info!("Map stage produced {} partial summaries", partials.len());
        Ok(partials)
    }

    /// Re-summarize groups of partials until they fit the reduce budget
    pub async fn collapse_stage(&self, partials: Vec<String>) -> Result<Vec<String>, ProcessError> {
        let budget = self.config.reduce_input_chars;
        let mut partials = partials;

        while joined_char_len(&partials) > budget && partials.len() > 1 {
            let groups = group_partials(&partials, budget);
            if groups.len() >= partials.len() {
                warn!(
                    "Partial summaries exceed the reduce budget of {} characters but cannot be grouped further",
                    budget
                );
                break;
            }
            debug!(
                "Collapsing {} partial summaries into {} groups",
                partials.len(),
                groups.len()
            );
            let prompts = groups
                .iter()
                .map(|group| map_prompt(&group.join(PARTIAL_SEPARATOR)))
                .collect();
            partials = self.complete_all(prompts, SummaryStage::Collapse).await?;
        }
        Ok(partials)
    }

    /// Combine partial summaries into the structured document with one request
    pub async fn reduce_stage(&self, partials: &[String]) -> Result<String, ProcessError> {
        let prompt = combine_prompt(&partials.join(PARTIAL_SEPARATOR));
        self.completer
            .complete(&prompt)
            .await
            .map_err(ProcessError::completion(SummaryStage::Reduce))
    }

    async fn stuff(&self, chunks: &[TextChunk]) -> Result<String, ProcessError> {
        let text = chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(PARTIAL_SEPARATOR);
        self.completer
            .complete(&combine_prompt(&text))
            .await
            .map_err(ProcessError::completion(SummaryStage::Stuff))
    }

    async fn refine(&self, chunks: &[TextChunk]) -> Result<String, ProcessError> {
        let mut answer = String::new();
        for (index, chunk) in chunks.iter().enumerate() {
            let prompt = if index == 0 {
                combine_prompt(&chunk.text)
            } else {
                refine_prompt(&answer, &chunk.text)
            };
            debug!("Refining with chunk {}", chunk.position);
            answer = self
                .completer
                .complete(&prompt)
                .await
                .map_err(ProcessError::completion(SummaryStage::Refine))?;
        }
        Ok(answer)
    }

    /// Send every prompt with bounded concurrency, keeping input order
    ///
    /// The first failure aborts every request still queued or in flight.
    async fn complete_all(
        &self,
        prompts: Vec<String>,
        stage: SummaryStage,
    ) -> Result<Vec<String>, ProcessError> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut outputs: Vec<Option<String>> = vec![None; prompts.len()];
        let mut tasks = JoinSet::new();

        for (position, prompt) in prompts.into_iter().enumerate() {
            let permit = semaphore.clone().acquire_owned();
            let completer = self.completer.clone();

            tasks.spawn(async move {
                let _permit = permit.await?;
                debug!("Running {} request {}", stage, position);
                let output = completer
                    .complete(&prompt)
                    .await
                    .map_err(ProcessError::completion(stage))?;
                Ok::<_, ProcessError>((position, output))
            });
        }

        while let Some(result) = tasks.join_next().await {
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) => Err(e.into()),
            };
            match outcome {
                Ok((position, output)) => outputs[position] = Some(output),
                Err(e) => {
                    warn!("{} request failed, cancelling {} remaining", stage, tasks.len());
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(outputs.into_iter().flatten().collect())
    }
}

/// Character length of the partials once joined for the reduce prompt
fn joined_char_len(partials: &[String]) -> usize {
    let separators = partials.len().saturating_sub(1) * PARTIAL_SEPARATOR.len();
    partials.iter().map(|p| p.chars().count()).sum::<usize>() + separators
}

/// Greedily pack consecutive partials into groups that fit `budget`
///
/// A partial longer than the budget on its own forms its own group.
fn group_partials(partials: &[String], budget: usize) -> Vec<Vec<String>> {
    let mut groups: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for partial in partials {
        let mut candidate = current.clone();
        candidate.push(partial.clone());
        if current.is_empty() || joined_char_len(&candidate) <= budget {
            current = candidate;
        } else {
            groups.push(std::mem::take(&mut current));
            current.push(partial.clone());
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock_model::ScriptedCompleter;
    use rig::completion::CompletionError;
    use std::time::Duration;

    const PROFILE_JSON: &str =
        r#"{"title": "Acme", "summary": "Rockets", "company_name": "Acme", "employees": []}"#;

    /// The text a map or collapse prompt was built from
    fn map_input(prompt: &str) -> Option<&str> {
        let start = prompt.find("TEXT:`")? + "TEXT:`".len();
        let end = prompt.rfind("`\nBrief Summary:")?;
        Some(&prompt[start..end])
    }

    fn is_combine(prompt: &str) -> bool {
        prompt.starts_with("Generate a summary")
    }

    fn summary_completer() -> ScriptedCompleter {
        ScriptedCompleter::new(|prompt| match map_input(prompt) {
            Some(text) => Ok(format!("summary of [{}]", text)),
            None => Ok(PROFILE_JSON.to_string()),
        })
    }

    fn chunks(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(position, text)| TextChunk {
                text: text.to_string(),
                position,
                offset: 0,
            })
            .collect()
    }

    #[test]
    fn test_chunk_options() {
        let options = ChunkOptions::default();

        assert_eq!(options.chunk_size, 6000);
        assert_eq!(options.chunk_overlap, 1000);
    }

    #[test]
    fn test_processor_config() {
        let config = ProcessorConfig::builder()
            .chunk_size(1000)
            .chunk_overlap(100)
            .strategy(SummaryStrategy::Refine)
            .concurrency(2)
            .min_corpus_chars(10)
            .reduce_input_chars(500)
            .build();

        assert_eq!(config.chunk_options.chunk_size, 1000);
        assert_eq!(config.chunk_options.chunk_overlap, 100);
        assert_eq!(config.strategy, SummaryStrategy::Refine);
        assert_eq!(config.concurrency, 2);
        assert_eq!(config.min_corpus_chars, 10);
        assert_eq!(config.reduce_input_chars, 500);

        let defaults = ProcessorConfig::default();
        assert_eq!(defaults.strategy, SummaryStrategy::MapReduce);
        assert_eq!(defaults.concurrency, 5);
    }

    #[test]
    fn test_strategy_names() {
        for strategy in SummaryStrategy::ALL {
            assert_eq!(strategy.as_str().parse::<SummaryStrategy>(), Ok(strategy));
        }
        assert!("summarize".parse::<SummaryStrategy>().is_err());
    }

    #[test]
    fn test_group_partials() {
        let partials: Vec<String> = ["aaaa", "bbbb", "cccc", "dddddddddddd"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let groups = group_partials(&partials, 10);

        assert_eq!(
            groups,
            vec![
                vec!["aaaa".to_string(), "bbbb".to_string()],
                vec!["cccc".to_string()],
                vec!["dddddddddddd".to_string()],
            ]
        );
        assert_eq!(joined_char_len(&partials[..2]), 10);
    }

    #[tokio::test]
    async fn test_map_reduce_call_counts_and_order() {
        let completer = summary_completer();
        let summarizer = Summarizer::new(completer.clone(), ProcessorConfig::default());

        let output = summarizer
            .summarize_chunks(&chunks(&["first", "second", "third"]))
            .await
            .unwrap();

        assert_eq!(output, PROFILE_JSON);
        let prompts = completer.prompts().await;
        assert_eq!(prompts.len(), 4);
        let reduce_prompts: Vec<&String> = prompts.iter().filter(|p| is_combine(p)).collect();
        assert_eq!(reduce_prompts.len(), 1);
        assert!(reduce_prompts[0].contains(
            "summary of [first]\n\nsummary of [second]\n\nsummary of [third]"
        ));
    }

    #[tokio::test]
    async fn test_map_results_keep_chunk_order_under_varying_latency() {
        let completer = summary_completer().with_latency(|prompt| match map_input(prompt) {
            Some("slow") => Duration::from_millis(60),
            Some("medium") => Duration::from_millis(30),
            _ => Duration::from_millis(1),
        });
        let summarizer = Summarizer::new(completer.clone(), ProcessorConfig::default());

        let partials = summarizer
            .map_stage(&chunks(&["slow", "medium", "fast"]))
            .await
            .unwrap();

        assert_eq!(
            partials,
            vec!["summary of [slow]", "summary of [medium]", "summary of [fast]"]
        );
    }

    #[tokio::test]
    async fn test_reduce_prompt_is_identical_for_identical_partials() {
        let completer = summary_completer();
        let summarizer = Summarizer::new(completer.clone(), ProcessorConfig::default());
        let partials = vec!["one".to_string(), "two".to_string()];

        summarizer.reduce_stage(&partials).await.unwrap();
        summarizer.reduce_stage(&partials).await.unwrap();

        let prompts = completer.prompts().await;
        assert_eq!(prompts.len(), 2);
        assert_eq!(prompts[0], prompts[1]);
    }

    #[tokio::test]
    async fn test_map_failure_aborts_before_reduce() {
        let completer = ScriptedCompleter::new(|prompt| match map_input(prompt) {
            Some("broken") => Err(CompletionError::ProviderError("quota exhausted".to_string())),
            Some(text) => Ok(format!("summary of [{}]", text)),
            None => Ok(PROFILE_JSON.to_string()),
        });
        let summarizer = Summarizer::new(completer.clone(), ProcessorConfig::default());

        let result = summarizer
            .summarize_chunks(&chunks(&["fine", "broken", "also fine"]))
            .await;

        assert!(matches!(
            result,
            Err(ProcessError::Completion {
                stage: SummaryStage::Map,
                ..
            })
        ));
        let prompts = completer.prompts().await;
        assert!(!prompts.iter().any(|p| is_combine(p)));
    }

    #[tokio::test]
    async fn test_map_failure_cancels_outstanding_requests() {
        let completer = ScriptedCompleter::new(|prompt| match map_input(prompt) {
            Some("broken") => Err(CompletionError::ProviderError("quota exhausted".to_string())),
            Some(text) => Ok(format!("summary of [{}]", text)),
            None => Ok(PROFILE_JSON.to_string()),
        })
        .with_latency(|prompt| match map_input(prompt) {
            Some("broken") => Duration::from_millis(1),
            _ => Duration::from_secs(60),
        });
        let summarizer = Summarizer::new(completer.clone(), ProcessorConfig::default());

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            summarizer.map_stage(&chunks(&["slow one", "broken", "slow two"])),
        )
        .await
        .expect("map stage should fail without waiting for slow requests");

        assert!(matches!(
            result,
            Err(ProcessError::Completion {
                stage: SummaryStage::Map,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_collapse_runs_when_partials_exceed_budget() {
        let completer = ScriptedCompleter::new(|prompt| match map_input(prompt) {
            Some(text) if text.starts_with("chunk") => Ok("x".repeat(40)),
            Some(_) => Ok("short".to_string()),
            None => Ok(PROFILE_JSON.to_string()),
        });
        let config = ProcessorConfig::builder().reduce_input_chars(100).build();
        let summarizer = Summarizer::new(completer.clone(), config);

        let output = summarizer
            .summarize_chunks(&chunks(&["chunk a", "chunk b", "chunk c", "chunk d"]))
            .await
            .unwrap();

        assert_eq!(output, PROFILE_JSON);
        let prompts = completer.prompts().await;
        // 4 map requests, 2 collapse requests of two partials each, 1 reduce
        assert_eq!(prompts.len(), 7);
        let reduce = prompts.iter().find(|p| is_combine(p)).unwrap();
        assert!(reduce.contains("Text:`short\n\nshort`"));
    }

    #[tokio::test]
    async fn test_stuff_sends_single_request() {
        let completer = summary_completer();
        let config = ProcessorConfig::builder()
            .strategy(SummaryStrategy::Stuff)
            .build();
        let summarizer = Summarizer::new(completer.clone(), config);

        summarizer
            .summarize_chunks(&chunks(&["first", "second"]))
            .await
            .unwrap();

        let prompts = completer.prompts().await;
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Text:`first\n\nsecond`"));
    }

    #[tokio::test]
    async fn test_refine_carries_running_answer() {
        let completer = ScriptedCompleter::new(|prompt| {
            if is_combine(prompt) {
                Ok("draft profile".to_string())
            } else {
                Ok(PROFILE_JSON.to_string())
            }
        });
        let config = ProcessorConfig::builder()
            .strategy(SummaryStrategy::Refine)
            .build();
        let summarizer = Summarizer::new(completer.clone(), config);

        let output = summarizer
            .summarize_chunks(&chunks(&["first", "second", "third"]))
            .await
            .unwrap();

        assert_eq!(output, PROFILE_JSON);
        let prompts = completer.prompts().await;
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].contains("draft profile"));
        assert!(prompts[1].contains("second"));
        assert!(prompts[2].contains(PROFILE_JSON));
    }

    #[tokio::test]
    async fn test_short_corpus_never_calls_the_model() {
        let completer = summary_completer();
        let summarizer = Summarizer::new(completer.clone(), ProcessorConfig::default());

        let result = summarizer.summarize("   hi   ").await;

        assert!(matches!(result, Err(ProcessError::CorpusTooShort { .. })));
        assert_eq!(completer.calls().await, 0);
    }
}
