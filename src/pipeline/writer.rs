//! Section, introduction and conclusion writing.

use std::sync::Arc;

use super::prompts;
use super::step::{generate_checked, run_ordered, unfence};
use super::{PipelineStage, SectionDraft};
use crate::ai::TextGenerator;
use crate::core::{PipelineResult, RetryConfig};

/// Rough token allowance per word of output.
const TOKENS_PER_WORD: usize = 2;

fn token_budget(max_words: usize) -> u32 {
    u32::try_from(max_words.saturating_mul(TOKENS_PER_WORD)).unwrap_or(u32::MAX)
}

/// Check that `text` is non-empty markdown whose first line starts with
/// `prefix`, and return it cleaned up.
fn starts_with_heading(text: &str, prefix: &str) -> Result<String, String> {
    let text = unfence(text);
    if text.is_empty() {
        return Err("empty output".to_string());
    }
    if !text.starts_with(prefix) {
        return Err(format!("output must start with a \"{}\" heading", prefix.trim_end()));
    }
    Ok(text.to_string())
}

/// Writes one report section per interview.
#[derive(Clone)]
pub struct SectionWriter {
    generator: Arc<dyn TextGenerator>,
    retry: RetryConfig,
    max_words: usize,
    max_concurrent: usize,
}

impl SectionWriter {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryConfig, max_words: usize) -> Self {
        Self { generator, retry, max_words, max_concurrent: 4 }
    }

    /// Set how many sections may be written at once.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Write the section for a single interview.
    pub async fn write(&self, topic: &str, draft: &SectionDraft) -> PipelineResult<String> {
        let budget = token_budget(self.max_words);

        generate_checked(
            self.generator.as_ref(),
            PipelineStage::WriteSections,
            &self.retry,
            |previous| {
                prompts::section(topic, draft, self.max_words, previous).with_max_tokens(budget)
            },
            |text| starts_with_heading(text, "## "),
        )
        .await
    }

    /// Write every section concurrently; results follow `drafts` order.
    pub async fn write_all(&self, topic: &str, drafts: &[SectionDraft]) -> PipelineResult<Vec<String>> {
        let topic: Arc<str> = Arc::from(topic);

        run_ordered(PipelineStage::WriteSections, self.max_concurrent, drafts.to_vec(), |draft| {
            let writer = self.clone();
            let topic = topic.clone();
            async move { writer.write(&topic, &draft).await }
        })
        .await
    }
}

/// Writes the introduction and conclusion around the finished sections.
#[derive(Clone)]
pub struct BookendWriter {
    generator: Arc<dyn TextGenerator>,
    retry: RetryConfig,
    max_words: usize,
}

impl BookendWriter {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryConfig, max_words: usize) -> Self {
        Self { generator, retry, max_words }
    }

    /// Returns `(introduction, conclusion)`.
    ///
    /// The introduction opens with the report title (`# `) followed by an
    /// `## Introduction` heading; the conclusion opens with `## Conclusion`.
    pub async fn write(&self, topic: &str, sections: &[String]) -> PipelineResult<(String, String)> {
        let body = sections.join("\n\n");
        let stage = PipelineStage::WriteIntroConclusion;
        let budget = token_budget(self.max_words);

        let introduction = generate_checked(
            self.generator.as_ref(),
            stage,
            &self.retry,
            |previous| {
                prompts::introduction(topic, &body, self.max_words, previous).with_max_tokens(budget)
            },
            |text| {
                let text = starts_with_heading(text, "# ")?;
                if text.contains("## Introduction") {
                    Ok(text)
                } else {
                    Err("introduction must contain an \"## Introduction\" heading".to_string())
                }
            },
        );

        let conclusion = generate_checked(
            self.generator.as_ref(),
            stage,
            &self.retry,
            |previous| {
                prompts::conclusion(topic, &body, self.max_words, previous).with_max_tokens(budget)
            },
            |text| starts_with_heading(text, "## Conclusion"),
        );

        tokio::try_join!(introduction, conclusion)
    }
}
