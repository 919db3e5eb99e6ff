//! Simulated analyst/expert interviews.

use std::sync::Arc;

use super::prompts;
use super::step::{generate_checked, run_ordered};
use super::{InterviewTurn, Persona, PipelineStage, SectionDraft};
use crate::ai::TextGenerator;
use crate::core::{PipelineResult, RetryConfig};

const STAGE: PipelineStage = PipelineStage::ConductInterviews;

/// Default number of question/answer turns per interview.
pub const DEFAULT_TURNS: usize = 2;

/// Runs one interview per persona.
#[derive(Clone)]
pub struct InterviewRunner {
    generator: Arc<dyn TextGenerator>,
    retry: RetryConfig,
    turns: usize,
    max_concurrent: usize,
}

impl InterviewRunner {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryConfig) -> Self {
        Self { generator, retry, turns: DEFAULT_TURNS, max_concurrent: 4 }
    }

    /// Set the turn budget.
    pub fn with_turns(mut self, turns: usize) -> Self {
        self.turns = turns.max(1);
        self
    }

    /// Set how many interviews may run at once.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Interview every persona concurrently.
    ///
    /// The drafts are returned in persona order.
    pub async fn run_all(&self, topic: &str, personas: &[Persona]) -> PipelineResult<Vec<SectionDraft>> {
        let topic: Arc<str> = Arc::from(topic);

        run_ordered(STAGE, self.max_concurrent, personas.to_vec(), |persona| {
            let runner = self.clone();
            let topic = topic.clone();
            async move { runner.interview(&topic, persona).await }
        })
        .await
    }

    /// Run a single interview.
    ///
    /// Stops after the turn budget or after a question that contains the
    /// closing sentinel, whichever comes first.
    pub async fn interview(&self, topic: &str, persona: Persona) -> PipelineResult<SectionDraft> {
        let mut draft = SectionDraft::new(persona);

        for turn in 0..self.turns {
            let last_turn = turn + 1 == self.turns;

            let question = generate_checked(
                self.generator.as_ref(),
                STAGE,
                &self.retry,
                |previous| prompts::question(topic, &draft.persona, &draft, last_turn, previous),
                |text| non_empty(text, "question"),
            )
            .await?;

            let answer = generate_checked(
                self.generator.as_ref(),
                STAGE,
                &self.retry,
                |previous| prompts::answer(topic, &draft.persona, &draft, &question, previous),
                |text| non_empty(text, "answer"),
            )
            .await?;

            let finished = prompts::is_closing(&question);
            draft.transcript.push(InterviewTurn { question, answer });

            tracing::debug!(persona = %draft.persona.name, turn = turn + 1, "Interview turn complete");
            if finished {
                break;
            }
        }

        Ok(draft)
    }
}

fn non_empty(text: &str, what: &str) -> Result<String, String> {
    let text = text.trim();
    if text.is_empty() {
        Err(format!("empty {what}"))
    } else {
        Ok(text.to_string())
    }
}
