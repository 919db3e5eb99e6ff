//! Drives report threads through the stage table.
//!
//! Each stage works on a copy of the checkpoint. On success the copy, moved
//! to the next stage, replaces the checkpoint; on failure the untouched
//! original is stored as FAILED with a [`FailureRecord`] attached. The
//! thread's lock is held for the whole drive, so two callers can never
//! advance the same thread at once.

use std::path::PathBuf;
use std::sync::Arc;

use super::render::{assemble_body, DocumentRenderer};
use super::{
    BookendWriter, Feedback, InterviewRunner, PersonaGenerator, PipelineStage, SectionWriter,
    StatusReport, ThreadState,
};
use crate::ai::TextGenerator;
use crate::core::{Config, FailureRecord, PipelineConfig, PipelineError, PipelineResult, RetryConfig};
use crate::store::{StateStore, ThreadLocks};

/// Upper bound on topic length, in characters.
pub const MAX_TOPIC_CHARS: usize = 500;

/// The report pipeline.
pub struct Orchestrator {
    store: Arc<dyn StateStore>,
    locks: ThreadLocks,
    personas: PersonaGenerator,
    interviews: InterviewRunner,
    sections: SectionWriter,
    bookends: BookendWriter,
    renderer: DocumentRenderer,
    max_analysts: usize,
}

impl Orchestrator {
    /// Wire the pipeline around one generator and one store.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn StateStore>,
        settings: &PipelineConfig,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        let retry = RetryConfig::reprompt(settings.validation_retries);

        Self {
            store,
            locks: ThreadLocks::new(),
            personas: PersonaGenerator::new(generator.clone(), retry),
            interviews: InterviewRunner::new(generator.clone(), retry)
                .with_turns(settings.interview_turns)
                .with_max_concurrent(settings.max_concurrent_interviews),
            sections: SectionWriter::new(generator.clone(), retry, settings.section_max_words)
                .with_max_concurrent(settings.max_concurrent_interviews),
            bookends: BookendWriter::new(generator, retry, settings.section_max_words),
            renderer: DocumentRenderer::new(output_dir),
            max_analysts: settings.max_analysts,
        }
    }

    /// Build from the full application config.
    pub fn from_config(
        generator: Arc<dyn TextGenerator>,
        store: Arc<dyn StateStore>,
        config: &Config,
    ) -> Self {
        Self::new(generator, store, &config.pipeline, config.output_dir())
    }

    /// Get the checkpoint store.
    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    /// Checkpoint a new thread at CREATE_ANALYSTS without running it.
    pub async fn create(&self, topic: &str, analyst_count: usize) -> PipelineResult<String> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(PipelineError::InvalidInput("topic must not be empty".to_string()));
        }
        if topic.chars().count() > MAX_TOPIC_CHARS {
            return Err(PipelineError::InvalidInput(format!(
                "topic is longer than {MAX_TOPIC_CHARS} characters"
            )));
        }
        if analyst_count == 0 || analyst_count > self.max_analysts {
            return Err(PipelineError::InvalidInput(format!(
                "analyst count must be between 1 and {}, got {analyst_count}",
                self.max_analysts
            )));
        }

        let state = ThreadState::new(topic, analyst_count);
        self.store.put(&state).await?;
        tracing::info!(thread_id = %state.thread_id, topic = %state.topic, analysts = analyst_count, "Thread created");
        Ok(state.thread_id)
    }

    /// Create a thread and run it to the feedback gate.
    pub async fn start(&self, topic: &str, analyst_count: usize) -> PipelineResult<String> {
        let thread_id = self.create(topic, analyst_count).await?;
        self.run(&thread_id).await?;
        Ok(thread_id)
    }

    /// Create a thread and run it on a background task.
    ///
    /// Returns as soon as the checkpoint exists; poll [`Self::status`] for
    /// progress. Errors from the run end up on the thread as a failure record.
    pub async fn spawn(self: &Arc<Self>, topic: &str, analyst_count: usize) -> PipelineResult<String> {
        let thread_id = self.create(topic, analyst_count).await?;

        let orchestrator = Arc::clone(self);
        let id = thread_id.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run(&id).await {
                tracing::warn!(thread_id = %id, error = %e, "Background run failed");
            }
        });

        Ok(thread_id)
    }

    /// Continue a checkpointed thread from its current stage until it pauses
    /// or finishes.
    ///
    /// This is how a thread interrupted mid-stage is picked up again. A
    /// thread already at AWAIT_FEEDBACK is left as is.
    pub async fn run(&self, thread_id: &str) -> PipelineResult<PipelineStage> {
        let _guard = self.locks.lock(thread_id).await;
        let state = self.load(thread_id).await?;

        if state.stage.is_terminal() {
            return Err(PipelineError::InvalidResume { thread_id: thread_id.to_string(), stage: state.stage });
        }
        self.drive(state).await
    }

    /// Pass the feedback gate.
    ///
    /// Only legal at AWAIT_FEEDBACK. Feedback text sends the thread back to
    /// CREATE_ANALYSTS for one more round; no feedback carries it through to
    /// DONE. Any other stage is rejected and the checkpoint is not touched.
    pub async fn resume(&self, thread_id: &str, feedback: Option<&str>) -> PipelineResult<PipelineStage> {
        let _guard = self.locks.lock(thread_id).await;
        let mut state = self.load(thread_id).await?;

        if !state.stage.is_paused() {
            return Err(PipelineError::InvalidResume { thread_id: thread_id.to_string(), stage: state.stage });
        }

        let feedback = Feedback::parse(feedback);
        state.stage = state.stage.transition(feedback.next_stage())?;
        if let Feedback::Adjust(note) = feedback {
            tracing::info!(thread_id, "Feedback received, regenerating analysts");
            state.pending_feedback = Some(note);
        } else {
            tracing::info!(thread_id, "Analysts approved");
        }

        state.touch();
        self.store.put(&state).await?;
        self.drive(state).await
    }

    /// Current snapshot of a thread.
    pub async fn status(&self, thread_id: &str) -> PipelineResult<StatusReport> {
        let state = self.load(thread_id).await?;
        Ok(StatusReport::from(&state))
    }

    /// Full checkpoint of a thread, including generated text.
    pub async fn thread(&self, thread_id: &str) -> PipelineResult<ThreadState> {
        self.load(thread_id).await
    }

    /// Snapshots of every stored thread, oldest first.
    pub async fn list(&self) -> PipelineResult<Vec<StatusReport>> {
        let threads = self.store.list_threads().await?;
        Ok(threads.iter().map(StatusReport::from).collect())
    }

    async fn load(&self, thread_id: &str) -> PipelineResult<ThreadState> {
        self.store
            .get(thread_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(thread_id.to_string()))
    }

    /// Run stages until the thread pauses, finishes or fails.
    async fn drive(&self, mut state: ThreadState) -> PipelineResult<PipelineStage> {
        loop {
            let stage = state.stage;
            if stage.is_paused() || stage.is_terminal() {
                tracing::info!(thread_id = %state.thread_id, stage = %stage, "Thread stopped");
                return Ok(stage);
            }

            tracing::info!(thread_id = %state.thread_id, stage = %stage, "Stage started");
            let outcome = match self.execute(&state).await {
                Ok(mut next) => {
                    next.touch();
                    self.store.put(&next).await.map(|()| next).map_err(PipelineError::from)
                }
                Err(e) => Err(e),
            };

            match outcome {
                Ok(next) => state = next,
                Err(error) => return Err(self.fail(state, error).await),
            }
        }
    }

    /// Run the current stage on a copy of `state`.
    async fn execute(&self, state: &ThreadState) -> PipelineResult<ThreadState> {
        let mut next = state.clone();
        let stage = state.stage;

        match stage {
            PipelineStage::CreateAnalysts => {
                let adjustment = next.pending_feedback.take();
                next.personas = self
                    .personas
                    .generate(&next.topic, next.analyst_count, adjustment.as_deref())
                    .await?;
                if let Some(note) = adjustment {
                    next.feedback_history.push(note);
                }
                next.sections.clear();
                next.introduction = None;
                next.conclusion = None;
                next.final_document = None;
            }
            PipelineStage::ConductInterviews => {
                next.sections = self.interviews.run_all(&next.topic, &next.personas).await?;
            }
            PipelineStage::WriteSections => {
                let texts = self.sections.write_all(&next.topic, &next.sections).await?;
                for (draft, text) in next.sections.iter_mut().zip(texts) {
                    draft.section = Some(text);
                }
            }
            PipelineStage::WriteIntroConclusion => {
                let (introduction, conclusion) =
                    self.bookends.write(&next.topic, &next.section_texts()).await?;
                next.introduction = Some(introduction);
                next.conclusion = Some(conclusion);
            }
            PipelineStage::Finalize => {
                let body = assemble_body(
                    next.introduction.as_deref().unwrap_or_default(),
                    &next.section_texts(),
                    next.conclusion.as_deref().unwrap_or_default(),
                );
                let files = self.renderer.render(&next.topic, &body).await?;
                next.final_document = Some(body);
                next.files = Some(files);
            }
            PipelineStage::AwaitFeedback | PipelineStage::Done | PipelineStage::Failed => {
                return Err(PipelineError::InvalidResume { thread_id: state.thread_id.clone(), stage });
            }
        }

        let successor = stage
            .successor()
            .ok_or(PipelineError::InvalidTransition { from: stage, to: stage })?;
        next.stage = stage.transition(successor)?;
        tracing::info!(thread_id = %next.thread_id, stage = %stage, next = %next.stage, "Stage complete");
        Ok(next)
    }

    /// Store `state` as FAILED and hand back the error that caused it.
    async fn fail(&self, mut state: ThreadState, error: PipelineError) -> PipelineError {
        let stage = state.stage;
        tracing::error!(thread_id = %state.thread_id, stage = %stage, kind = %error.kind(), error = %error, "Stage failed");

        state.failure = Some(FailureRecord::from_error(&error, stage));
        state.stage = PipelineStage::Failed;
        state.touch();
        if let Err(e) = self.store.put(&state).await {
            tracing::error!(thread_id = %state.thread_id, error = %e, "Could not record failure");
        }
        error
    }
}
