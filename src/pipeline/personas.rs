//! Analyst persona generation.

use std::sync::Arc;

use serde::Deserialize;

use super::{prompts, Persona, PipelineStage};
use crate::ai::{generate_structured, GenerationRequest, StructuredError, TextGenerator};
use crate::core::{retry_async_if, PipelineError, PipelineResult, RetryConfig};

const STAGE: PipelineStage = PipelineStage::CreateAnalysts;

#[derive(Debug, Deserialize)]
struct PersonaList {
    analysts: Vec<Persona>,
}

/// Produces the analyst personas for a topic in one structured call.
#[derive(Clone)]
pub struct PersonaGenerator {
    generator: Arc<dyn TextGenerator>,
    retry: RetryConfig,
}

impl PersonaGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>, retry: RetryConfig) -> Self {
        Self { generator, retry }
    }

    /// Generate exactly `count` complete personas.
    ///
    /// `adjustment` is the feedback note from the previous round, if any.
    pub async fn generate(
        &self,
        topic: &str,
        count: usize,
        adjustment: Option<&str>,
    ) -> PipelineResult<Vec<Persona>> {
        let result = retry_async_if(
            &self.retry,
            move |previous| {
                let request = prompts::personas(topic, count, adjustment, previous.as_deref());
                async move { self.attempt(&request, count).await }
            },
            PipelineError::is_reprompt_candidate,
        )
        .await;

        if result.was_retried {
            tracing::debug!(attempts = result.attempts, "Persona generation needed a re-prompt");
        }
        result.into_result()
    }

    async fn attempt(
        &self,
        request: &GenerationRequest,
        count: usize,
    ) -> PipelineResult<Vec<Persona>> {
        let list: PersonaList = generate_structured(self.generator.as_ref(), request)
            .await
            .map_err(|e| match e {
                StructuredError::Generation(source) => PipelineError::generation(STAGE, source),
                StructuredError::Invalid(message) => PipelineError::validation(STAGE, message),
            })?;

        validate(list.analysts, count)
    }
}

fn validate(personas: Vec<Persona>, count: usize) -> PipelineResult<Vec<Persona>> {
    if personas.len() != count {
        return Err(PipelineError::validation(
            STAGE,
            format!("expected {count} analysts, got {}", personas.len()),
        ));
    }

    if let Some(position) = personas.iter().position(|p| !p.is_complete()) {
        return Err(PipelineError::validation(
            STAGE,
            format!("analyst {} is missing a name, role or focus", position + 1),
        ));
    }

    Ok(personas
        .into_iter()
        .map(|p| Persona::new(p.name.trim(), p.role.trim(), p.focus.trim()))
        .collect())
}
