//! Building blocks shared by the generation stages.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::PipelineStage;
use crate::ai::{GenerationError, GenerationRequest, TextGenerator};
use crate::core::{retry_async_if, PipelineError, PipelineResult, RetryConfig};

/// One free-text generation call whose output must pass `validate`.
///
/// Rejected output is re-prompted per `retry`, with the rejection reason
/// handed to `build`. Provider failures escalate immediately.
pub(crate) async fn generate_checked<B, V>(
    generator: &dyn TextGenerator,
    stage: PipelineStage,
    retry: &RetryConfig,
    build: B,
    validate: V,
) -> PipelineResult<String>
where
    B: Fn(Option<&str>) -> GenerationRequest,
    V: Fn(&str) -> Result<String, String>,
{
    let build = &build;
    let validate = &validate;

    retry_async_if(
        retry,
        move |previous| {
            let request = build(previous.as_deref());
            async move {
                let text = generator
                    .generate(&request)
                    .await
                    .map_err(|e| PipelineError::generation(stage, e))?;
                validate(&text).map_err(|message| PipelineError::validation(stage, message))
            }
        },
        PipelineError::is_reprompt_candidate,
    )
    .await
    .into_result()
}

/// Run `task` over `items` with at most `limit` in flight.
///
/// Results come back in input order whatever order the tasks finish in.
/// The first error aborts the remaining tasks and is returned.
pub(crate) async fn run_ordered<I, T, F, Fut>(
    stage: PipelineStage,
    limit: usize,
    items: Vec<I>,
    task: F,
) -> PipelineResult<Vec<T>>
where
    T: Send + 'static,
    F: Fn(I) -> Fut,
    Fut: Future<Output = PipelineResult<T>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut tasks = JoinSet::new();
    let total = items.len();

    for (index, item) in items.into_iter().enumerate() {
        let semaphore = semaphore.clone();
        let work = task(item);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            (index, work.await)
        });
    }

    let mut results: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some(joined) = tasks.join_next().await {
        let (index, result) = match joined {
            Ok(pair) => pair,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                return Err(PipelineError::generation(
                    stage,
                    GenerationError::Api(format!("task cancelled: {e}")),
                ))
            }
        };
        results[index] = Some(result?);
    }

    Ok(results.into_iter().flatten().collect())
}

/// Strip a wrapping code fence some models put around markdown.
pub(crate) fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "markdown") on the opening line.
    match body.split_once('\n') {
        Some((_, inner)) => inner.trim(),
        None => body.trim(),
    }
}
