//! Bounded re-prompt logic.
//!
//! Generation stages get one more attempt when the model returns content
//! that fails validation. The failed attempt's error message is handed to the
//! next attempt so the prompt can say what was wrong. Errors that do not
//! qualify for a re-prompt are returned immediately.

use std::future::Future;

/// Configuration for re-prompt behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of extra attempts (0 = no retries).
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::reprompt(1)
    }
}

impl RetryConfig {
    /// Create a config that re-prompts up to `attempts` times.
    pub fn reprompt(attempts: u32) -> Self {
        Self { max_attempts: attempts }
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// The final result (success or last error).
    pub result: Result<T, E>,

    /// Number of attempts made.
    pub attempts: u32,

    /// Whether the operation was retried.
    pub was_retried: bool,
}

impl<T, E> RetryResult<T, E> {
    /// Check if the operation succeeded.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// Get the result.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Retry an async operation while `should_retry` accepts the error.
///
/// `operation` receives the previous attempt's error message (`None` on the
/// first attempt).
pub async fn retry_async_if<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: P,
) -> RetryResult<T, E>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    let max_attempts = config.max_attempts + 1; // +1 for initial attempt
    let mut previous_error: Option<String> = None;

    loop {
        attempts += 1;
        let result = operation(previous_error.take()).await;

        let error = match result {
            Err(e) if attempts < max_attempts && should_retry(&e) => e,
            result => {
                return RetryResult { result, attempts, was_retried: attempts > 1 };
            }
        };

        tracing::debug!(attempt = attempts, error = %error, "Re-prompting after rejected output");
        previous_error = Some(error.to_string());
    }
}
