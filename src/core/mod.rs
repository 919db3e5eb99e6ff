//! Core types shared across Reportsmith.
//!
//! Configuration, the pipeline error taxonomy and the re-prompt policy.

mod config;
mod error;
mod retry;

pub use config::{
    AiConfig, Config, GeneralConfig, OllamaConfig, OpenAiConfig, OutputConfig, PipelineConfig,
    StoreBackend, StoreConfig, LOCAL_CONFIG_FILE,
};
pub use error::{ErrorKind, FailureRecord, PipelineError, PipelineResult};
pub use retry::{retry_async_if, RetryConfig, RetryResult};
