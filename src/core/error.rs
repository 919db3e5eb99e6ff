//! Pipeline error types.
//!
//! Every failure the pipeline can surface maps onto one [`ErrorKind`]. The
//! kind and message are what gets recorded on a failed thread and what the
//! calling layer shows to the user.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ai::GenerationError;
use crate::pipeline::PipelineStage;
use crate::store::StoreError;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while driving a report thread.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Generated content was malformed or incomplete.
    #[error("Validation failed during {stage}: {message}")]
    Validation { stage: PipelineStage, message: String },

    /// The text-generation capability failed (provider error, timeout, bad response).
    #[error("Generation failed during {stage}: {source}")]
    Generation {
        stage: PipelineStage,
        #[source]
        source: GenerationError,
    },

    /// Reading or writing a checkpoint failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Writing an output document failed.
    #[error("Failed to write {}: {message}", path.display())]
    Render { path: PathBuf, message: String },

    /// `resume` or `run` was called on a thread that cannot accept it.
    #[error("Cannot resume thread '{thread_id}' at stage {stage}")]
    InvalidResume { thread_id: String, stage: PipelineStage },

    /// No checkpoint exists for the thread id.
    #[error("Unknown thread '{0}'")]
    NotFound(String),

    /// The caller supplied an unusable topic or analyst count.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stage attempted a transition the stage table does not define.
    #[error("Undefined transition {from} -> {to}")]
    InvalidTransition { from: PipelineStage, to: PipelineStage },
}

impl PipelineError {
    /// Build a validation error for the given stage.
    pub fn validation(stage: PipelineStage, message: impl Into<String>) -> Self {
        Self::Validation { stage, message: message.into() }
    }

    /// Wrap a generation error raised during the given stage.
    pub fn generation(stage: PipelineStage, source: GenerationError) -> Self {
        Self::Generation { stage, source }
    }

    /// Get the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Generation { .. } => ErrorKind::Generation,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::Render { .. } => ErrorKind::Render,
            Self::InvalidResume { .. } | Self::NotFound(_) => ErrorKind::InvalidResume,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }

    /// Whether a stage may re-prompt once before escalating this error.
    pub fn is_reprompt_candidate(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

/// Failure category surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Generation,
    Persistence,
    Render,
    InvalidResume,
    InvalidInput,
    InvalidTransition,
}

impl ErrorKind {
    /// Stable label used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "ValidationFailure",
            Self::Generation => "GenerationFailure",
            Self::Persistence => "PersistenceFailure",
            Self::Render => "RenderFailure",
            Self::InvalidResume => "InvalidResumeFailure",
            Self::InvalidInput => "InvalidInput",
            Self::InvalidTransition => "InvalidTransition",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong on a thread that ended in FAILED.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Taxonomy kind
    pub kind: ErrorKind,
    /// Verbatim error message
    pub message: String,
    /// Stage that was executing when the failure happened
    pub stage: PipelineStage,
}

impl FailureRecord {
    /// Capture an error raised while `stage` was executing.
    pub fn from_error(error: &PipelineError, stage: PipelineStage) -> Self {
        Self { kind: error.kind(), message: error.to_string(), stage }
    }
}

impl fmt::Display for FailureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.kind, self.stage, self.message)
    }
}
