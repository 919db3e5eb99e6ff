//! # Reportsmith
//!
//! Checkpointed, LLM-driven research reports with a human in the loop.
//!
//! Give Reportsmith a topic and it assembles a panel of analyst personas,
//! interviews an expert once per analyst, turns each interview into a report
//! section, then pauses for feedback. Feedback regenerates the panel; approval
//! writes the introduction and conclusion and renders the report to Markdown
//! and HTML.
//!
//! ## Features
//!
//! - **Checkpoints**: Every stage result is stored, so a thread can pause, be
//!   inspected, and resume (even after a crash)
//! - **Feedback Gate**: Steer the analyst panel before any prose is finalized
//! - **Provider Agnostic**: Claude, OpenAI-compatible endpoints or local Ollama,
//!   with fallback
//! - **Concurrent Interviews**: Bounded parallelism, deterministic section order
//!
//! ## Quick Start
//!
//! ```bash
//! # Run to the feedback gate
//! reportsmith start "Solar Energy" -n 2
//!
//! # Approve the analysts and finish the report
//! reportsmith resume <thread-id>
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::unnecessary_literal_bound)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::format_push_string)]

pub mod ai;
pub mod core;
pub mod pipeline;
pub mod store;

pub use ai::{GenerationError, GenerationRequest, GeneratorChain, TextGenerator};
pub use crate::core::{Config, ErrorKind, FailureRecord, PipelineError, PipelineResult};
pub use pipeline::{Orchestrator, PipelineStage, StatusReport, ThreadState};
pub use store::{FileStore, MemoryStore, StateStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "reportsmith";
