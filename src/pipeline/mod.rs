//! The report pipeline.
//!
//! A thread moves through these stages:
//!
//! ```text
//! CREATE_ANALYSTS -> CONDUCT_INTERVIEWS -> WRITE_SECTIONS -> AWAIT_FEEDBACK
//!        ^                                                        |
//!        +-------------------- feedback --------------------------+
//!                                                                 | approve
//!                                     WRITE_INTRO_CONCLUSION <----+
//!                                              |
//!                                          FINALIZE -> DONE
//! ```
//!
//! Any working stage may end in FAILED instead. The [`Orchestrator`] owns the
//! sequencing; the other modules each implement one stage.

mod interview;
mod orchestrator;
mod personas;
pub mod prompts;
pub mod render;
mod stage;
mod step;
mod types;
mod writer;

pub use interview::{InterviewRunner, DEFAULT_TURNS};
pub use orchestrator::{Orchestrator, MAX_TOPIC_CHARS};
pub use personas::PersonaGenerator;
pub use render::{assemble_body, DocumentRenderer};
pub use stage::PipelineStage;
pub use types::{
    Feedback, GeneratedFiles, InterviewTurn, Persona, SectionDraft, StatusReport, ThreadState,
};
pub use writer::{BookendWriter, SectionWriter};
