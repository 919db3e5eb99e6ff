//! Thread state and the records it is built from.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PipelineStage;
use crate::core::FailureRecord;

/// A synthetic analyst that drives one interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub role: String,
    pub focus: String,
}

impl Persona {
    pub fn new(name: impl Into<String>, role: impl Into<String>, focus: impl Into<String>) -> Self {
        Self { name: name.into(), role: role.into(), focus: focus.into() }
    }

    /// Whether every field has visible content.
    pub fn is_complete(&self) -> bool {
        [&self.name, &self.role, &self.focus].iter().all(|f| !f.trim().is_empty())
    }

    /// Persona card used inside prompts.
    pub fn describe(&self) -> String {
        format!("Name: {}\nRole: {}\nFocus: {}", self.name, self.role, self.focus)
    }
}

/// One question and its answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewTurn {
    pub question: String,
    pub answer: String,
}

/// Interview result for one persona, later filled with its section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionDraft {
    pub persona: Persona,
    pub transcript: Vec<InterviewTurn>,
    #[serde(default)]
    pub section: Option<String>,
}

impl SectionDraft {
    pub fn new(persona: Persona) -> Self {
        Self { persona, transcript: Vec::new(), section: None }
    }

    /// Transcript as alternating analyst/expert lines.
    pub fn transcript_text(&self) -> String {
        self.transcript
            .iter()
            .map(|turn| format!("Analyst: {}\nExpert: {}", turn.question, turn.answer))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Paths of the rendered report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFiles {
    /// Run directory holding both files
    pub directory: PathBuf,
    /// Markdown rendering
    pub markdown: PathBuf,
    /// HTML rendering
    pub html: PathBuf,
}

impl GeneratedFiles {
    /// Both output paths, markdown first.
    pub fn paths(&self) -> [&PathBuf; 2] {
        [&self.markdown, &self.html]
    }
}

/// Checkpointed state of one report thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadState {
    pub thread_id: String,
    pub topic: String,
    pub analyst_count: usize,
    pub stage: PipelineStage,

    #[serde(default)]
    pub personas: Vec<Persona>,
    #[serde(default)]
    pub sections: Vec<SectionDraft>,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub final_document: Option<String>,

    /// Feedback waiting for the next persona pass
    #[serde(default)]
    pub pending_feedback: Option<String>,
    /// Feedback notes already applied, oldest first
    #[serde(default)]
    pub feedback_history: Vec<String>,

    #[serde(default)]
    pub files: Option<GeneratedFiles>,
    #[serde(default)]
    pub failure: Option<FailureRecord>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ThreadState {
    /// Fresh thread at CREATE_ANALYSTS with a new v4 id.
    pub fn new(topic: impl Into<String>, analyst_count: usize) -> Self {
        let now = Utc::now();
        Self {
            thread_id: uuid::Uuid::new_v4().to_string(),
            topic: topic.into(),
            analyst_count,
            stage: PipelineStage::CreateAnalysts,
            personas: Vec::new(),
            sections: Vec::new(),
            introduction: None,
            conclusion: None,
            final_document: None,
            pending_feedback: None,
            feedback_history: Vec::new(),
            files: None,
            failure: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Section bodies in persona order, skipping unwritten ones.
    pub fn section_texts(&self) -> Vec<String> {
        self.sections.iter().filter_map(|draft| draft.section.clone()).collect()
    }
}

/// What a human said at the feedback gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feedback {
    /// Regenerate personas with this adjustment note
    Adjust(String),
    /// Carry on to the introduction and conclusion
    Approve,
}

impl Feedback {
    const APPROVALS: [&'static str; 5] = ["none", "no", "approve", "approved", "no feedback"];

    /// Interpret raw feedback input. Missing, blank or explicit "no feedback"
    /// answers approve the current analysts.
    pub fn parse(input: Option<&str>) -> Self {
        let Some(text) = input.map(str::trim).filter(|t| !t.is_empty()) else {
            return Self::Approve;
        };

        let normalized = text.trim_end_matches(&['.', '!'][..]).to_lowercase();
        if Self::APPROVALS.contains(&normalized.as_str()) {
            Self::Approve
        } else {
            Self::Adjust(text.to_string())
        }
    }

    /// Stage the gate opens onto.
    pub fn next_stage(&self) -> PipelineStage {
        match self {
            Self::Adjust(_) => PipelineStage::CreateAnalysts,
            Self::Approve => PipelineStage::WriteIntroConclusion,
        }
    }
}

/// Snapshot of a thread for the calling layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub thread_id: String,
    pub topic: String,
    pub stage: PipelineStage,
    pub analyst_count: usize,
    pub personas: Vec<Persona>,
    /// Interviews finished
    pub interviews: usize,
    /// Sections written
    pub sections_written: usize,
    pub has_introduction: bool,
    pub has_conclusion: bool,
    pub pending_feedback: Option<String>,
    pub feedback_rounds: usize,
    pub files: Option<GeneratedFiles>,
    pub failure: Option<FailureRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ThreadState> for StatusReport {
    fn from(state: &ThreadState) -> Self {
        Self {
            thread_id: state.thread_id.clone(),
            topic: state.topic.clone(),
            stage: state.stage,
            analyst_count: state.analyst_count,
            personas: state.personas.clone(),
            interviews: state.sections.len(),
            sections_written: state.sections.iter().filter(|d| d.section.is_some()).count(),
            has_introduction: state.introduction.is_some(),
            has_conclusion: state.conclusion.is_some(),
            pending_feedback: state.pending_feedback.clone(),
            feedback_rounds: state.feedback_history.len(),
            files: state.files.clone(),
            failure: state.failure.clone(),
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }
}
