//! Pipeline stages and the transition table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{PipelineError, PipelineResult};

/// One step of a report thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineStage {
    /// Generate the analyst personas
    CreateAnalysts,
    /// Run one interview per persona
    ConductInterviews,
    /// Turn each transcript into a section
    WriteSections,
    /// Paused for optional human feedback
    AwaitFeedback,
    /// Write the introduction and conclusion
    WriteIntroConclusion,
    /// Assemble and render the final document
    Finalize,
    /// Finished, files written
    Done,
    /// A stage failed; terminal
    Failed,
}

impl PipelineStage {
    /// Every stage, in pipeline order.
    pub const ALL: [Self; 8] = [
        Self::CreateAnalysts,
        Self::ConductInterviews,
        Self::WriteSections,
        Self::AwaitFeedback,
        Self::WriteIntroConclusion,
        Self::Finalize,
        Self::Done,
        Self::Failed,
    ];

    /// Wire name of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateAnalysts => "CREATE_ANALYSTS",
            Self::ConductInterviews => "CONDUCT_INTERVIEWS",
            Self::WriteSections => "WRITE_SECTIONS",
            Self::AwaitFeedback => "AWAIT_FEEDBACK",
            Self::WriteIntroConclusion => "WRITE_INTRO_CONCLUSION",
            Self::Finalize => "FINALIZE",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    /// DONE and FAILED accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether the thread is waiting on `resume`.
    pub fn is_paused(&self) -> bool {
        matches!(self, Self::AwaitFeedback)
    }

    /// The transition table.
    ///
    /// Stages advance strictly forward. The only backward edge is
    /// AWAIT_FEEDBACK -> CREATE_ANALYSTS, and any non-terminal stage may fail.
    pub fn can_transition_to(&self, next: Self) -> bool {
        use PipelineStage::*;

        match (*self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (CreateAnalysts, ConductInterviews) => true,
            (ConductInterviews, WriteSections) => true,
            (WriteSections, AwaitFeedback) => true,
            (AwaitFeedback, CreateAnalysts | WriteIntroConclusion) => true,
            (WriteIntroConclusion, Finalize) => true,
            (Finalize, Done) => true,
            _ => false,
        }
    }

    /// Check `self -> next` against the table.
    pub fn transition(self, next: Self) -> PipelineResult<Self> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PipelineError::InvalidTransition { from: self, to: next })
        }
    }

    /// The forward successor of a working stage.
    ///
    /// AWAIT_FEEDBACK has two successors and is decided by `resume`, so it
    /// returns `None` here along with the terminal stages.
    pub fn successor(&self) -> Option<Self> {
        match self {
            Self::CreateAnalysts => Some(Self::ConductInterviews),
            Self::ConductInterviews => Some(Self::WriteSections),
            Self::WriteSections => Some(Self::AwaitFeedback),
            Self::WriteIntroConclusion => Some(Self::Finalize),
            Self::Finalize => Some(Self::Done),
            Self::AwaitFeedback | Self::Done | Self::Failed => None,
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == wanted)
            .ok_or_else(|| format!("Unknown stage: {s}"))
    }
}
