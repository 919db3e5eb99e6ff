//! Prompt construction for every generation step.
//!
//! Each builder returns a ready [`GenerationRequest`]. When a previous
//! attempt was rejected, its error is passed in and echoed back to the model
//! as a correction note.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::json;

use super::{Persona, SectionDraft};
use crate::ai::GenerationRequest;

/// Phrase an interviewer uses to close the interview.
pub const INTERVIEW_SENTINEL: &str = "Thank you so much for your help";

static SENTINEL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)thank\s+you\s+so\s+much\s+for\s+your\s+help").unwrap());

/// Whether an interviewer's turn closes the interview. Case and spacing are
/// ignored.
pub fn is_closing(question: &str) -> bool {
    SENTINEL_PATTERN.is_match(question)
}

fn with_correction(prompt: String, previous_error: Option<&str>) -> String {
    match previous_error {
        Some(error) => format!(
            "{prompt}\n\nYour previous answer was rejected: {error}\nFollow the format exactly this time."
        ),
        None => prompt,
    }
}

/// JSON schema for the persona list.
pub fn persona_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "analysts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "role": { "type": "string" },
                        "focus": { "type": "string" }
                    },
                    "required": ["name", "role", "focus"]
                }
            }
        },
        "required": ["analysts"]
    })
}

/// Ask for exactly `count` analyst personas.
pub fn personas(
    topic: &str,
    count: usize,
    adjustment: Option<&str>,
    previous_error: Option<&str>,
) -> GenerationRequest {
    let system = "You are tasked with creating a set of AI analyst personas for a research report. \
                  Each analyst covers a distinct sub-theme of the topic and has a name, a role \
                  and a one-sentence focus.";

    let mut prompt = format!("Topic: {topic}\nCreate exactly {count} analysts.");
    if let Some(note) = adjustment {
        prompt.push_str(&format!(
            "\n\nEditorial feedback to take into account when choosing the analysts:\n{note}"
        ));
    }

    GenerationRequest::new(system, with_correction(prompt, previous_error))
        .with_schema(persona_schema())
}

/// Ask the analyst for the next interview question.
pub fn question(
    topic: &str,
    persona: &Persona,
    draft: &SectionDraft,
    last_turn: bool,
    previous_error: Option<&str>,
) -> GenerationRequest {
    let system = format!(
        "You are an analyst interviewing an expert about {topic}.\n{}\n\n\
         Ask one specific, insightful question at a time that fits your focus. \
         When you have enough material, end your turn with \"{INTERVIEW_SENTINEL}!\"",
        persona.describe()
    );

    let mut prompt = if draft.transcript.is_empty() {
        "Introduce yourself briefly and ask your first question.".to_string()
    } else {
        format!("Interview so far:\n\n{}\n\nAsk your next question.", draft.transcript_text())
    };
    if last_turn {
        prompt.push_str(&format!(" This is your final question; close with \"{INTERVIEW_SENTINEL}!\""));
    }

    GenerationRequest::new(system, with_correction(prompt, previous_error))
}

/// Ask the expert to answer the latest question.
pub fn answer(
    topic: &str,
    persona: &Persona,
    draft: &SectionDraft,
    question: &str,
    previous_error: Option<&str>,
) -> GenerationRequest {
    let system = format!(
        "You are an expert on {topic} being interviewed by an analyst.\n\
         The analyst's profile:\n{}\n\n\
         Answer concisely and concretely, staying on the analyst's focus.",
        persona.describe()
    );

    let mut prompt = String::new();
    if !draft.transcript.is_empty() {
        prompt.push_str(&format!("Interview so far:\n\n{}\n\n", draft.transcript_text()));
    }
    prompt.push_str(&format!("Question: {question}"));

    GenerationRequest::new(system, with_correction(prompt, previous_error))
}

/// Turn one interview into a report section.
pub fn section(
    topic: &str,
    draft: &SectionDraft,
    max_words: usize,
    previous_error: Option<&str>,
) -> GenerationRequest {
    let system = format!(
        "You are an expert technical writer. Write one section of a report on {topic} \
         from an interview transcript.\n\
         Use markdown. Start with a level-2 heading (\"## \") naming the section's theme. \
         Keep it under {max_words} words. Do not add a preamble."
    );

    let prompt = format!(
        "Analyst:\n{}\n\nTranscript:\n\n{}",
        draft.persona.describe(),
        draft.transcript_text()
    );

    GenerationRequest::new(system, with_correction(prompt, previous_error))
}

/// Write the report title and introduction.
pub fn introduction(
    topic: &str,
    sections: &str,
    max_words: usize,
    previous_error: Option<&str>,
) -> GenerationRequest {
    let system = format!(
        "You are a technical writer finishing a report on {topic}. \
         Write a compelling title and an introduction that previews every section.\n\
         Use markdown: first a level-1 title line (\"# \"), then a \"## Introduction\" heading. \
         Keep it under {max_words} words."
    );
    let prompt = format!("Report sections:\n\n{sections}");

    GenerationRequest::new(system, with_correction(prompt, previous_error))
}

/// Write the report conclusion.
pub fn conclusion(
    topic: &str,
    sections: &str,
    max_words: usize,
    previous_error: Option<&str>,
) -> GenerationRequest {
    let system = format!(
        "You are a technical writer finishing a report on {topic}. \
         Write a conclusion that recaps the key findings of every section.\n\
         Use markdown and start with a \"## Conclusion\" heading. Keep it under {max_words} words."
    );
    let prompt = format!("Report sections:\n\n{sections}");

    GenerationRequest::new(system, with_correction(prompt, previous_error))
}
