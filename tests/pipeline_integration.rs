//! End-to-end pipeline tests against a scripted text generator.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::TempDir;

use reportsmith::core::{ErrorKind, PipelineConfig};
use reportsmith::pipeline::prompts::INTERVIEW_SENTINEL;
use reportsmith::{
    FileStore, GenerationError, GenerationRequest, MemoryStore, Orchestrator, PipelineError,
    PipelineStage, StateStore, TextGenerator, ThreadState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Call {
    Personas,
    Question,
    Answer,
    Section,
    Introduction,
    Conclusion,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    /// Provider error
    Error,
    /// Output that fails validation
    Garbage,
}

/// Deterministic stand-in for a language model.
#[derive(Default)]
struct Scripted {
    log: Mutex<Vec<(Call, String)>>,
    fault: Mutex<Option<(Call, Fault)>>,
    /// Per-persona answer delays, in milliseconds
    delays: HashMap<String, u64>,
}

impl Scripted {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_delays(delays: &[(&str, u64)]) -> Arc<Self> {
        Arc::new(Self {
            delays: delays.iter().map(|(n, d)| ((*n).to_string(), *d)).collect(),
            ..Self::default()
        })
    }

    fn fail(&self, call: Call, fault: Fault) {
        *self.fault.lock() = Some((call, fault));
    }

    fn count(&self, call: Call) -> usize {
        self.log.lock().iter().filter(|(c, _)| *c == call).count()
    }

    fn prompts(&self, call: Call) -> Vec<String> {
        self.log.lock().iter().filter(|(c, _)| *c == call).map(|(_, p)| p.clone()).collect()
    }

    fn classify(request: &GenerationRequest) -> Call {
        if request.schema.is_some() {
            Call::Personas
        } else if request.system.starts_with("You are an analyst") {
            Call::Question
        } else if request.system.starts_with("You are an expert on") {
            Call::Answer
        } else if request.system.contains("Write one section") {
            Call::Section
        } else if request.system.contains("introduction") {
            Call::Introduction
        } else {
            Call::Conclusion
        }
    }
}

fn field<'a>(text: &'a str, label: &str) -> &'a str {
    text.lines().find_map(|l| l.strip_prefix(label)).unwrap_or("?").trim()
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let call = Self::classify(request);
        self.log.lock().push((call, request.prompt.clone()));

        let fault = *self.fault.lock();
        match fault {
            Some((c, Fault::Error)) if c == call => {
                return Err(GenerationError::Api("scripted outage".to_string()))
            }
            Some((c, Fault::Garbage)) if c == call => return Ok("lorem ipsum".to_string()),
            _ => {}
        }

        let reply = match call {
            Call::Personas => {
                let count: usize = request
                    .prompt
                    .split("exactly ")
                    .nth(1)
                    .and_then(|rest| rest.split_whitespace().next())
                    .and_then(|n| n.parse().ok())
                    .unwrap_or(0);
                let prefix = if request.prompt.contains("Editorial feedback") { "Revised " } else { "" };
                let analysts: Vec<_> = (1..=count)
                    .map(|i| {
                        serde_json::json!({
                            "name": format!("{prefix}Analyst {i}"),
                            "role": format!("Role {i}"),
                            "focus": format!("Focus area {i}"),
                        })
                    })
                    .collect();
                format!("```json\n{}\n```", serde_json::json!({ "analysts": analysts }))
            }
            Call::Question => {
                if request.prompt.contains("Interview so far") {
                    format!("And what comes next? {INTERVIEW_SENTINEL}!")
                } else {
                    "What matters most?".to_string()
                }
            }
            Call::Answer => {
                let name = field(&request.system, "Name:");
                if let Some(ms) = self.delays.get(name) {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                format!("{name} answers.")
            }
            Call::Section => {
                let name = field(&request.prompt, "Name:");
                format!("## Findings of {name}\n\nDetails from {name}.")
            }
            Call::Introduction => "# Solar Energy Report\n\n## Introduction\nWhat follows.".to_string(),
            Call::Conclusion => "## Conclusion\nThat is all.".to_string(),
        };
        Ok(reply)
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct Harness {
    generator: Arc<Scripted>,
    store: Arc<dyn StateStore>,
    orchestrator: Arc<Orchestrator>,
    output: TempDir,
}

impl Harness {
    fn new(generator: Arc<Scripted>) -> Self {
        Self::with_store(generator, Arc::new(MemoryStore::new()))
    }

    fn with_store(generator: Arc<Scripted>, store: Arc<dyn StateStore>) -> Self {
        let output = TempDir::new().unwrap();
        let orchestrator = Arc::new(Orchestrator::new(
            generator.clone(),
            store.clone(),
            &PipelineConfig::default(),
            output.path(),
        ));
        Self { generator, store, orchestrator, output }
    }

    async fn state(&self, id: &str) -> ThreadState {
        self.store.get(id).await.unwrap().unwrap()
    }
}

#[tokio::test]
async fn test_solar_energy_scenario() {
    let h = Harness::new(Scripted::new());
    let orch = &h.orchestrator;

    let id = orch.create("Solar Energy", 2).await.unwrap();
    assert_eq!(orch.status(&id).await.unwrap().stage, PipelineStage::CreateAnalysts);

    assert_eq!(orch.run(&id).await.unwrap(), PipelineStage::AwaitFeedback);
    let status = orch.status(&id).await.unwrap();
    assert_eq!(status.stage, PipelineStage::AwaitFeedback);
    assert_eq!(status.personas.len(), 2);

    assert_eq!(orch.resume(&id, None).await.unwrap(), PipelineStage::Done);
    let status = orch.status(&id).await.unwrap();
    assert_eq!(status.stage, PipelineStage::Done);

    let files = status.files.expect("files attached at DONE");
    for path in files.paths() {
        assert!(path.starts_with(h.output.path()));
        let content = std::fs::read_to_string(path).unwrap();
        assert!(!content.trim().is_empty());
    }
    assert!(files.directory.parent().unwrap().ends_with("solar-energy"));
}

#[tokio::test]
async fn test_start_produces_requested_persona_count() {
    for n in [1, 3, 5] {
        let h = Harness::new(Scripted::new());
        let id = h.orchestrator.start("Grid storage", n).await.unwrap();

        let state = h.state(&id).await;
        assert_eq!(state.personas.len(), n);
        assert!(state.personas.iter().all(|p| {
            !p.name.is_empty() && !p.role.is_empty() && !p.focus.is_empty()
        }));
        assert_eq!(state.sections.len(), n);
        assert_eq!(h.generator.count(Call::Personas), 1);
    }
}

#[tokio::test]
async fn test_interviews_respect_turn_budget_and_sentinel() {
    let h = Harness::new(Scripted::new());
    let id = h.orchestrator.start("Solar Energy", 2).await.unwrap();

    let state = h.state(&id).await;
    for draft in &state.sections {
        // The second question carries the sentinel, which also hits the budget.
        assert_eq!(draft.transcript.len(), 2);
        assert!(draft.transcript[1].question.contains(INTERVIEW_SENTINEL));
        assert_eq!(draft.transcript[0].answer, format!("{} answers.", draft.persona.name));
    }
}

#[tokio::test]
async fn test_feedback_loops_back_exactly_once() {
    let h = Harness::new(Scripted::new());
    let orch = &h.orchestrator;
    let id = orch.start("Solar Energy", 2).await.unwrap();

    let stage = orch.resume(&id, Some("Add someone from a utility company")).await.unwrap();
    assert_eq!(stage, PipelineStage::AwaitFeedback);
    assert_eq!(h.generator.count(Call::Personas), 2);

    let persona_prompts = h.generator.prompts(Call::Personas);
    assert!(!persona_prompts[0].contains("utility company"));
    assert!(persona_prompts[1].contains("utility company"));

    let state = h.state(&id).await;
    assert!(state.pending_feedback.is_none());
    assert_eq!(state.feedback_history, vec!["Add someone from a utility company".to_string()]);
    assert!(state.personas.iter().all(|p| p.name.starts_with("Revised ")));
    assert!(state.sections.iter().all(|d| d.persona.name.starts_with("Revised ")));
    assert!(state.introduction.is_none());
}

#[tokio::test]
async fn test_no_feedback_signals_finish_the_report() {
    for signal in [None, Some(""), Some("  "), Some("none"), Some("No"), Some("APPROVE")] {
        let h = Harness::new(Scripted::new());
        let id = h.orchestrator.start("Solar Energy", 1).await.unwrap();

        assert_eq!(h.orchestrator.resume(&id, signal).await.unwrap(), PipelineStage::Done);
        assert_eq!(h.generator.count(Call::Personas), 1);
        assert_eq!(h.generator.count(Call::Introduction), 1);
        assert_eq!(h.generator.count(Call::Conclusion), 1);

        let state = h.state(&id).await;
        assert!(state.feedback_history.is_empty());
        assert!(state.final_document.is_some());
    }
}

#[tokio::test]
async fn test_section_order_follows_persona_order() {
    // The first analyst's answers arrive last.
    let generator = Scripted::with_delays(&[("Analyst 1", 80), ("Analyst 2", 30), ("Analyst 3", 0)]);
    let h = Harness::new(generator);

    let id = h.orchestrator.start("Solar Energy", 3).await.unwrap();
    h.orchestrator.resume(&id, None).await.unwrap();

    let state = h.state(&id).await;
    let names: Vec<_> = state.sections.iter().map(|d| d.persona.name.as_str()).collect();
    assert_eq!(names, vec!["Analyst 1", "Analyst 2", "Analyst 3"]);

    let document = state.final_document.unwrap();
    let positions: Vec<_> = (1..=3)
        .map(|i| document.find(&format!("## Findings of Analyst {i}")).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
    assert!(document.starts_with("# Solar Energy Report"));
    assert!(document.trim_end().ends_with("That is all."));

    let markdown = std::fs::read_to_string(&state.files.unwrap().markdown).unwrap();
    assert_eq!(markdown, document);
}

#[tokio::test]
async fn test_generation_failure_marks_failed_and_keeps_prior_fields() {
    let generator = Scripted::new();
    generator.fail(Call::Section, Fault::Error);
    let h = Harness::new(generator);

    let id = h.orchestrator.create("Solar Energy", 2).await.unwrap();
    let err = h.orchestrator.run(&id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generation);

    let state = h.state(&id).await;
    assert_eq!(state.stage, PipelineStage::Failed);
    assert_eq!(state.personas.len(), 2);
    assert_eq!(state.sections.len(), 2);
    assert!(state.sections.iter().all(|d| d.section.is_none() && !d.transcript.is_empty()));

    let failure = state.failure.unwrap();
    assert_eq!(failure.kind, ErrorKind::Generation);
    assert_eq!(failure.stage, PipelineStage::WriteSections);
    assert!(failure.message.contains("scripted outage"));
}

#[tokio::test]
async fn test_failure_after_feedback_gate_keeps_sections() {
    let h = Harness::new(Scripted::new());
    let id = h.orchestrator.start("Solar Energy", 2).await.unwrap();
    let before = h.state(&id).await;

    h.generator.fail(Call::Conclusion, Fault::Error);
    let err = h.orchestrator.resume(&id, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::Generation { stage: PipelineStage::WriteIntroConclusion, .. }));

    let after = h.state(&id).await;
    assert_eq!(after.stage, PipelineStage::Failed);
    assert_eq!(after.personas, before.personas);
    assert_eq!(after.sections, before.sections);
    assert!(after.introduction.is_none());
    assert!(after.conclusion.is_none());
    assert!(after.files.is_none());
}

#[tokio::test]
async fn test_persistent_validation_failure_reprompts_once() {
    let generator = Scripted::new();
    generator.fail(Call::Personas, Fault::Garbage);
    let h = Harness::new(generator);

    let err = h.orchestrator.start("Solar Energy", 2).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.generator.count(Call::Personas), 2);

    let ids = h.store.list_ids().await.unwrap();
    let state = h.state(&ids[0]).await;
    assert_eq!(state.stage, PipelineStage::Failed);
    assert!(state.personas.is_empty());
    assert_eq!(state.failure.unwrap().kind, ErrorKind::Validation);
}

#[tokio::test]
async fn test_resume_rejected_on_terminal_threads_without_mutation() {
    // DONE
    let h = Harness::new(Scripted::new());
    let done = h.orchestrator.start("Solar Energy", 1).await.unwrap();
    h.orchestrator.resume(&done, None).await.unwrap();
    let before = h.state(&done).await;

    let err = h.orchestrator.resume(&done, Some("more economists")).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidResume { stage: PipelineStage::Done, .. }));
    assert_eq!(err.kind(), ErrorKind::InvalidResume);
    assert_eq!(h.state(&done).await, before);

    // FAILED
    h.generator.fail(Call::Personas, Fault::Error);
    let failed = h.orchestrator.create("Wind Energy", 1).await.unwrap();
    h.orchestrator.run(&failed).await.unwrap_err();
    let before = h.state(&failed).await;
    assert_eq!(before.stage, PipelineStage::Failed);

    let err = h.orchestrator.resume(&failed, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResume);
    assert_eq!(h.state(&failed).await, before);
}

#[tokio::test]
async fn test_resume_rejected_before_gate() {
    let h = Harness::new(Scripted::new());
    let id = h.orchestrator.create("Solar Energy", 1).await.unwrap();
    let before = h.state(&id).await;

    let err = h.orchestrator.resume(&id, None).await.unwrap_err();
    assert!(matches!(err, PipelineError::InvalidResume { stage: PipelineStage::CreateAnalysts, .. }));
    assert_eq!(h.state(&id).await, before);
}

#[tokio::test]
async fn test_concurrent_resumes_on_one_thread_are_serialized() {
    let h = Harness::new(Scripted::new());
    let id = h.orchestrator.start("Solar Energy", 2).await.unwrap();

    let (a, b) = tokio::join!(h.orchestrator.resume(&id, None), h.orchestrator.resume(&id, None));
    let outcomes = [a, b];

    let done = outcomes.iter().filter(|r| matches!(r, Ok(PipelineStage::Done))).count();
    let rejected = outcomes
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == ErrorKind::InvalidResume))
        .count();
    assert_eq!((done, rejected), (1, 1));
    assert_eq!(h.generator.count(Call::Introduction), 1);
}

#[tokio::test]
async fn test_threads_run_independently() {
    let h = Harness::new(Scripted::with_delays(&[("Analyst 1", 20)]));

    let (a, b) = tokio::join!(
        h.orchestrator.start("Solar Energy", 1),
        h.orchestrator.start("Wind Energy", 2)
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a, b);

    let listed = h.orchestrator.list().await.unwrap();
    assert_eq!(listed.len(), 2);
    assert!(listed.iter().all(|r| r.stage == PipelineStage::AwaitFeedback));
}

#[tokio::test]
async fn test_render_failure_marks_failed() {
    let generator = Scripted::new();
    let output = TempDir::new().unwrap();
    let blocked = output.path().join("not-a-dir");
    std::fs::write(&blocked, "file in the way").unwrap();

    let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
    let orch = Orchestrator::new(generator, store.clone(), &PipelineConfig::default(), &blocked);

    let id = orch.start("Solar Energy", 1).await.unwrap();
    let err = orch.resume(&id, None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);

    let state = store.get(&id).await.unwrap().unwrap();
    assert_eq!(state.stage, PipelineStage::Failed);
    assert_eq!(state.failure.unwrap().stage, PipelineStage::Finalize);
    assert!(state.final_document.is_none());
    assert!(state.introduction.is_some());
}

#[tokio::test]
async fn test_file_store_survives_restart() {
    let checkpoints = TempDir::new().unwrap();
    let generator = Scripted::new();

    let id = {
        let store = Arc::new(FileStore::new(checkpoints.path()));
        let h = Harness::with_store(generator.clone(), store);
        h.orchestrator.start("Solar Energy", 2).await.unwrap()
    };

    // A fresh orchestrator over the same directory picks the thread up.
    let h = Harness::with_store(generator, Arc::new(FileStore::new(checkpoints.path())));
    assert_eq!(h.orchestrator.status(&id).await.unwrap().stage, PipelineStage::AwaitFeedback);
    assert_eq!(h.orchestrator.resume(&id, None).await.unwrap(), PipelineStage::Done);
}

#[tokio::test]
async fn test_run_continues_interrupted_thread() {
    let h = Harness::new(Scripted::new());
    let id = h.orchestrator.start("Solar Energy", 2).await.unwrap();

    // Simulate a crash right after the interviews were checkpointed.
    let mut state = h.state(&id).await;
    state.stage = PipelineStage::WriteSections;
    for draft in &mut state.sections {
        draft.section = None;
    }
    h.store.put(&state).await.unwrap();

    assert_eq!(h.orchestrator.run(&id).await.unwrap(), PipelineStage::AwaitFeedback);
    assert_eq!(h.generator.count(Call::Personas), 1);
    assert_eq!(h.orchestrator.status(&id).await.unwrap().sections_written, 2);
}

#[tokio::test]
async fn test_spawn_returns_before_run_finishes() {
    let h = Harness::new(Scripted::with_delays(&[("Analyst 1", 50)]));

    let id = h.orchestrator.spawn("Solar Energy", 1).await.unwrap();

    let stage = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let stage = h.orchestrator.status(&id).await.unwrap().stage;
            if stage == PipelineStage::AwaitFeedback {
                return stage;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(stage, PipelineStage::AwaitFeedback);
}

#[tokio::test]
async fn test_unknown_thread_is_reported() {
    let h = Harness::new(Scripted::new());

    let err = h.orchestrator.status("does-not-exist").await.unwrap_err();
    assert!(matches!(err, PipelineError::NotFound(_)));

    let err = h.orchestrator.run("does-not-exist").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidResume);
}
