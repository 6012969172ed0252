//! Test-only helpers: scripted agent runs and a recording observer.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::core::approval::Verdict;
use crate::core::event::AgentEvent;
use crate::core::types::{Credential, Role, SessionOutcome};
use crate::io::agent::{AgentRequest, AgentRunner, EventStream};
use crate::io::config::DadaConfig;
use crate::io::workspace::{FEEDBACK_DIR, Workspace, feedback_file_name, logical_path};

type Effect = Box<dyn Fn(&Path) -> Result<()>>;

/// One predetermined agent run.
///
/// The effect runs against the workspace root when the run starts; the events
/// are then replayed in order.
pub struct ScriptedPhase {
    effect: Option<Effect>,
    events: Vec<AgentEvent>,
}

impl ScriptedPhase {
    /// A run that does nothing and finishes cleanly.
    pub fn completes() -> Self {
        Self {
            effect: None,
            events: vec![AgentEvent::StepStart { step_number: 1 }, AgentEvent::Done],
        }
    }

    /// A run that writes `contents` to `relative` under the workspace root.
    pub fn writes(relative: &str, contents: &str) -> Self {
        let rel = relative.to_string();
        let body = contents.to_string();
        Self {
            effect: Some(Box::new(move |root: &Path| {
                let path = root.join(&rel);
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&path, &body).with_context(|| format!("write {}", path.display()))
            })),
            events: vec![
                AgentEvent::FileWritten {
                    path: logical_path(relative),
                },
                AgentEvent::Done,
            ],
        }
    }

    /// A coach run that writes its feedback for `turn`.
    pub fn feedback(turn: u32, text: &str) -> Self {
        Self::writes(&format!("{FEEDBACK_DIR}/{}", feedback_file_name(turn)), text)
    }

    /// A run that reports an error event.
    pub fn fails(message: &str) -> Self {
        Self {
            effect: None,
            events: vec![
                AgentEvent::StepStart { step_number: 1 },
                AgentEvent::error(message),
            ],
        }
    }

    /// A run whose stream ends without a terminal event.
    pub fn truncated() -> Self {
        Self {
            effect: None,
            events: vec![AgentEvent::StepStart { step_number: 1 }],
        }
    }

    /// Replace the effect, keeping the events.
    pub fn with_effect(mut self, effect: impl Fn(&Path) -> Result<()> + 'static) -> Self {
        self.effect = Some(Box::new(effect));
        self
    }
}

/// Runner that replays [`ScriptedPhase`]s in order and records every request.
///
/// Starting a run with no phases left fails to start.
pub struct ScriptedRunner {
    phases: RefCell<VecDeque<ScriptedPhase>>,
    requests: RefCell<Vec<AgentRequest>>,
}

impl ScriptedRunner {
    pub fn new(phases: Vec<ScriptedPhase>) -> Self {
        Self {
            phases: RefCell::new(phases.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<AgentRequest> {
        self.requests.borrow().clone()
    }

    pub fn remaining(&self) -> usize {
        self.phases.borrow().len()
    }
}

impl AgentRunner for ScriptedRunner {
    fn start(&self, request: &AgentRequest) -> Result<EventStream<'_>> {
        self.requests.borrow_mut().push(request.clone());
        let phase = self
            .phases
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("no scripted phase left for {}", request.config.role))?;
        if let Some(effect) = &phase.effect {
            effect(&request.config.sandbox.cwd)?;
        }
        Ok(Box::new(phase.events.into_iter()))
    }
}

/// Observer that records a compact line per callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub log: Vec<String>,
}

impl crate::observer::Observer for RecordingObserver {
    fn session_started(&mut self, max_turns: u32) {
        self.log.push(format!("session {max_turns}"));
    }

    fn turn_started(&mut self, turn: u32, max_turns: u32) {
        self.log.push(format!("turn {turn}/{max_turns}"));
    }

    fn phase_started(&mut self, role: Role, _turn: u32) {
        self.log.push(format!("start {role}"));
    }

    fn event(&mut self, role: Role, event: &AgentEvent) {
        self.log.push(format!("event {role} {}", event.kind()));
    }

    fn phase_finished(&mut self, role: Role, _turn: u32) {
        self.log.push(format!("finish {role}"));
    }

    fn verdict(&mut self, turn: u32, _max_turns: u32, verdict: &Verdict) {
        let status = if verdict.approved {
            "approved"
        } else {
            "not-approved"
        };
        self.log.push(format!("verdict {turn} {status}"));
    }

    fn session_finished(&mut self, outcome: &SessionOutcome) {
        let status = if outcome.approved {
            "approved"
        } else {
            "not-approved"
        };
        self.log
            .push(format!("outcome {status} {}", outcome.turns_executed));
    }
}

pub fn test_credential() -> Credential {
    Credential::new("sk-test-credential").expect("non-blank credential")
}

pub fn test_config() -> DadaConfig {
    DadaConfig::default()
}

/// Temporary directory with a workspace rooted at `<tmp>/workspace`.
///
/// The workspace directory itself is not created.
pub fn temp_workspace() -> (TempDir, Workspace) {
    let temp = tempfile::tempdir().expect("tempdir");
    let workspace = Workspace::new(temp.path().join("workspace"));
    (temp, workspace)
}
