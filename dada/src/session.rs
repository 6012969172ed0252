//! Player/Coach turn orchestration.
//!
//! Each turn runs the player, then the coach, then reads the coach's feedback
//! for that turn. The three steps never overlap: the coach starts only after
//! the player's run has delivered its terminal event, and feedback is read only
//! after the coach's run has. The loop stops on approval or when the turn
//! budget is spent.

use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::core::approval::Verdict;
use crate::core::budget::TurnBudget;
use crate::core::errors::{AgentRunError, PreconditionError};
use crate::core::event::AgentEvent;
use crate::core::types::{Credential, Role, SessionOutcome, TurnOutcome};
use crate::io::agent::{AgentRequest, AgentRunner};
use crate::io::config::DadaConfig;
use crate::io::prompt::PromptEngine;
use crate::io::session_log::{SessionRecord, TurnRecord, write_session_record, write_turn_record};
use crate::io::workspace::{InitOptions, Workspace, init_workspace};
use crate::observer::Observer;
use crate::roles::{AgentConfig, RoleContract};

/// Drives sessions against one workspace.
///
/// The credential is injected here rather than looked up, so a missing
/// credential is a precondition of [`Orchestrator::run`].
pub struct Orchestrator<'a, R: AgentRunner> {
    runner: &'a R,
    config: &'a DadaConfig,
    credential: Option<Credential>,
    workspace: Workspace,
    prompts: PromptEngine,
    fresh: bool,
}

/// Role configurations for one session.
struct SessionRoles {
    player: AgentConfig,
    coach: AgentConfig,
}

/// Phases of a turn that finished, for the turn record.
#[derive(Debug, Default, Clone, Copy)]
struct TurnProgress {
    player_completed: bool,
    coach_completed: bool,
}

impl<'a, R: AgentRunner> Orchestrator<'a, R> {
    pub fn new(
        runner: &'a R,
        config: &'a DadaConfig,
        credential: Option<Credential>,
        workspace: Workspace,
    ) -> Result<Self> {
        Ok(Self {
            runner,
            config,
            credential,
            workspace,
            prompts: PromptEngine::new()?,
            fresh: false,
        })
    }

    /// Clear feedback left by an earlier session instead of refusing to start.
    pub fn fresh(mut self, fresh: bool) -> Self {
        self.fresh = fresh;
        self
    }

    /// Run the convergence loop until the coach approves or `max_turns` turns
    /// have run.
    ///
    /// Not reaching approval is `Ok` with `approved: false`. Errors are either
    /// a [`PreconditionError`] (raised before any agent runs) or an agent run
    /// failure, which is propagated without retrying.
    #[instrument(skip_all, fields(max_turns = max_turns, root = %self.workspace.root.display()))]
    pub fn run<O: Observer, F: FnMut(&TurnOutcome)>(
        &self,
        requirements: &str,
        max_turns: u32,
        observer: &mut O,
        mut on_turn: F,
    ) -> Result<SessionOutcome> {
        let credential = self.check_preconditions(requirements)?;
        let mut budget = TurnBudget::new(max_turns)?;

        init_workspace(&self.workspace, requirements, &InitOptions { fresh: self.fresh })?;
        let roles = self.session_roles()?;

        let started_at = Utc::now().to_rfc3339();
        info!("session started");
        observer.session_started(max_turns);

        let mut approved = false;
        while !approved {
            let Some(turn) = budget.next_turn() else {
                break;
            };
            let verdict = self.run_turn(turn, max_turns, &roles, credential, observer)?;
            approved = verdict.approved;
            on_turn(&TurnOutcome {
                turn,
                max_turns,
                verdict,
            });
        }

        let outcome = SessionOutcome {
            approved,
            turns_executed: budget.current(),
            workspace: self.workspace.root.clone(),
        };
        let record = SessionRecord {
            outcome: &outcome,
            max_turns,
            started_at,
            ended_at: Utc::now().to_rfc3339(),
        };
        if let Err(err) = write_session_record(&self.workspace, &record) {
            warn!(err = %err, "failed to write session record");
        }
        info!(
            approved = outcome.approved,
            turns = outcome.turns_executed,
            "session finished"
        );
        observer.session_finished(&outcome);
        Ok(outcome)
    }

    fn check_preconditions(&self, requirements: &str) -> Result<&Credential, PreconditionError> {
        let credential =
            self.credential
                .as_ref()
                .ok_or_else(|| PreconditionError::MissingCredential {
                    env: self.config.credential_env.clone(),
                })?;
        if requirements.trim().is_empty() {
            return Err(PreconditionError::EmptyRequirements);
        }
        Ok(credential)
    }

    fn session_roles(&self) -> Result<SessionRoles> {
        let player = RoleContract::player(&self.config.player, &self.prompts)?;
        let coach = RoleContract::coach(&self.config.coach, &self.prompts)?;
        Ok(SessionRoles {
            player: player.agent_config(&self.workspace, &self.config.sandbox),
            coach: coach.agent_config(&self.workspace, &self.config.sandbox),
        })
    }

    /// Run one turn and persist its record, whether it succeeds or fails.
    ///
    /// Records are diagnostics: failing to write one never changes the result.
    fn run_turn<O: Observer>(
        &self,
        turn: u32,
        max_turns: u32,
        roles: &SessionRoles,
        credential: &Credential,
        observer: &mut O,
    ) -> Result<Verdict> {
        let start = Instant::now();
        let started_at = Utc::now().to_rfc3339();
        observer.turn_started(turn, max_turns);

        let mut progress = TurnProgress::default();
        let result = self.run_phases(turn, roles, credential, observer, &mut progress);

        let record = TurnRecord {
            turn,
            max_turns,
            player_completed: progress.player_completed,
            coach_completed: progress.coach_completed,
            verdict: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|err| format!("{err:#}")),
            started_at,
            ended_at: Utc::now().to_rfc3339(),
            duration_ms: start.elapsed().as_millis() as u64,
        };
        if let Err(err) = write_turn_record(&self.workspace, &record) {
            warn!(turn, err = %err, "failed to write turn record");
        }

        let verdict = result?;
        observer.verdict(turn, max_turns, &verdict);
        Ok(verdict)
    }

    fn run_phases<O: Observer>(
        &self,
        turn: u32,
        roles: &SessionRoles,
        credential: &Credential,
        observer: &mut O,
        progress: &mut TurnProgress,
    ) -> Result<Verdict> {
        let prompt = self.prompts.player_prompt(turn)?;
        self.run_phase(turn, &roles.player, prompt, credential, observer)?;
        progress.player_completed = true;

        let prompt = self.prompts.coach_prompt(turn)?;
        self.run_phase(turn, &roles.coach, prompt, credential, observer)?;
        progress.coach_completed = true;

        let feedback = self.workspace.read_feedback(turn)?;
        if feedback.is_none() {
            warn!(turn, "coach wrote no feedback; treating turn as not approved");
        }
        let verdict = Verdict::from_feedback(feedback.as_deref());
        debug!(turn, approved = verdict.approved, status = ?verdict.status_line, "turn judged");
        Ok(verdict)
    }

    /// Start one agent run and drain its events until the terminal event.
    fn run_phase<O: Observer>(
        &self,
        turn: u32,
        config: &AgentConfig,
        prompt: String,
        credential: &Credential,
        observer: &mut O,
    ) -> Result<()> {
        let role = config.role;
        observer.phase_started(role, turn);
        let request = AgentRequest {
            config: config.clone(),
            prompt,
            credential: credential.clone(),
        };

        let events = self
            .runner
            .start(&request)
            .map_err(|err| run_error(role, turn, format!("{err:#}")))?;

        for event in events {
            debug!(%role, turn, kind = event.kind(), "agent event");
            observer.event(role, &event);
            match event {
                AgentEvent::Done => {
                    observer.phase_finished(role, turn);
                    return Ok(());
                }
                AgentEvent::Error { error } => {
                    return Err(run_error(role, turn, error.message));
                }
                _ => {}
            }
        }
        Err(run_error(
            role,
            turn,
            "event stream ended without a terminal event".to_string(),
        ))
    }
}

fn run_error(role: Role, turn: u32, message: String) -> anyhow::Error {
    AgentRunError {
        role,
        turn,
        message,
    }
    .into()
}
