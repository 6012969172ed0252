//! Agent runner abstraction.
//!
//! The [`AgentRunner`] trait decouples turn orchestration from the agent
//! backend. [`CommandAgentRunner`] drives an external agent process that
//! speaks JSON lines; tests use scripted runners that emit predetermined
//! events without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::event::AgentEvent;
use crate::core::types::{Credential, Role};
use crate::io::config::DadaConfig;
use crate::io::process::{StreamingChild, spawn_streaming};
use crate::roles::AgentConfig;

/// Parameters for one agent run.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub config: AgentConfig,
    /// Task prompt for this run.
    pub prompt: String,
    pub credential: Credential,
}

/// Lazy, single-pass event sequence of one run.
///
/// Not restartable: it reflects one linear agent invocation. Runners end it
/// with a terminal event (`done` or `error`).
pub type EventStream<'a> = Box<dyn Iterator<Item = AgentEvent> + 'a>;

/// Abstraction over agent execution backends.
pub trait AgentRunner {
    /// Start a run. Errors here mean the run could not be started at all.
    fn start(&self, request: &AgentRequest) -> Result<EventStream<'_>>;
}

/// Request envelope written to the agent process's stdin.
#[derive(Serialize)]
struct RequestEnvelope<'a> {
    config: &'a AgentConfig,
    prompt: &'a str,
}

/// Runner that spawns the configured agent command per run.
///
/// The process runs in the workspace root with the credential exported under
/// `credential_env` and the sandbox environment added.
#[derive(Debug, Clone)]
pub struct CommandAgentRunner {
    command: Vec<String>,
    credential_env: String,
    exit_grace: Duration,
    stderr_limit_bytes: usize,
}

impl CommandAgentRunner {
    pub fn new(cfg: &DadaConfig) -> Self {
        Self {
            command: cfg.agent.command.clone(),
            credential_env: cfg.credential_env.clone(),
            exit_grace: Duration::from_secs(cfg.agent.exit_grace_secs),
            stderr_limit_bytes: cfg.agent.stderr_limit_bytes,
        }
    }
}

impl AgentRunner for CommandAgentRunner {
    #[instrument(skip_all, fields(role = %request.config.role))]
    fn start(&self, request: &AgentRequest) -> Result<EventStream<'_>> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| anyhow!("agent.command must not be empty"))?;
        info!(program = %program, cwd = %request.config.sandbox.cwd.display(), "starting agent");

        let mut cmd = Command::new(program);
        // Credential last so a sandbox entry of the same name cannot replace it.
        cmd.args(args)
            .current_dir(&request.config.sandbox.cwd)
            .envs(&request.config.sandbox.env)
            .env(&self.credential_env, request.credential.expose());

        let mut payload = serde_json::to_vec(&RequestEnvelope {
            config: &request.config,
            prompt: &request.prompt,
        })
        .context("serialize agent request")?;
        payload.push(b'\n');

        let child = spawn_streaming(cmd, Some(&payload), self.stderr_limit_bytes)
            .with_context(|| format!("start agent {program}"))?;

        Ok(Box::new(CommandRun {
            child,
            role: request.config.role,
            exit_grace: self.exit_grace,
            ended: false,
        }))
    }
}

/// Event stream backed by a running agent process.
struct CommandRun {
    child: StreamingChild,
    role: Role,
    exit_grace: Duration,
    ended: bool,
}

impl CommandRun {
    fn reap_after_terminal(&mut self) {
        match self.child.finish(self.exit_grace) {
            Ok(exit) if !exit.status.success() => {
                warn!(role = %self.role, exit_code = ?exit.status.code(), killed = exit.killed, "agent exited non-zero after terminal event");
            }
            Ok(_) => {}
            Err(err) => warn!(role = %self.role, err = %err, "failed to reap agent"),
        }
    }

    fn exited_without_terminal(&mut self) -> AgentEvent {
        match self.child.finish(self.exit_grace) {
            Ok(exit) => {
                let stderr = exit.stderr_text("agent");
                let mut message = format!(
                    "agent exited with status {:?} before a terminal event",
                    exit.status.code()
                );
                if !stderr.is_empty() {
                    message.push_str(": ");
                    message.push_str(&stderr);
                }
                AgentEvent::error(message)
            }
            Err(err) => AgentEvent::error(format!("{err:#}")),
        }
    }
}

impl Iterator for CommandRun {
    type Item = AgentEvent;

    fn next(&mut self) -> Option<AgentEvent> {
        if self.ended {
            return None;
        }
        loop {
            match self.child.next_line() {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<AgentEvent>(line) {
                        Ok(event) => {
                            if event.is_terminal() {
                                self.ended = true;
                                self.reap_after_terminal();
                            }
                            return Some(event);
                        }
                        Err(err) => {
                            warn!(role = %self.role, err = %err, "skipping malformed agent event");
                        }
                    }
                }
                Ok(None) => {
                    self.ended = true;
                    debug!(role = %self.role, "agent stdout closed");
                    return Some(self.exited_without_terminal());
                }
                Err(err) => {
                    self.ended = true;
                    return Some(AgentEvent::error(format!("read agent output: {err:#}")));
                }
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::io::config::DadaConfig;
    use crate::io::prompt::PromptEngine;
    use crate::io::workspace::Workspace;
    use crate::roles::RoleContract;

    fn runner(script: &str) -> CommandAgentRunner {
        let mut cfg = DadaConfig::default();
        cfg.credential_env = "DADA_TEST_KEY".to_string();
        cfg.agent.command = vec!["sh".to_string(), "-c".to_string(), script.to_string()];
        cfg.agent.exit_grace_secs = 5;
        CommandAgentRunner::new(&cfg)
    }

    fn request(root: &std::path::Path) -> AgentRequest {
        let cfg = DadaConfig::default();
        let prompts = PromptEngine::new().expect("templates");
        let contract = RoleContract::player(&cfg.player, &prompts).expect("contract");
        AgentRequest {
            config: contract.agent_config(&Workspace::new(root), &cfg.sandbox),
            prompt: "Read /requirements.md and implement the solution.".to_string(),
            credential: Credential::new("sk-test").expect("credential"),
        }
    }

    /// Verifies events stream in order and the request reaches the agent on stdin.
    #[test]
    fn streams_events_until_done() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = runner(
            r#"cat > request.json
echo '{"type":"step-start","stepNumber":1}'
echo 'not json'
echo '{"type":"file-written","path":"/src/main.rs"}'
echo "{\"type\":\"text\",\"text\":\"$DADA_TEST_KEY $NODE_ENV\"}"
echo '{"type":"done"}'"#,
        );

        let events: Vec<AgentEvent> = runner
            .start(&request(temp.path()))
            .expect("start")
            .collect();

        assert_eq!(
            events,
            vec![
                AgentEvent::StepStart { step_number: 1 },
                AgentEvent::FileWritten {
                    path: "/src/main.rs".to_string()
                },
                AgentEvent::Text {
                    text: "sk-test development".to_string()
                },
                AgentEvent::Done,
            ]
        );

        let sent = std::fs::read_to_string(temp.path().join("request.json")).expect("request");
        let sent: serde_json::Value = serde_json::from_str(&sent).expect("json");
        assert_eq!(sent["config"]["role"], "player");
        assert_eq!(
            sent["prompt"],
            "Read /requirements.md and implement the solution."
        );
    }

    #[test]
    fn sandbox_env_cannot_replace_credential() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = runner(
            r#"cat > /dev/null
echo "{\"type\":\"text\",\"text\":\"key=$DADA_TEST_KEY\"}"
echo '{"type":"done"}'"#,
        );
        let mut request = request(temp.path());
        request
            .config
            .sandbox
            .env
            .insert("DADA_TEST_KEY".to_string(), "overridden".to_string());

        let events: Vec<AgentEvent> = runner.start(&request).expect("start").collect();

        assert_eq!(
            events[0],
            AgentEvent::Text {
                text: "key=sk-test".to_string()
            }
        );
    }

    #[test]
    fn exit_without_terminal_becomes_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = runner(
            r#"cat > /dev/null
echo '{"type":"step-start","stepNumber":1}'
echo 'model unavailable' >&2
exit 2"#,
        );

        let events: Vec<AgentEvent> = runner
            .start(&request(temp.path()))
            .expect("start")
            .collect();

        assert_eq!(events.len(), 2);
        let AgentEvent::Error { error } = &events[1] else {
            panic!("expected error event, got {:?}", events[1]);
        };
        assert!(error.message.contains("Some(2)"));
        assert!(error.message.contains("model unavailable"));
    }

    #[test]
    fn stream_stops_after_terminal_event() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = runner(
            r#"cat > /dev/null
echo '{"type":"error","error":{"message":"boom"}}'
echo '{"type":"done"}'"#,
        );

        let events: Vec<AgentEvent> = runner
            .start(&request(temp.path()))
            .expect("start")
            .collect();
        assert_eq!(events, vec![AgentEvent::error("boom")]);
    }

    #[test]
    fn missing_program_fails_to_start() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut cfg = DadaConfig::default();
        cfg.agent.command = vec!["dada-test-no-such-agent".to_string()];
        let runner = CommandAgentRunner::new(&cfg);
        let err = match runner.start(&request(temp.path())) {
            Ok(_) => panic!("expected start to fail"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("start agent dada-test-no-such-agent"));
    }
}
