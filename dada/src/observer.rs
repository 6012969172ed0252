//! Operator-facing session log.
//!
//! Observers only watch. The orchestrator never reads anything back from them,
//! so nothing an observer does (including failing to write) can change how a
//! session proceeds.

use std::io::{self, Stderr, Stdout, Write};

use tracing::debug;

use crate::core::approval::Verdict;
use crate::core::event::AgentEvent;
use crate::core::types::{Role, SessionOutcome};

/// Receives session progress and agent events, in order.
pub trait Observer {
    fn session_started(&mut self, _max_turns: u32) {}
    fn turn_started(&mut self, _turn: u32, _max_turns: u32) {}
    fn phase_started(&mut self, _role: Role, _turn: u32) {}
    fn event(&mut self, _role: Role, _event: &AgentEvent) {}
    fn phase_finished(&mut self, _role: Role, _turn: u32) {}
    fn verdict(&mut self, _turn: u32, _max_turns: u32, _verdict: &Verdict) {}
    fn session_finished(&mut self, _outcome: &SessionOutcome) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {}

/// One log line for `event`, or `None` for kinds this crate does not know.
///
/// Embedded line breaks in agent text and commands are folded into spaces.
pub fn describe_event(event: &AgentEvent) -> Option<String> {
    let line = match event {
        AgentEvent::Text { text } | AgentEvent::TextSegment { text } => {
            format!("  {}", text.trim_end())
        }
        AgentEvent::StepStart { step_number } => format!("  step {step_number} starting"),
        AgentEvent::StepFinish {
            step_number,
            tool_calls,
        } => format!(
            "  step {step_number} complete ({} tool calls)",
            tool_calls.len()
        ),
        AgentEvent::ToolCall {
            tool_name,
            tool_call_id,
        } => format!("  tool: {tool_name} ({tool_call_id})"),
        AgentEvent::ToolResult {
            tool_name,
            tool_call_id,
        } => format!("  tool result: {tool_name} ({tool_call_id})"),
        AgentEvent::TodosChanged { todos } => format!("  todos updated ({} items)", todos.len()),
        AgentEvent::FileWriteStart { path } => format!("  writing: {path}"),
        AgentEvent::FileWritten { path } => format!("  written: {path}"),
        AgentEvent::FileEdited { path, occurrences } => {
            format!("  edited: {path} ({occurrences} replacements)")
        }
        AgentEvent::FileRead { path, lines } => format!("  read: {path} ({lines} lines)"),
        AgentEvent::Ls { path, count } => format!("  listed: {path} ({count} items)"),
        AgentEvent::Glob { pattern, count } => format!("  glob: {pattern} ({count} matches)"),
        AgentEvent::Grep { pattern, count } => format!("  grep: {pattern} ({count} matches)"),
        AgentEvent::ExecuteStart { command } => format!("  executing: {command}"),
        AgentEvent::ExecuteFinish { command, exit_code } => {
            let mark = if *exit_code == Some(0) { "ok" } else { "failed" };
            let code = exit_code.map_or_else(|| "?".to_string(), |code| code.to_string());
            format!("  [{mark}] executed: {command} -> exit {code}")
        }
        AgentEvent::SubagentStart { name, task } => {
            format!("  subagent started: {name} - {task}")
        }
        AgentEvent::SubagentFinish { name } => format!("  subagent finished: {name}"),
        AgentEvent::UserMessage { content } => {
            let preview: String = content.chars().take(50).collect();
            format!("  user message: {preview}...")
        }
        AgentEvent::ApprovalRequested {
            tool_name,
            approval_id,
        } => format!("  approval requested: {tool_name} ({approval_id})"),
        AgentEvent::ApprovalResponse {
            approved,
            approval_id,
        } => {
            let answer = if *approved { "granted" } else { "denied" };
            format!("  approval {answer}: {approval_id}")
        }
        AgentEvent::CheckpointSaved { thread_id, step } => {
            format!("  checkpoint saved: thread {thread_id}, step {step}")
        }
        AgentEvent::CheckpointLoaded {
            thread_id,
            step,
            messages_count,
        } => format!(
            "  checkpoint loaded: thread {thread_id}, step {step} ({messages_count} messages)"
        ),
        AgentEvent::Done => "  done".to_string(),
        AgentEvent::Error { error } => format!("  error: {}", error.message),
        AgentEvent::Unknown => return None,
    };
    Some(single_line(&line))
}

fn single_line(line: &str) -> String {
    if !line.contains(['\n', '\r']) {
        return line.to_string();
    }
    line.split(['\n', '\r'])
        .map(str::trim_end)
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Line-oriented log: progress and events to `out`, agent errors to `err`.
pub struct ConsoleObserver<O: Write, E: Write> {
    out: O,
    err: E,
}

impl ConsoleObserver<Stdout, Stderr> {
    pub fn stdio() -> Self {
        Self::new(io::stdout(), io::stderr())
    }
}

impl<O: Write, E: Write> ConsoleObserver<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self { out, err }
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }

    fn out_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.out, "{line}") {
            debug!(err = %err, "observer write failed");
        }
    }

    fn err_line(&mut self, line: &str) {
        if let Err(err) = writeln!(self.err, "{line}") {
            debug!(err = %err, "observer write failed");
        }
    }
}

impl<O: Write, E: Write> Observer for ConsoleObserver<O, E> {
    fn session_started(&mut self, max_turns: u32) {
        self.out_line(&format!("starting session (max {max_turns} turns)"));
    }

    fn turn_started(&mut self, turn: u32, max_turns: u32) {
        self.out_line("");
        self.out_line(&format!("=== TURN {turn}/{max_turns} ==="));
    }

    fn phase_started(&mut self, role: Role, _turn: u32) {
        let line = match role {
            Role::Player => "player: implementing...",
            Role::Coach => "coach: reviewing...",
        };
        self.out_line(line);
    }

    fn event(&mut self, _role: Role, event: &AgentEvent) {
        let Some(line) = describe_event(event) else {
            return;
        };
        if matches!(event, AgentEvent::Error { .. }) {
            self.err_line(&line);
        } else {
            self.out_line(&line);
        }
    }

    fn phase_finished(&mut self, role: Role, _turn: u32) {
        self.out_line(&format!("{role} turn complete"));
    }

    fn verdict(&mut self, turn: u32, max_turns: u32, verdict: &Verdict) {
        let line = if verdict.approved {
            format!("coach approved after {turn} turn(s)")
        } else if !verdict.feedback_present {
            format!("no feedback written for turn {turn}")
        } else {
            let status = verdict.status_line.as_deref().unwrap_or("issues found");
            format!("{status} on turn {turn}")
        };
        self.out_line(&line);
        if !verdict.approved && turn < max_turns {
            self.out_line(&format!("continuing to turn {}", turn + 1));
        }
    }

    fn session_finished(&mut self, outcome: &SessionOutcome) {
        if !outcome.approved {
            self.out_line(&format!(
                "max turns ({}) reached without approval",
                outcome.turns_executed
            ));
        }
        if let Err(err) = self.out.flush() {
            debug!(err = %err, "observer flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn console() -> ConsoleObserver<Vec<u8>, Vec<u8>> {
        ConsoleObserver::new(Vec::new(), Vec::new())
    }

    fn text(buf: &[u8]) -> String {
        String::from_utf8(buf.to_vec()).expect("utf8")
    }

    #[test]
    fn describes_salient_fields() {
        let line = describe_event(&AgentEvent::ExecuteFinish {
            command: "bun test".to_string(),
            exit_code: Some(1),
        });
        assert_eq!(line.as_deref(), Some("  [failed] executed: bun test -> exit 1"));

        let line = describe_event(&AgentEvent::FileEdited {
            path: "/src/App.tsx".to_string(),
            occurrences: 2,
        });
        assert_eq!(line.as_deref(), Some("  edited: /src/App.tsx (2 replacements)"));

        let line = describe_event(&AgentEvent::CheckpointLoaded {
            thread_id: "t-1".to_string(),
            step: 3,
            messages_count: 9,
        });
        assert_eq!(
            line.as_deref(),
            Some("  checkpoint loaded: thread t-1, step 3 (9 messages)")
        );
    }

    #[test]
    fn user_message_preview_is_char_bounded() {
        let content = "é".repeat(80);
        let line = describe_event(&AgentEvent::UserMessage { content }).expect("line");
        assert_eq!(line.chars().filter(|c| *c == 'é').count(), 50);
        assert!(line.ends_with("..."));
    }

    #[test]
    fn unknown_events_are_ignored() {
        assert_eq!(describe_event(&AgentEvent::Unknown), None);

        let mut observer = console();
        observer.event(Role::Player, &AgentEvent::Unknown);
        let (out, err) = observer.into_inner();
        assert!(out.is_empty());
        assert!(err.is_empty());
    }

    /// Verifies each event becomes exactly one line and errors go to stderr.
    #[test]
    fn one_line_per_event_with_errors_on_stderr() {
        let mut observer = console();
        observer.event(Role::Coach, &AgentEvent::StepStart { step_number: 1 });
        observer.event(
            Role::Coach,
            &AgentEvent::Grep {
                pattern: "TODO".to_string(),
                count: 4,
            },
        );
        observer.event(Role::Coach, &AgentEvent::error("sandbox timeout"));
        observer.event(Role::Coach, &AgentEvent::Done);

        let (out, err) = observer.into_inner();
        assert_eq!(
            text(&out),
            "  step 1 starting\n  grep: TODO (4 matches)\n  done\n"
        );
        assert_eq!(text(&err), "  error: sandbox timeout\n");
    }

    #[test]
    fn multi_line_fields_stay_on_one_line() {
        let mut observer = console();
        observer.event(
            Role::Player,
            &AgentEvent::Text {
                text: "I'll start by reading.\n\nThen write tests.\n".to_string(),
            },
        );
        observer.event(
            Role::Player,
            &AgentEvent::ExecuteStart {
                command: "cat > a.ts <<EOF\r\nx\r\nEOF".to_string(),
            },
        );

        let (out, _) = observer.into_inner();
        let out = text(&out);
        assert_eq!(out.lines().count(), 2);
        assert_eq!(
            out,
            "  I'll start by reading. Then write tests.\n  executing: cat > a.ts <<EOF x EOF\n"
        );
    }

    #[test]
    fn reports_turn_progress_and_budget_exhaustion() {
        let mut observer = console();
        observer.turn_started(3, 3);
        observer.verdict(
            3,
            3,
            &Verdict {
                approved: false,
                feedback_present: true,
                status_line: Some("ISSUES FOUND".to_string()),
            },
        );
        observer.session_finished(&SessionOutcome {
            approved: false,
            turns_executed: 3,
            workspace: PathBuf::from("ws"),
        });

        let (out, _) = observer.into_inner();
        assert_eq!(
            text(&out),
            "\n=== TURN 3/3 ===\nISSUES FOUND on turn 3\nmax turns (3) reached without approval\n"
        );
    }

    #[test]
    fn reports_missing_feedback_and_continuation() {
        let mut observer = console();
        observer.verdict(1, 2, &Verdict::from_feedback(None));
        let (out, _) = observer.into_inner();
        assert_eq!(
            text(&out),
            "no feedback written for turn 1\ncontinuing to turn 2\n"
        );
    }
}
