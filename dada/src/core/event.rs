//! Progress events emitted by an agent run.
//!
//! Wire format is one JSON object per line, tagged by `type` in kebab-case,
//! with camelCase fields. Kinds this crate does not know deserialize to
//! [`AgentEvent::Unknown`] instead of failing the run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AgentEvent {
    Text {
        text: String,
    },
    TextSegment {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    StepStart {
        step_number: u32,
    },
    #[serde(rename_all = "camelCase")]
    StepFinish {
        step_number: u32,
        #[serde(default)]
        tool_calls: Vec<Value>,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_name: String,
        tool_call_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolResult {
        tool_name: String,
        tool_call_id: String,
    },
    TodosChanged {
        #[serde(default)]
        todos: Vec<Value>,
    },
    FileWriteStart {
        path: String,
    },
    FileWritten {
        path: String,
    },
    FileEdited {
        path: String,
        occurrences: u32,
    },
    FileRead {
        path: String,
        lines: u64,
    },
    Ls {
        path: String,
        count: u64,
    },
    Glob {
        pattern: String,
        count: u64,
    },
    Grep {
        pattern: String,
        count: u64,
    },
    ExecuteStart {
        command: String,
    },
    #[serde(rename_all = "camelCase")]
    ExecuteFinish {
        command: String,
        exit_code: Option<i32>,
    },
    SubagentStart {
        name: String,
        task: String,
    },
    SubagentFinish {
        name: String,
    },
    UserMessage {
        content: String,
    },
    #[serde(rename_all = "camelCase")]
    ApprovalRequested {
        tool_name: String,
        approval_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ApprovalResponse {
        approved: bool,
        approval_id: String,
    },
    #[serde(rename_all = "camelCase")]
    CheckpointSaved {
        thread_id: String,
        step: u32,
    },
    #[serde(rename_all = "camelCase")]
    CheckpointLoaded {
        thread_id: String,
        step: u32,
        messages_count: u32,
    },
    /// Terminal: the run completed.
    Done,
    /// Terminal: the run failed.
    Error {
        error: ErrorPayload,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub message: String,
}

impl AgentEvent {
    /// Build a terminal error event.
    pub fn error(message: impl Into<String>) -> Self {
        AgentEvent::Error {
            error: ErrorPayload {
                message: message.into(),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done | AgentEvent::Error { .. })
    }

    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AgentEvent::Text { .. } => "text",
            AgentEvent::TextSegment { .. } => "text-segment",
            AgentEvent::StepStart { .. } => "step-start",
            AgentEvent::StepFinish { .. } => "step-finish",
            AgentEvent::ToolCall { .. } => "tool-call",
            AgentEvent::ToolResult { .. } => "tool-result",
            AgentEvent::TodosChanged { .. } => "todos-changed",
            AgentEvent::FileWriteStart { .. } => "file-write-start",
            AgentEvent::FileWritten { .. } => "file-written",
            AgentEvent::FileEdited { .. } => "file-edited",
            AgentEvent::FileRead { .. } => "file-read",
            AgentEvent::Ls { .. } => "ls",
            AgentEvent::Glob { .. } => "glob",
            AgentEvent::Grep { .. } => "grep",
            AgentEvent::ExecuteStart { .. } => "execute-start",
            AgentEvent::ExecuteFinish { .. } => "execute-finish",
            AgentEvent::SubagentStart { .. } => "subagent-start",
            AgentEvent::SubagentFinish { .. } => "subagent-finish",
            AgentEvent::UserMessage { .. } => "user-message",
            AgentEvent::ApprovalRequested { .. } => "approval-requested",
            AgentEvent::ApprovalResponse { .. } => "approval-response",
            AgentEvent::CheckpointSaved { .. } => "checkpoint-saved",
            AgentEvent::CheckpointLoaded { .. } => "checkpoint-loaded",
            AgentEvent::Done => "done",
            AgentEvent::Error { .. } => "error",
            AgentEvent::Unknown => "unknown",
        }
    }
}
