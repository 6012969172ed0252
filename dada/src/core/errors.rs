//! Typed errors callers need to tell apart.
//!
//! Everything else travels as `anyhow::Error`; these are recovered with
//! `downcast_ref`.

use std::fmt;

use crate::core::types::Role;

/// A session precondition is unmet. Raised before any turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// No model-access credential was provided.
    MissingCredential { env: String },
    /// The requirement document is empty or whitespace.
    EmptyRequirements,
    /// `max_turns` was zero.
    ZeroTurnBudget,
    /// The feedback area still holds documents from an earlier session.
    StaleFeedback { turns: Vec<u32> },
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreconditionError::MissingCredential { env } => {
                write!(f, "missing model credential ({env} not set)")
            }
            PreconditionError::EmptyRequirements => f.write_str("requirements must not be empty"),
            PreconditionError::ZeroTurnBudget => f.write_str("max_turns must be >= 1"),
            PreconditionError::StaleFeedback { turns } => {
                let turns: Vec<String> = turns.iter().map(u32::to_string).collect();
                write!(
                    f,
                    "workspace already has feedback for turn(s) {} (use --fresh to clear it)",
                    turns.join(", ")
                )
            }
        }
    }
}

impl std::error::Error for PreconditionError {}

/// An agent run ended with an error event, or without any terminal event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRunError {
    pub role: Role,
    pub turn: u32,
    pub message: String,
}

impl fmt::Display for AgentRunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} run failed on turn {}: {}",
            self.role, self.turn, self.message
        )
    }
}

impl std::error::Error for AgentRunError {}
