//! Behavioral contracts for the player and coach roles.
//!
//! A contract describes how a role should behave, not how it runs. Turning a
//! contract into an [`AgentConfig`] is pure assembly with no side effects.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::core::types::Role;
use crate::io::config::{CoachSettings, PlayerSettings, SandboxConfig, SummarizationPolicy};
use crate::io::prompt::PromptEngine;
use crate::io::workspace::Workspace;

/// Role name bound to its directive, step budget, and summarization policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleContract {
    pub role: Role,
    pub model: String,
    pub directive: String,
    /// Upper bound on autonomous actions in one run.
    pub max_steps: u32,
    pub summarization: Option<SummarizationPolicy>,
}

impl RoleContract {
    /// Short-lived implementer; no summarization.
    pub fn player(settings: &PlayerSettings, prompts: &PromptEngine) -> Result<Self> {
        Ok(Self {
            role: Role::Player,
            model: settings.model.clone(),
            directive: prompts.player_directive()?,
            max_steps: settings.max_steps,
            summarization: None,
        })
    }

    /// Reviewer; reads large amounts of source across turns, so its context is
    /// summarized past a threshold.
    pub fn coach(settings: &CoachSettings, prompts: &PromptEngine) -> Result<Self> {
        Ok(Self {
            role: Role::Coach,
            model: settings.model.clone(),
            directive: prompts.coach_directive()?,
            max_steps: settings.max_steps,
            summarization: Some(settings.summarization),
        })
    }

    /// Ready-to-invoke configuration for this role against `workspace`.
    pub fn agent_config(&self, workspace: &Workspace, sandbox: &SandboxConfig) -> AgentConfig {
        AgentConfig {
            role: self.role,
            model: self.model.clone(),
            system_prompt: self.directive.clone(),
            max_steps: self.max_steps,
            summarization: self.summarization,
            sandbox: SandboxPolicy {
                cwd: workspace.root.clone(),
                command_timeout_secs: sandbox.command_timeout_secs,
                env: sandbox.env.clone(),
            },
        }
    }
}

/// Configuration handed to the agent runner for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub role: Role,
    pub model: String,
    pub system_prompt: String,
    pub max_steps: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarization: Option<SummarizationPolicy>,
    pub sandbox: SandboxPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxPolicy {
    /// Working directory for agent commands (the workspace root).
    pub cwd: PathBuf,
    pub command_timeout_secs: u64,
    pub env: BTreeMap<String, String>,
}
