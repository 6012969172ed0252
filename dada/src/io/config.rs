//! Session configuration stored in `dada.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Default location of the configuration file, relative to the current directory.
pub const DEFAULT_CONFIG_PATH: &str = "dada.toml";

/// Session configuration (TOML).
///
/// Intended to be edited by humans. Missing fields and tables fall back to the
/// defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DadaConfig {
    /// Turn budget for a session. `dada run --max-turns` overrides it.
    pub max_turns: u32,

    /// Environment variable holding the model-access credential.
    pub credential_env: String,

    pub agent: AgentCommandConfig,
    pub sandbox: SandboxConfig,
    pub player: PlayerSettings,
    pub coach: CoachSettings,
}

/// How to launch the external agent process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentCommandConfig {
    /// Program and arguments. The request is written to its stdin and events
    /// are read from its stdout as JSON lines.
    pub command: Vec<String>,

    /// How long to wait for the process to exit once its stdout closes.
    pub exit_grace_secs: u64,

    /// Keep at most this many bytes of agent stderr for error reports.
    pub stderr_limit_bytes: usize,
}

/// Sandbox policy forwarded to the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Wall-clock limit for each command the agent executes.
    pub command_timeout_secs: u64,

    /// Extra environment for agent commands.
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlayerSettings {
    pub model: String,
    pub max_steps: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CoachSettings {
    pub model: String,
    pub max_steps: u32,
    pub summarization: SummarizationPolicy,
}

/// Bounds conversation growth inside a single agent run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SummarizationPolicy {
    /// Summarize once accumulated context exceeds this many tokens.
    pub token_threshold: u64,
    /// Recent messages kept verbatim after summarizing.
    pub keep_messages: u32,
}

impl Default for DadaConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            credential_env: "ANTHROPIC_API_KEY".to_string(),
            agent: AgentCommandConfig::default(),
            sandbox: SandboxConfig::default(),
            player: PlayerSettings::default(),
            coach: CoachSettings::default(),
        }
    }
}

impl Default for AgentCommandConfig {
    fn default() -> Self {
        Self {
            command: vec!["deep-agent".to_string(), "--jsonl".to_string()],
            exit_grace_secs: 10,
            stderr_limit_bytes: 100_000,
        }
    }
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: 120,
            env: BTreeMap::from([("NODE_ENV".to_string(), "development".to_string())]),
        }
    }
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            model: "claude-haiku-4-5-20251001".to_string(),
            max_steps: 50,
        }
    }
}

impl Default for CoachSettings {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5-20250929".to_string(),
            max_steps: 50,
            summarization: SummarizationPolicy::default(),
        }
    }
}

impl Default for SummarizationPolicy {
    fn default() -> Self {
        Self {
            token_threshold: 170_000,
            keep_messages: 6,
        }
    }
}

impl DadaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.credential_env.trim().is_empty() {
            return Err(anyhow!("credential_env must not be empty"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        if self.agent.exit_grace_secs == 0 {
            return Err(anyhow!("agent.exit_grace_secs must be > 0"));
        }
        if self.agent.stderr_limit_bytes == 0 {
            return Err(anyhow!("agent.stderr_limit_bytes must be > 0"));
        }
        if self.sandbox.command_timeout_secs == 0 {
            return Err(anyhow!("sandbox.command_timeout_secs must be > 0"));
        }
        validate_role("player", &self.player.model, self.player.max_steps)?;
        validate_role("coach", &self.coach.model, self.coach.max_steps)?;
        if self.coach.summarization.token_threshold == 0 {
            return Err(anyhow!("coach.summarization.token_threshold must be > 0"));
        }
        if self.coach.summarization.keep_messages == 0 {
            return Err(anyhow!("coach.summarization.keep_messages must be > 0"));
        }
        Ok(())
    }
}

fn validate_role(role: &str, model: &str, max_steps: u32) -> Result<()> {
    if model.trim().is_empty() {
        return Err(anyhow!("{role}.model must not be empty"));
    }
    if max_steps == 0 {
        return Err(anyhow!("{role}.max_steps must be > 0"));
    }
    Ok(())
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `DadaConfig::default()`.
pub fn load_config(path: &Path) -> Result<DadaConfig> {
    if !path.exists() {
        let cfg = DadaConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: DadaConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &DadaConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
