//! Turn and session records under `<workspace>/.dada/`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::core::approval::Verdict;
use crate::core::types::SessionOutcome;
use crate::io::workspace::Workspace;

/// What happened in one turn. Written after the turn finishes or fails.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRecord {
    pub turn: u32,
    pub max_turns: u32,
    pub player_completed: bool,
    pub coach_completed: bool,
    /// Absent when a phase failed before the feedback was read.
    pub verdict: Option<Verdict>,
    pub error: Option<String>,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord<'a> {
    #[serde(flatten)]
    pub outcome: &'a SessionOutcome,
    pub max_turns: u32,
    pub started_at: String,
    pub ended_at: String,
}

pub fn write_turn_record(workspace: &Workspace, record: &TurnRecord) -> Result<PathBuf> {
    let path = workspace.turn_record_path(record.turn);
    write_json(&path, record)?;
    Ok(path)
}

pub fn write_session_record(workspace: &Workspace, record: &SessionRecord<'_>) -> Result<PathBuf> {
    let path = workspace.session_record_path.clone();
    write_json(&path, record)?;
    Ok(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}
