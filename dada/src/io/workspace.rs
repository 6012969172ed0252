//! Shared workspace layout and initialization.
//!
//! Layout under the workspace root:
//!
//! ```text
//! requirements.md        requirement document, written once per session
//! src/                   player output
//! tests/                 player tests
//! feedback/turn-<n>.md   coach feedback, one write-once document per turn
//! .dada/                 turn and session records
//! ```

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::core::errors::PreconditionError;

pub const REQUIREMENTS_FILE: &str = "requirements.md";
pub const SRC_DIR: &str = "src";
pub const TESTS_DIR: &str = "tests";
pub const FEEDBACK_DIR: &str = "feedback";
pub const STATE_DIR: &str = ".dada";

/// File name of the feedback document for `turn`.
pub fn feedback_file_name(turn: u32) -> String {
    format!("turn-{turn}.md")
}

/// Workspace-absolute path agents use to address an entry, e.g. `/requirements.md`.
pub fn logical_path(relative: &str) -> String {
    format!("/{relative}")
}

/// Workspace-absolute path of the feedback document for `turn`.
pub fn logical_feedback_path(turn: u32) -> String {
    logical_path(&format!("{FEEDBACK_DIR}/{}", feedback_file_name(turn)))
}

/// All canonical paths within a workspace root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    pub requirements_path: PathBuf,
    pub src_dir: PathBuf,
    pub tests_dir: PathBuf,
    pub feedback_dir: PathBuf,
    pub state_dir: PathBuf,
    pub turns_dir: PathBuf,
    pub session_record_path: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let state_dir = root.join(STATE_DIR);
        Self {
            requirements_path: root.join(REQUIREMENTS_FILE),
            src_dir: root.join(SRC_DIR),
            tests_dir: root.join(TESTS_DIR),
            feedback_dir: root.join(FEEDBACK_DIR),
            turns_dir: state_dir.join("turns"),
            session_record_path: state_dir.join("session.json"),
            state_dir,
            root,
        }
    }

    pub fn feedback_path(&self, turn: u32) -> PathBuf {
        self.feedback_dir.join(feedback_file_name(turn))
    }

    pub fn turn_record_path(&self, turn: u32) -> PathBuf {
        self.turns_dir.join(format!("turn-{turn}.json"))
    }

    /// Read the feedback document for `turn`, or `None` if the coach wrote none.
    pub fn read_feedback(&self, turn: u32) -> Result<Option<String>> {
        let path = self.feedback_path(turn);
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err).with_context(|| format!("read feedback {}", path.display())),
        }
    }

    /// Turn numbers that already have a feedback document, ascending.
    pub fn existing_feedback_turns(&self) -> Result<Vec<u32>> {
        if !self.feedback_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut turns = Vec::new();
        for entry in fs::read_dir(&self.feedback_dir)
            .with_context(|| format!("read {}", self.feedback_dir.display()))?
        {
            let entry = entry.context("read feedback entry")?;
            let name = entry.file_name();
            if let Some(turn) = parse_feedback_file_name(&name.to_string_lossy()) {
                turns.push(turn);
            }
        }
        turns.sort_unstable();
        Ok(turns)
    }
}

fn parse_feedback_file_name(name: &str) -> Option<u32> {
    name.strip_prefix("turn-")?.strip_suffix(".md")?.parse().ok()
}

/// Options for `init_workspace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Clear feedback and turn records left by an earlier session.
    pub fresh: bool,
}

/// Create the workspace subareas and persist the requirement document.
///
/// Idempotent for an empty feedback area. Fails with
/// [`PreconditionError::StaleFeedback`] if earlier feedback exists and
/// `options.fresh` is not set.
pub fn init_workspace(workspace: &Workspace, requirements: &str, options: &InitOptions) -> Result<()> {
    let stale = workspace.existing_feedback_turns()?;
    if !stale.is_empty() {
        if !options.fresh {
            return Err(PreconditionError::StaleFeedback { turns: stale }.into());
        }
        info!(turns = ?stale, "clearing feedback from earlier session");
        for turn in &stale {
            remove_file(&workspace.feedback_path(*turn))?;
        }
    }
    if options.fresh && workspace.turns_dir.is_dir() {
        fs::remove_dir_all(&workspace.turns_dir)
            .with_context(|| format!("remove {}", workspace.turns_dir.display()))?;
    }

    create_dir(&workspace.root)?;
    create_dir(&workspace.src_dir)?;
    create_dir(&workspace.tests_dir)?;
    create_dir(&workspace.feedback_dir)?;
    create_dir(&workspace.turns_dir)?;

    fs::write(&workspace.requirements_path, requirements)
        .with_context(|| format!("write {}", workspace.requirements_path.display()))?;
    debug!(root = %workspace.root.display(), "workspace initialized");
    Ok(())
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).with_context(|| format!("create directory {}", path.display()))
}

fn remove_file(path: &Path) -> Result<()> {
    fs::remove_file(path).with_context(|| format!("remove {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feedback_key_is_a_function_of_turn() {
        let workspace = Workspace::new("/ws");
        assert_eq!(workspace.feedback_path(3), Path::new("/ws/feedback/turn-3.md"));
        assert_eq!(logical_feedback_path(3), "/feedback/turn-3.md");
        assert_eq!(logical_path(REQUIREMENTS_FILE), "/requirements.md");
        assert!(workspace.turn_record_path(2).ends_with(".dada/turns/turn-2.json"));
    }

    #[test]
    fn parses_only_turn_documents() {
        assert_eq!(parse_feedback_file_name("turn-12.md"), Some(12));
        assert_eq!(parse_feedback_file_name("turn-x.md"), None);
        assert_eq!(parse_feedback_file_name("notes.md"), None);
        assert_eq!(parse_feedback_file_name("turn-1.txt"), None);
    }

    /// Verifies init creates every subarea and persists the requirements.
    #[test]
    fn init_creates_expected_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path().join("ws"));

        init_workspace(&workspace, "# Build a thing\n", &InitOptions::default()).expect("init");

        assert!(workspace.src_dir.is_dir());
        assert!(workspace.tests_dir.is_dir());
        assert!(workspace.feedback_dir.is_dir());
        assert!(workspace.turns_dir.is_dir());
        let requirements = fs::read_to_string(&workspace.requirements_path).expect("read");
        assert_eq!(requirements, "# Build a thing\n");

        init_workspace(&workspace, "# Build a thing\n", &InitOptions::default())
            .expect("re-init is idempotent");
    }

    #[test]
    fn read_feedback_missing_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path());
        init_workspace(&workspace, "req", &InitOptions::default()).expect("init");

        assert_eq!(workspace.read_feedback(1).expect("read"), None);
        fs::write(workspace.feedback_path(1), "**ISSUES FOUND**").expect("write");
        assert_eq!(
            workspace.read_feedback(1).expect("read").as_deref(),
            Some("**ISSUES FOUND**")
        );
    }

    /// Verifies earlier feedback blocks init unless a fresh workspace is requested.
    #[test]
    fn stale_feedback_requires_fresh() {
        let temp = tempfile::tempdir().expect("tempdir");
        let workspace = Workspace::new(temp.path());
        init_workspace(&workspace, "req", &InitOptions::default()).expect("init");
        fs::write(workspace.feedback_path(2), "old").expect("write");
        fs::write(workspace.feedback_path(1), "old").expect("write");
        fs::write(workspace.feedback_dir.join("notes.md"), "keep").expect("write");

        let err = init_workspace(&workspace, "req", &InitOptions::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PreconditionError>(),
            Some(&PreconditionError::StaleFeedback { turns: vec![1, 2] })
        );

        init_workspace(&workspace, "req", &InitOptions { fresh: true }).expect("fresh init");
        assert!(workspace.existing_feedback_turns().expect("list").is_empty());
        assert!(workspace.feedback_dir.join("notes.md").is_file());
    }
}
