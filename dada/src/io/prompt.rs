//! Prompt rendering for role directives and per-turn task prompts.

use anyhow::{Context, Result};
use minijinja::{Environment, Value, context};

use crate::core::approval::{APPROVAL_TOKEN, ISSUES_TOKEN};
use crate::io::workspace::{
    FEEDBACK_DIR, REQUIREMENTS_FILE, SRC_DIR, TESTS_DIR, logical_feedback_path, logical_path,
};

const PLAYER_DIRECTIVE: &str = include_str!("prompts/player.md");
const COACH_DIRECTIVE: &str = include_str!("prompts/coach.md");
const PLAYER_INITIAL: &str = include_str!("prompts/player_initial.md");
const PLAYER_FOLLOWUP: &str = include_str!("prompts/player_followup.md");
const COACH_REVIEW: &str = include_str!("prompts/coach_review.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (name, source) in [
            ("player", PLAYER_DIRECTIVE),
            ("coach", COACH_DIRECTIVE),
            ("player_initial", PLAYER_INITIAL),
            ("player_followup", PLAYER_FOLLOWUP),
            ("coach_review", COACH_REVIEW),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("load {name} template"))?;
        }
        Ok(Self { env })
    }

    /// System directive for the player role.
    pub fn player_directive(&self) -> Result<String> {
        self.render("player", layout_context())
    }

    /// System directive for the coach role.
    pub fn coach_directive(&self) -> Result<String> {
        self.render("coach", layout_context())
    }

    /// Task prompt for the player on `turn`.
    ///
    /// Turn 1 implements from the requirements; later turns address the
    /// previous turn's feedback.
    pub fn player_prompt(&self, turn: u32) -> Result<String> {
        if turn <= 1 {
            return self.render("player_initial", layout_context());
        }
        self.render(
            "player_followup",
            context! {
                previous_feedback => logical_feedback_path(turn - 1),
                ..layout_context()
            },
        )
    }

    /// Task prompt for the coach on `turn`.
    pub fn coach_prompt(&self, turn: u32) -> Result<String> {
        self.render(
            "coach_review",
            context! {
                feedback => logical_feedback_path(turn),
                ..layout_context()
            },
        )
    }

    fn render(&self, name: &str, ctx: Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        let rendered = template
            .render(ctx)
            .with_context(|| format!("render {name} prompt"))?;
        Ok(rendered)
    }
}

fn layout_context() -> Value {
    context! {
        requirements => logical_path(REQUIREMENTS_FILE),
        src => logical_path(&format!("{SRC_DIR}/")),
        tests => logical_path(&format!("{TESTS_DIR}/")),
        feedback_dir => logical_path(&format!("{FEEDBACK_DIR}/")),
        approval_token => APPROVAL_TOKEN,
        issues_token => ISSUES_TOKEN,
    }
}
