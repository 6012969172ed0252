//! Player/Coach convergence loop for autonomous coding agents.
//!
//! A player agent implements requirements in a shared workspace; a coach agent
//! reviews the result and writes per-turn feedback. Turns repeat until the coach
//! approves or the turn budget is spent.
//!
//! - **[`core`]**: Pure logic (events, approval detection, turn budget, errors).
//!   No I/O.
//! - **[`io`]**: Side effects (workspace files, config, prompts, agent processes,
//!   turn records).
//!
//! [`session`] coordinates the two; [`roles`] assembles per-role agent
//! configuration and [`observer`] renders progress.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod observer;
pub mod roles;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
