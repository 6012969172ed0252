//! I/O helpers for sessions.

pub mod agent;
pub mod config;
pub mod process;
pub mod prompt;
pub mod session_log;
pub mod workspace;
