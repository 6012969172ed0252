//! Stable exit codes for dada CLI commands.

/// Session ended with coach approval, or `init` succeeded.
pub const OK: i32 = 0;
/// Session used its whole turn budget without approval.
pub const NOT_APPROVED: i32 = 1;
/// Precondition, configuration, or agent run failure.
pub const ERROR: i32 = 1;
