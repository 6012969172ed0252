//! Turn budget for the convergence loop.

use crate::core::errors::PreconditionError;

/// Bounded, strictly increasing 1-based turn counter.
///
/// Turns are handed out once each, in order, and never past `max_turns`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnBudget {
    max_turns: u32,
    current: u32,
}

impl TurnBudget {
    pub fn new(max_turns: u32) -> Result<Self, PreconditionError> {
        if max_turns == 0 {
            return Err(PreconditionError::ZeroTurnBudget);
        }
        Ok(Self {
            max_turns,
            current: 0,
        })
    }

    /// Advance to the next turn, or `None` once the budget is spent.
    pub fn next_turn(&mut self) -> Option<u32> {
        if self.current >= self.max_turns {
            return None;
        }
        self.current += 1;
        Some(self.current)
    }

    /// Last turn handed out (0 before the first turn).
    pub fn current(&self) -> u32 {
        self.current
    }
}
