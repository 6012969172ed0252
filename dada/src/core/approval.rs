//! Approval detection for coach feedback.
//!
//! Approval is a plain, case-sensitive substring test for [`APPROVAL_TOKEN`].
//! Feedback is free-form critique, so nothing else in it is interpreted. A
//! critique that quotes the token (e.g. "do not write COACH APPROVED yet")
//! still counts as approval.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Literal the coach writes to sign off on a turn.
pub const APPROVAL_TOKEN: &str = "COACH APPROVED";

/// Literal the coach writes when the turn is not approved.
pub const ISSUES_TOKEN: &str = "ISSUES FOUND";

/// Approval result for a single turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub approved: bool,
    /// Whether the coach wrote a feedback document for the turn at all.
    pub feedback_present: bool,
    /// Last bold status marker in the feedback, for logs only.
    pub status_line: Option<String>,
}

impl Verdict {
    /// Judge a turn from its feedback document, if one was written.
    pub fn from_feedback(feedback: Option<&str>) -> Self {
        match feedback {
            Some(text) => Self {
                approved: is_approved(text),
                feedback_present: true,
                status_line: status_line(text),
            },
            None => Self {
                approved: false,
                feedback_present: false,
                status_line: None,
            },
        }
    }
}

pub fn is_approved(feedback: &str) -> bool {
    feedback.contains(APPROVAL_TOKEN)
}

/// Extract the last line of the form `**STATUS**`.
pub fn status_line(feedback: &str) -> Option<String> {
    static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^\s*\*\*([^*\n]+)\*\*").expect("status regex should be valid")
    });

    STATUS_RE
        .captures_iter(feedback)
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPROVED_FEEDBACK: &str = "\
## Requirements Compliance
- [x] add
- [x] divide by zero

## Issues Found
None.

## Status
**COACH APPROVED**
";

    const REJECTED_FEEDBACK: &str = "\
## Issues Found
1. src/calc.rs:12 divides without checking for zero

## Status
**ISSUES FOUND**
";

    #[test]
    fn approval_requires_exact_token() {
        assert!(is_approved(APPROVED_FEEDBACK));
        assert!(!is_approved(REJECTED_FEEDBACK));
        assert!(!is_approved("coach approved"));
        assert!(!is_approved("COACH  APPROVED"));
    }

    #[test]
    fn quoted_token_still_counts_as_approval() {
        let feedback = "Do not write \"COACH APPROVED\" until tests pass.\n**ISSUES FOUND**";
        assert!(is_approved(feedback));
    }

    #[test]
    fn missing_feedback_is_not_approved() {
        let verdict = Verdict::from_feedback(None);
        assert!(!verdict.approved);
        assert!(!verdict.feedback_present);
        assert_eq!(verdict.status_line, None);
    }

    #[test]
    fn verdict_reports_status_line() {
        let verdict = Verdict::from_feedback(Some(APPROVED_FEEDBACK));
        assert!(verdict.approved);
        assert!(verdict.feedback_present);
        assert_eq!(verdict.status_line.as_deref(), Some(APPROVAL_TOKEN));

        let verdict = Verdict::from_feedback(Some(REJECTED_FEEDBACK));
        assert!(!verdict.approved);
        assert_eq!(verdict.status_line.as_deref(), Some(ISSUES_TOKEN));
    }

    #[test]
    fn status_line_picks_last_marker() {
        let feedback = "**Draft**\nbody\n**ISSUES FOUND**\n";
        assert_eq!(status_line(feedback).as_deref(), Some("ISSUES FOUND"));
        assert_eq!(status_line("no markers here"), None);
    }
}
