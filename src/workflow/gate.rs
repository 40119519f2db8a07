//! Submission gate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::section::{Section, SectionId};

/// Whether every required section is marked completed.
pub fn can_submit(sections: &[Section]) -> bool {
    sections.iter().filter(|s| s.required).all(|s| s.completed)
}

/// A completed submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// Workflow instance id
    pub workflow_id: uuid::Uuid,

    /// Grant or report id
    pub target_id: String,

    /// Route the caller should navigate to
    pub redirect: String,

    /// When the submission happened
    pub submitted_at: DateTime<Utc>,
}

/// Result of a submit request.
///
/// A blocked submission is a value, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The terminal action ran
    Submitted(Submission),

    /// Required sections are still incomplete
    Rejected {
        /// Ids of the incomplete required sections
        missing: Vec<SectionId>,
        /// User-facing message
        message: String,
    },

    /// The instance was already submitted; nothing ran
    AlreadySubmitted,
}

impl SubmitOutcome {
    /// Check if this call performed the submission.
    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted(_))
    }
}

/// Validation in front of the terminal submit transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionGate;

impl SubmissionGate {
    /// Check the sections; `Err` carries the rejection.
    pub fn check(&self, sections: &[Section]) -> Result<(), SubmitOutcome> {
        if can_submit(sections) {
            return Ok(());
        }

        let missing: Vec<&Section> =
            sections.iter().filter(|s| s.required && !s.completed).collect();
        let titles: Vec<&str> = missing.iter().map(|s| s.title.as_str()).collect();

        Err(SubmitOutcome::Rejected {
            missing: missing.iter().map(|s| s.id.clone()).collect(),
            message: format!(
                "Complete all required sections before submitting: {}",
                titles.join(", ")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::section::SectionKind;

    fn section(id: &str, required: bool, completed: bool) -> Section {
        let mut s = Section::new(id, id.to_uppercase(), SectionKind::FreeText, required, 1);
        s.completed = completed;
        s
    }

    #[test]
    fn test_required_incomplete_blocks() {
        let sections = vec![
            section("a", true, false),
            section("b", true, true),
            section("c", true, true),
            section("d", false, false),
        ];
        assert!(!can_submit(&sections));

        let Err(SubmitOutcome::Rejected { missing, message }) = SubmissionGate.check(&sections)
        else {
            panic!("expected rejection");
        };
        assert_eq!(missing, vec!["a"]);
        assert!(message.contains('A'));
    }

    #[test]
    fn test_optional_sections_never_block() {
        // Every optional-state permutation with all required complete
        for mask in 0..4u8 {
            let sections = vec![
                section("req", true, true),
                section("opt1", false, mask & 1 == 1),
                section("opt2", false, mask & 2 == 2),
            ];
            assert!(can_submit(&sections));
            assert!(SubmissionGate.check(&sections).is_ok());
        }
    }

    #[test]
    fn test_any_incomplete_required_blocks_all_permutations() {
        for mask in 0..8u8 {
            let sections = vec![
                section("r1", true, mask & 1 == 1),
                section("r2", true, mask & 2 == 2),
                section("opt", false, mask & 4 == 4),
            ];
            let all_required = mask & 3 == 3;
            assert_eq!(can_submit(&sections), all_required);
        }
    }

    #[test]
    fn test_no_sections_can_submit() {
        assert!(can_submit(&[]));
    }
}
