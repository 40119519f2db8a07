//! Drafting workflow error types.

use thiserror::Error;

use super::drafting::WorkflowPhase;

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Errors that can occur while driving a drafting workflow.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Unknown grant, report or template id.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Two sections in one catalog share an id.
    #[error("Duplicate section id: {0}")]
    DuplicateSection(String),

    /// The operation named a section that is not in the catalog.
    #[error("Unknown section: {0}")]
    UnknownSection(String),

    /// The operation is not allowed in the current phase.
    #[error("Cannot {action} while the workflow is {phase}")]
    InvalidPhase { phase: WorkflowPhase, action: &'static str },

    /// The write does not match the section's content kind.
    #[error("Section '{section}' expects {expected} content")]
    ContentKind { section: String, expected: &'static str },

    /// The fixture catalog could not be read.
    #[error("Fixture catalog error: {0}")]
    Fixture(String),
}

impl WorkflowError {
    /// Shorthand for a missing grant/report/template.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Whether this is a not-found error (rendered as an empty state).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Malformed stored content for a structured section.
///
/// Never surfaced as a fault: callers reinitialize the section's answers and
/// log a warning.
#[derive(Debug, Error)]
#[error("Malformed answers for section '{section}': {reason}")]
pub struct RecoverableParseError {
    /// Section whose payload could not be read.
    pub section: String,

    /// Parser message.
    pub reason: String,
}
