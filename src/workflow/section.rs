//! Sections and the per-instance section catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{WorkflowError, WorkflowResult};
use super::question::Question;

/// Stable section key, unique within a workflow instance.
pub type SectionId = String;

/// How a section's content is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    /// Free-form prose
    FreeText,
    /// Map of question id to answer
    StructuredQuestions,
    /// Budget lines as text
    BudgetTable,
    /// Milestones as text
    Timeline,
    /// Reference to uploaded files
    FileUpload,
}

impl SectionKind {
    /// Whether content is a question/answer map.
    pub fn is_structured(self) -> bool {
        matches!(self, Self::StructuredQuestions)
    }

    /// Whether progress is measured by content length.
    pub fn is_prose(self) -> bool {
        matches!(self, Self::FreeText | Self::StructuredQuestions)
    }

    /// Kebab-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::FreeText => "free-text",
            Self::StructuredQuestions => "structured-questions",
            Self::BudgetTable => "budget-table",
            Self::Timeline => "timeline",
            Self::FileUpload => "file-upload",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One titled unit of an application or report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Stable id
    pub id: SectionId,

    /// Display title
    pub title: String,

    /// Display description
    pub description: String,

    /// Content kind
    pub kind: SectionKind,

    /// Fixed when the catalog is populated
    pub required: bool,

    /// Marked by the user or by a non-empty write
    pub completed: bool,

    /// Presentation order
    pub order: u32,

    /// Questions for structured sections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<Question>,
}

impl Section {
    /// Create an incomplete section without questions.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        kind: SectionKind,
        required: bool,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            kind,
            required,
            completed: false,
            order,
            questions: Vec::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Attach questions.
    pub fn with_questions(mut self, questions: Vec<Question>) -> Self {
        self.questions = questions;
        self
    }

    /// Find a question by id.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

/// The working set of sections for one workflow instance.
#[derive(Debug, Clone, Default)]
pub struct SectionCatalog {
    sections: Vec<Section>,
}

impl SectionCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working set.
    ///
    /// Either every section is installed or, on a duplicate id, nothing
    /// changes.
    pub fn populate(&mut self, mut sections: Vec<Section>) -> WorkflowResult<()> {
        let mut seen = std::collections::HashSet::new();
        for section in &sections {
            if !seen.insert(section.id.as_str()) {
                return Err(WorkflowError::DuplicateSection(section.id.clone()));
            }
        }

        sections.sort_by_key(|s| s.order);
        self.sections = sections;
        Ok(())
    }

    /// Flip a section's completion flag without looking at its content.
    ///
    /// Returns the new value.
    pub fn toggle_completion(&mut self, id: &str) -> WorkflowResult<bool> {
        let section = self.get_mut(id)?;
        section.completed = !section.completed;
        Ok(section.completed)
    }

    /// Set a section's completion flag.
    pub fn set_completed(&mut self, id: &str, completed: bool) -> WorkflowResult<()> {
        self.get_mut(id)?.completed = completed;
        Ok(())
    }

    /// Append an optional free-text section.
    ///
    /// Returns `None` (and changes nothing) if the title is blank or a
    /// section with the same title already exists.
    pub fn add_custom_section(&mut self, title: &str) -> Option<SectionId> {
        let title = title.trim();
        if title.is_empty() || self.sections.iter().any(|s| s.title.eq_ignore_ascii_case(title)) {
            return None;
        }

        let id = self.unique_id(&slugify(title));
        let order = self.sections.iter().map(|s| s.order).max().map_or(1, |max| max + 1);

        self.sections.push(
            Section::new(id.clone(), title, SectionKind::FreeText, false, order)
                .with_description("Custom section"),
        );

        Some(id)
    }

    /// Look up a section.
    pub fn get(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> WorkflowResult<&mut Section> {
        self.sections
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| WorkflowError::UnknownSection(id.to_string()))
    }

    /// Check if a section exists.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Sections in presentation order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Sections as a slice, in presentation order.
    pub fn as_slice(&self) -> &[Section] {
        &self.sections
    }

    /// Required sections that are not completed.
    pub fn incomplete_required(&self) -> Vec<&Section> {
        self.sections.iter().filter(|s| s.required && !s.completed).collect()
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// Check if no sections are loaded.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    fn unique_id(&self, base: &str) -> SectionId {
        let base = if base.is_empty() { "section" } else { base };
        if !self.contains(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}-{n}"))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }
}

/// Lowercase, dash-separated id from a title.
pub fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
