//! Static fixture source.
//!
//! A read-only catalog of grants, reports, section templates and canned
//! drafting content. The built-in catalog is embedded at compile time; a
//! replacement can be loaded from any TOML file with the same layout.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::workflow::{
    Answers, Question, Section, SectionContent, SectionKind, WorkflowError, WorkflowResult,
};

const BUILTIN_CATALOG: &str = include_str!("catalog.toml");

/// A grant opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantFixture {
    pub id: String,
    pub title: String,
    pub funder: String,
    pub amount: u64,
    pub deadline: NaiveDate,
    #[serde(default)]
    pub focus_area: String,
    /// Section template key
    pub template: String,
}

/// A report owed on an awarded grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportFixture {
    pub id: String,
    pub title: String,
    pub grant_id: String,
    pub due: NaiveDate,
    /// Section template key
    pub template: String,
}

/// A question template inside a structured section template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionTemplate {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub word_limit: Option<u32>,
    #[serde(default)]
    pub answer: Option<String>,
}

/// A section template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionTemplate {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub kind: SectionKind,
    #[serde(default)]
    pub required: bool,
    pub order: u32,
    #[serde(default)]
    pub questions: Vec<QuestionTemplate>,
}

impl SectionTemplate {
    /// Instantiate an incomplete section.
    pub fn to_section(&self) -> Section {
        let questions = self
            .questions
            .iter()
            .map(|q| Question {
                id: q.id.clone(),
                section_id: self.id.clone(),
                text: q.text.clone(),
                help_text: q.help_text.clone(),
                placeholder: q.placeholder.clone(),
                word_limit: q.word_limit,
                answer: q.answer.clone(),
            })
            .collect();

        Section::new(self.id.clone(), self.title.clone(), self.kind, self.required, self.order)
            .with_description(self.description.clone())
            .with_questions(questions)
    }
}

/// A set of sections for one grant or report type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateFixture {
    pub name: String,
    /// Requirement questions an analysis can extract
    #[serde(default)]
    pub requirements: Vec<String>,
    pub sections: Vec<SectionTemplate>,
}

impl TemplateFixture {
    /// Instantiate every section.
    pub fn to_sections(&self) -> Vec<Section> {
        self.sections.iter().map(SectionTemplate::to_section).collect()
    }
}

/// Canned content for one section id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<Answers>,
}

impl DraftTemplate {
    /// Content to write, if the template has any.
    pub fn content(&self) -> Option<SectionContent> {
        if let Some(answers) = &self.answers {
            return Some(SectionContent::Answers(answers.clone()));
        }
        self.text.clone().map(SectionContent::Text)
    }
}

/// One question of the pre-generation questionnaire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireItem {
    pub id: String,
    pub text: String,
}

/// Keyword rule routing a questionnaire answer into a section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpliceRule {
    /// Matched case-insensitively against the question text
    pub keyword: String,
    /// Target section id
    pub section: String,
}

/// Read-only fixture lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureCatalog {
    grants: Vec<GrantFixture>,
    reports: Vec<ReportFixture>,
    templates: BTreeMap<String, TemplateFixture>,
    drafts: BTreeMap<String, DraftTemplate>,
    questionnaire: Vec<QuestionnaireItem>,
    splices: Vec<SpliceRule>,
}

impl FixtureCatalog {
    /// The embedded catalog.
    pub fn builtin() -> WorkflowResult<Self> {
        Self::from_toml_str(BUILTIN_CATALOG)
    }

    /// Parse and validate a catalog.
    pub fn from_toml_str(content: &str) -> WorkflowResult<Self> {
        let catalog: Self =
            toml::from_str(content).map_err(|e| WorkflowError::Fixture(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load a catalog file.
    pub fn load(path: &Path) -> WorkflowResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WorkflowError::Fixture(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Check cross-references and section id uniqueness.
    pub fn validate(&self) -> WorkflowResult<()> {
        for grant in &self.grants {
            if !self.templates.contains_key(&grant.template) {
                return Err(WorkflowError::Fixture(format!(
                    "grant '{}' uses unknown template '{}'",
                    grant.id, grant.template
                )));
            }
        }

        for report in &self.reports {
            if !self.templates.contains_key(&report.template) {
                return Err(WorkflowError::Fixture(format!(
                    "report '{}' uses unknown template '{}'",
                    report.id, report.template
                )));
            }
            if !self.grants.iter().any(|g| g.id == report.grant_id) {
                return Err(WorkflowError::Fixture(format!(
                    "report '{}' references unknown grant '{}'",
                    report.id, report.grant_id
                )));
            }
        }

        for (key, template) in &self.templates {
            let mut seen = HashSet::new();
            for section in &template.sections {
                if !seen.insert(section.id.as_str()) {
                    return Err(WorkflowError::Fixture(format!(
                        "template '{}' repeats section '{}'",
                        key, section.id
                    )));
                }
            }
        }

        Ok(())
    }

    /// Look up a grant.
    pub fn grant(&self, id: &str) -> WorkflowResult<&GrantFixture> {
        self.grants
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| WorkflowError::not_found("grant", id))
    }

    /// Look up a report.
    pub fn report(&self, id: &str) -> WorkflowResult<&ReportFixture> {
        self.reports
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| WorkflowError::not_found("report", id))
    }

    /// Look up a section template.
    pub fn template(&self, key: &str) -> WorkflowResult<&TemplateFixture> {
        self.templates.get(key).ok_or_else(|| WorkflowError::not_found("template", key))
    }

    /// All grants.
    pub fn grants(&self) -> &[GrantFixture] {
        &self.grants
    }

    /// All reports.
    pub fn reports(&self) -> &[ReportFixture] {
        &self.reports
    }

    /// Canned content by section id.
    pub fn drafts(&self) -> &BTreeMap<String, DraftTemplate> {
        &self.drafts
    }

    /// The pre-generation questionnaire.
    pub fn questionnaire(&self) -> &[QuestionnaireItem] {
        &self.questionnaire
    }

    /// Look up a questionnaire item by id.
    pub fn questionnaire_item(&self, id: &str) -> Option<&QuestionnaireItem> {
        self.questionnaire.iter().find(|q| q.id == id)
    }

    /// Keyword splice rules.
    pub fn splices(&self) -> &[SpliceRule] {
        &self.splices
    }
}
