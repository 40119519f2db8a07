//! Pluggable analysis and drafting backends.
//!
//! The workflow only sees these traits; the canned implementations below
//! stand in for a real document parser or writing assistant.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::content::SectionContent;
use super::question::{Questionnaire, RequirementQuestion};
use super::section::{Section, SectionId, SectionKind};
use crate::core::SeededRng;
use crate::fixtures::{DraftTemplate, FixtureCatalog, SpliceRule, TemplateFixture};

/// Input to an RFP analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    /// Grant or report id
    pub target_id: String,

    /// Section template for the grant type
    pub template: TemplateFixture,

    /// How many requirement questions to extract
    pub requirement_count: usize,

    /// Seed for any pseudo-random choices
    pub seed: u64,
}

/// Result of an RFP analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// Sections to install
    pub sections: Vec<Section>,

    /// Extracted requirement questions
    pub requirements: Vec<RequirementQuestion>,
}

/// Backend that turns an RFP into sections and requirements.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Analyze an RFP.
    async fn analyze(&self, request: AnalysisRequest) -> anyhow::Result<AnalysisOutcome>;

    /// Get the backend name.
    fn name(&self) -> &str;
}

/// Analysis that returns the template's sections and a seeded sample of
/// its requirement pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedAnalysis;

#[async_trait]
impl AnalysisBackend for CannedAnalysis {
    async fn analyze(&self, request: AnalysisRequest) -> anyhow::Result<AnalysisOutcome> {
        let sections = request.template.to_sections();
        if sections.is_empty() {
            anyhow::bail!("Template '{}' has no sections", request.template.name);
        }

        // Fall back to section-derived prompts when the template lists none
        let pool: Vec<String> = if request.template.requirements.is_empty() {
            sections
                .iter()
                .filter(|s| s.required)
                .map(|s| format!("What does the funder expect in the {} section?", s.title))
                .collect()
        } else {
            request.template.requirements.clone()
        };

        let mut rng = SeededRng::from_seed(request.seed);
        let mut requirements = rng.sample(&pool, request.requirement_count.max(1));
        if requirements.is_empty() {
            requirements
                .push(format!("Review the RFP for {} eligibility rules.", request.target_id));
        }

        Ok(AnalysisOutcome { sections, requirements })
    }

    fn name(&self) -> &str {
        "canned"
    }
}

/// A section to draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftTarget {
    pub id: SectionId,
    pub kind: SectionKind,
    /// Known question ids (structured sections only)
    pub question_ids: Vec<String>,
}

impl DraftTarget {
    /// Target for a section.
    pub fn from_section(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            kind: section.kind,
            question_ids: section.questions.iter().map(|q| q.id.clone()).collect(),
        }
    }
}

/// Input to draft generation.
#[derive(Debug, Clone, Default)]
pub struct DraftRequest {
    /// Sections to fill
    pub targets: Vec<DraftTarget>,

    /// Questionnaire answers to splice in
    pub questionnaire: Questionnaire,
}

/// Content to write into one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftWrite {
    pub section: SectionId,
    pub content: SectionContent,
}

/// Result of draft generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftOutcome {
    /// Writes in target order
    pub writes: Vec<DraftWrite>,

    /// Sections that received a questionnaire answer
    pub spliced: Vec<SectionId>,
}

/// Backend that writes draft content.
#[async_trait]
pub trait DraftBackend: Send + Sync {
    /// Draft content for the requested sections.
    async fn draft(&self, request: DraftRequest) -> anyhow::Result<DraftOutcome>;

    /// Get the backend name.
    fn name(&self) -> &str;
}

/// Drafting from canned per-section content, enriched with questionnaire
/// answers by keyword.
#[derive(Debug, Clone, Default)]
pub struct CannedDrafts {
    drafts: BTreeMap<String, DraftTemplate>,
    splices: Vec<SpliceRule>,
}

impl CannedDrafts {
    /// Create from explicit templates and rules.
    pub fn new(drafts: BTreeMap<String, DraftTemplate>, splices: Vec<SpliceRule>) -> Self {
        Self { drafts, splices }
    }

    /// Create from a fixture catalog.
    pub fn from_catalog(catalog: &FixtureCatalog) -> Self {
        Self::new(catalog.drafts().clone(), catalog.splices().to_vec())
    }

    fn canned_for(&self, target: &DraftTarget) -> Option<SectionContent> {
        let content = self.drafts.get(&target.id)?.content()?;

        match (target.kind.is_structured(), content) {
            (true, SectionContent::Answers(mut answers)) => {
                if !target.question_ids.is_empty() {
                    answers.retain(|q, _| target.question_ids.contains(q));
                }
                (!answers.is_empty()).then_some(SectionContent::Answers(answers))
            }
            (false, SectionContent::Answers(answers)) => Some(SectionContent::Text(
                answers.into_values().collect::<Vec<_>>().join("\n\n"),
            )),
            (false, text @ SectionContent::Text(_)) => Some(text),
            // Prose cannot be split into answers
            (true, SectionContent::Text(_)) => None,
        }
    }

    fn splice_target(&self, question: &str) -> Option<&str> {
        let question = question.to_lowercase();
        self.splices
            .iter()
            .find(|rule| question.contains(&rule.keyword.to_lowercase()))
            .map(|rule| rule.section.as_str())
    }
}

#[async_trait]
impl DraftBackend for CannedDrafts {
    async fn draft(&self, request: DraftRequest) -> anyhow::Result<DraftOutcome> {
        let mut outcome = DraftOutcome::default();

        for target in &request.targets {
            if let Some(content) = self.canned_for(target) {
                outcome.writes.push(DraftWrite { section: target.id.clone(), content });
            }
        }

        for item in &request.questionnaire.answers {
            let answer = item.answer.trim();
            if answer.is_empty() {
                continue;
            }
            let Some(section) = self.splice_target(&item.question) else {
                continue;
            };
            let Some(write) = outcome.writes.iter_mut().find(|w| w.section == section) else {
                continue;
            };
            if let SectionContent::Text(text) = &mut write.content {
                *text = format!("{answer}\n\n{text}");
                if !outcome.spliced.iter().any(|s| s == section) {
                    outcome.spliced.push(section.to_string());
                }
            }
        }

        Ok(outcome)
    }

    fn name(&self) -> &str {
        "canned"
    }
}
