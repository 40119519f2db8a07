//! Completion and progress tracking.
//!
//! Everything here is derived from a section/content snapshot on every call;
//! nothing is cached.
//!
//! Per-section percentages are an approximate indicator based on content
//! length, not a measure of whether the section is actually finished.

use serde::{Deserialize, Serialize};

use super::content::{ContentStore, SectionContent};
use super::section::{Section, SectionId};

/// Scale for the per-section length heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressScale {
    /// Characters at which a section reads as 100%
    pub saturation_chars: usize,

    /// Minimum percentage for any non-empty content
    pub floor_percent: u8,
}

impl Default for ProgressScale {
    fn default() -> Self {
        Self { saturation_chars: 400, floor_percent: 10 }
    }
}

impl ProgressScale {
    /// Percentage for a content length.
    pub fn percent_for(&self, chars: usize) -> u8 {
        if chars == 0 {
            return 0;
        }
        let saturation = self.saturation_chars.max(1);
        let scaled = (chars.min(saturation) * 100 / saturation) as u8;
        scaled.max(self.floor_percent.min(100))
    }
}

/// Progress of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionProgress {
    /// Section id
    pub id: SectionId,

    /// Approximate content progress, 0-100
    pub percent: u8,

    /// Completion flag at the time of the snapshot
    pub completed: bool,

    /// Whether the section is required
    pub required: bool,

    /// Question ids whose answers run past their advisory word limit
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub over_word_limit: Vec<String>,
}

/// Completion summary for a workflow instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionSummary {
    /// Number of sections
    pub total: usize,

    /// Completed sections
    pub completed: usize,

    /// Required sections
    pub required_total: usize,

    /// Completed required sections
    pub required_completed: usize,

    /// `completed / total` as a percentage
    pub overall_percent: u8,

    /// `required_completed / required_total` as a percentage
    pub required_percent: u8,

    /// Per-section progress in presentation order
    pub sections: Vec<SectionProgress>,
}

impl CompletionSummary {
    /// Progress entry for a section.
    pub fn section(&self, id: &str) -> Option<&SectionProgress> {
        self.sections.iter().find(|s| s.id == id)
    }

    /// Whether every required section is completed.
    pub fn all_required_complete(&self) -> bool {
        self.required_completed == self.required_total
    }

    /// Format as a human-readable summary.
    pub fn to_summary_string(&self) -> String {
        let mut summary = format!(
            "Overall: {}% ({}/{} sections)\nRequired: {}% ({}/{} sections)\n",
            self.overall_percent,
            self.completed,
            self.total,
            self.required_percent,
            self.required_completed,
            self.required_total
        );

        for section in &self.sections {
            let status = if section.completed { "✓" } else { "✗" };
            let marker = if section.required { "*" } else { " " };
            summary.push_str(&format!(
                "  {} {}{} {:>3}%",
                status, section.id, marker, section.percent
            ));
            if !section.over_word_limit.is_empty() {
                summary.push_str(&format!(
                    " (over word limit: {})",
                    section.over_word_limit.join(", ")
                ));
            }
            summary.push('\n');
        }

        summary
    }
}

/// Derives completion from sections and their content.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompletionTracker {
    scale: ProgressScale,
}

impl CompletionTracker {
    /// Create a tracker with the given scale.
    pub fn new(scale: ProgressScale) -> Self {
        Self { scale }
    }

    /// Percentage for one section.
    ///
    /// Prose and structured sections scale with length; budget, timeline and
    /// upload sections are all-or-nothing.
    pub fn section_percent(&self, section: &Section, content: &ContentStore) -> u8 {
        let Some(payload) = content.get(&section.id) else {
            return 0;
        };

        if section.kind.is_prose() {
            self.scale.percent_for(payload.char_len())
        } else if payload.is_empty() {
            0
        } else {
            100
        }
    }

    /// Answers of a structured section that exceed their question's word limit.
    pub fn over_word_limit(&self, section: &Section, content: &ContentStore) -> Vec<String> {
        let Some(answers) = content.get(&section.id).and_then(SectionContent::answers) else {
            return Vec::new();
        };

        answers
            .iter()
            .filter(|(id, answer)| {
                section.question(id).is_some_and(|q| q.exceeds_word_limit(answer))
            })
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Summarize a snapshot.
    pub fn summarize(&self, sections: &[Section], content: &ContentStore) -> CompletionSummary {
        let total = sections.len();
        let completed = sections.iter().filter(|s| s.completed).count();
        let required_total = sections.iter().filter(|s| s.required).count();
        let required_completed = sections.iter().filter(|s| s.required && s.completed).count();

        CompletionSummary {
            total,
            completed,
            required_total,
            required_completed,
            overall_percent: ratio_percent(completed, total),
            required_percent: ratio_percent(required_completed, required_total),
            sections: sections
                .iter()
                .map(|s| SectionProgress {
                    id: s.id.clone(),
                    percent: self.section_percent(s, content),
                    completed: s.completed,
                    required: s.required,
                    over_word_limit: self.over_word_limit(s, content),
                })
                .collect(),
        }
    }
}

/// `part / whole` as a rounded-down percentage; an empty whole counts as done.
fn ratio_percent(part: usize, whole: usize) -> u8 {
    if whole == 0 {
        return 100;
    }
    (part.min(whole) * 100 / whole) as u8
}
