//! Section content and the per-instance content store.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::error::RecoverableParseError;
use super::section::{SectionId, SectionKind};

/// Answers of a structured section, keyed by question id.
pub type Answers = BTreeMap<String, String>;

/// Content payload of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
pub enum SectionContent {
    /// Prose, budget lines, milestones or file references
    Text(String),
    /// Question id to answer
    Answers(Answers),
}

impl SectionContent {
    /// Empty content for a section kind.
    pub fn empty_for(kind: SectionKind) -> Self {
        if kind.is_structured() {
            Self::Answers(Answers::new())
        } else {
            Self::Text(String::new())
        }
    }

    /// Check if there is nothing but whitespace.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.trim().is_empty(),
            Self::Answers(answers) => answers.values().all(|a| a.trim().is_empty()),
        }
    }

    /// Content length in characters (answers summed).
    pub fn char_len(&self) -> usize {
        match self {
            Self::Text(text) => text.trim().chars().count(),
            Self::Answers(answers) => answers.values().map(|a| a.trim().chars().count()).sum(),
        }
    }

    /// Text payload, if this is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Answers(_) => None,
        }
    }

    /// Answer map, if this is structured.
    pub fn answers(&self) -> Option<&Answers> {
        match self {
            Self::Answers(answers) => Some(answers),
            Self::Text(_) => None,
        }
    }

    /// Parse a legacy JSON-encoded answer map.
    ///
    /// Non-string values are kept in their JSON rendering.
    pub fn parse_answers(section: &str, raw: &str) -> Result<Answers, RecoverableParseError> {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| RecoverableParseError {
                section: section.to_string(),
                reason: e.to_string(),
            })?;

        let serde_json::Value::Object(map) = value else {
            return Err(RecoverableParseError {
                section: section.to_string(),
                reason: "expected a JSON object".to_string(),
            });
        };

        Ok(map
            .into_iter()
            .map(|(k, v)| match v {
                serde_json::Value::String(s) => (k, s),
                other => (k, other.to_string()),
            })
            .collect())
    }
}

/// Mapping from section id to content.
///
/// A missing entry means empty content.
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    entries: HashMap<SectionId, SectionContent>,
}

impl ContentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored content, if any.
    pub fn get(&self, section: &str) -> Option<&SectionContent> {
        self.entries.get(section)
    }

    /// Stored content, or empty content of the given kind.
    pub fn content_for(&self, section: &str, kind: SectionKind) -> SectionContent {
        self.entries.get(section).cloned().unwrap_or_else(|| SectionContent::empty_for(kind))
    }

    /// Replace a section's content with text.
    pub fn set_free_text(&mut self, section: &str, text: impl Into<String>) -> &SectionContent {
        self.replace(section, SectionContent::Text(text.into()))
    }

    /// Merge one answer into a section's answer map.
    ///
    /// Sibling answers are kept. If the section currently holds text, it is
    /// read as a legacy JSON answer map; unreadable text is dropped in favor
    /// of a fresh map.
    pub fn set_answer(
        &mut self,
        section: &str,
        question: &str,
        value: impl Into<String>,
    ) -> &SectionContent {
        let entry = self
            .entries
            .entry(section.to_string())
            .or_insert_with(|| SectionContent::Answers(Answers::new()));

        if let SectionContent::Text(raw) = entry {
            let answers = if raw.trim().is_empty() {
                Answers::new()
            } else {
                SectionContent::parse_answers(section, raw).unwrap_or_else(|e| {
                    tracing::warn!(section, error = %e, "Discarding malformed answers");
                    Answers::new()
                })
            };
            *entry = SectionContent::Answers(answers);
        }

        if let SectionContent::Answers(answers) = entry {
            answers.insert(question.to_string(), value.into());
        }

        entry
    }

    /// Store a raw payload as it would arrive from legacy storage.
    ///
    /// Structured sections expect a JSON object; anything else reinitializes
    /// the section with an empty map.
    pub fn import_raw(&mut self, section: &str, kind: SectionKind, raw: &str) -> &SectionContent {
        let content = if kind.is_structured() {
            if raw.trim().is_empty() {
                SectionContent::Answers(Answers::new())
            } else {
                match SectionContent::parse_answers(section, raw) {
                    Ok(answers) => SectionContent::Answers(answers),
                    Err(e) => {
                        tracing::warn!(
                            section,
                            error = %e,
                            "Reinitializing malformed section content"
                        );
                        SectionContent::Answers(Answers::new())
                    }
                }
            }
        } else {
            SectionContent::Text(raw.to_string())
        };

        self.replace(section, content)
    }

    fn replace(&mut self, section: &str, content: SectionContent) -> &SectionContent {
        match self.entries.entry(section.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.insert(content);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(content),
        }
    }

    /// Check if a section has non-empty content.
    pub fn has_content(&self, section: &str) -> bool {
        self.entries.get(section).is_some_and(|c| !c.is_empty())
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All stored entries.
    pub fn iter(&self) -> impl Iterator<Item = (&SectionId, &SectionContent)> {
        self.entries.iter()
    }
}
