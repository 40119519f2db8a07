//! Questions attached to structured sections, and the pre-generation
//! questionnaire.

use serde::{Deserialize, Serialize};

/// A question inside a `structured-questions` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    /// Question id, unique within its section
    pub id: String,

    /// Owning section id
    pub section_id: String,

    /// Question text
    pub text: String,

    /// Optional help text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,

    /// Optional input placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,

    /// Optional word limit (advisory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_limit: Option<u32>,

    /// Pre-filled answer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
}

impl Question {
    /// Create a question with only the required fields.
    pub fn new(
        id: impl Into<String>,
        section_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            section_id: section_id.into(),
            text: text.into(),
            help_text: None,
            placeholder: None,
            word_limit: None,
            answer: None,
        }
    }

    /// Count words in an answer against the limit.
    pub fn exceeds_word_limit(&self, answer: &str) -> bool {
        self.word_limit.is_some_and(|limit| answer.split_whitespace().count() > limit as usize)
    }
}

/// An advisory requirement extracted by RFP analysis.
pub type RequirementQuestion = String;

/// One answered item of the short questionnaire shown before drafting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionnaireAnswer {
    /// Question text as shown to the user
    pub question: String,

    /// User's answer
    pub answer: String,
}

/// Answers collected before draft generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Questionnaire {
    /// Answers in the order they were given
    pub answers: Vec<QuestionnaireAnswer>,
}

impl Questionnaire {
    /// Create an empty questionnaire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an answer.
    pub fn answer(mut self, question: impl Into<String>, answer: impl Into<String>) -> Self {
        self.answers.push(QuestionnaireAnswer { question: question.into(), answer: answer.into() });
        self
    }

    /// Check if no answers were given.
    pub fn is_empty(&self) -> bool {
        self.answers.iter().all(|a| a.answer.trim().is_empty())
    }
}
