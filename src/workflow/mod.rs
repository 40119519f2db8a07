//! Grant application and report drafting workflow.
//!
//! ## Pieces
//!
//! - [`SectionCatalog`] - ordered sections with completion flags
//! - [`ContentStore`] - free text or question/answer content per section
//! - [`CompletionTracker`] - per-section and overall progress
//! - [`SubmissionGate`] - blocks submit until required sections are done
//! - [`SimulationProgress`] - progress of RFP analysis and draft generation
//! - [`DraftingSession`] - the state machine tying them together

mod backend;
mod content;
mod drafting;
mod error;
mod gate;
mod progress;
mod question;
mod section;
mod simulator;

pub use backend::{
    AnalysisBackend, AnalysisOutcome, AnalysisRequest, CannedAnalysis, CannedDrafts, DraftBackend,
    DraftOutcome, DraftRequest, DraftTarget, DraftWrite,
};
pub use content::{Answers, ContentStore, SectionContent};
pub use drafting::{
    DraftingSession, GenerationScope, NotFoundView, SectionSnapshot, SectionSource, SessionDeps,
    SessionEvent, SessionSettings, SessionSnapshot, StartOutcome, WorkflowKind, WorkflowPhase,
    WorkflowProfile,
};
pub use error::{RecoverableParseError, WorkflowError, WorkflowResult};
pub use gate::{can_submit, Submission, SubmissionGate, SubmitOutcome};
pub use progress::{CompletionSummary, CompletionTracker, ProgressScale, SectionProgress};
pub use question::{Question, Questionnaire, QuestionnaireAnswer, RequirementQuestion};
pub use section::{slugify, Section, SectionCatalog, SectionId, SectionKind};
pub use simulator::{
    spawn_simulation, Advance, RunId, SimulationEvent, SimulationHandle, SimulationKind,
    SimulationPayload, SimulationProgress, TickSchedule,
};
