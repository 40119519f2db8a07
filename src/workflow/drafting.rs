//! The drafting workflow state machine.
//!
//! One [`DraftingSession`] is one open application or report draft. It owns
//! its section catalog, content store and simulators exclusively:
//!
//! ```text
//! Empty -> Analyzing -> Populated -> Editing <-> Generating
//!                                       |
//!                                       +-> Submitted
//! ```
//!
//! Simulations run as Tokio tasks and report back through a channel; the
//! session applies their events one at a time, so no state is shared with
//! the tasks. Dropping the session aborts any task still running.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TryRecvError, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use super::backend::{
    AnalysisBackend, AnalysisOutcome, AnalysisRequest, DraftBackend, DraftOutcome, DraftRequest,
    DraftTarget,
};
use super::content::{ContentStore, SectionContent};
use super::error::{WorkflowError, WorkflowResult};
use super::gate::{Submission, SubmissionGate, SubmitOutcome};
use super::progress::{CompletionSummary, CompletionTracker, ProgressScale};
use super::question::{Questionnaire, RequirementQuestion};
use super::section::{Section, SectionCatalog, SectionId};
use super::simulator::{
    spawn_simulation, Advance, RunId, SimulationEvent, SimulationHandle, SimulationKind,
    SimulationPayload, SimulationProgress, TickSchedule,
};
use crate::core::{CompletionPolicy, Config, NotificationSink, SeededRng, TickConfig, Toast};
use crate::fixtures::{FixtureCatalog, TemplateFixture};

/// How often a waiting session checks that its simulation task is alive.
const WATCHDOG_INTERVAL: Duration = Duration::from_millis(250);

/// The three places a draft can be started from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowKind {
    /// Full application workspace; sections come from RFP analysis
    GrantApplication,
    /// Quick application from a grant card; sections come from the template
    InlineApplication,
    /// Funder report; sections come from the report template
    Report,
}

/// Where a workflow's sections come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSource {
    /// Populated when RFP analysis completes
    Analysis,
    /// Populated from the static template when the session opens
    Template,
}

/// Per-kind parameters of the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowProfile {
    pub kind: WorkflowKind,
    /// "application" or "report"
    pub noun: &'static str,
    pub sections_from: SectionSource,
    /// Route to navigate to after submitting
    pub redirect: &'static str,
    /// Route offered when the target does not exist
    pub listing: &'static str,
}

impl WorkflowKind {
    /// Parameters for this kind.
    pub const fn profile(self) -> WorkflowProfile {
        match self {
            Self::GrantApplication => WorkflowProfile {
                kind: self,
                noun: "application",
                sections_from: SectionSource::Analysis,
                redirect: "/applications",
                listing: "/grants",
            },
            Self::InlineApplication => WorkflowProfile {
                kind: self,
                noun: "application",
                sections_from: SectionSource::Template,
                redirect: "/applications",
                listing: "/grants",
            },
            Self::Report => WorkflowProfile {
                kind: self,
                noun: "report",
                sections_from: SectionSource::Template,
                redirect: "/reports",
                listing: "/reports",
            },
        }
    }

    /// Kebab-case name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::GrantApplication => "grant-application",
            Self::InlineApplication => "inline-application",
            Self::Report => "report",
        }
    }

    /// Empty state shown when `id` does not exist.
    pub fn not_found_view(self, id: &str) -> NotFoundView {
        let profile = self.profile();
        let (what, action) = match self {
            Self::Report => ("Report", "Back to reports"),
            Self::GrantApplication | Self::InlineApplication => ("Grant", "Browse grants"),
        };
        NotFoundView {
            message: format!("{what} '{id}' was not found."),
            action_label: action.to_string(),
            route: profile.listing.to_string(),
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// User-facing empty state with one recovery action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotFoundView {
    pub message: String,
    pub action_label: String,
    pub route: String,
}

/// Workflow phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    /// No sections loaded
    Empty,
    /// RFP analysis running
    Analyzing,
    /// Sections loaded, nothing edited yet
    Populated,
    /// Steady state
    Editing,
    /// Draft generation running
    Generating,
    /// Terminal
    Submitted,
}

impl WorkflowPhase {
    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Analyzing => "analyzing",
            Self::Populated => "populated",
            Self::Editing => "editing",
            Self::Generating => "generating",
            Self::Submitted => "submitted",
        }
    }

    /// Whether section content may be changed.
    pub fn allows_edits(self) -> bool {
        matches!(self, Self::Populated | Self::Editing | Self::Generating)
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new run was spawned
    Started(RunId),
    /// A run is already in flight; the request was ignored
    AlreadyRunning,
}

/// Which sections draft generation may write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum GenerationScope {
    /// Every section
    #[default]
    All,
    /// Only these sections
    Sections(Vec<SectionId>),
}

impl GenerationScope {
    /// Scope of a single section.
    pub fn section(id: impl Into<String>) -> Self {
        Self::Sections(vec![id.into()])
    }
}

/// What applying a simulation event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The backend result is ready
    Prepared(SimulationKind),
    /// Progress moved
    Progress { kind: SimulationKind, percent: u8 },
    /// The completion side-effect ran
    Completed(SimulationKind),
    /// The run failed
    Failed { kind: SimulationKind, error: String },
    /// Stale or unexpected event; nothing changed
    Ignored,
}

/// Tunables of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub analysis: TickConfig,
    pub generation: TickConfig,
    pub requirement_questions: usize,
    pub scale: ProgressScale,
    pub policy: CompletionPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionSettings {
    /// Settings from application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            analysis: config.analysis.ticks,
            generation: config.generation,
            requirement_questions: config.analysis.requirement_questions,
            scale: config.progress.scale(),
            policy: config.completion.policy,
        }
    }

    /// Same settings with no pauses between progress steps.
    pub fn instant(mut self) -> Self {
        self.analysis = TickConfig { min_interval_ms: 0, max_interval_ms: 0, ..self.analysis };
        self.generation = TickConfig { min_interval_ms: 0, max_interval_ms: 0, ..self.generation };
        self
    }
}

/// Collaborators injected into a session.
pub struct SessionDeps {
    pub analysis: Arc<dyn AnalysisBackend>,
    pub drafts: Arc<dyn DraftBackend>,
    pub notifier: Arc<dyn NotificationSink>,
    pub rng: SeededRng,
    pub settings: SessionSettings,
}

impl fmt::Debug for SessionDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDeps")
            .field("analysis", &self.analysis.name())
            .field("drafts", &self.drafts.name())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Serializable view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub kind: WorkflowKind,
    pub target_id: String,
    pub title: String,
    pub phase: WorkflowPhase,
    pub requirements: Vec<RequirementQuestion>,
    pub sections: Vec<SectionSnapshot>,
    pub summary: CompletionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission: Option<Submission>,
}

/// One section with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSnapshot {
    #[serde(flatten)]
    pub section: Section,
    pub content: SectionContent,
}

/// One open application or report draft.
pub struct DraftingSession {
    id: Uuid,
    kind: WorkflowKind,
    target_id: String,
    title: String,
    template: TemplateFixture,
    phase: WorkflowPhase,
    catalog: SectionCatalog,
    content: ContentStore,
    requirements: Vec<RequirementQuestion>,
    analysis: SimulationProgress,
    generation: SimulationProgress,
    pending_analysis: Option<AnalysisOutcome>,
    pending_draft: Option<DraftOutcome>,
    analysis_task: Option<SimulationHandle>,
    generation_task: Option<SimulationHandle>,
    events_tx: UnboundedSender<SimulationEvent>,
    events_rx: UnboundedReceiver<SimulationEvent>,
    analysis_backend: Arc<dyn AnalysisBackend>,
    draft_backend: Arc<dyn DraftBackend>,
    notifier: Arc<dyn NotificationSink>,
    rng: SeededRng,
    settings: SessionSettings,
    tracker: CompletionTracker,
    gate: SubmissionGate,
    submission: Option<Submission>,
}

impl fmt::Debug for DraftingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DraftingSession")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("target_id", &self.target_id)
            .field("phase", &self.phase)
            .field("sections", &self.catalog.len())
            .field("analysis", &self.analysis)
            .field("generation", &self.generation)
            .finish()
    }
}

impl DraftingSession {
    /// Open a draft for a grant or report.
    ///
    /// Template-backed kinds start `Populated`; the grant application
    /// workspace starts `Empty` and waits for RFP analysis.
    pub fn open(
        kind: WorkflowKind,
        target_id: &str,
        fixtures: &FixtureCatalog,
        deps: SessionDeps,
    ) -> WorkflowResult<Self> {
        let (title, template_key) = match kind {
            WorkflowKind::GrantApplication | WorkflowKind::InlineApplication => {
                let grant = fixtures.grant(target_id)?;
                (grant.title.clone(), grant.template.clone())
            }
            WorkflowKind::Report => {
                let report = fixtures.report(target_id)?;
                (report.title.clone(), report.template.clone())
            }
        };
        let template = fixtures.template(&template_key)?.clone();

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut session = Self {
            id: Uuid::new_v4(),
            kind,
            target_id: target_id.to_string(),
            title,
            template,
            phase: WorkflowPhase::Empty,
            catalog: SectionCatalog::new(),
            content: ContentStore::new(),
            requirements: Vec::new(),
            analysis: SimulationProgress::new(),
            generation: SimulationProgress::new(),
            pending_analysis: None,
            pending_draft: None,
            analysis_task: None,
            generation_task: None,
            events_tx,
            events_rx,
            analysis_backend: deps.analysis,
            draft_backend: deps.drafts,
            notifier: deps.notifier,
            rng: deps.rng,
            settings: deps.settings,
            tracker: CompletionTracker::new(deps.settings.scale),
            gate: SubmissionGate,
            submission: None,
        };

        if kind.profile().sections_from == SectionSource::Template {
            session.catalog.populate(session.template.to_sections())?;
            session.prefill_answers();
            session.requirements = session.template.requirements.clone();
            session.phase = WorkflowPhase::Populated;
            session.notifier.notify(Toast::info(
                "Template Loaded",
                format!("{} sections from {}", session.catalog.len(), session.template.name),
            ));
        }

        tracing::debug!(
            id = %session.id,
            %kind,
            target = target_id,
            phase = %session.phase,
            "Opened drafting session"
        );
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Instance id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Workflow kind.
    pub fn kind(&self) -> WorkflowKind {
        self.kind
    }

    /// Grant or report id.
    pub fn target_id(&self) -> &str {
        &self.target_id
    }

    /// Grant or report title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current phase.
    pub fn phase(&self) -> WorkflowPhase {
        self.phase
    }

    /// Sections in presentation order.
    pub fn sections(&self) -> &[Section] {
        self.catalog.as_slice()
    }

    /// Look up a section.
    pub fn section(&self, id: &str) -> Option<&Section> {
        self.catalog.get(id)
    }

    /// Requirement questions extracted so far.
    pub fn requirements(&self) -> &[RequirementQuestion] {
        &self.requirements
    }

    /// Progress of a simulator.
    pub fn progress(&self, kind: SimulationKind) -> SimulationProgress {
        match kind {
            SimulationKind::Analysis => self.analysis,
            SimulationKind::Generation => self.generation,
        }
    }

    /// Whether no simulation is running.
    pub fn is_idle(&self) -> bool {
        !self.analysis.running() && !self.generation.running()
    }

    /// Content of a section; missing content reads as empty.
    pub fn content(&self, id: &str) -> WorkflowResult<SectionContent> {
        let section = self.require_section(id)?;
        Ok(self.content.content_for(id, section.kind))
    }

    /// Completion summary, derived from the current state.
    pub fn summary(&self) -> CompletionSummary {
        self.tracker.summarize(self.catalog.as_slice(), &self.content)
    }

    /// Whether every required section is completed.
    pub fn can_submit(&self) -> bool {
        super::gate::can_submit(self.catalog.as_slice())
    }

    /// The submission, once submitted.
    pub fn submission(&self) -> Option<&Submission> {
        self.submission.as_ref()
    }

    /// Serializable view of the session.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id,
            kind: self.kind,
            target_id: self.target_id.clone(),
            title: self.title.clone(),
            phase: self.phase,
            requirements: self.requirements.clone(),
            sections: self
                .catalog
                .iter()
                .map(|s| SectionSnapshot {
                    section: s.clone(),
                    content: self.content.content_for(&s.id, s.kind),
                })
                .collect(),
            summary: self.summary(),
            submission: self.submission.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Simulations
    // ------------------------------------------------------------------

    /// Start RFP analysis.
    ///
    /// Ignored while analysis is already running.
    pub fn start_analysis(&mut self) -> WorkflowResult<StartOutcome> {
        match self.phase {
            WorkflowPhase::Empty => {}
            WorkflowPhase::Analyzing => {
                tracing::debug!(id = %self.id, "Analysis already running, ignoring start");
                return Ok(StartOutcome::AlreadyRunning);
            }
            phase => {
                return Err(WorkflowError::InvalidPhase { phase, action: "start RFP analysis" })
            }
        }

        let Some(run) = self.analysis.begin() else {
            return Ok(StartOutcome::AlreadyRunning);
        };
        self.phase = WorkflowPhase::Analyzing;

        let request = AnalysisRequest {
            target_id: self.target_id.clone(),
            template: self.template.clone(),
            requirement_count: self.settings.requirement_questions,
            seed: self.rng.next_u64(),
        };
        let backend = Arc::clone(&self.analysis_backend);
        let work = async move { backend.analyze(request).await.map(SimulationPayload::Analysis) };

        self.analysis_task = Some(spawn_simulation(
            SimulationKind::Analysis,
            run,
            TickSchedule::from_config(&self.settings.analysis),
            self.rng.fork(),
            work,
            self.events_tx.clone(),
        ));

        tracing::info!(
            id = %self.id,
            run,
            backend = self.analysis_backend.name(),
            "Started RFP analysis"
        );
        Ok(StartOutcome::Started(run))
    }

    /// Start draft generation for the sections in `scope`.
    ///
    /// Ignored while generation is already running.
    pub fn start_generation(
        &mut self,
        scope: GenerationScope,
        questionnaire: Questionnaire,
    ) -> WorkflowResult<StartOutcome> {
        match self.phase {
            WorkflowPhase::Populated | WorkflowPhase::Editing => {}
            WorkflowPhase::Generating => {
                tracing::debug!(id = %self.id, "Generation already running, ignoring start");
                return Ok(StartOutcome::AlreadyRunning);
            }
            phase => return Err(WorkflowError::InvalidPhase { phase, action: "generate drafts" }),
        }

        let targets = match &scope {
            GenerationScope::All => self.catalog.iter().map(DraftTarget::from_section).collect(),
            GenerationScope::Sections(ids) => ids
                .iter()
                .map(|id| self.require_section(id).map(DraftTarget::from_section))
                .collect::<WorkflowResult<Vec<_>>>()?,
        };

        let Some(run) = self.generation.begin() else {
            return Ok(StartOutcome::AlreadyRunning);
        };
        self.phase = WorkflowPhase::Generating;

        let request = DraftRequest { targets, questionnaire };
        let backend = Arc::clone(&self.draft_backend);
        let work = async move { backend.draft(request).await.map(SimulationPayload::Draft) };

        self.generation_task = Some(spawn_simulation(
            SimulationKind::Generation,
            run,
            TickSchedule::from_config(&self.settings.generation),
            self.rng.fork(),
            work,
            self.events_tx.clone(),
        ));

        tracing::info!(
            id = %self.id,
            run,
            backend = self.draft_backend.name(),
            "Started draft generation"
        );
        Ok(StartOutcome::Started(run))
    }

    /// Stop a running simulation; its late events are discarded.
    ///
    /// Returns whether anything was running.
    pub fn cancel(&mut self, kind: SimulationKind) -> bool {
        let was_running = match kind {
            SimulationKind::Analysis => {
                self.analysis_task = None;
                self.pending_analysis = None;
                self.analysis.cancel()
            }
            SimulationKind::Generation => {
                self.generation_task = None;
                self.pending_draft = None;
                self.generation.cancel()
            }
        };

        if was_running {
            self.phase = match kind {
                SimulationKind::Analysis => WorkflowPhase::Empty,
                SimulationKind::Generation => WorkflowPhase::Editing,
            };
            tracing::info!(id = %self.id, %kind, "Cancelled simulation");
        }

        was_running
    }

    /// Apply one event from a simulation task.
    pub fn apply(&mut self, event: SimulationEvent) -> SessionEvent {
        let (kind, run) = (event.kind(), event.run());
        if !self.progress(kind).is_current(run) {
            tracing::debug!(%kind, run, "Dropping stale simulation event");
            return SessionEvent::Ignored;
        }

        match event {
            SimulationEvent::Prepared { kind, payload, .. } => {
                match (kind, payload) {
                    (SimulationKind::Analysis, SimulationPayload::Analysis(outcome)) => {
                        self.pending_analysis = Some(outcome);
                    }
                    (SimulationKind::Generation, SimulationPayload::Draft(outcome)) => {
                        self.pending_draft = Some(outcome);
                    }
                    _ => {
                        return self.fail(kind, "backend returned the wrong result type".to_string())
                    }
                }
                SessionEvent::Prepared(kind)
            }

            SimulationEvent::Tick { kind, run, increment } => {
                let advance = match kind {
                    SimulationKind::Analysis => self.analysis.advance(run, increment),
                    SimulationKind::Generation => self.generation.advance(run, increment),
                };

                match advance {
                    Advance::Ignored => {
                        tracing::debug!(%kind, run, "Dropping stale progress");
                        SessionEvent::Ignored
                    }
                    Advance::Progressed(percent) => SessionEvent::Progress { kind, percent },
                    Advance::Completed => {
                        self.complete(kind);
                        match kind {
                            SimulationKind::Analysis => {
                                self.analysis.reset();
                                self.analysis_task = None;
                            }
                            SimulationKind::Generation => {
                                self.generation.reset();
                                self.generation_task = None;
                            }
                        }
                        SessionEvent::Completed(kind)
                    }
                }
            }

            SimulationEvent::Failed { kind, error, .. } => self.fail(kind, error),
        }
    }

    /// Wait for and apply the next simulation event.
    ///
    /// Returns `None` when nothing is running. Must be called within a Tokio
    /// runtime.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        loop {
            if self.is_idle() {
                return None;
            }

            match self.events_rx.try_recv() {
                Ok(event) => return Some(self.apply(event)),
                Err(TryRecvError::Disconnected) => return None,
                Err(TryRecvError::Empty) => {}
            }

            if let Some(kind) = self.dead_simulation() {
                // The task may have sent its last events after the first poll
                if let Ok(event) = self.events_rx.try_recv() {
                    return Some(self.apply(event));
                }
                return Some(self.fail(kind, "simulation task stopped unexpectedly".to_string()));
            }

            match tokio::time::timeout(WATCHDOG_INTERVAL, self.events_rx.recv()).await {
                Ok(Some(event)) => return Some(self.apply(event)),
                Ok(None) => return None,
                Err(_) => {}
            }
        }
    }

    /// Apply events until no simulation is running.
    pub async fn run_until_idle(&mut self) -> Vec<SessionEvent> {
        let mut applied = Vec::new();
        while let Some(event) = self.next_event().await {
            applied.push(event);
        }
        applied
    }

    fn dead_simulation(&self) -> Option<SimulationKind> {
        let dead = |progress: &SimulationProgress, task: &Option<SimulationHandle>| {
            progress.running() && task.as_ref().map_or(true, SimulationHandle::is_finished)
        };

        if dead(&self.analysis, &self.analysis_task) {
            Some(SimulationKind::Analysis)
        } else if dead(&self.generation, &self.generation_task) {
            Some(SimulationKind::Generation)
        } else {
            None
        }
    }

    fn complete(&mut self, kind: SimulationKind) {
        match kind {
            SimulationKind::Analysis => self.complete_analysis(),
            SimulationKind::Generation => self.complete_generation(),
        }
    }

    fn complete_analysis(&mut self) {
        let Some(outcome) = self.pending_analysis.take() else {
            self.fail_completed(SimulationKind::Analysis, "analysis finished without a result");
            return;
        };

        if let Err(e) = self.catalog.populate(outcome.sections) {
            self.fail_completed(SimulationKind::Analysis, &e.to_string());
            return;
        }

        self.prefill_answers();
        self.requirements = outcome.requirements;
        self.phase = WorkflowPhase::Populated;

        tracing::info!(
            id = %self.id,
            sections = self.catalog.len(),
            requirements = self.requirements.len(),
            "RFP analysis complete"
        );
        self.notifier.notify(Toast::success(
            "RFP Analysis Complete",
            format!(
                "Found {} sections and {} key requirements",
                self.catalog.len(),
                self.requirements.len()
            ),
        ));
    }

    fn complete_generation(&mut self) {
        let Some(outcome) = self.pending_draft.take() else {
            self.fail_completed(SimulationKind::Generation, "generation finished without a result");
            return;
        };

        let mut written = 0;
        for write in outcome.writes {
            let Some(section) = self.catalog.get(&write.section) else {
                tracing::debug!(section = %write.section, "Skipping draft for removed section");
                continue;
            };
            let structured = section.kind.is_structured();

            match (structured, write.content) {
                (true, SectionContent::Answers(answers)) => {
                    for (question, answer) in answers {
                        self.content.set_answer(&write.section, &question, answer);
                    }
                }
                (false, SectionContent::Text(text)) => {
                    self.content.set_free_text(&write.section, text);
                }
                _ => {
                    tracing::debug!(section = %write.section, "Skipping draft of the wrong kind");
                    continue;
                }
            }
            self.after_write(&write.section);
            written += 1;
        }

        self.phase = WorkflowPhase::Editing;

        tracing::info!(id = %self.id, sections = written, "Draft generation complete");
        self.notifier.notify(Toast::success(
            "Draft Generated",
            format!("Drafted {} sections. Review and edit before submitting.", written),
        ));
    }

    /// Seed structured sections with the answers their questions carry.
    fn prefill_answers(&mut self) {
        let prefilled: Vec<(SectionId, String, String)> = self
            .catalog
            .iter()
            .filter(|s| s.kind.is_structured())
            .flat_map(|s| {
                s.questions.iter().filter_map(move |q| {
                    let answer = q.answer.as_deref()?.trim();
                    (!answer.is_empty())
                        .then(|| (s.id.clone(), q.id.clone(), answer.to_string()))
                })
            })
            .collect();

        for (section, question, answer) in &prefilled {
            self.content.set_answer(section, question, answer.as_str());
            self.after_write(section);
        }

        if !prefilled.is_empty() {
            tracing::debug!(id = %self.id, answers = prefilled.len(), "Pre-filled answers");
        }
    }

    /// Completion arrived but the side-effect could not run.
    fn fail_completed(&mut self, kind: SimulationKind, error: &str) {
        tracing::warn!(id = %self.id, %kind, error, "Simulation completed without usable result");
        self.phase = match kind {
            SimulationKind::Analysis => WorkflowPhase::Empty,
            SimulationKind::Generation => WorkflowPhase::Editing,
        };
        self.notify_failure(kind, error);
    }

    fn fail(&mut self, kind: SimulationKind, error: String) -> SessionEvent {
        match kind {
            SimulationKind::Analysis => {
                self.analysis.cancel();
                self.analysis_task = None;
                self.pending_analysis = None;
                self.phase = WorkflowPhase::Empty;
            }
            SimulationKind::Generation => {
                self.generation.cancel();
                self.generation_task = None;
                self.pending_draft = None;
                self.phase = WorkflowPhase::Editing;
            }
        }

        tracing::warn!(id = %self.id, %kind, error = %error, "Simulation failed");
        self.notify_failure(kind, &error);
        SessionEvent::Failed { kind, error }
    }

    fn notify_failure(&self, kind: SimulationKind, error: &str) {
        let title = match kind {
            SimulationKind::Analysis => "Analysis Failed",
            SimulationKind::Generation => "Generation Failed",
        };
        self.notifier.notify(Toast::error(title, error.to_string()));
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    /// Replace a text section's content.
    pub fn set_free_text(&mut self, id: &str, text: impl Into<String>) -> WorkflowResult<()> {
        self.ensure_editable("edit content")?;
        if self.require_section(id)?.kind.is_structured() {
            return Err(WorkflowError::ContentKind {
                section: id.to_string(),
                expected: "question/answer",
            });
        }

        self.content.set_free_text(id, text);
        self.after_write(id);
        self.touch();
        Ok(())
    }

    /// Set one answer of a structured section, keeping the others.
    pub fn set_answer(
        &mut self,
        id: &str,
        question: &str,
        value: impl Into<String>,
    ) -> WorkflowResult<()> {
        self.ensure_editable("edit content")?;
        if !self.require_section(id)?.kind.is_structured() {
            return Err(WorkflowError::ContentKind { section: id.to_string(), expected: "text" });
        }

        self.content.set_answer(id, question, value);
        self.after_write(id);
        self.touch();
        Ok(())
    }

    /// Store a raw payload from legacy storage.
    ///
    /// Malformed structured payloads reinitialize the section.
    pub fn import_raw(&mut self, id: &str, raw: &str) -> WorkflowResult<()> {
        self.ensure_editable("import content")?;
        let kind = self.require_section(id)?.kind;

        self.content.import_raw(id, kind, raw);
        self.after_write(id);
        self.touch();
        Ok(())
    }

    /// Flip a section's completion flag; content is not checked.
    pub fn toggle_completion(&mut self, id: &str) -> WorkflowResult<bool> {
        self.ensure_editable("change completion")?;
        let completed = self.catalog.toggle_completion(id)?;
        self.touch();
        Ok(completed)
    }

    /// Add an optional free-text section.
    ///
    /// `Ok(None)` if a section with that title already exists.
    pub fn add_custom_section(&mut self, title: &str) -> WorkflowResult<Option<SectionId>> {
        self.ensure_editable("add sections")?;
        let id = self.catalog.add_custom_section(title);
        if id.is_some() {
            self.touch();
        }
        Ok(id)
    }

    fn ensure_editable(&self, action: &'static str) -> WorkflowResult<()> {
        if self.phase.allows_edits() {
            Ok(())
        } else {
            Err(WorkflowError::InvalidPhase { phase: self.phase, action })
        }
    }

    /// First edit moves a populated session to editing.
    fn touch(&mut self) {
        if self.phase == WorkflowPhase::Populated {
            self.phase = WorkflowPhase::Editing;
        }
    }

    /// Completion follows non-empty writes; clearing depends on the policy.
    fn after_write(&mut self, id: &str) {
        let has_content = self.content.has_content(id);
        let result = if has_content {
            self.catalog.set_completed(id, true)
        } else if self.settings.policy == CompletionPolicy::TrackContent {
            self.catalog.set_completed(id, false)
        } else {
            Ok(())
        };

        if let Err(e) = result {
            tracing::debug!(section = id, error = %e, "Completion update skipped");
        }
    }

    fn require_section(&self, id: &str) -> WorkflowResult<&Section> {
        self.catalog.get(id).ok_or_else(|| WorkflowError::UnknownSection(id.to_string()))
    }

    // ------------------------------------------------------------------
    // Submission
    // ------------------------------------------------------------------

    /// Submit the draft.
    ///
    /// Incomplete required sections give `SubmitOutcome::Rejected`; a repeat
    /// submit after success gives `SubmitOutcome::AlreadySubmitted`.
    pub fn submit(&mut self) -> WorkflowResult<SubmitOutcome> {
        match self.phase {
            WorkflowPhase::Editing => {}
            WorkflowPhase::Submitted => {
                tracing::debug!(id = %self.id, "Ignoring duplicate submit");
                return Ok(SubmitOutcome::AlreadySubmitted);
            }
            phase => return Err(WorkflowError::InvalidPhase { phase, action: "submit" }),
        }

        if let Err(rejected) = self.gate.check(self.catalog.as_slice()) {
            if let SubmitOutcome::Rejected { missing, message } = &rejected {
                tracing::info!(id = %self.id, missing = missing.len(), "Submission blocked");
                self.notifier.notify(Toast::warning("Submission Blocked", message.clone()));
            }
            return Ok(rejected);
        }

        let profile = self.kind.profile();
        let submission = Submission {
            workflow_id: self.id,
            target_id: self.target_id.clone(),
            redirect: profile.redirect.to_string(),
            submitted_at: Utc::now(),
        };

        self.phase = WorkflowPhase::Submitted;
        self.submission = Some(submission.clone());

        tracing::info!(id = %self.id, target = %self.target_id, "Submitted {}", profile.noun);
        let title = match self.kind {
            WorkflowKind::Report => "Report Submitted",
            WorkflowKind::GrantApplication | WorkflowKind::InlineApplication => {
                "Application Submitted"
            }
        };
        self.notifier.notify(Toast::success(
            title,
            format!("Your {} for {} has been submitted.", profile.noun, self.title),
        ));

        Ok(SubmitOutcome::Submitted(submission))
    }
}
