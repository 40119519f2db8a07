//! Workflow Integration Tests
//!
//! Drives drafting sessions end-to-end through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use grantflow::core::{AppSession, Config, RecordingSink, SeededRng};
use grantflow::workflow::{
    AnalysisBackend, AnalysisOutcome, AnalysisRequest, CannedAnalysis, CannedDrafts, DraftBackend,
    DraftOutcome, DraftRequest, GenerationScope, Questionnaire, SessionDeps, SessionEvent,
    SessionSettings, SimulationKind, StartOutcome, SubmitOutcome, WorkflowKind, WorkflowPhase,
};
use grantflow::{DraftingSession, FixtureCatalog};

fn app(sink: &RecordingSink) -> AppSession {
    let mut config = Config::default();
    config.general.seed = Some(42);
    let app = AppSession::new(config).unwrap().with_notifier(Arc::new(sink.clone()));
    let settings = app.settings().instant();
    app.with_settings(settings)
}

fn open(kind: WorkflowKind, id: &str) -> (DraftingSession, RecordingSink) {
    let sink = RecordingSink::new();
    let draft = app(&sink).open(kind, id).unwrap();
    (draft, sink)
}

fn count(events: &[SessionEvent], wanted: &SessionEvent) -> usize {
    events.iter().filter(|e| *e == wanted).count()
}

/// Fails the first `failures` calls, then behaves like the canned backends.
struct Flaky {
    failures: AtomicUsize,
    drafts: CannedDrafts,
}

impl Flaky {
    fn new(failures: usize, fixtures: &FixtureCatalog) -> Self {
        Self { failures: AtomicUsize::new(failures), drafts: CannedDrafts::from_catalog(fixtures) }
    }

    fn should_fail(&self) -> bool {
        self.failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1)).is_ok()
    }
}

#[async_trait]
impl AnalysisBackend for Flaky {
    async fn analyze(&self, request: AnalysisRequest) -> anyhow::Result<AnalysisOutcome> {
        if self.should_fail() {
            anyhow::bail!("RFP service offline");
        }
        CannedAnalysis.analyze(request).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

#[async_trait]
impl DraftBackend for Flaky {
    async fn draft(&self, request: DraftRequest) -> anyhow::Result<DraftOutcome> {
        if self.should_fail() {
            anyhow::bail!("writing assistant unavailable");
        }
        self.drafts.draft(request).await
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

fn open_flaky(kind: WorkflowKind, id: &str) -> (DraftingSession, RecordingSink) {
    let fixtures = FixtureCatalog::builtin().unwrap();
    let backend = Arc::new(Flaky::new(1, &fixtures));
    let sink = RecordingSink::new();
    let deps = SessionDeps {
        analysis: backend.clone(),
        drafts: backend,
        notifier: Arc::new(sink.clone()),
        rng: SeededRng::from_seed(42),
        settings: SessionSettings::default().instant(),
    };
    (DraftingSession::open(kind, id, &fixtures, deps).unwrap(), sink)
}

// ============================================================================
// RFP Analysis
// ============================================================================

#[tokio::test]
async fn test_analysis_reaches_populated_with_template_sections() {
    let (mut draft, sink) = open(WorkflowKind::GrantApplication, "grant-2");
    assert_eq!(draft.phase(), WorkflowPhase::Empty);
    assert!(draft.sections().is_empty());

    draft.start_analysis().unwrap();
    assert_eq!(draft.phase(), WorkflowPhase::Analyzing);

    let mut percents = Vec::new();
    while let Some(event) = draft.next_event().await {
        if let SessionEvent::Progress { percent, .. } = event {
            percents.push(percent);
        }
    }

    assert!(percents.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(draft.phase(), WorkflowPhase::Populated);

    let app = app(&RecordingSink::new());
    let template = app.catalog().template("federal").unwrap();
    let ids: Vec<_> = draft.sections().iter().map(|s| s.id.as_str()).collect();
    let expected: Vec<_> = template.sections.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, expected);
    assert!(!draft.requirements().is_empty());
    assert_eq!(sink.titles(), vec!["RFP Analysis Complete"]);
}

#[tokio::test]
async fn test_double_start_completes_once() {
    let (mut draft, sink) = open(WorkflowKind::GrantApplication, "grant-1");

    assert!(matches!(draft.start_analysis().unwrap(), StartOutcome::Started(_)));
    assert_eq!(draft.start_analysis().unwrap(), StartOutcome::AlreadyRunning);

    let events = draft.run_until_idle().await;
    assert_eq!(count(&events, &SessionEvent::Completed(SimulationKind::Analysis)), 1);

    draft.start_generation(GenerationScope::All, Questionnaire::new()).unwrap();
    assert_eq!(
        draft.start_generation(GenerationScope::All, Questionnaire::new()).unwrap(),
        StartOutcome::AlreadyRunning
    );

    let events = draft.run_until_idle().await;
    assert_eq!(count(&events, &SessionEvent::Completed(SimulationKind::Generation)), 1);

    let titles = sink.titles();
    assert_eq!(titles.iter().filter(|t| *t == "RFP Analysis Complete").count(), 1);
    assert_eq!(titles.iter().filter(|t| *t == "Draft Generated").count(), 1);
}

#[tokio::test]
async fn test_same_seed_same_requirements() {
    let (mut a, _) = open(WorkflowKind::GrantApplication, "grant-1");
    let (mut b, _) = open(WorkflowKind::GrantApplication, "grant-1");

    a.start_analysis().unwrap();
    b.start_analysis().unwrap();
    a.run_until_idle().await;
    b.run_until_idle().await;

    assert_eq!(a.requirements(), b.requirements());
}

#[tokio::test]
async fn test_failed_analysis_resets_and_can_restart() {
    let (mut draft, sink) = open_flaky(WorkflowKind::GrantApplication, "grant-2");

    draft.start_analysis().unwrap();
    let events = draft.run_until_idle().await;

    assert_eq!(
        events,
        vec![SessionEvent::Failed {
            kind: SimulationKind::Analysis,
            error: "RFP service offline".to_string(),
        }]
    );
    assert_eq!(draft.phase(), WorkflowPhase::Empty);
    assert!(draft.sections().is_empty());
    assert_eq!(sink.titles(), vec!["Analysis Failed"]);
    assert_eq!(sink.toasts()[0].description, "RFP service offline");

    assert!(matches!(draft.start_analysis().unwrap(), StartOutcome::Started(_)));
    draft.run_until_idle().await;
    assert_eq!(draft.phase(), WorkflowPhase::Populated);
    assert!(!draft.sections().is_empty());
    assert_eq!(sink.titles(), vec!["Analysis Failed", "RFP Analysis Complete"]);
}

#[tokio::test]
async fn test_dropping_session_mid_analysis() {
    let (mut draft, sink) = open(WorkflowKind::GrantApplication, "grant-1");
    draft.start_analysis().unwrap();
    drop(draft);

    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(sink.titles().is_empty());
}

// ============================================================================
// Draft Generation
// ============================================================================

#[tokio::test]
async fn test_generation_preserves_manual_edits_outside_scope() {
    let (mut draft, _) = open(WorkflowKind::InlineApplication, "grant-1");

    draft
        .start_generation(GenerationScope::section("need-statement"), Questionnaire::new())
        .unwrap();
    draft.run_until_idle().await;
    let canned = draft.content("need-statement").unwrap();
    assert!(!canned.is_empty());

    draft.set_free_text("need-statement", "Our own words").unwrap();

    draft
        .start_generation(GenerationScope::section("project-description"), Questionnaire::new())
        .unwrap();
    draft.run_until_idle().await;

    assert_eq!(draft.content("need-statement").unwrap().as_text(), Some("Our own words"));
    assert!(!draft.content("project-description").unwrap().is_empty());
}

#[tokio::test]
async fn test_questionnaire_answers_are_spliced() {
    let sink = RecordingSink::new();
    let mut app = app(&sink);
    let questionnaire = app.questionnaire(&[
        ("community-need", "Rural families drive two hours to the nearest clinic."),
        ("funding", "$50,000 over two years"),
    ]);
    let mut draft = app.open(WorkflowKind::InlineApplication, "grant-1").unwrap();

    draft.start_generation(GenerationScope::All, questionnaire).unwrap();
    draft.run_until_idle().await;

    let need = draft.content("need-statement").unwrap();
    assert!(need.as_text().unwrap().starts_with("Rural families"));
    let budget = draft.content("budget").unwrap();
    assert!(budget.as_text().unwrap().starts_with("$50,000"));
}

#[tokio::test]
async fn test_failed_generation_returns_to_editing_and_can_restart() {
    let (mut draft, sink) = open_flaky(WorkflowKind::InlineApplication, "grant-1");
    draft.set_free_text("need-statement", "Our own words").unwrap();

    draft.start_generation(GenerationScope::All, Questionnaire::new()).unwrap();
    let events = draft.run_until_idle().await;

    assert_eq!(
        events,
        vec![SessionEvent::Failed {
            kind: SimulationKind::Generation,
            error: "writing assistant unavailable".to_string(),
        }]
    );
    assert_eq!(draft.phase(), WorkflowPhase::Editing);
    assert!(draft.content("executive-summary").unwrap().is_empty());
    assert_eq!(draft.content("need-statement").unwrap().as_text(), Some("Our own words"));
    assert!(sink.titles().contains(&"Generation Failed".to_string()));

    assert!(matches!(
        draft.start_generation(GenerationScope::All, Questionnaire::new()).unwrap(),
        StartOutcome::Started(_)
    ));
    draft.run_until_idle().await;
    assert_eq!(draft.phase(), WorkflowPhase::Editing);
    assert!(!draft.content("executive-summary").unwrap().is_empty());
    assert!(sink.titles().contains(&"Draft Generated".to_string()));
}

#[tokio::test]
async fn test_generation_then_submit() {
    let (mut draft, sink) = open(WorkflowKind::InlineApplication, "grant-3");

    draft.start_generation(GenerationScope::All, Questionnaire::new()).unwrap();
    draft.run_until_idle().await;
    assert_eq!(draft.phase(), WorkflowPhase::Editing);
    assert!(draft.can_submit());

    let summary = draft.summary();
    assert_eq!(summary.required_completed, summary.required_total);

    let outcome = draft.submit().unwrap();
    let SubmitOutcome::Submitted(submission) = outcome else {
        panic!("expected submission, got {outcome:?}");
    };
    assert_eq!(submission.redirect, "/applications");
    assert_eq!(submission.target_id, "grant-3");
    assert!(sink.titles().contains(&"Application Submitted".to_string()));
}

// ============================================================================
// Editing
// ============================================================================

#[test]
fn test_set_answer_keeps_sibling_answers() {
    let (mut draft, _) = open(WorkflowKind::Report, "report-1");

    draft.set_answer("outcomes", "participants", "40").unwrap();
    draft.set_answer("outcomes", "milestones", "Opened second site").unwrap();
    draft.set_answer("outcomes", "participants", "42").unwrap();

    let content = draft.content("outcomes").unwrap();
    let answers = content.answers().unwrap();
    assert_eq!(answers.len(), 2);
    assert_eq!(answers["participants"], "42");
    assert_eq!(answers["milestones"], "Opened second site");
}

#[test]
fn test_prefilled_answers_from_custom_catalog() {
    let catalog = FixtureCatalog::from_toml_str(
        r#"
[[reports]]
id = "report-7"
title = "Pantry Network - Interim Report"
grant_id = "grant-7"
due = "2027-04-30"
template = "interim"

[[grants]]
id = "grant-7"
title = "Pantry Network"
funder = "County Food Fund"
amount = 40000
deadline = "2026-12-01"
template = "interim"

[templates.interim]
name = "Interim Report"

[[templates.interim.sections]]
id = "outcomes"
title = "Outcomes"
kind = "structured-questions"
required = true
order = 1

[[templates.interim.sections.questions]]
id = "award"
text = "Award amount"
answer = "$40,000"

[[templates.interim.sections.questions]]
id = "households"
text = "Households served so far"
"#,
    )
    .unwrap();

    let sink = RecordingSink::new();
    let mut draft =
        app(&sink).with_catalog(catalog).open(WorkflowKind::Report, "report-7").unwrap();
    assert!(draft.section("outcomes").unwrap().completed);

    draft.set_answer("outcomes", "households", "310").unwrap();
    let content = draft.content("outcomes").unwrap();
    let answers = content.answers().unwrap();
    assert_eq!(answers["award"], "$40,000");
    assert_eq!(answers["households"], "310");
}

#[test]
fn test_custom_section_round_trip() {
    let (mut draft, _) = open(WorkflowKind::InlineApplication, "grant-1");

    let id = draft.add_custom_section("Risk Mitigation").unwrap().unwrap();
    assert_eq!(id, "risk-mitigation");
    assert!(draft.add_custom_section("risk mitigation").unwrap().is_none());

    draft.set_free_text(&id, "text").unwrap();
    let section = draft.section(&id).unwrap();
    assert!(section.completed);
    assert!(!section.required);

    // Completion is a manual flag; toggling flips it regardless of content
    assert!(!draft.toggle_completion(&id).unwrap());
    assert!(draft.toggle_completion(&id).unwrap());

    assert!(draft.section(&id).unwrap().completed);
    assert_eq!(draft.content(&id).unwrap().as_text(), Some("text"));
    assert_eq!(draft.sections().last().unwrap().id, id);
}

#[test]
fn test_summary_is_pure() {
    let (mut draft, _) = open(WorkflowKind::InlineApplication, "grant-1");
    draft.set_free_text("executive-summary", "A short overview").unwrap();
    draft.set_answer("organization-background", "mission", "Health for all").unwrap();

    assert_eq!(draft.summary(), draft.summary());
}

#[test]
fn test_invalid_phase_message() {
    let (mut draft, _) = open(WorkflowKind::GrantApplication, "grant-1");
    let err = draft.set_free_text("executive-summary", "x").unwrap_err();
    assert_eq!(err.to_string(), "Cannot edit content while the workflow is empty");
}

// ============================================================================
// Submission
// ============================================================================

#[test]
fn test_submit_blocked_until_required_sections_complete() {
    let (mut draft, sink) = open(WorkflowKind::Report, "report-2");
    let required: Vec<String> =
        draft.sections().iter().filter(|s| s.required).map(|s| s.id.clone()).collect();

    // Everything but the first required section
    for id in &required[1..] {
        draft.toggle_completion(id).unwrap();
    }
    assert!(!draft.can_submit());

    let SubmitOutcome::Rejected { missing, message } = draft.submit().unwrap() else {
        panic!("expected rejection");
    };
    assert_eq!(missing, vec![required[0].clone()]);
    assert!(message.contains("Project Summary"));
    assert_eq!(draft.phase(), WorkflowPhase::Editing);

    draft.toggle_completion(&required[0]).unwrap();
    assert!(draft.can_submit());
    assert!(draft.submit().unwrap().is_submitted());
    assert_eq!(draft.submit().unwrap(), SubmitOutcome::AlreadySubmitted);

    let titles = sink.titles();
    assert_eq!(titles.iter().filter(|t| *t == "Report Submitted").count(), 1);
    assert_eq!(draft.submission().unwrap().redirect, "/reports");
}

#[test]
fn test_unknown_target_is_not_found() {
    let sink = RecordingSink::new();
    let err = app(&sink).open(WorkflowKind::GrantApplication, "grant-999").unwrap_err();
    assert!(err.is_not_found());
    assert!(sink.titles().is_empty());
}
