//! Application-wide state.
//!
//! Holds what lives above any single draft: configuration, the fixture
//! catalog, the notification sink and the root random generator.

use std::sync::Arc;

use anyhow::Context;

use super::config::Config;
use super::notify::{FanoutSink, NotificationSink, TracingSink};
use super::rng::SeededRng;
use crate::fixtures::FixtureCatalog;
use crate::workflow::{
    CannedAnalysis, CannedDrafts, DraftingSession, Questionnaire, SessionDeps, SessionSettings,
    WorkflowKind, WorkflowResult,
};

/// Application session.
pub struct AppSession {
    config: Config,
    catalog: FixtureCatalog,
    notifier: Arc<dyn NotificationSink>,
    rng: SeededRng,
    settings: SessionSettings,
}

impl std::fmt::Debug for AppSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppSession")
            .field("config", &self.config)
            .field("grants", &self.catalog.grants().len())
            .field("reports", &self.catalog.reports().len())
            .field("seed", &self.rng.seed())
            .finish()
    }
}

impl AppSession {
    /// Create a session from configuration.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let catalog = match &config.general.catalog {
            Some(path) => FixtureCatalog::load(path)
                .with_context(|| format!("Failed to load catalog {}", path.display()))?,
            None => FixtureCatalog::builtin().context("Built-in catalog is invalid")?,
        };

        let notifier = default_notifier(&config);
        let rng = SeededRng::from_optional_seed(config.general.seed);
        let settings = SessionSettings::from_config(&config);

        tracing::debug!(
            grants = catalog.grants().len(),
            reports = catalog.reports().len(),
            seed = ?config.general.seed,
            "Created app session"
        );

        Ok(Self { config, catalog, notifier, rng, settings })
    }

    /// Replace the notification sink.
    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Replace the fixture catalog.
    pub fn with_catalog(mut self, catalog: FixtureCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Replace the per-draft settings.
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fixture catalog.
    pub fn catalog(&self) -> &FixtureCatalog {
        &self.catalog
    }

    /// Notification sink shared by every draft.
    pub fn notifier(&self) -> Arc<dyn NotificationSink> {
        Arc::clone(&self.notifier)
    }

    /// Settings applied to new drafts.
    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Whether the first-run walkthrough was completed.
    pub fn onboarding_completed(&self) -> bool {
        self.config.general.onboarding_completed
    }

    /// Mark the walkthrough as completed.
    ///
    /// Returns `false` if it already was.
    pub fn complete_onboarding(&mut self) -> bool {
        if self.config.general.onboarding_completed {
            return false;
        }
        self.config.general.onboarding_completed = true;
        true
    }

    /// Persist configuration to the global config file.
    pub fn save_config(&self) -> anyhow::Result<std::path::PathBuf> {
        self.config.save()
    }

    /// Open a draft with the canned backends.
    pub fn open(&mut self, kind: WorkflowKind, id: &str) -> WorkflowResult<DraftingSession> {
        let deps = SessionDeps {
            analysis: Arc::new(CannedAnalysis),
            drafts: Arc::new(CannedDrafts::from_catalog(&self.catalog)),
            notifier: Arc::clone(&self.notifier),
            rng: self.rng.fork(),
            settings: self.settings,
        };
        DraftingSession::open(kind, id, &self.catalog, deps)
    }

    /// Build a questionnaire from `(question id, answer)` pairs.
    ///
    /// Unknown ids are used as the question text.
    pub fn questionnaire<K: AsRef<str>, V: AsRef<str>>(&self, answers: &[(K, V)]) -> Questionnaire {
        answers.iter().fold(Questionnaire::new(), |questionnaire, (id, answer)| {
            let id = id.as_ref();
            let text = self
                .catalog
                .questionnaire_item(id)
                .map_or_else(|| id.to_string(), |item| item.text.clone());
            questionnaire.answer(text, answer.as_ref())
        })
    }
}

fn default_notifier(config: &Config) -> Arc<dyn NotificationSink> {
    let fanout = FanoutSink::new().with(Arc::new(TracingSink));

    #[cfg(feature = "notifications")]
    let fanout = if config.notifications.desktop {
        fanout.with(Arc::new(super::notify::DesktopSink))
    } else {
        fanout
    };

    #[cfg(not(feature = "notifications"))]
    if config.notifications.desktop {
        tracing::warn!("Desktop notifications requested but not compiled in");
    }

    Arc::new(fanout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RecordingSink;
    use crate::workflow::WorkflowPhase;

    fn session() -> AppSession {
        let mut config = Config::default();
        config.general.seed = Some(3);
        AppSession::new(config).unwrap()
    }

    #[test]
    fn test_new_uses_builtin_catalog() {
        let app = session();
        assert!(app.catalog().grant("grant-1").is_ok());
        assert!(!app.onboarding_completed());
    }

    #[test]
    fn test_missing_catalog_file_fails() {
        let mut config = Config::default();
        config.general.catalog = Some("/nonexistent/catalog.toml".into());
        assert!(AppSession::new(config).is_err());
    }

    #[test]
    fn test_complete_onboarding_once() {
        let mut app = session();
        assert!(app.complete_onboarding());
        assert!(!app.complete_onboarding());
        assert!(app.onboarding_completed());
    }

    #[test]
    fn test_open_routes_notifications() {
        let sink = RecordingSink::new();
        let mut app = session().with_notifier(Arc::new(sink.clone()));

        let draft = app.open(WorkflowKind::Report, "report-1").unwrap();
        assert_eq!(draft.phase(), WorkflowPhase::Populated);
        assert_eq!(sink.titles(), vec!["Template Loaded"]);

        assert!(app.open(WorkflowKind::Report, "report-404").unwrap_err().is_not_found());
    }

    #[test]
    fn test_questionnaire_maps_ids_to_text() {
        let app = session();
        let questionnaire = app.questionnaire(&[("community-need", "Transit"), ("custom", "x")]);

        assert_eq!(questionnaire.answers.len(), 2);
        assert_eq!(
            questionnaire.answers[0].question,
            "What community need does your project address?"
        );
        assert_eq!(questionnaire.answers[1].question, "custom");
    }
}
