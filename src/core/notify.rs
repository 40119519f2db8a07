//! User-visible status notifications ("toasts").
//!
//! The workflow emits toasts and never waits for them to be shown.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Toast severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    /// Lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A status message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toast {
    /// Short title
    pub title: String,

    /// Longer description
    pub description: String,

    /// Severity
    pub severity: Severity,

    /// When the toast was raised
    pub created_at: DateTime<Utc>,
}

impl Toast {
    /// Create a toast stamped with the current time.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            created_at: Utc::now(),
        }
    }

    /// Informational toast.
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Info)
    }

    /// Success toast.
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Success)
    }

    /// Warning toast.
    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Warning)
    }

    /// Error toast.
    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(title, description, Severity::Error)
    }
}

/// Fire-and-forget destination for toasts.
pub trait NotificationSink: Send + Sync {
    /// Deliver a toast.
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, toast: Toast) {
        match toast.severity {
            Severity::Info | Severity::Success => {
                tracing::info!(title = %toast.title, "{}", toast.description);
            }
            Severity::Warning => tracing::warn!(title = %toast.title, "{}", toast.description),
            Severity::Error => tracing::error!(title = %toast.title, "{}", toast.description),
        }
    }
}

/// Keeps every toast in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    toasts: Arc<Mutex<Vec<Toast>>>,
}

impl RecordingSink {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything received so far.
    pub fn toasts(&self) -> Vec<Toast> {
        self.toasts.lock().clone()
    }

    /// Titles received so far.
    pub fn titles(&self) -> Vec<String> {
        self.toasts.lock().iter().map(|t| t.title.clone()).collect()
    }

    /// Remove and return everything received so far.
    pub fn drain(&self) -> Vec<Toast> {
        std::mem::take(&mut *self.toasts.lock())
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, toast: Toast) {
        self.toasts.lock().push(toast);
    }
}

/// Forwards each toast to several sinks.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanoutSink {
    /// Create a fanout with no targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target.
    pub fn with(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl fmt::Debug for FanoutSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FanoutSink").field("sinks", &self.sinks.len()).finish()
    }
}

impl NotificationSink for FanoutSink {
    fn notify(&self, toast: Toast) {
        for sink in &self.sinks {
            sink.notify(toast.clone());
        }
    }
}

/// Shows toasts as desktop notifications.
#[cfg(feature = "notifications")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopSink;

#[cfg(feature = "notifications")]
impl NotificationSink for DesktopSink {
    fn notify(&self, toast: Toast) {
        use notify_rust::Notification;

        let icon = match toast.severity {
            Severity::Info | Severity::Success => "dialog-information",
            Severity::Warning => "dialog-warning",
            Severity::Error => "dialog-error",
        };

        if let Err(e) = Notification::new()
            .summary(&format!("Grantflow: {}", toast.title))
            .body(&toast.description)
            .icon(icon)
            .appname("grantflow")
            .timeout(5000)
            .show()
        {
            tracing::debug!(error = %e, "Desktop notification failed");
        }
    }
}
