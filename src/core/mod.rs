//! Core application services for Grantflow.
//!
//! Configuration, notifications, the seeded random generator and the
//! application session that ties them to the fixture catalog.

mod config;
mod notify;
mod rng;
mod session;

pub use config::{
    AnalysisConfig, CompletionConfig, CompletionPolicy, Config, GeneralConfig, NotificationsConfig,
    ProgressConfig, TickConfig, CONFIG_ENV,
};
#[cfg(feature = "notifications")]
pub use notify::DesktopSink;
pub use notify::{FanoutSink, NotificationSink, RecordingSink, Severity, Toast, TracingSink};
pub use rng::SeededRng;
pub use session::AppSession;
