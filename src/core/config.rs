//! Configuration management for Grantflow.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::workflow::ProgressScale;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "GRANTFLOW_CONFIG";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// RFP analysis simulator
    pub analysis: AnalysisConfig,

    /// Draft generation simulator
    pub generation: TickConfig,

    /// Per-section progress heuristic
    pub progress: ProgressConfig,

    /// Completion flag policy
    pub completion: CompletionConfig,

    /// Notification settings
    pub notifications: NotificationsConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Whether the first-run walkthrough has been completed
    pub onboarding_completed: bool,

    /// Seed for the pseudo-random generator (random if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Replacement fixture catalog
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
}

/// Tick schedule of a simulated long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TickConfig {
    /// Smallest progress step, in percent
    pub min_increment: u8,

    /// Largest progress step, in percent
    pub max_increment: u8,

    /// Shortest pause between steps
    pub min_interval_ms: u64,

    /// Longest pause between steps
    pub max_interval_ms: u64,
}

/// RFP analysis settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Tick schedule
    #[serde(flatten)]
    pub ticks: TickConfig,

    /// Number of requirement questions to extract
    pub requirement_questions: usize,
}

/// Progress heuristic settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Characters at which a section reads as 100%
    pub saturation_chars: usize,

    /// Minimum percentage for any non-empty content
    pub floor_percent: u8,
}

/// What happens to `completed` when a write empties a section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompletionPolicy {
    /// Never cleared automatically
    #[default]
    Sticky,
    /// Cleared when content becomes empty
    TrackContent,
}

/// Completion settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Policy for empty writes
    pub policy: CompletionPolicy,
}

/// Notification settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Also show toasts as desktop notifications
    pub desktop: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            analysis: AnalysisConfig::default(),
            generation: TickConfig::default(),
            progress: ProgressConfig::default(),
            completion: CompletionConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Default for TickConfig {
    fn default() -> Self {
        Self { min_increment: 10, max_increment: 15, min_interval_ms: 300, max_interval_ms: 800 }
    }
}

impl TickConfig {
    /// A schedule with no pauses, for scripted runs and tests.
    pub fn instant() -> Self {
        Self { min_interval_ms: 0, max_interval_ms: 0, ..Self::default() }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { ticks: TickConfig::default(), requirement_questions: 4 }
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        let scale = ProgressScale::default();
        Self { saturation_chars: scale.saturation_chars, floor_percent: scale.floor_percent }
    }
}

impl ProgressConfig {
    /// Scale used by the completion tracker.
    pub fn scale(&self) -> ProgressScale {
        ProgressScale { saturation_chars: self.saturation_chars, floor_percent: self.floor_percent }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. the file named by `GRANTFLOW_CONFIG`
    /// 2. `.grantflow.toml` in current directory
    /// 3. `~/.config/grantflow/config.toml`
    /// 4. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            if !path.is_empty() {
                return Self::load_from_file(Path::new(&path));
            }
        }

        // Try local config first
        let local_config = PathBuf::from(".grantflow.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        // Try global config
        if let Some(global_config) = Self::config_file() {
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_ticks("analysis", &self.analysis.ticks)?;
        validate_ticks("generation", &self.generation)?;

        if self.progress.saturation_chars == 0 {
            anyhow::bail!("progress.saturation_chars must be greater than 0");
        }
        if self.progress.floor_percent > 100 {
            anyhow::bail!("progress.floor_percent must be at most 100");
        }

        Ok(())
    }

    /// Save configuration to the global config file.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let config_path = Self::config_file()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        self.save_to_file(&config_path)?;
        Ok(config_path)
    }

    /// Save configuration to a specific file.
    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("grantflow"))
    }

    /// Get the global config file path.
    pub fn config_file() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("config.toml"))
    }
}

fn validate_ticks(name: &str, ticks: &TickConfig) -> anyhow::Result<()> {
    if ticks.min_increment == 0 {
        anyhow::bail!("{name}.min_increment must be greater than 0");
    }
    if ticks.min_increment > ticks.max_increment {
        anyhow::bail!("{name}.min_increment must not exceed {name}.max_increment");
    }
    if ticks.max_increment > 100 {
        anyhow::bail!("{name}.max_increment must be at most 100");
    }
    if ticks.min_interval_ms > ticks.max_interval_ms {
        anyhow::bail!("{name}.min_interval_ms must not exceed {name}.max_interval_ms");
    }
    Ok(())
}
