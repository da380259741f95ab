//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use ta_core::CoverageConfig;

/// Upper bound for `max_session_hours` and `--max-hours`: one year.
pub const MAX_SESSION_HOURS: i64 = 24 * 365;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Employee that session commands act for when `--employee` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,

    pub organization_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,

    /// How long to wait on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,

    /// Open entries older than this are closed by `close-stale`.
    pub max_session_hours: i64,

    /// Coalescing window for change notifications in `watch`, in milliseconds.
    pub debounce_ms: u64,

    /// Refresh interval of `watch`, in milliseconds.
    pub tick_ms: u64,

    pub coverage: CoverageConfig,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("employee_id", &self.employee_id)
            .field("organization_id", &self.organization_id)
            .field("team_id", &self.team_id)
            .field("busy_timeout_ms", &self.busy_timeout_ms)
            .field("max_session_hours", &self.max_session_hours)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("ta.db"),
            employee_id: None,
            organization_id: "default".to_string(),
            team_id: None,
            busy_timeout_ms: 5000,
            max_session_hours: 16,
            debounce_ms: 100,
            tick_ms: 1000,
            coverage: CoverageConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TA_*)
        figment = figment.merge(Env::prefixed("TA_"));

        figment.extract()
    }

    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// The stale-session limit, rejected unless within `1..=MAX_SESSION_HOURS`.
    pub fn max_session(&self) -> anyhow::Result<chrono::Duration> {
        let hours = self.max_session_hours;
        if !(1..=MAX_SESSION_HOURS).contains(&hours) {
            anyhow::bail!("max_session_hours must be between 1 and {MAX_SESSION_HOURS}, got {hours}");
        }
        chrono::Duration::try_hours(hours)
            .ok_or_else(|| anyhow::anyhow!("max_session_hours {hours} is out of range"))
    }

    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub const fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Returns the platform-specific config directory for ta.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("ta"))
}

/// Returns the platform-specific data directory for ta.
///
/// On Linux: `~/.local/share/ta`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ta"))
}
