//! Configuration loading and management.
//!
//! Loads guardian configuration from `$GUARDIAN_CONFIG_PATH` or
//! `~/.guardian/config.toml`. Environment variables override file values;
//! file values override defaults.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Action types gated by default.
pub const DEFAULT_ALLOWLIST: [&str; 5] = [
    "file_write",
    "file_delete",
    "command_exec",
    "json_write",
    "http_request",
];

// ── Top-level config ────────────────────────────────────────────

/// Top-level guardian configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Gating feature flag. When off, every action passes straight through.
    pub enabled: bool,
    /// Tracing log level filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Action types that are gated when the flag is on.
    pub allowlist: Vec<String>,
    /// Journal and fallback locations.
    pub paths: PathsConfig,
    /// Per-execution time budget.
    pub budget: BudgetConfig,
    /// Shell command execution limits.
    pub command: CommandConfig,
    /// Outbound HTTP limits.
    pub http: HttpConfig,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_level: "info".to_owned(),
            allowlist: DEFAULT_ALLOWLIST.iter().map(|s| (*s).to_owned()).collect(),
            paths: PathsConfig::default(),
            budget: BudgetConfig::default(),
            command: CommandConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl GuardianConfig {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// If the file does not exist, defaults are used.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        let path = Self::config_path_with(|key| std::env::var(key).ok());
        let mut config = Self::load_from_file(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                toml::from_str(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "failed to read config at {}: {e}",
                path.display()
            )),
        }
    }

    /// Resolve the config path using a custom env resolver.
    ///
    /// Checks `$GUARDIAN_CONFIG_PATH` first, then `~/.guardian/config.toml`.
    pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
        if let Some(p) = env("GUARDIAN_CONFIG_PATH") {
            return PathBuf::from(p);
        }
        guardian_home().join("config.toml")
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("EXEC_HOOK_ENABLED") {
            match parse_flag(&v) {
                Some(flag) => self.enabled = flag,
                None => tracing::warn!(
                    var = "EXEC_HOOK_ENABLED",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("GUARDIAN_LOG_LEVEL") {
            self.log_level = v;
        }

        // Paths.
        if let Some(v) = env("GUARDIAN_JOURNAL_PATH") {
            self.paths.journal = PathBuf::from(v);
        }
        if let Some(v) = env("GUARDIAN_LAST_RESORT_PATH") {
            self.paths.last_resort = PathBuf::from(v);
        }
        if let Some(v) = env("GUARDIAN_EXECUTIVE_DIR") {
            self.paths.executive_dir = Some(PathBuf::from(v));
        }

        if let Some(v) = env("GUARDIAN_BUDGET_MS") {
            match v.parse() {
                Ok(n) => self.budget.max_duration_ms = n,
                Err(_) => tracing::warn!(
                    var = "GUARDIAN_BUDGET_MS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).context("failed to parse config TOML")
    }

    /// Per-execution time budget, `None` when unlimited.
    pub fn budget_limit(&self) -> Option<Duration> {
        match self.budget.max_duration_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }
}

/// Accept the usual spellings of a boolean toggle.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

// ── Paths config ────────────────────────────────────────────────

/// Filesystem locations for audit output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Primary decision journal (JSON Lines).
    pub journal: PathBuf,
    /// Fixed location for last-resort entries when the journal is unusable.
    pub last_resort: PathBuf,
    /// Directory of an installed executive layer, probed at startup.
    pub executive_dir: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            journal: guardian_home().join("logs").join("guardian-journal.jsonl"),
            last_resort: std::env::temp_dir().join("guardian-last-resort.jsonl"),
            executive_dir: None,
        }
    }
}

// ── Limits ──────────────────────────────────────────────────────

/// Time budget for one gated execution.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Milliseconds before the budget reports exhaustion; `0` disables it.
    pub max_duration_ms: u64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_duration_ms: 60_000,
        }
    }
}

/// Shell command execution limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Seconds before a running command is killed.
    pub timeout_secs: u64,
    /// Characters of stdout/stderr kept in audit metadata.
    pub output_limit: usize,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 120,
            output_limit: 500,
        }
    }
}

/// Outbound HTTP limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { timeout_secs: 30 }
    }
}

/// Resolve the guardian home directory (`~/.guardian/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".guardian"))
}

/// Home directory or a temp-dir fallback when no home is resolvable.
fn guardian_home() -> PathBuf {
    config_dir().unwrap_or_else(|_| std::env::temp_dir().join(".guardian"))
}
