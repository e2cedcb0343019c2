/// `load_config` module: reads the optional YAML settings file and fills in defaults.
///
/// Every key is optional. Path values may start with `~/`, which expands to the
/// home directory. Command-line flags and environment variables are applied on
/// top of the result by [`crate::cli`].
///
/// # Errors
/// A settings file that cannot be read or parsed is fatal and surfaces as an
/// `anyhow::Error` naming the file.
use anyhow::{anyhow, Context, Result};
use dmarc_analyzer_core::model_config::DEFAULT_CONFIG_FILE_NAME;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_INBOX_DIR: &str = "~/Downloads/dmarc-report-inbox";

/// Fully resolved settings used by a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub ollama_url: String,
    pub inbox_dir: PathBuf,
    pub model_config_path: PathBuf,
    pub archive_processed: bool,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
    pub monitor_prompt_timeout: Duration,
    pub request_timeout: Duration,
    pub ok_markers: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    ollama_url: Option<String>,
    inbox_dir: Option<String>,
    model_config_path: Option<String>,
    archive_processed: Option<bool>,
    poll_interval_secs: Option<u64>,
    settle_delay_ms: Option<u64>,
    monitor_prompt_timeout_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    ok_markers: Option<Vec<String>>,
}

impl Settings {
    /// Built-in defaults, as if an empty settings file had been given.
    pub fn defaults() -> Result<Self> {
        Self::from_file(SettingsFile::default())
    }

    fn from_file(raw: SettingsFile) -> Result<Self> {
        let model_config_path = match raw.model_config_path {
            Some(p) => expand_home(&p)?,
            None => home_dir()?.join(DEFAULT_CONFIG_FILE_NAME),
        };
        let ok_markers = match raw.ok_markers {
            Some(markers) if !markers.is_empty() => markers,
            _ => vec!["ok".to_string()],
        };

        Ok(Self {
            ollama_url: raw.ollama_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            inbox_dir: expand_home(raw.inbox_dir.as_deref().unwrap_or(DEFAULT_INBOX_DIR))?,
            model_config_path,
            archive_processed: raw.archive_processed.unwrap_or(true),
            poll_interval: Duration::from_secs(raw.poll_interval_secs.unwrap_or(2).max(1)),
            settle_delay: Duration::from_millis(raw.settle_delay_ms.unwrap_or(500)),
            monitor_prompt_timeout: Duration::from_secs(raw.monitor_prompt_timeout_secs.unwrap_or(30)),
            request_timeout: Duration::from_secs(raw.request_timeout_secs.unwrap_or(300)),
            ok_markers,
        })
    }
}

/// Loads settings from `path`, or returns the defaults when no path is given.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<Settings> {
    let Some(path) = path else {
        info!("No settings file given, using defaults");
        return Settings::defaults();
    };
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading settings from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read settings file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    // An empty document deserializes to unit, not to a map.
    let raw: SettingsFile = if content.trim().is_empty() {
        SettingsFile::default()
    } else {
        serde_yaml::from_str(&content).map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse settings YAML");
            anyhow!("Failed to parse config YAML {:?}: {e}", path_ref)
        })?
    };

    let settings = Settings::from_file(raw)?;
    info!(config_path = ?path_ref, ?settings, "Settings loaded");
    Ok(settings)
}

/// Expands a leading `~/` (or a bare `~`) to the home directory.
pub fn expand_home(raw: &str) -> Result<PathBuf> {
    if raw == "~" {
        return home_dir();
    }
    match raw.strip_prefix("~/") {
        Some(rest) => Ok(home_dir()?.join(rest)),
        None => Ok(PathBuf::from(raw)),
    }
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("Could not determine the home directory")
}
