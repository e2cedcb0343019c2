//! Persisted default-model choice.
//!
//! The file is a small JSON object such as `{"default_model": "llama3:8b"}`.
//! Keys this program does not know about are carried through a rewrite untouched.

use crate::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File name used under the home directory when no explicit path is configured.
pub const DEFAULT_CONFIG_FILE_NAME: &str = ".dmarc_analyzer_config.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Reads and writes the [`ModelConfig`] at one fixed location.
#[derive(Debug, Clone)]
pub struct ModelConfigStore {
    path: PathBuf,
}

impl ModelConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the config. A missing file is an empty config; anything unreadable is an error.
    pub fn try_load(&self) -> Result<ModelConfig> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No model config file yet");
                return Ok(ModelConfig::default());
            }
            Err(e) => {
                return Err(AnalyzerError::Config {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_str(&content).map_err(|e| AnalyzerError::Config {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    /// Like [`try_load`](Self::try_load), but a broken file counts as "no default set".
    pub fn load(&self) -> ModelConfig {
        match self.try_load() {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable model config");
                ModelConfig::default()
            }
        }
    }

    /// Atomically replaces the config file (temp file in the same directory, then rename).
    pub fn save(&self, config: &ModelConfig) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let to_config_err = |reason: String| AnalyzerError::Config {
            path: self.path.clone(),
            reason,
        };

        fs::create_dir_all(&dir).map_err(|e| AnalyzerError::io(&dir, e))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|e| AnalyzerError::io(&dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, config).map_err(|e| to_config_err(e.to_string()))?;
        tmp.write_all(b"\n").map_err(|e| AnalyzerError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| to_config_err(e.error.to_string()))?;

        info!(path = %self.path.display(), default_model = ?config.default_model, "Saved model config");
        Ok(())
    }

    /// Stores `model` as the default while keeping any other keys in the file.
    pub fn set_default_model(&self, model: &str) -> Result<()> {
        let mut config = self.load();
        config.default_model = Some(model.to_string());
        self.save(&config)
    }
}
