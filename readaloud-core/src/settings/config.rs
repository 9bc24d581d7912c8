use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SpeechError};

/// Provider defaults shared by every synthesis request. Loaded once and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub region: String,
    pub format: String,
    pub voice: String,
    #[serde(rename = "type")]
    pub text_type: String,
    /// Speaking rate in percent of the voice's normal rate.
    pub speed: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        default_config()
    }
}

pub fn default_config() -> ProviderConfig {
    ProviderConfig {
        region: "eu-west-1".to_string(),
        format: "pcm".to_string(),
        voice: "Joanna".to_string(),
        text_type: "ssml".to_string(),
        speed: 100,
    }
}

impl ProviderConfig {
    /// Parse a YAML document. Keys that are absent keep their defaults.
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty or `~` document is null, not a map
        if contents.trim().is_empty() {
            return Ok(default_config());
        }

        let config: Option<ProviderConfig> = serde_yaml::from_str(contents)?;
        let config = config.unwrap_or_else(default_config);
        if config.speed == 0 {
            return Err(SpeechError::Config(anyhow::anyhow!(
                "speed must be greater than 0"
            )));
        }
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {path:?}"))
            .map_err(SpeechError::Config)?;

        Self::from_yaml(&contents)
    }

    /// Load configuration, falling back to the defaults when the file is
    /// missing or malformed. The fallback comes back together with the
    /// error that caused it.
    pub fn load_or_default(path: &Path) -> (Self, Option<SpeechError>) {
        match Self::load(path) {
            Ok(config) => (config, None),
            Err(e) => (default_config(), Some(e)),
        }
    }

    /// Get the default config path (~/.readaloud/config.yaml)
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .context("Failed to get home directory")
            .map_err(SpeechError::Config)?;
        Ok(home.join(".readaloud").join("config.yaml"))
    }
}
