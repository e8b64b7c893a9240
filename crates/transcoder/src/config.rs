use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the encoder binary from the config file
pub const ENCODER_BIN_ENV: &str = "HBCONVERT_ENCODER_BIN";

/// Configuration for the batch converter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Path (or PATH-resolvable name) of the HandBrakeCLI binary
    pub encoder_bin: PathBuf,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

impl ConvertConfig {
    /// Create a default configuration with sensible values
    pub fn default_config() -> Self {
        Self {
            encoder_bin: PathBuf::from("HandBrakeCLI"),
        }
    }

    /// Load configuration from a file, or return defaults if path is None or file doesn't exist.
    /// `HBCONVERT_ENCODER_BIN` wins over whatever the file says.
    pub fn load_config(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default_config();

        if let Some(config_path) = path {
            if config_path.exists() {
                let content = std::fs::read_to_string(config_path)
                    .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

                // TOML by extension, JSON otherwise
                if config_path.extension().and_then(|s| s.to_str()) == Some("toml") {
                    config = toml::from_str(&content)
                        .with_context(|| format!("Failed to parse TOML config: {}", config_path.display()))?;
                } else {
                    config = serde_json::from_str(&content)
                        .with_context(|| format!("Failed to parse JSON config: {}", config_path.display()))?;
                }
            } else {
                log::warn!("Config file not found, using defaults: {}", config_path.display());
            }
        }

        if let Some(bin) = std::env::var_os(ENCODER_BIN_ENV) {
            if !bin.is_empty() {
                config.encoder_bin = PathBuf::from(bin);
            }
        }

        Ok(config)
    }
}
