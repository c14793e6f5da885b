//! Host configuration loaded from a TOML file.

use crate::cli::CliArgs;
use message_dispatch::DispatcherConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Could not write configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Dispatcher runtime settings
    #[serde(default)]
    pub dispatcher: DispatcherConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingSettings,
    /// Demo traffic settings
    #[serde(default)]
    pub demo: DemoSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter
    pub level: String,
    /// JSON formatting
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// How many times the handler table is rebuilt after the initial load
    pub reload_cycles: u32,
    /// Mirror loaded handlers into the legacy dispatcher
    pub bridge_legacy: bool,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            reload_cycles: 1,
            bridge_legacy: true,
        }
    }
}

impl AppConfig {
    /// Loads configuration from `path`, writing a default file when it does
    /// not exist yet.
    pub async fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            match toml::from_str::<AppConfig>(&content) {
                Ok(config) => Ok(config),
                Err(e) => {
                    warn!("Failed to parse config file {}: {}", path.display(), e);
                    Err(e.into())
                }
            }
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file values.
    pub fn apply_overrides(&mut self, args: &CliArgs) {
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
        if let Some(cycles) = args.reload_cycles {
            self.demo.reload_cycles = cycles;
        }
        if let Some(timeout) = args.handler_timeout_ms {
            self.dispatcher.handler_timeout_ms = Some(timeout);
        }
    }
}
