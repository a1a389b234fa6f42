//! Server settings
//!
//! Loads settings from an optional TOML file and layers command-line and
//! environment overrides on top.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::server::{DEFAULT_HEARTBEAT_INTERVAL_SECS, MAX_HEARTBEAT_INTERVAL_SECS};

/// Default bind address
pub const DEFAULT_BIND: &str = "0.0.0.0";

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 3000;

/// Errors that can occur during config operations
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// `[server]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSettings {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// `[heartbeat]` table
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HeartbeatSettings {
    /// Seconds between heartbeats
    pub interval_secs: u64,
}

impl Default for HeartbeatSettings {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

/// Complete server settings
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub server: ServerSettings,
    pub heartbeat: HeartbeatSettings,
}

impl Settings {
    /// Load settings from a TOML file
    ///
    /// Unlike an absent `--config` flag, a missing file is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate settings from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply command-line / environment overrides. `None` keeps the current value.
    pub fn with_overrides(
        mut self,
        bind: Option<String>,
        port: Option<u16>,
        interval_secs: Option<u64>,
    ) -> Result<Self, ConfigError> {
        if let Some(bind) = bind {
            self.server.bind = bind;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        if let Some(interval_secs) = interval_secs {
            self.heartbeat.interval_secs = interval_secs;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check that the settings can actually be served
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.bind.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "server.bind cannot be empty".to_string(),
            ));
        }
        if self.heartbeat.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat.interval_secs must be at least 1".to_string(),
            ));
        }
        if self.heartbeat.interval_secs > MAX_HEARTBEAT_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "heartbeat.interval_secs must be at most {}",
                MAX_HEARTBEAT_INTERVAL_SECS
            )));
        }
        Ok(())
    }
}
