//! Bridge configuration parsing and validation.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::link::record::EncoderDefaults;
use crate::{BridgeError, Result};

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    23456
}

fn default_max_message_bytes() -> usize {
    65_536
}

fn default_relink_interval_seconds() -> u64 {
    5
}

fn default_name() -> String {
    "Foundry VTT User".into()
}

fn default_identity() -> String {
    "{}".into()
}

fn default_description() -> String {
    "Foundry VTT".into()
}

/// WebSocket listener settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    /// Host name or address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port to bind; 0 lets the OS choose.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest inbound frame accepted from a client.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

/// Link record defaults and region acquisition policy.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct LinkConfig {
    /// Minimum delay between attempts to acquire a missing region; 0 disables.
    #[serde(default = "default_relink_interval_seconds")]
    pub relink_interval_seconds: u64,
    /// Name written when a message carries none.
    #[serde(default = "default_name")]
    pub default_name: String,
    /// Identity written when a message carries none.
    #[serde(default = "default_identity")]
    pub default_identity: String,
    /// Description written when a message carries none.
    #[serde(default = "default_description")]
    pub default_description: String,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            relink_interval_seconds: default_relink_interval_seconds(),
            default_name: default_name(),
            default_identity: default_identity(),
            default_description: default_description(),
        }
    }
}

impl LinkConfig {
    /// Relink interval, or `None` when re-acquisition is disabled.
    #[must_use]
    pub fn relink_interval(&self) -> Option<Duration> {
        match self.relink_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Encoder defaults derived from this table.
    #[must_use]
    pub fn encoder_defaults(&self) -> EncoderDefaults {
        EncoderDefaults {
            name: self.default_name.clone(),
            identity: self.default_identity.clone(),
            description: self.default_description.clone(),
        }
    }
}

/// Global configuration parsed from an optional TOML file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BridgeConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Link record settings.
    #[serde(default)]
    pub link: LinkConfig,
}

impl BridgeConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| BridgeError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides on top of file values.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Config` if the merged result is invalid.
    pub fn with_overrides(mut self, host: Option<String>, port: Option<u16>) -> Result<Self> {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(BridgeError::Config("server.host must not be empty".into()));
        }

        if self.server.max_message_bytes == 0 {
            return Err(BridgeError::Config(
                "server.max_message_bytes must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
