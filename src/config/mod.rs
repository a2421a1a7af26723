//! Configuration module
//!
//! Handles loading and saving framenet configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::network::Address;
use crate::protocol::{DEFAULT_PORT, MAX_ENVELOPE_SIZE};

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Socket settings
    #[serde(default)]
    pub network: NetworkConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Name this host signs its notes with
    #[serde(default = "default_name")]
    pub name: String,
    /// Enable verbose logging
    #[serde(default)]
    pub verbose: bool,
}

fn default_name() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            verbose: false,
        }
    }
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Literal IPv4 address to bind to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allow datagrams to broadcast addresses
    #[serde(default)]
    pub broadcast: bool,
    /// Set SO_REUSEADDR before binding
    #[serde(default = "default_true")]
    pub reuse_address: bool,
    /// Receive timeout in ms (unset = block)
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,
    /// Largest stream envelope accepted, in bytes
    #[serde(default = "default_max_envelope_size")]
    pub max_envelope_size: usize,
}

fn default_bind_address() -> String {
    crate::network::UNSPECIFIED_IP.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

fn default_max_envelope_size() -> usize {
    MAX_ENVELOPE_SIZE
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            broadcast: false,
            reuse_address: default_true(),
            read_timeout_ms: None,
            max_envelope_size: default_max_envelope_size(),
        }
    }
}

impl NetworkConfig {
    /// The configured local endpoint
    pub fn bind_address(&self) -> Address {
        Address::new(self.bind_address.clone(), self.port)
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the default location
    pub fn load_default() -> ConfigResult<Self> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("framenet/config.toml")),
            Some(PathBuf::from("./framenet.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                return Self::load(path);
            }
        }

        // Return default config if no file found
        Ok(Self::default())
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Generate a sample configuration file
pub fn generate_sample_config() -> ConfigResult<String> {
    let config = Config {
        general: GeneralConfig {
            name: "lab-desk".to_string(),
            verbose: false,
        },
        network: NetworkConfig {
            bind_address: "127.0.0.1".to_string(),
            read_timeout_ms: Some(2000),
            ..Default::default()
        },
    };

    Ok(toml::to_string_pretty(&config)?)
}
