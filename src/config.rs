//! Configuration management for WaveChain

use crate::consensus::ForkChoice;
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub use crate::blockchain::MAX_DIFFICULTY;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub gossip: GossipConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NetworkConfig {
    /// Port for inbound peers; 0 asks the OS for an ephemeral port.
    #[serde(default)]
    pub listen_port: u16,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    #[serde(default = "default_difficulty")]
    pub difficulty: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GossipConfig {
    #[serde(default)]
    pub fork_choice: ForkChoice,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    #[serde(default)]
    pub announce_on_connect: bool,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            fork_choice: ForkChoice::default(),
            channel_capacity: default_channel_capacity(),
            announce_on_connect: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.chain.difficulty == 0 || self.chain.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::ConfigError(format!(
                "chain.difficulty must be between 1 and {}, got {}",
                MAX_DIFFICULTY, self.chain.difficulty
            )));
        }

        if self.gossip.channel_capacity == 0 {
            return Err(ChainError::ConfigError(
                "gossip.channel_capacity must be greater than zero".to_string(),
            ));
        }

        for peer in &self.network.bootstrap_peers {
            if peer.rsplit_once(':').is_none() {
                return Err(ChainError::ConfigError(format!(
                    "bootstrap peer {:?} must be in host:port form",
                    peer
                )));
            }
        }

        Ok(())
    }
}

/// Loads `config.toml` from the working directory, falling back to defaults
/// when the file is absent.
pub fn load_config() -> Result<Config, ChainError> {
    let path = Path::new("config.toml");
    if !path.exists() {
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }
    load_config_from(path)
}

pub fn load_config_from(path: &Path) -> Result<Config, ChainError> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| ChainError::ConfigError(format!("Failed to read {:?}: {}", path, e)))?;
    let config: Config = toml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

fn default_difficulty() -> usize {
    3
}

fn default_channel_capacity() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}
