//! Configuration management
//!
//! Handles storing and loading CLI configuration.
//! Config directory: ~/.inscribe/ (cross-platform)
//!
//! Config file format (~/.inscribe/config.toml):
//! ```toml
//! [rpc]
//! url = "https://api.devnet.solana.com"
//! commitment = "confirmed"
//!
//! [wallet]
//! keypair_path = "/home/me/.config/solana/id.json"
//!
//! [inscribe]
//! concurrency = 2
//! cache_dir = "cache"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown config key: {0}. Valid keys: {keys}", keys = VALID_KEYS.join(", "))]
    UnknownKey(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Keys accepted by `config set`
pub const VALID_KEYS: &[&str] = &[
    "rpc.url",
    "rpc.commitment",
    "wallet.keypair_path",
    "inscribe.concurrency",
    "inscribe.cache_dir",
];

/// This is the structure of ~/.inscribe/config.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InscribeConfig {
    /// RPC endpoint settings
    #[serde(default)]
    pub rpc: RpcSettings,

    /// Wallet settings
    #[serde(default)]
    pub wallet: WalletSettings,

    /// Inscription settings
    #[serde(default)]
    pub inscribe: InscribeSettings,
}

/// RPC endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RpcSettings {
    /// Solana RPC URL
    #[serde(default = "default_rpc_url")]
    pub url: String,

    /// Commitment level for reads and confirmations
    #[serde(default = "default_commitment")]
    pub commitment: String,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: default_rpc_url(),
            commitment: default_commitment(),
        }
    }
}

fn default_rpc_url() -> String {
    std::env::var("INSCRIBE_RPC_URL")
        .unwrap_or_else(|_| "https://api.devnet.solana.com".to_string())
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

/// Wallet settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WalletSettings {
    /// Payer keypair (JSON byte array)
    #[serde(default = "default_keypair_path")]
    pub keypair_path: Option<String>,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            keypair_path: default_keypair_path(),
        }
    }
}

fn default_keypair_path() -> Option<String> {
    std::env::var("INSCRIBE_KEYPAIR").ok().or_else(|| {
        dirs::home_dir().map(|home| {
            home.join(".config")
                .join("solana")
                .join("id.json")
                .display()
                .to_string()
        })
    })
}

/// Inscription settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InscribeSettings {
    /// Remote calls in flight at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Where fetched NFT JSON and media are cached
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for InscribeSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("cache")
}

impl InscribeConfig {
    /// Set a value by dotted key
    pub fn set(&mut self, key: &str, value: String) -> std::result::Result<(), ConfigError> {
        match key {
            "rpc.url" => self.rpc.url = value,
            "rpc.commitment" => match value.as_str() {
                "processed" | "confirmed" | "finalized" => self.rpc.commitment = value,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: "expected processed, confirmed or finalized".to_string(),
                    })
                }
            },
            "wallet.keypair_path" => self.wallet.keypair_path = Some(value),
            "inscribe.concurrency" => {
                let concurrency: usize =
                    value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: format!("'{}' is not a number", value),
                    })?;
                if concurrency == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                self.inscribe.concurrency = concurrency;
            }
            "inscribe.cache_dir" => self.inscribe.cache_dir = PathBuf::from(value),
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

/// Get the config directory path (~/.inscribe/)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    let config_dir = home.join(".inscribe");

    // Create directory if it doesn't exist
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)
            .context("Failed to create config directory ~/.inscribe/")?;
    }

    Ok(config_dir)
}

/// Get the config file path
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Load configuration from ~/.inscribe/config.toml
/// Falls back to defaults if file doesn't exist
pub fn load_config() -> InscribeConfig {
    match config_file_path() {
        Ok(path) => load_config_from(&path),
        Err(_) => InscribeConfig::default(),
    }
}

/// Load configuration from a specific file, falling back to defaults
pub fn load_config_from(path: &Path) -> InscribeConfig {
    if !path.exists() {
        return InscribeConfig::default();
    }

    match fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to parse config file: {}", e);
                InscribeConfig::default()
            }
        },
        Err(e) => {
            eprintln!("Warning: Failed to read config file: {}", e);
            InscribeConfig::default()
        }
    }
}

/// Save configuration to ~/.inscribe/config.toml
pub fn save_config(config: &InscribeConfig) -> Result<()> {
    save_config_to(config, &config_file_path()?)
}

/// Save configuration to a specific file
pub fn save_config_to(config: &InscribeConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}
