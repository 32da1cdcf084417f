//! CLI Commands

pub mod download;
pub mod fetch;
pub mod inscribe;
pub mod shards;

use crate::config::InscribeConfig;
use anyhow::{Context, Result};
use inscribe_core::Address;
use inscribe_engine::DriverConfig;
use inscribe_ledger::{LedgerConfig, SolanaLedger};
use std::sync::Arc;

/// Connection flags shared by every command; unset flags fall back to the
/// config file
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub rpc: Option<String>,
    pub keypair: Option<String>,
    pub concurrency: Option<usize>,
}

impl GlobalOptions {
    /// Ledger configuration with flags layered over the config file
    pub fn ledger_config(&self, cfg: &InscribeConfig) -> LedgerConfig {
        LedgerConfig {
            rpc_url: self.rpc.clone().unwrap_or_else(|| cfg.rpc.url.clone()),
            keypair_path: self
                .keypair
                .clone()
                .or_else(|| cfg.wallet.keypair_path.clone()),
            commitment: cfg.rpc.commitment.clone(),
            ..LedgerConfig::default()
        }
    }

    /// Driver configuration with the effective concurrency
    pub fn driver_config(&self, cfg: &InscribeConfig) -> DriverConfig {
        DriverConfig::default()
            .with_concurrency(self.concurrency.unwrap_or(cfg.inscribe.concurrency))
    }

    /// Connect to the configured RPC node with the configured payer
    pub fn connect(&self, cfg: &InscribeConfig) -> Result<Arc<SolanaLedger>> {
        let ledger_config = self.ledger_config(cfg);
        let ledger = SolanaLedger::from_config(ledger_config)
            .context("Failed to set up Solana ledger")?;
        Ok(Arc::new(ledger))
    }

    /// Connect for queries; no keypair is needed
    pub fn connect_read_only(&self, cfg: &InscribeConfig) -> Result<Arc<SolanaLedger>> {
        let ledger = SolanaLedger::read_only(self.ledger_config(cfg))
            .context("Failed to set up Solana ledger")?;
        Ok(Arc::new(ledger))
    }
}

/// Parse base58 mint addresses given on the command line
pub fn parse_mints(mints: &[String]) -> Result<Vec<Address>> {
    if mints.is_empty() {
        anyhow::bail!("No mints given");
    }
    mints
        .iter()
        .map(|mint| {
            mint.parse::<Address>()
                .with_context(|| format!("Invalid mint address: {}", mint))
        })
        .collect()
}

/// Write JSON to `output`, or stdout when unset
pub fn write_json<T: serde::Serialize>(value: &T, output: Option<&std::path::Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    match output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{}", json),
    }
    Ok(())
}
