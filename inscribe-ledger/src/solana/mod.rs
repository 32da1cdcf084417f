//! Solana Integration
//!
//! Drives the on-chain inscription program over JSON-RPC:
//! - Account reads at the configured commitment
//! - Allocate and write-data transactions for inscription accounts
//! - Shard counter creation and decoding
//! - Mint and associated inscription initialization
//! - Metadata lookup by inscription rank through filtered program scans
//!
//! # Example
//!
//! ```rust,ignore
//! use inscribe_ledger::solana::{LedgerConfig, SolanaLedger};
//!
//! let ledger = SolanaLedger::from_config(LedgerConfig::from_env())?;
//! let target = ledger.mint_target(&mint);
//! let shard = ledger.fetch_shard(7).await?;
//! ```

mod client;
pub mod instructions;
pub mod pda;
pub mod state;
pub mod types;

pub use client::{load_keypair, SolanaLedger};
pub use state::{
    rank_filters, AccountKey, AssociatedInscription, DataType, InscriptionMetadata, TokenMetadata,
};
pub use types::{constants, map_client_error, to_address, to_pubkey, LedgerConfig};
