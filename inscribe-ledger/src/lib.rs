//! Inscribe Ledger
//!
//! Remote account access for inscriptions. The [`InscriptionLedger`] trait is
//! the seam between the driver and the chain; two implementations ship:
//! - [`MemoryLedger`]: in-process simulation with fault injection
//! - `SolanaLedger`: the on-chain program over JSON-RPC (feature `solana`)

pub mod ledger;
pub mod memory;

#[cfg(feature = "solana")]
pub mod solana;

pub use ledger::{AccountSnapshot, InscriptionLedger, ShardInfo};
pub use memory::{LedgerStats, MemoryLedger, MEMORY_PROGRAM_ID};

#[cfg(feature = "solana")]
pub use solana::{LedgerConfig, SolanaLedger};
