//! Solana Ledger Types
//!
//! Configuration, program constants and conversions between the
//! chain-agnostic core types and Solana's.

use inscribe_core::{Address, InscribeError};
use serde::{Deserialize, Serialize};
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_sdk::{
    commitment_config::CommitmentConfig, instruction::InstructionError, pubkey::Pubkey,
    transaction::TransactionError,
};

/// Constants for the inscription program
pub mod constants {
    use solana_sdk::{pubkey, pubkey::Pubkey};

    /// Inscription program ID
    pub const PROGRAM_ID: Pubkey = pubkey!("1NSCRfGeyo7wPUazGbaPBUsTM49e1k2aXewHGARfzSo");

    /// Token metadata program ID
    pub const TOKEN_METADATA_PROGRAM_ID: Pubkey =
        pubkey!("metaqbxxUerdq28cj1RbAWkYQm3ybzjb6a8bt518x1s");

    /// Seed prefix shared by every inscription PDA
    pub const PREFIX: &[u8] = b"Inscription";

    /// Seed for associated inscription accounts
    pub const ASSOCIATION: &[u8] = b"Association";

    /// Seed for shard counter accounts
    pub const SHARD_PREFIX: &[u8] = b"Shard";

    /// Seed prefix for token metadata accounts
    pub const METADATA_PREFIX: &[u8] = b"metadata";

    /// Default RPC endpoint
    pub const DEFAULT_RPC_URL: &str = "https://api.devnet.solana.com";
}

/// Solana ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Solana RPC URL
    pub rpc_url: String,

    /// Payer/authority keypair path
    pub keypair_path: Option<String>,

    /// Commitment level: processed, confirmed or finalized
    pub commitment: String,

    /// Inscription program ID
    pub program_id: Pubkey,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        let default_keypair = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map(|home| format!("{}/.config/solana/id.json", home))
            .ok();

        Self {
            rpc_url: constants::DEFAULT_RPC_URL.to_string(),
            keypair_path: default_keypair,
            commitment: "confirmed".to_string(),
            program_id: constants::PROGRAM_ID,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("INSCRIBE_RPC_URL") {
            config.rpc_url = url;
        }
        if let Ok(path) = std::env::var("INSCRIBE_KEYPAIR") {
            config.keypair_path = Some(path);
        }
        config
    }

    /// Parsed commitment level
    pub fn commitment_config(&self) -> Result<CommitmentConfig, InscribeError> {
        match self.commitment.as_str() {
            "processed" => Ok(CommitmentConfig::processed()),
            "confirmed" => Ok(CommitmentConfig::confirmed()),
            "finalized" => Ok(CommitmentConfig::finalized()),
            other => Err(InscribeError::Configuration(format!(
                "unknown commitment level: {}",
                other
            ))),
        }
    }
}

/// Convert a core address into a Solana public key
pub fn to_pubkey(address: &Address) -> Pubkey {
    Pubkey::new_from_array(*address.as_bytes())
}

/// Convert a Solana public key into a core address
pub fn to_address(pubkey: &Pubkey) -> Address {
    Address::new(pubkey.to_bytes())
}

/// Custom error codes raised by the inscription program
mod program_error {
    pub const ALREADY_INITIALIZED: u32 = 0;
    pub const NOT_INITIALIZED: u32 = 1;
    pub const DERIVED_KEY_INVALID: u32 = 2;
    pub const INVALID_AUTHORITY: u32 = 7;
    pub const INCORRECT_OWNER: u32 = 9;
}

/// Classify a failed instruction
fn map_instruction_error(err: &InstructionError, context: &str) -> InscribeError {
    match err {
        InstructionError::Custom(code) => match *code {
            program_error::ALREADY_INITIALIZED => {
                InscribeError::AlreadyInitialized(context.to_string())
            }
            program_error::NOT_INITIALIZED => InscribeError::NotFound(context.to_string()),
            program_error::DERIVED_KEY_INVALID | program_error::INCORRECT_OWNER => {
                InscribeError::DerivationMismatch {
                    address: context.to_string(),
                }
            }
            program_error::INVALID_AUTHORITY => InscribeError::Unauthorized(context.to_string()),
            other => {
                InscribeError::Rejected(format!("{}: custom program error {}", context, other))
            }
        },
        InstructionError::AccountAlreadyInitialized => {
            InscribeError::AlreadyInitialized(context.to_string())
        }
        InstructionError::MissingRequiredSignature => {
            InscribeError::Unauthorized(context.to_string())
        }
        InstructionError::IncorrectProgramId | InstructionError::InvalidSeeds => {
            InscribeError::DerivationMismatch {
                address: context.to_string(),
            }
        }
        other => InscribeError::Rejected(format!("{}: {}", context, other)),
    }
}

/// Classify an RPC client error.
///
/// Program errors are fatal or retryable depending on their code; transport
/// failures and expired blockhashes are transient.
pub fn map_client_error(err: ClientError, context: &str) -> InscribeError {
    if let Some(tx_err) = err.get_transaction_error() {
        return match tx_err {
            TransactionError::InstructionError(_, ref ix_err) => {
                map_instruction_error(ix_err, context)
            }
            TransactionError::AccountNotFound => InscribeError::NotFound(context.to_string()),
            TransactionError::InsufficientFundsForFee
            | TransactionError::InsufficientFundsForRent { .. } => {
                InscribeError::InsufficientFunds(format!("{}: {}", context, tx_err))
            }
            other => InscribeError::Transient(format!("{}: {}", context, other)),
        };
    }

    let message = err.to_string();
    if message.contains("429") || message.contains("Too Many Requests") {
        return InscribeError::RateLimited;
    }

    match err.kind() {
        ClientErrorKind::SerdeJson(_) => {
            InscribeError::Serialization(format!("{}: {}", context, message))
        }
        _ => InscribeError::Transient(format!("{}: {}", context, message)),
    }
}
