//! Inscription ledger trait
//!
//! Defines the remote operations the inscription driver and shard allocator
//! consume. Every call is asynchronous, fallible and individually billed by
//! the remote side; none of them is assumed to be linearizable with writers
//! outside this process.

use async_trait::async_trait;
use bytes::Bytes;
use inscribe_core::{Address, InscribeError, InscriptionTarget, Result, SHARD_COUNT};
use serde::{Deserialize, Serialize};

/// Point-in-time snapshot of a remote account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    /// Current account data
    pub data: Bytes,

    /// Program that owns the account
    pub owner: Address,
}

impl AccountSnapshot {
    /// Current allocated length
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the account holds no data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Shard counter used to rank new inscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardInfo {
    /// Shard number in `[0, SHARD_COUNT)`
    pub shard_number: u8,

    /// Inscriptions created through this shard
    pub count: u64,
}

impl ShardInfo {
    /// Global rank counter represented by this shard
    pub fn real_count(&self) -> u64 {
        self.count * SHARD_COUNT as u64 + self.shard_number as u64
    }
}

/// Remote account operations needed to inscribe a payload.
///
/// Implementations must be `Send + Sync` so one ledger can be shared by all
/// concurrently running calls of a driver round.
#[async_trait]
pub trait InscriptionLedger: Send + Sync {
    /// Read an account; `None` when it does not exist
    async fn get_account(&self, address: &Address) -> Result<Option<AccountSnapshot>>;

    /// Grow the target account toward `target_size`.
    ///
    /// A single call grows by at most a fixed increment, so large deltas take
    /// several calls.
    async fn allocate(&self, target: &InscriptionTarget, target_size: usize) -> Result<()>;

    /// Overwrite `data.len()` bytes of the target account starting at `offset`
    async fn write_data(&self, target: &InscriptionTarget, offset: usize, data: Bytes)
        -> Result<()>;

    /// Address of the shard counter with the given number
    fn shard_address(&self, shard_number: u8) -> Address;

    /// Read a shard counter; `None` when it has not been created
    async fn fetch_shard(&self, shard_number: u8) -> Result<Option<ShardInfo>>;

    /// Create a shard counter. Fails with `AlreadyInitialized` if it exists.
    async fn create_shard(&self, shard_number: u8) -> Result<()>;

    /// Check that the target's addresses match their expected derivation
    async fn verify_target(&self, _target: &InscriptionTarget) -> Result<()> {
        Ok(())
    }

    /// Whether an account exists
    async fn account_exists(&self, address: &Address) -> Result<bool> {
        Ok(self.get_account(address).await?.is_some())
    }

    /// Current allocated length; fails with `NotFound` if the account is missing
    async fn account_length(&self, address: &Address) -> Result<usize> {
        self.get_account(address)
            .await?
            .map(|account| account.len())
            .ok_or_else(|| InscribeError::NotFound(address.to_string()))
    }

    /// True iff the account exists and holds exactly `expected`
    async fn account_valid(&self, address: &Address, expected: &[u8]) -> Result<bool> {
        Ok(self
            .get_account(address)
            .await?
            .is_some_and(|account| account.data.as_ref() == expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_real_count() {
        let shard = ShardInfo {
            shard_number: 5,
            count: 3,
        };
        assert_eq!(shard.real_count(), 3 * 32 + 5);

        let fresh = ShardInfo {
            shard_number: 31,
            count: 0,
        };
        assert_eq!(fresh.real_count(), 31);
    }

    #[test]
    fn test_shard_info_json() {
        let shard = ShardInfo {
            shard_number: 2,
            count: 10,
        };
        let json = serde_json::to_string(&shard).unwrap();
        assert_eq!(json, r#"{"shardNumber":2,"count":10}"#);
    }
}
