//! Shard Allocator
//!
//! Idempotent create-or-fetch over the fixed set of shard counters that rank
//! new inscriptions. Spreading callers across shards keeps contention on any
//! single counter low; races with other processes creating the same shard
//! resolve to a re-fetch.

use inscribe_core::{Address, InscribeError, Result, SHARD_COUNT};
use inscribe_ledger::{InscriptionLedger, ShardInfo};
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// A shard that exists on the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardHandle {
    /// Shard number in `[0, SHARD_COUNT)`
    pub number: u8,
    /// Shard account address
    pub address: Address,
    /// Counter state as last fetched
    pub info: ShardInfo,
}

/// Shard allocator
pub struct ShardAllocator {
    ledger: Arc<dyn InscriptionLedger>,
}

impl ShardAllocator {
    /// Create a new allocator
    pub fn new(ledger: Arc<dyn InscriptionLedger>) -> Self {
        Self { ledger }
    }

    /// Pick a shard number uniformly at random
    pub fn random_shard() -> u8 {
        rand::thread_rng().gen_range(0..SHARD_COUNT)
    }

    /// Fetch a shard if it exists
    pub async fn fetch(&self, number: u8) -> Result<Option<ShardHandle>> {
        check_number(number)?;
        let address = self.ledger.shard_address(number);
        Ok(self
            .ledger
            .fetch_shard(number)
            .await?
            .map(|info| ShardHandle {
                number,
                address,
                info,
            }))
    }

    /// Return the given shard (or a random one), creating it if missing
    #[instrument(skip(self))]
    pub async fn ensure_shard(&self, number: Option<u8>) -> Result<ShardHandle> {
        let number = match number {
            Some(number) => {
                check_number(number)?;
                number
            }
            None => Self::random_shard(),
        };

        if let Some(handle) = self.fetch(number).await? {
            debug!(shard = number, count = handle.info.count, "Shard exists");
            return Ok(handle);
        }

        match self.ledger.create_shard(number).await {
            Ok(()) => info!(shard = number, "Shard created"),
            Err(InscribeError::AlreadyInitialized(_)) => {
                debug!(shard = number, "Shard created concurrently");
            }
            Err(e) => return Err(e),
        }

        self.fetch(number).await?.ok_or_else(|| {
            InscribeError::NotFound(self.ledger.shard_address(number).to_string())
        })
    }

    /// Ensure every shard exists
    pub async fn ensure_all(&self) -> Result<Vec<ShardHandle>> {
        let mut handles = Vec::with_capacity(SHARD_COUNT as usize);
        for number in 0..SHARD_COUNT {
            handles.push(self.ensure_shard(Some(number)).await?);
        }
        Ok(handles)
    }
}

fn check_number(number: u8) -> Result<()> {
    if number >= SHARD_COUNT {
        return Err(InscribeError::Configuration(format!(
            "shard number {} out of range (0..{})",
            number, SHARD_COUNT
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inscribe_ledger::MemoryLedger;

    #[tokio::test]
    async fn test_ensure_creates_then_fetches() {
        let ledger = Arc::new(MemoryLedger::new());
        let allocator = ShardAllocator::new(ledger.clone());

        let first = allocator.ensure_shard(Some(9)).await.unwrap();
        assert_eq!(first.number, 9);
        assert_eq!(first.address, ledger.shard_address(9));
        assert_eq!(first.info.count, 0);

        let second = allocator.ensure_shard(Some(9)).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.stats().shard_creates, 1);
    }

    #[tokio::test]
    async fn test_random_shard_in_range() {
        let allocator = ShardAllocator::new(Arc::new(MemoryLedger::new()));
        for _ in 0..64 {
            let handle = allocator.ensure_shard(None).await.unwrap();
            assert!(handle.number < SHARD_COUNT);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_rejected() {
        let allocator = ShardAllocator::new(Arc::new(MemoryLedger::new()));
        assert!(matches!(
            allocator.ensure_shard(Some(SHARD_COUNT)).await,
            Err(InscribeError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_ensure_all() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.create_shard(0).await.unwrap();

        let allocator = ShardAllocator::new(ledger.clone());
        let handles = allocator.ensure_all().await.unwrap();
        assert_eq!(handles.len(), SHARD_COUNT as usize);
        assert_eq!(ledger.stats().shard_creates, SHARD_COUNT as u64);
        assert_eq!(ledger.stats().shard_conflicts, 0);
    }
}
