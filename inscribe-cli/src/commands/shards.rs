//! Shard Commands
//!
//! Create and inspect the shard counters that rank new inscriptions.

use super::write_json;
use crate::ui::{CHECK, INFO};
use anyhow::{Context, Result};
use console::style;
use futures::stream::{self, StreamExt, TryStreamExt};
use inscribe_core::{Address, SHARD_COUNT};
use inscribe_engine::ShardAllocator;
use inscribe_ledger::InscriptionLedger;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// Shard dump entry
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardRecord {
    pub shard_number: u8,
    pub address: Address,
    pub count: u64,
    pub real_count: u64,
}

/// Shard fetch configuration
pub struct FetchConfig {
    pub numbers: Vec<u8>,
    pub output: Option<PathBuf>,
    pub concurrency: usize,
}

/// Create every missing shard
pub async fn create(ledger: Arc<dyn InscriptionLedger>) -> Result<()> {
    let allocator = ShardAllocator::new(ledger);

    for number in 0..SHARD_COUNT {
        if allocator.fetch(number).await?.is_some() {
            println!("{} Shard {} already exists.", style(CHECK).green(), number);
            continue;
        }

        println!("{} Creating shard {}...", style(INFO).blue(), number);
        let shard = allocator
            .ensure_shard(Some(number))
            .await
            .with_context(|| format!("Failed to create shard {}", number))?;
        println!(
            "{} Shard {} at {}",
            style(CHECK).green(),
            number,
            style(shard.address).cyan()
        );
    }

    Ok(())
}

/// Fetch shard counters; missing shards are left out
pub async fn fetch(ledger: Arc<dyn InscriptionLedger>, config: FetchConfig) -> Result<()> {
    let records = collect(ledger, &config.numbers, config.concurrency).await?;
    write_json(&records, config.output.as_deref())?;

    if let Some(path) = &config.output {
        println!(
            "{} Wrote {} shards to {}",
            style(CHECK).green(),
            records.len(),
            path.display()
        );
    }
    Ok(())
}

/// Fetch the given shards (all when empty) in number order
async fn collect(
    ledger: Arc<dyn InscriptionLedger>,
    numbers: &[u8],
    concurrency: usize,
) -> Result<Vec<ShardRecord>> {
    let numbers: Vec<u8> = if numbers.is_empty() {
        (0..SHARD_COUNT).collect()
    } else {
        numbers.to_vec()
    };

    let allocator = ShardAllocator::new(ledger);
    let handles: Vec<_> = stream::iter(numbers)
        .map(|number| {
            let allocator = &allocator;
            async move {
                allocator
                    .fetch(number)
                    .await
                    .with_context(|| format!("Failed to fetch shard {}", number))
            }
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await?;

    Ok(handles
        .into_iter()
        .flatten()
        .map(|shard| ShardRecord {
            shard_number: shard.number,
            address: shard.address,
            count: shard.info.count,
            real_count: shard.info.real_count(),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use inscribe_ledger::MemoryLedger;

    #[tokio::test]
    async fn test_create_then_collect_all() {
        let ledger = Arc::new(MemoryLedger::new());
        create(ledger.clone()).await.unwrap();
        assert_eq!(ledger.stats().shard_creates, SHARD_COUNT as u64);

        // A second pass only fetches
        create(ledger.clone()).await.unwrap();
        assert_eq!(ledger.stats().shard_creates, SHARD_COUNT as u64);

        let records = collect(ledger.clone(), &[], 4).await.unwrap();
        assert_eq!(records.len(), SHARD_COUNT as usize);
        assert_eq!(records[7].shard_number, 7);
        assert_eq!(records[7].real_count, 7);
        assert_eq!(records[7].address, ledger.shard_address(7));
    }

    #[tokio::test]
    async fn test_collect_skips_missing_and_rejects_out_of_range() {
        let ledger = Arc::new(MemoryLedger::new());
        ShardAllocator::new(ledger.clone())
            .ensure_shard(Some(3))
            .await
            .unwrap();

        let records = collect(ledger.clone(), &[1, 3], 2).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shard_number, 3);

        assert!(collect(ledger, &[40], 2).await.is_err());
    }

    #[test]
    fn test_record_json_uses_camel_case() {
        let record = ShardRecord {
            shard_number: 2,
            address: Address::new([0u8; 32]),
            count: 3,
            real_count: 98,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["shardNumber"], 2);
        assert_eq!(json["realCount"], 98);
        assert_eq!(json["address"], "11111111111111111111111111111111");
    }
}
