//! Integration tests for the in-memory ledger
//!
//! Exercises the ledger through the trait object the driver uses.
//!
//! Run with: cargo test -p inscribe-ledger --test memory_ledger_test

use bytes::Bytes;
use inscribe_core::{Address, ChunkSet, InscribeError, InscriptionTarget, CHUNK_SIZE};
use inscribe_ledger::{InscriptionLedger, MemoryLedger};
use std::sync::Arc;

fn target() -> InscriptionTarget {
    InscriptionTarget::new(Address::new([11u8; 32]), Address::new([12u8; 32]))
}

/// Generate a payload that's easy to verify
fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 256) as u8).collect()
}

#[tokio::test]
async fn test_manual_inscription_through_trait_object() {
    let memory = Arc::new(MemoryLedger::with_grow_increment(1024));
    let ledger: Arc<dyn InscriptionLedger> = memory.clone();
    let target = target();
    memory.initialize(&target);

    let data = payload(3000);
    while ledger.account_length(&target.account).await.unwrap() < data.len() {
        ledger.allocate(&target, data.len()).await.unwrap();
    }
    assert_eq!(memory.stats().grows, 3);

    let chunks = ChunkSet::split(data.clone(), CHUNK_SIZE).unwrap();
    for chunk in &chunks {
        ledger
            .write_data(&target, chunk.offset, chunk.data.clone())
            .await
            .unwrap();
    }

    assert!(ledger.account_valid(&target.account, &data).await.unwrap());
    let snapshot = ledger.get_account(&target.account).await.unwrap().unwrap();
    assert!(chunks.diff_against(&snapshot.data).is_empty());
}

#[tokio::test]
async fn test_concurrent_shard_creation_has_one_winner() {
    let ledger = Arc::new(MemoryLedger::new());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.create_shard(4).await })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => created += 1,
            Err(InscribeError::AlreadyInitialized(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 7);
    assert_eq!(ledger.fetch_shard(4).await.unwrap().unwrap().count, 0);
}

#[tokio::test]
async fn test_dropped_write_is_visible_on_reread() {
    let ledger = MemoryLedger::new();
    let target = target();
    ledger.initialize(&target);
    ledger.allocate(&target, 1000).await.unwrap();
    ledger.drop_next_writes(1);

    ledger
        .write_data(&target, 0, Bytes::from(payload(500)))
        .await
        .unwrap();

    let desired = ChunkSet::split(payload(500), CHUNK_SIZE).unwrap();
    let snapshot = ledger.get_account(&target.account).await.unwrap().unwrap();
    assert_eq!(desired.diff_against(&snapshot.data).len(), 1);
}

#[tokio::test]
async fn test_uninitialized_target_not_found() {
    let ledger = MemoryLedger::new();
    let err = ledger.allocate(&target(), 100).await.unwrap_err();
    assert!(matches!(err, InscribeError::NotFound(_)));
    assert!(!err.is_retryable());
}
