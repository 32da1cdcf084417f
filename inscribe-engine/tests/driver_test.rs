//! Integration tests for the inscription driver and shard allocator
//!
//! Drives the in-memory ledger through the full SIZING -> WRITING ->
//! CONVERGED cycle, with and without injected faults.
//!
//! Run with: cargo test -p inscribe-engine --test driver_test

use inscribe_core::{Address, InscribeError, InscriptionTarget, RetryPolicy};
use inscribe_engine::{CancellationToken, DriverConfig, InscriptionDriver, ShardAllocator};
use inscribe_ledger::{InscriptionLedger, MemoryLedger};
use std::sync::Arc;

/// Generate a payload that's easy to verify
fn payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8 ^ 0x5a).collect()
}

fn target() -> InscriptionTarget {
    InscriptionTarget::new(Address::new([31u8; 32]), Address::new([32u8; 32]))
}

fn setup() -> (Arc<MemoryLedger>, InscriptionTarget) {
    let ledger = Arc::new(MemoryLedger::new());
    let target = target();
    ledger.initialize(&target);
    (ledger, target)
}

fn config() -> DriverConfig {
    DriverConfig::default().with_write_retry(RetryPolicy::immediate(4))
}

fn driver(ledger: &Arc<MemoryLedger>, config: DriverConfig) -> InscriptionDriver {
    InscriptionDriver::new(ledger.clone(), config).unwrap()
}

#[tokio::test]
async fn test_1200_byte_scenario() {
    let (ledger, target) = setup();
    let data = payload(1200);

    let report = driver(&ledger, config()).inscribe(&target, data.clone()).await.unwrap();

    assert_eq!(report.initial_length, 0);
    assert_eq!(report.grow_calls, 1);
    assert_eq!(report.chunks_written, 3);
    assert_eq!(report.final_length, 1200);
    assert_eq!(report.rounds, 2);

    let stats = ledger.stats();
    assert_eq!(stats.grows, 1);
    assert_eq!(stats.writes, 3);
    assert!(ledger.account_valid(&target.account, &data).await.unwrap());
}

#[tokio::test]
async fn test_second_inscribe_is_noop() {
    let (ledger, target) = setup();
    let data = payload(25_000);
    let driver = driver(&ledger, config());

    driver.inscribe(&target, data.clone()).await.unwrap();
    let before = ledger.stats();

    let report = driver.inscribe(&target, data).await.unwrap();
    let after = ledger.stats();

    assert!(report.was_noop());
    assert_eq!(report.rounds, 0);
    assert_eq!(after.grows, before.grows);
    assert_eq!(after.writes, before.writes);
}

#[tokio::test]
async fn test_converges_from_any_initial_length() {
    let data = payload(25_000);

    for initial in [0usize, 1, 499, 10_240, 24_999, 25_000, 40_000] {
        let ledger = Arc::new(MemoryLedger::new());
        let target = target();
        ledger.initialize(&target);
        ledger.insert_account(target.account, vec![0xee; initial]);

        let report = driver(&ledger, config())
            .inscribe(&target, data.clone())
            .await
            .unwrap();

        let account = ledger.account_data(&target.account).unwrap();
        assert!(account.len() >= data.len(), "initial length {}", initial);
        assert_eq!(&account[..data.len()], data.as_slice(), "initial length {}", initial);
        assert_eq!(report.initial_length, initial);
        assert_eq!(report.final_length, initial.max(data.len()));
    }
}

#[tokio::test]
async fn test_partial_grow_and_write_failures() {
    let (ledger, target) = setup();
    let data = payload(25_000);
    ledger.fail_next_grows(1);
    ledger.fail_next_writes(2);

    let report = driver(&ledger, config()).inscribe(&target, data.clone()).await.unwrap();

    // 3 grows needed, one dropped and re-derived in a second round
    assert_eq!(report.grow_calls, 4);
    assert_eq!(report.grow_failures, 1);
    assert_eq!(report.write_retries, 2);
    assert_eq!(report.chunks_written, 50);
    assert!(ledger.account_valid(&target.account, &data).await.unwrap());
}

#[tokio::test]
async fn test_lost_grow_responses_do_not_overgrow() {
    let (ledger, target) = setup();
    let data = payload(15_000);
    ledger.lose_next_grow_responses(2);

    let report = driver(&ledger, config()).inscribe(&target, data.clone()).await.unwrap();

    assert_eq!(report.grow_failures, 2);
    assert_eq!(report.final_length, 15_000);
    assert!(ledger.account_valid(&target.account, &data).await.unwrap());
}

#[tokio::test]
async fn test_lost_writes_are_rewritten() {
    let (ledger, target) = setup();
    let data = payload(1200);
    ledger.drop_next_writes(2);

    let report = driver(&ledger, config()).inscribe(&target, data.clone()).await.unwrap();

    assert_eq!(report.chunks_written, 5);
    assert_eq!(report.rounds, 3);
    assert!(ledger.account_valid(&target.account, &data).await.unwrap());
}

#[tokio::test]
async fn test_external_corruption_is_repaired() {
    let (ledger, target) = setup();
    let data = payload(3000);
    let driver = driver(&ledger, config());
    driver.inscribe(&target, data.clone()).await.unwrap();

    ledger.overwrite(&target.account, 1250, &[0u8; 10]);
    let report = driver.inscribe(&target, data.clone()).await.unwrap();

    assert_eq!(report.grow_calls, 0);
    assert_eq!(report.chunks_written, 1);
    assert!(ledger.account_valid(&target.account, &data).await.unwrap());
}

#[tokio::test]
async fn test_unauthorized_is_fatal() {
    let (ledger, target) = setup();
    ledger.revoke_authority(target.metadata_account);

    let err = driver(&ledger, config())
        .inscribe(&target, payload(1200))
        .await
        .unwrap_err();

    assert!(matches!(err, InscribeError::Unauthorized(_)));
    assert_eq!(ledger.stats().grows, 1);
}

#[tokio::test]
async fn test_fatal_grow_aborts_rest_of_round() {
    let ledger = Arc::new(MemoryLedger::with_grow_increment(1024));
    let target = target();
    ledger.initialize(&target);
    ledger.revoke_authority(target.metadata_account);

    let config = DriverConfig {
        grow_increment: 1024,
        ..config().with_concurrency(1)
    };
    let err = driver(&ledger, config)
        .inscribe(&target, payload(10 * 1024))
        .await
        .unwrap_err();

    assert!(matches!(err, InscribeError::Unauthorized(_)));
    // Ten grows were queued; the ones behind the failure never reach the ledger
    let grows = ledger.stats().grows;
    assert!(grows <= 2, "{} grows issued", grows);
}

#[tokio::test]
async fn test_failed_chunk_aborts_rest_of_round() {
    let (ledger, target) = setup();
    ledger.fail_writes_at(0, u64::MAX);

    let config = config()
        .with_write_retry(RetryPolicy::immediate(1))
        .with_concurrency(1);
    let err = driver(&ledger, config)
        .inscribe(&target, payload(20_000))
        .await
        .unwrap_err();

    assert!(matches!(err, InscribeError::WriteFailed { offset: 0, .. }));
    let writes = ledger.stats().writes;
    assert!(writes <= 2, "{} of 40 chunk writes issued", writes);
}

#[tokio::test]
async fn test_grow_stalls_after_round_limit() {
    let (ledger, target) = setup();
    ledger.fail_next_grows(u64::MAX);

    let config = DriverConfig {
        max_grow_rounds: 3,
        ..config()
    };
    let err = driver(&ledger, config)
        .inscribe(&target, payload(1200))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InscribeError::GrowStalled {
            target: 1200,
            length: 0,
            rounds: 3
        }
    );
    assert_eq!(ledger.stats().writes, 0);
}

#[tokio::test]
async fn test_write_fails_after_retry_budget() {
    let (ledger, target) = setup();
    ledger.fail_writes_at(500, u64::MAX);

    let err = driver(&ledger, config())
        .inscribe(&target, payload(1200))
        .await
        .unwrap_err();

    match err {
        InscribeError::WriteFailed {
            offset, attempts, ..
        } => {
            assert_eq!(offset, 500);
            assert_eq!(attempts, 4);
        }
        other => panic!("expected WriteFailed, got {:?}", other),
    }

    // Chunks acknowledged before the failure stay written
    let account = ledger.account_data(&target.account).unwrap();
    assert_eq!(&account[..500], &payload(1200)[..500]);
}

#[tokio::test]
async fn test_verification_stalls_when_writes_never_land() {
    let (ledger, target) = setup();
    ledger.drop_next_writes(u64::MAX);

    let config = DriverConfig {
        max_write_rounds: 2,
        ..config()
    };
    let err = driver(&ledger, config)
        .inscribe(&target, payload(1200))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        InscribeError::VerificationStalled {
            rounds: 2,
            pending: 3
        }
    );
}

#[tokio::test]
async fn test_cancellation_at_round_boundary() {
    let (ledger, target) = setup();
    let token = CancellationToken::new();
    let driver = driver(&ledger, config()).with_cancellation(token.clone());

    token.cancel();
    let err = driver.inscribe(&target, payload(1200)).await.unwrap_err();
    assert_eq!(err, InscribeError::Cancelled);
    assert_eq!(ledger.stats().grows, 0);
    assert_eq!(ledger.stats().writes, 0);
}

#[tokio::test]
async fn test_cancelled_driver_still_reports_converged_account() {
    let (ledger, target) = setup();
    let data = payload(800);
    driver(&ledger, config()).inscribe(&target, data.clone()).await.unwrap();

    let cancelled = driver(&ledger, config());
    cancelled.cancellation_token().cancel();
    let report = cancelled.inscribe(&target, data).await.unwrap();
    assert!(report.was_noop());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_limit_respected() {
    let ledger = Arc::new(MemoryLedger::with_grow_increment(1024));
    let target = target();
    ledger.initialize(&target);
    let data = payload(20_000);

    let config = DriverConfig {
        grow_increment: 1024,
        ..config().with_concurrency(3)
    };
    let report = driver(&ledger, config).inscribe(&target, data.clone()).await.unwrap();

    let stats = ledger.stats();
    assert!(stats.peak_in_flight >= 1);
    assert!(stats.peak_in_flight <= 3, "peak {}", stats.peak_in_flight);
    assert_eq!(report.chunks_written, 40);
    assert!(ledger.account_valid(&target.account, &data).await.unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_shard_allocation() {
    let ledger = Arc::new(MemoryLedger::new());
    let first = ShardAllocator::new(ledger.clone());
    let second = ShardAllocator::new(ledger.clone());

    let (a, b) = tokio::join!(first.ensure_shard(Some(5)), second.ensure_shard(Some(5)));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a, b);
    assert_eq!(a.address, ledger.shard_address(5));

    let stats = ledger.stats();
    assert_eq!(stats.shard_creates, 1);
    assert!(stats.shard_conflicts <= 1);
}

#[tokio::test]
async fn test_associated_target_inscribes_independently() {
    let (ledger, base) = setup();
    let image =
        InscriptionTarget::associated(Address::new([33u8; 32]), base.metadata_account, "image")
            .unwrap();
    ledger.initialize(&image);

    let driver = driver(&ledger, config());
    driver.inscribe(&base, payload(700)).await.unwrap();
    driver.inscribe(&image, payload(2000)).await.unwrap();

    assert!(ledger.account_valid(&base.account, &payload(700)).await.unwrap());
    assert!(ledger.account_valid(&image.account, &payload(2000)).await.unwrap());
}
