//! In-memory ledger
//!
//! Simulates the inscription program in-process. Used for testing, dry runs
//! and development. Not persistent.
//!
//! The simulation enforces the same constraints as the remote program: an
//! allocate call grows an account by at most the grow increment, writes past
//! the current allocation are rejected, and revoked authorities cannot write.
//! Faults can be injected to exercise the driver's recovery paths.

use crate::ledger::{AccountSnapshot, InscriptionLedger, ShardInfo};
use async_trait::async_trait;
use bytes::Bytes;
use inscribe_core::{
    Address, InscribeError, InscriptionTarget, Result, CHUNK_SIZE, MAX_GROW_INCREMENT,
    SHARD_COUNT,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Owner recorded on accounts created through the memory ledger
pub const MEMORY_PROGRAM_ID: Address = Address::new([0x1d; 32]);

/// Operation counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Account reads
    pub reads: u64,
    /// Allocate calls received
    pub grows: u64,
    /// Allocate calls that returned an error
    pub grow_failures: u64,
    /// Write calls received
    pub writes: u64,
    /// Write calls that returned an error
    pub write_failures: u64,
    /// Shards created
    pub shard_creates: u64,
    /// Create-shard calls that hit an existing shard
    pub shard_conflicts: u64,
    /// Highest number of allocate/write calls in flight at once
    pub peak_in_flight: usize,
}

/// Pending injected faults
#[derive(Debug, Default)]
struct FaultPlan {
    /// Next N allocate calls fail without growing
    failing_grows: u64,
    /// Next N allocate calls grow but report failure
    lost_grow_responses: u64,
    /// Next N write calls fail without writing
    failing_writes: u64,
    /// Next N write calls report success without writing
    dropped_writes: u64,
    /// Per-offset write failures
    failing_offsets: HashMap<usize, u64>,
    /// Metadata accounts whose signer is no longer an authority
    revoked: HashSet<Address>,
}

fn take(counter: &mut u64) -> bool {
    if *counter > 0 {
        *counter -= 1;
        true
    } else {
        false
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    accounts: HashMap<Address, Vec<u8>>,
    shards: HashMap<u8, ShardInfo>,
}

/// In-memory inscription ledger
pub struct MemoryLedger {
    /// Account and shard storage
    state: RwLock<LedgerState>,

    /// Injected faults
    faults: Mutex<FaultPlan>,

    /// Maximum bytes a single allocate call adds
    grow_increment: usize,

    /// Operation counters
    reads: AtomicU64,
    grows: AtomicU64,
    grow_failures: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    shard_creates: AtomicU64,
    shard_conflicts: AtomicU64,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MemoryLedger {
    /// Create a new in-memory ledger
    pub fn new() -> Self {
        Self::with_grow_increment(MAX_GROW_INCREMENT)
    }

    /// Create with a custom grow increment
    pub fn with_grow_increment(grow_increment: usize) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            faults: Mutex::new(FaultPlan::default()),
            grow_increment,
            reads: AtomicU64::new(0),
            grows: AtomicU64::new(0),
            grow_failures: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            shard_creates: AtomicU64::new(0),
            shard_conflicts: AtomicU64::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Create (or replace) an account with the given data
    pub fn insert_account(&self, address: Address, data: impl Into<Vec<u8>>) {
        self.state.write().accounts.insert(address, data.into());
    }

    /// Create an empty inscription account and its metadata account
    pub fn initialize(&self, target: &InscriptionTarget) {
        let mut state = self.state.write();
        state.accounts.entry(target.account).or_default();
        state
            .accounts
            .entry(target.metadata_account)
            .or_insert_with(|| vec![0u8; 64]);
    }

    /// Overwrite bytes of an account directly, as another writer would
    pub fn overwrite(&self, address: &Address, offset: usize, data: &[u8]) {
        let mut state = self.state.write();
        if let Some(account) = state.accounts.get_mut(address) {
            let end = (offset + data.len()).min(account.len());
            if offset < end {
                account[offset..end].copy_from_slice(&data[..end - offset]);
            }
        }
    }

    /// Current account data
    pub fn account_data(&self, address: &Address) -> Option<Vec<u8>> {
        self.state.read().accounts.get(address).cloned()
    }

    /// Fail the next `n` allocate calls without growing
    pub fn fail_next_grows(&self, n: u64) {
        self.faults.lock().failing_grows = n;
    }

    /// Grow on the next `n` allocate calls but report failure to the caller
    pub fn lose_next_grow_responses(&self, n: u64) {
        self.faults.lock().lost_grow_responses = n;
    }

    /// Fail the next `n` write calls without writing
    pub fn fail_next_writes(&self, n: u64) {
        self.faults.lock().failing_writes = n;
    }

    /// Acknowledge the next `n` write calls without applying them
    pub fn drop_next_writes(&self, n: u64) {
        self.faults.lock().dropped_writes = n;
    }

    /// Fail the next `n` writes that start at `offset`
    pub fn fail_writes_at(&self, offset: usize, n: u64) {
        self.faults.lock().failing_offsets.insert(offset, n);
    }

    /// Remove the signer from the authorities of a metadata account
    pub fn revoke_authority(&self, metadata_account: Address) {
        self.faults.lock().revoked.insert(metadata_account);
    }

    /// Snapshot of the operation counters
    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            reads: self.reads.load(Ordering::Relaxed),
            grows: self.grows.load(Ordering::Relaxed),
            grow_failures: self.grow_failures.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            shard_creates: self.shard_creates.load(Ordering::Relaxed),
            shard_conflicts: self.shard_conflicts.load(Ordering::Relaxed),
            peak_in_flight: self.peak_in_flight.load(Ordering::Relaxed),
        }
    }

    /// Track a mutating call for the in-flight peak, yielding so that
    /// concurrent callers interleave.
    async fn enter(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::task::yield_now().await;
        InFlight(&self.in_flight)
    }

    fn check_target(&self, target: &InscriptionTarget) -> Result<()> {
        if self.faults.lock().revoked.contains(&target.metadata_account) {
            return Err(InscribeError::Unauthorized(target.account.to_string()));
        }
        let state = self.state.read();
        if !state.accounts.contains_key(&target.metadata_account) {
            return Err(InscribeError::NotFound(target.metadata_account.to_string()));
        }
        if !state.accounts.contains_key(&target.account) {
            return Err(InscribeError::NotFound(target.account.to_string()));
        }
        Ok(())
    }

    fn apply_allocate(&self, target: &InscriptionTarget, target_size: usize) -> Result<()> {
        self.check_target(target)?;

        let (lost, failing) = {
            let mut faults = self.faults.lock();
            let failing = take(&mut faults.failing_grows);
            let lost = !failing && take(&mut faults.lost_grow_responses);
            (lost, failing)
        };
        if failing {
            return Err(InscribeError::Transient("allocate dropped".to_string()));
        }

        {
            let mut state = self.state.write();
            let account = state
                .accounts
                .get_mut(&target.account)
                .ok_or_else(|| InscribeError::NotFound(target.account.to_string()))?;
            let new_size = target_size.min(account.len() + self.grow_increment);
            if new_size > account.len() {
                account.resize(new_size, 0);
            }
            debug!(account = %target.account, size = account.len(), "Allocated");
        }

        if lost {
            return Err(InscribeError::Transient("allocate response lost".to_string()));
        }
        Ok(())
    }

    fn apply_write(&self, target: &InscriptionTarget, offset: usize, data: &[u8]) -> Result<()> {
        if data.len() > CHUNK_SIZE {
            return Err(InscribeError::ChunkTooLarge {
                size: data.len(),
                max: CHUNK_SIZE,
            });
        }
        self.check_target(target)?;

        let dropped = {
            let mut faults = self.faults.lock();
            if take(&mut faults.failing_writes) {
                return Err(InscribeError::Transient("write dropped".to_string()));
            }
            if let Some(remaining) = faults.failing_offsets.get_mut(&offset) {
                if take(remaining) {
                    return Err(InscribeError::Transient(format!(
                        "write at offset {} dropped",
                        offset
                    )));
                }
            }
            take(&mut faults.dropped_writes)
        };
        if dropped {
            return Ok(());
        }

        let mut state = self.state.write();
        let account = state
            .accounts
            .get_mut(&target.account)
            .ok_or_else(|| InscribeError::NotFound(target.account.to_string()))?;
        let end = offset + data.len();
        if end > account.len() {
            return Err(InscribeError::Rejected(format!(
                "write to {}..{} beyond allocated length {}",
                offset,
                end,
                account.len()
            )));
        }
        account[offset..end].copy_from_slice(data);
        Ok(())
    }
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl InscriptionLedger for MemoryLedger {
    async fn get_account(&self, address: &Address) -> Result<Option<AccountSnapshot>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        Ok(state.accounts.get(address).map(|data| AccountSnapshot {
            data: Bytes::copy_from_slice(data),
            owner: MEMORY_PROGRAM_ID,
        }))
    }

    async fn allocate(&self, target: &InscriptionTarget, target_size: usize) -> Result<()> {
        let _guard = self.enter().await;
        self.grows.fetch_add(1, Ordering::Relaxed);
        let result = self.apply_allocate(target, target_size);
        if result.is_err() {
            self.grow_failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    async fn write_data(
        &self,
        target: &InscriptionTarget,
        offset: usize,
        data: Bytes,
    ) -> Result<()> {
        let _guard = self.enter().await;
        self.writes.fetch_add(1, Ordering::Relaxed);
        let result = self.apply_write(target, offset, &data);
        if result.is_err() {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    fn shard_address(&self, shard_number: u8) -> Address {
        let mut bytes = [0u8; 32];
        bytes[..5].copy_from_slice(b"Shard");
        bytes[31] = shard_number;
        Address::new(bytes)
    }

    async fn fetch_shard(&self, shard_number: u8) -> Result<Option<ShardInfo>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.state.read().shards.get(&shard_number).copied())
    }

    async fn create_shard(&self, shard_number: u8) -> Result<()> {
        if shard_number >= SHARD_COUNT {
            return Err(InscribeError::DerivationMismatch {
                address: self.shard_address(shard_number).to_string(),
            });
        }
        tokio::task::yield_now().await;

        let mut state = self.state.write();
        if state.shards.contains_key(&shard_number) {
            self.shard_conflicts.fetch_add(1, Ordering::Relaxed);
            return Err(InscribeError::AlreadyInitialized(
                self.shard_address(shard_number).to_string(),
            ));
        }
        state.shards.insert(
            shard_number,
            ShardInfo {
                shard_number,
                count: 0,
            },
        );
        self.shard_creates.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
