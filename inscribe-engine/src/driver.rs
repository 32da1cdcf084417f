//! Inscription Driver
//!
//! Drives a remote account to an exact replica of a payload:
//! - SIZING: concurrent allocate calls until the account is long enough
//! - WRITING: concurrent chunk writes for every range that differs
//! - CONVERGED: a fresh read matches the payload
//!
//! Remaining work is always re-derived from a fresh read of the account,
//! never from local bookkeeping of call outcomes. Calling `inscribe` again on
//! a converged account costs two reads and no transactions.

use bytes::Bytes;
use futures::stream::{FuturesUnordered, StreamExt};
use inscribe_core::{
    needed_grows, Address, Chunk, ChunkSet, InscribeError, InscriptionTarget, Result,
    RetryPolicy,
};
use inscribe_ledger::{AccountSnapshot, InscriptionLedger};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::DriverConfig;
use crate::progress::ProgressEvent;

/// Capacity of the progress channel. Events beyond it are dropped.
const PROGRESS_CAPACITY: usize = 1024;

/// Outcome of a converged inscription
#[derive(Debug, Clone)]
pub struct InscribeReport {
    /// Inscribed target
    pub target: InscriptionTarget,
    /// Payload length
    pub payload_len: usize,
    /// Account length before sizing
    pub initial_length: usize,
    /// Account length after convergence
    pub final_length: usize,
    /// Allocate calls issued
    pub grow_calls: u64,
    /// Allocate calls that failed and were dropped
    pub grow_failures: u64,
    /// Chunk writes acknowledged
    pub chunks_written: u64,
    /// Chunk write attempts beyond the first
    pub write_retries: u64,
    /// Sizing and write rounds executed
    pub rounds: u32,
    /// Wall-clock time
    pub duration: Duration,
}

impl InscribeReport {
    fn new(target: &InscriptionTarget, payload_len: usize) -> Self {
        Self {
            target: target.clone(),
            payload_len,
            initial_length: 0,
            final_length: 0,
            grow_calls: 0,
            grow_failures: 0,
            chunks_written: 0,
            write_retries: 0,
            rounds: 0,
            duration: Duration::ZERO,
        }
    }

    /// Whether the account already held the payload
    pub fn was_noop(&self) -> bool {
        self.grow_calls == 0 && self.chunks_written == 0
    }

    /// Summary string
    pub fn summary(&self) -> String {
        format!(
            "{} bytes into {} ({} -> {} bytes): {} grows ({} failed), {} chunks, {} retries, {} rounds in {:?}",
            self.payload_len,
            self.target,
            self.initial_length,
            self.final_length,
            self.grow_calls,
            self.grow_failures,
            self.chunks_written,
            self.write_retries,
            self.rounds,
            self.duration
        )
    }
}

/// Inscription driver
pub struct InscriptionDriver {
    ledger: Arc<dyn InscriptionLedger>,
    config: DriverConfig,
    /// Limits in-flight remote calls across every running round
    semaphore: Arc<Semaphore>,
    /// Progress channel
    progress_tx: Option<mpsc::Sender<ProgressEvent>>,
    /// Checked at round boundaries
    cancel: CancellationToken,
}

impl InscriptionDriver {
    /// Create a new driver
    pub fn new(ledger: Arc<dyn InscriptionLedger>, config: DriverConfig) -> Result<Self> {
        config.validate()?;
        let semaphore = Arc::new(Semaphore::new(config.concurrency));

        Ok(Self {
            ledger,
            config,
            semaphore,
            progress_tx: None,
            cancel: CancellationToken::new(),
        })
    }

    /// Create a driver with a progress channel
    pub fn with_progress(
        ledger: Arc<dyn InscriptionLedger>,
        config: DriverConfig,
    ) -> Result<(Self, mpsc::Receiver<ProgressEvent>)> {
        let (tx, rx) = mpsc::channel(PROGRESS_CAPACITY);
        let mut driver = Self::new(ledger, config)?;
        driver.progress_tx = Some(tx);
        Ok((driver, rx))
    }

    /// Stop at the next round boundary once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that cancels this driver's inscriptions
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Driver configuration
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Inscribe `payload` into `target`, returning once the account holds it.
    ///
    /// The target account must already exist.
    #[instrument(
        skip(self, target, payload),
        fields(account = %target.account, tag = ?target.tag())
    )]
    pub async fn inscribe(
        &self,
        target: &InscriptionTarget,
        payload: impl Into<Bytes>,
    ) -> Result<InscribeReport> {
        let start = Instant::now();
        let payload: Bytes = payload.into();
        let mut report = InscribeReport::new(target, payload.len());

        self.ledger.verify_target(target).await?;
        let desired = ChunkSet::split(payload.clone(), self.config.chunk_size)?;

        info!(bytes = payload.len(), chunks = desired.len(), "Starting inscription");

        let length = self.size(target, payload.len(), &mut report).await?;
        debug!(length, "Sizing complete");

        report.final_length = self.write(target, &desired, &mut report).await?;
        report.duration = start.elapsed();

        info!(summary = %report.summary(), "Inscription converged");
        Ok(report)
    }

    /// SIZING: grow the account until it can hold `payload_len` bytes
    async fn size(
        &self,
        target: &InscriptionTarget,
        payload_len: usize,
        report: &mut InscribeReport,
    ) -> Result<usize> {
        let mut length = self.read_account(&target.account).await?.len();
        report.initial_length = length;
        let mut stalled_rounds = 0u32;

        loop {
            let grows = needed_grows(payload_len, length, self.config.grow_increment);
            if grows == 0 {
                return Ok(length);
            }
            self.check_cancelled()?;
            report.rounds += 1;

            debug!(current = length, target = payload_len, grows, "Sizing round");
            self.emit(ProgressEvent::Sizing {
                account: target.account,
                current: length,
                target: payload_len,
                grows,
            });

            let abort = CancellationToken::new();
            let mut handles: FuturesUnordered<_> = (0..grows)
                .map(|_| {
                    let ledger = self.ledger.clone();
                    let semaphore = self.semaphore.clone();
                    let target = target.clone();
                    spawn_abortable(&abort, async move {
                        let _permit = semaphore
                            .acquire_owned()
                            .await
                            .map_err(|_| InscribeError::Cancelled)?;
                        ledger.allocate(&target, payload_len).await
                    })
                })
                .collect();

            while let Some(outcome) = handles.next().await {
                match outcome {
                    Ok(None) => {}
                    Ok(Some(Ok(()))) => report.grow_calls += 1,
                    Ok(Some(Err(e))) if e.is_retryable() => {
                        report.grow_calls += 1;
                        report.grow_failures += 1;
                        warn!(error = %e, "Allocate failed, dropping for this round");
                    }
                    Ok(Some(Err(e))) => {
                        report.grow_calls += 1;
                        report.grow_failures += 1;
                        error!(
                            error = %e,
                            remaining = handles.len(),
                            "Allocate failed, aborting round"
                        );
                        abort_batch(&abort, &mut handles).await;
                        return Err(e);
                    }
                    Err(e) => {
                        report.grow_calls += 1;
                        report.grow_failures += 1;
                        error!(error = %e, "Allocate task panicked");
                    }
                }
            }

            let new_length = self.read_account(&target.account).await?.len();
            self.emit(ProgressEvent::Allocated {
                account: target.account,
                length: new_length,
                target: payload_len,
            });

            if new_length > length {
                stalled_rounds = 0;
            } else {
                stalled_rounds += 1;
                warn!(length = new_length, stalled_rounds, "Sizing round made no progress");
                if stalled_rounds >= self.config.max_grow_rounds {
                    return Err(InscribeError::GrowStalled {
                        target: payload_len,
                        length: new_length,
                        rounds: stalled_rounds,
                    });
                }
            }
            length = new_length;
        }
    }

    /// WRITING: write differing chunks until a fresh read matches
    async fn write(
        &self,
        target: &InscriptionTarget,
        desired: &ChunkSet,
        report: &mut InscribeReport,
    ) -> Result<usize> {
        let mut round = 0u32;

        loop {
            self.emit(ProgressEvent::Verifying {
                account: target.account,
                round,
            });
            let snapshot = self.read_account(&target.account).await?;
            let pending = desired.diff_against(&snapshot.data);

            if pending.is_empty() {
                self.emit(ProgressEvent::Converged {
                    account: target.account,
                    bytes: desired.total_bytes(),
                });
                return Ok(snapshot.len());
            }
            if round >= self.config.max_write_rounds {
                return Err(InscribeError::VerificationStalled {
                    rounds: round,
                    pending: pending.len(),
                });
            }
            self.check_cancelled()?;
            round += 1;
            report.rounds += 1;

            debug!(round, pending = pending.len(), "Write round");
            self.emit(ProgressEvent::Writing {
                account: target.account,
                pending: pending.len(),
                total: desired.len(),
            });

            let abort = CancellationToken::new();
            let mut handles: FuturesUnordered<_> = pending
                .into_iter()
                .map(|chunk| {
                    let writer = ChunkWriter {
                        ledger: self.ledger.clone(),
                        semaphore: self.semaphore.clone(),
                        target: target.clone(),
                        policy: self.config.write_retry.clone(),
                        progress_tx: self.progress_tx.clone(),
                    };
                    spawn_abortable(&abort, async move { writer.write(chunk).await })
                })
                .collect();

            while let Some(outcome) = handles.next().await {
                match outcome {
                    Ok(None) => {}
                    Ok(Some(Ok(retries))) => {
                        report.chunks_written += 1;
                        report.write_retries += retries as u64;
                    }
                    Ok(Some(Err(e))) => {
                        error!(
                            error = %e,
                            remaining = handles.len(),
                            "Chunk write failed, aborting round"
                        );
                        abort_batch(&abort, &mut handles).await;
                        return Err(e);
                    }
                    Err(e) => {
                        error!(error = %e, "Write task panicked");
                    }
                }
            }
        }
    }

    /// Read an account, retrying transient failures
    async fn read_account(&self, address: &Address) -> Result<AccountSnapshot> {
        let policy = &self.config.write_retry;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.ledger.get_account(address).await {
                Ok(Some(snapshot)) => return Ok(snapshot),
                Ok(None) => return Err(InscribeError::NotFound(address.to_string())),
                Err(e) if e.is_retryable() && policy.allows(attempts) => {
                    warn!(
                        account = %address,
                        attempt = attempts,
                        error = %e,
                        "Account read failed, retrying"
                    );
                    tokio::time::sleep(policy.delay_for(attempts)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            info!("Inscription cancelled at round boundary");
            return Err(InscribeError::Cancelled);
        }
        Ok(())
    }

    fn emit(&self, event: ProgressEvent) {
        emit(&self.progress_tx, event);
    }
}

fn emit(tx: &Option<mpsc::Sender<ProgressEvent>>, event: ProgressEvent) {
    if let Some(tx) = tx {
        let _ = tx.try_send(event);
    }
}

/// Spawn `task` on the runtime; it is dropped unpolled or mid-call once
/// `abort` fires.
fn spawn_abortable<T, F>(abort: &CancellationToken, task: F) -> JoinHandle<Option<Result<T>>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let abort = abort.clone();
    tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = abort.cancelled() => None,
            outcome = task => Some(outcome),
        }
    })
}

/// Abort the rest of a batch and wait for its tasks to wind down
async fn abort_batch<T>(
    abort: &CancellationToken,
    handles: &mut FuturesUnordered<JoinHandle<Option<Result<T>>>>,
) {
    abort.cancel();
    while handles.next().await.is_some() {}
}

/// Writes one chunk, retrying with backoff until it is acknowledged
struct ChunkWriter {
    ledger: Arc<dyn InscriptionLedger>,
    semaphore: Arc<Semaphore>,
    target: InscriptionTarget,
    policy: RetryPolicy,
    progress_tx: Option<mpsc::Sender<ProgressEvent>>,
}

impl ChunkWriter {
    /// Returns the number of retries it took
    async fn write(self, chunk: Chunk) -> Result<u32> {
        let mut attempts = 0u32;

        loop {
            // The permit is released before any backoff sleep
            let result = {
                let _permit = self
                    .semaphore
                    .acquire()
                    .await
                    .map_err(|_| InscribeError::Cancelled)?;
                self.ledger
                    .write_data(&self.target, chunk.offset, chunk.data.clone())
                    .await
            };
            attempts += 1;

            match result {
                Ok(()) => {
                    emit(
                        &self.progress_tx,
                        ProgressEvent::ChunkWritten {
                            account: self.target.account,
                            index: chunk.index,
                            bytes: chunk.len(),
                        },
                    );
                    return Ok(attempts - 1);
                }
                Err(e) if e.is_retryable() && self.policy.allows(attempts) => {
                    let delay = self.policy.delay_for(attempts);
                    warn!(
                        offset = chunk.offset,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Chunk write failed, retrying"
                    );
                    emit(
                        &self.progress_tx,
                        ProgressEvent::Retrying {
                            account: self.target.account,
                            offset: chunk.offset,
                            attempt: attempts,
                            error: e.to_string(),
                        },
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(InscribeError::WriteFailed {
                        offset: chunk.offset,
                        attempts,
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}
