//! Inscribe Core Library
//!
//! Core abstractions for writing arbitrary payloads into remote accounts.
//! This crate provides:
//! - Offset-indexed chunking and chunk diffing (`ChunkSet`)
//! - Account addresses and inscription targets
//! - Retry policy with exponential backoff
//! - Common error type and its transient/fatal classification

pub mod address;
pub mod chunk;
pub mod error;
pub mod retry;

pub use address::{Address, InscriptionTarget};
pub use chunk::{Chunk, ChunkSet};
pub use error::{InscribeError, Result};
pub use retry::RetryPolicy;

/// Maximum number of payload bytes carried by a single write call.
pub const CHUNK_SIZE: usize = 500;

/// Maximum number of bytes a single allocate call can add to an account.
///
/// Matches the runtime's per-instruction realloc ceiling.
pub const MAX_GROW_INCREMENT: usize = 10_240;

/// Number of shard counters used to rank new inscriptions.
pub const SHARD_COUNT: u8 = 32;

/// Longest associated tag accepted (it doubles as a PDA seed).
pub const MAX_TAG_LEN: usize = 32;

/// Number of allocate calls needed to grow `current` bytes to `target` bytes.
///
/// Returns 0 when the account is already large enough.
pub fn needed_grows(target: usize, current: usize, increment: usize) -> usize {
    if increment == 0 {
        return 0;
    }
    target.saturating_sub(current).div_ceil(increment)
}
