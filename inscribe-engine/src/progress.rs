//! Progress events emitted by the inscription driver

use inscribe_core::Address;

/// Driver progress, sent over an optional channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A sizing round is starting
    Sizing {
        account: Address,
        current: usize,
        target: usize,
        grows: usize,
    },
    /// A sizing round finished and the length was re-read
    Allocated {
        account: Address,
        length: usize,
        target: usize,
    },
    /// A write round is starting
    Writing {
        account: Address,
        pending: usize,
        total: usize,
    },
    /// A chunk write was acknowledged
    ChunkWritten {
        account: Address,
        index: usize,
        bytes: usize,
    },
    /// A chunk write failed and will be retried
    Retrying {
        account: Address,
        offset: usize,
        attempt: u32,
        error: String,
    },
    /// Account content is being re-read and compared
    Verifying { account: Address, round: u32 },
    /// Account content equals the payload
    Converged { account: Address, bytes: usize },
}

impl ProgressEvent {
    /// Account the event refers to
    pub fn account(&self) -> &Address {
        match self {
            ProgressEvent::Sizing { account, .. }
            | ProgressEvent::Allocated { account, .. }
            | ProgressEvent::Writing { account, .. }
            | ProgressEvent::ChunkWritten { account, .. }
            | ProgressEvent::Retrying { account, .. }
            | ProgressEvent::Verifying { account, .. }
            | ProgressEvent::Converged { account, .. } => account,
        }
    }
}
