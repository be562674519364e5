//! Execution head and scan cursor primitives.

use crate::arith::SafeArith;
use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

/// The latest execution-layer block anchored by the consensus layer.
///
/// Written once at genesis and then once per block by the sweep driver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHead {
    /// Execution block hash.
    pub block_hash: B256,
    /// Consensus height this head was produced at.
    pub height: u64,
}

impl ExecutionHead {
    /// Create a new execution head.
    pub const fn new(block_hash: B256, height: u64) -> Self {
        Self { block_hash, height }
    }

    /// The head inserted by the genesis anchor.
    pub const fn genesis(block_hash: B256) -> Self {
        Self::new(block_hash, 0)
    }
}

/// Persisted pointer into the queue's logical ordering.
///
/// The position is an index into the current queue listing and wraps
/// modulo the queue length when used. The anchor is the sequence of the
/// entry at that position when the cursor was written, so a scan can seek
/// straight to it instead of walking the listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanCursor {
    /// Index of the next entry to scan.
    pub position: u64,
    /// Sequence of the entry at `position`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<u64>,
}

impl ScanCursor {
    /// Create an unanchored cursor at the given position.
    pub const fn new(position: u64) -> Self {
        Self { position, anchor: None }
    }

    /// Create a cursor at `position` whose entry has sequence `anchor`.
    pub const fn anchored(position: u64, anchor: u64) -> Self {
        Self { position, anchor: Some(anchor) }
    }

    /// Resolve the position against a queue of `len` entries.
    ///
    /// Returns `None` for an empty queue.
    pub fn index_in(&self, len: usize) -> Option<usize> {
        let index = self.position.safe_rem(len as u64).ok()?;
        usize::try_from(index).ok()
    }
}
