//! Persistent, strictly ordered withdrawal queue.
//!
//! # Operations
//!
//! - [`enqueue`]: append at the tail with the next unused sequence
//! - [`scan_from`]: bounded forward scan from a cursor, wrapping once
//! - [`remove_set`]: selective removal preserving survivor order
//! - [`query_withdrawal_queue`]: paginated read-only inspection
//!
//! Ordering is defined by sequence number. Sequences are handed out by a
//! persisted counter and are never reused, even after removal.

mod query;

pub use query::{query_withdrawal_queue, PageRequest, PageResponse, QueryConfig};

use crate::arith::{ArithError, SafeArith};
use crate::primitives::{ScanCursor, WithdrawalKind, WithdrawalRequest};
use crate::storage::{SettlementStoreReader, SettlementStoreWriter, StoreError};
use alloy_primitives::Address;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Errors produced by queue operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The request was rejected before touching state.
    #[error("invalid withdrawal request: {0}")]
    InvalidRequest(&'static str),

    /// A sequence selected for removal is not queued.
    #[error("withdrawal sequence {0} not found")]
    NotFound(u64),

    /// The sequence counter cannot advance.
    #[error("withdrawal sequence counter exhausted at {0}")]
    SequenceExhausted(u64),

    /// The store returned fewer entries than its reported length.
    #[error("queue listing inconsistent: expected {expected} entries, got {actual}")]
    Inconsistent { expected: usize, actual: usize },

    /// Cursor or length bookkeeping left its valid range.
    #[error("queue arithmetic failed: {0}")]
    Arithmetic(#[from] ArithError),

    /// Malformed pagination request.
    #[error("invalid pagination: {0}")]
    InvalidPagination(&'static str),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl QueueError {
    /// Whether this error means queue state has diverged from its invariants.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::InvalidRequest(_) | Self::InvalidPagination(_))
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Entries visited by one [`scan_from`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Visited entries in scan order.
    pub entries: Vec<WithdrawalRequest>,
    /// Logical index the scan started at.
    pub start_index: usize,
    /// Queue length at scan time.
    pub queue_len: usize,
    /// Sequence of the entry right after the window, if the scan stopped
    /// short of a full traversal.
    pub following: Option<u64>,
}

impl ScanResult {
    /// Number of entries actually visited.
    pub fn visited(&self) -> usize {
        self.entries.len()
    }

    /// Whether the scan visited every queued entry.
    pub fn traversed_all(&self) -> bool {
        self.visited() == self.queue_len
    }
}

/// Append a withdrawal at the tail of the queue.
///
/// Returns the assigned sequence number. Fails with
/// [`QueueError::InvalidRequest`] if `amount` is zero, without touching state.
pub fn enqueue<S>(
    store: &S,
    beneficiary: Address,
    amount: u64,
    kind: WithdrawalKind,
    height: u64,
) -> QueueResult<u64>
where
    S: SettlementStoreReader + SettlementStoreWriter + ?Sized,
{
    if amount == 0 {
        return Err(QueueError::InvalidRequest("amount must be positive"));
    }

    let sequence = store.next_sequence()?;
    let next = sequence.safe_add(1).map_err(|_| QueueError::SequenceExhausted(sequence))?;

    store.insert_withdrawal(WithdrawalRequest::new(sequence, beneficiary, amount, kind, height))?;
    store.set_next_sequence(next)?;

    debug!(target: "withdrawals::queue", sequence, %beneficiary, amount, ?kind, height, "enqueued withdrawal");
    Ok(sequence)
}

/// Visit up to `limit` entries starting at `cursor`, wrapping to the front
/// once the tail is reached.
///
/// No entry is visited twice in one call: if `limit` exceeds the queue
/// length the scan stops after one full traversal. An anchored cursor
/// whose entry is still queued is resolved by sequence lookup; otherwise
/// the position is resolved against the listing.
pub fn scan_from<S>(store: &S, cursor: ScanCursor, limit: usize) -> QueueResult<ScanResult>
where
    S: SettlementStoreReader + ?Sized,
{
    let queue_len = store.queue_len()? as usize;
    let Some(start_index) = cursor.index_in(queue_len) else {
        return Ok(ScanResult::default());
    };

    let to_visit = limit.min(queue_len);
    // one extra entry marks where the next scan resumes
    let fetch = if to_visit < queue_len { to_visit.safe_add(1)? } else { to_visit };

    let mut entries = match cursor.anchor {
        Some(anchor) if store.has_withdrawal(anchor)? => {
            store.withdrawals_by_sequence(Some(anchor), fetch, false)?
        }
        _ => store.withdrawals_from_index(start_index, fetch)?,
    };
    if entries.len() < fetch {
        let wrapped = store.withdrawals_by_sequence(None, fetch.safe_sub(entries.len())?, false)?;
        entries.extend(wrapped);
    }

    if entries.len() != fetch {
        return Err(QueueError::Inconsistent { expected: fetch, actual: entries.len() });
    }
    let following = if fetch > to_visit { entries.pop().map(|w| w.sequence) } else { None };

    trace!(
        target: "withdrawals::queue",
        start_index,
        anchor = ?cursor.anchor,
        queue_len,
        visited = entries.len(),
        "scanned queue"
    );
    Ok(ScanResult { entries, start_index, queue_len, following })
}

/// Remove exactly the given sequences.
///
/// Every sequence is checked before anything is removed, so a
/// [`QueueError::NotFound`] leaves the queue untouched. A sequence listed
/// twice is reported as not found.
pub fn remove_set<S>(store: &S, sequences: &[u64]) -> QueueResult<Vec<WithdrawalRequest>>
where
    S: SettlementStoreReader + SettlementStoreWriter + ?Sized,
{
    let mut seen = HashSet::with_capacity(sequences.len());
    for &sequence in sequences {
        if !seen.insert(sequence) || !store.has_withdrawal(sequence)? {
            return Err(QueueError::NotFound(sequence));
        }
    }

    let mut removed = Vec::with_capacity(sequences.len());
    for &sequence in sequences {
        let request = store.remove_withdrawal(sequence)?.ok_or(QueueError::NotFound(sequence))?;
        removed.push(request);
    }

    debug!(target: "withdrawals::queue", count = removed.len(), "removed withdrawals");
    Ok(removed)
}
