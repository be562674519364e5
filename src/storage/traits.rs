//! Storage traits for settlement state.
//!
//! Every piece of state the engine persists has a fixed, typed accessor.
//! There are no string-keyed lookups: params, genesis hash, execution head,
//! queue entries, scan cursor and the sequence counter each get their own
//! methods.

use crate::params::Params;
use crate::primitives::{ExecutionHead, ScanCursor, WithdrawalRequest};
use alloy_primitives::B256;

/// Error type for settlement storage operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// A queue entry with this sequence already exists.
    #[error("withdrawal with sequence {0} already stored")]
    DuplicateSequence(u64),

    /// A transaction was committed on top of a state it was not begun from.
    #[error("transaction conflict: begun at version {base}, store at version {current}")]
    Conflict { base: u64, current: u64 },

    /// Database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Read-only access to settlement state.
pub trait SettlementStoreReader {
    /// Get the stored params, if genesis has run.
    fn params(&self) -> Result<Option<Params>, StoreError>;

    /// Get the execution genesis block hash anchored at genesis.
    fn genesis_hash(&self) -> Result<Option<B256>, StoreError>;

    /// Get the latest execution head, if genesis has run.
    fn execution_head(&self) -> Result<Option<ExecutionHead>, StoreError>;

    /// Get a queued withdrawal by sequence.
    fn withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError>;

    /// Number of queued withdrawals.
    fn queue_len(&self) -> Result<u64, StoreError>;

    /// Up to `limit` queued withdrawals in sequence order, starting at the
    /// logical `index` (0 is the oldest entry).
    fn withdrawals_from_index(
        &self,
        index: usize,
        limit: usize,
    ) -> Result<Vec<WithdrawalRequest>, StoreError>;

    /// Up to `limit` queued withdrawals starting at sequence `start`
    /// (inclusive), or at the oldest/newest entry when `start` is `None`.
    /// `reverse` walks from newest to oldest.
    fn withdrawals_by_sequence(
        &self,
        start: Option<u64>,
        limit: usize,
        reverse: bool,
    ) -> Result<Vec<WithdrawalRequest>, StoreError>;

    /// Persisted scan cursor. Defaults to position 0.
    fn scan_cursor(&self) -> Result<ScanCursor, StoreError>;

    /// Sequence number the next enqueue will receive.
    fn next_sequence(&self) -> Result<u64, StoreError>;

    /// Check if a withdrawal with this sequence is queued.
    fn has_withdrawal(&self, sequence: u64) -> Result<bool, StoreError> {
        Ok(self.withdrawal(sequence)?.is_some())
    }

    /// All queued withdrawals in sequence order.
    fn withdrawals(&self) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let len = self.queue_len()? as usize;
        self.withdrawals_from_index(0, len)
    }
}

/// Write access to settlement state.
pub trait SettlementStoreWriter {
    /// Store params. Callers validate first.
    fn set_params(&self, params: Params) -> Result<(), StoreError>;

    /// Record the execution genesis block hash.
    fn set_genesis_hash(&self, hash: B256) -> Result<(), StoreError>;

    /// Replace the execution head.
    fn set_execution_head(&self, head: ExecutionHead) -> Result<(), StoreError>;

    /// Insert a withdrawal. Fails if its sequence is already stored.
    fn insert_withdrawal(&self, request: WithdrawalRequest) -> Result<(), StoreError>;

    /// Remove a withdrawal by sequence, returning it if it was queued.
    fn remove_withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError>;

    /// Replace the scan cursor.
    fn set_scan_cursor(&self, cursor: ScanCursor) -> Result<(), StoreError>;

    /// Replace the next sequence counter.
    fn set_next_sequence(&self, next: u64) -> Result<(), StoreError>;
}

/// Combined read-write access to settlement storage.
pub trait SettlementStore: SettlementStoreReader + SettlementStoreWriter {}

impl<T> SettlementStore for T where T: SettlementStoreReader + SettlementStoreWriter {}

/// A store whose writes can be grouped into one atomically committed unit.
///
/// The block driver begins one transaction per block, mutates it, and
/// commits only if the whole block succeeded. Readers of the store never
/// observe an uncommitted transaction. Beginning a transaction must not copy
/// the queue: writes are staged and merged on commit.
pub trait TransactionalStore: SettlementStore {
    /// Staged view over the committed state.
    type Transaction: SettlementStore;

    /// Begin a transaction from the current committed state.
    fn begin(&self) -> Result<Self::Transaction, StoreError>;

    /// Atomically publish a transaction.
    fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError>;
}
