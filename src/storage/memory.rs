//! In-memory settlement storage.
//!
//! This provides a simple in-memory implementation of [`SettlementStore`]
//! and [`TransactionalStore`] for tests, the demo binary, and embedding in
//! hosts that persist state elsewhere.
//!
//! [`SettlementStore`]: super::SettlementStore

use super::traits::{
    SettlementStoreReader, SettlementStoreWriter, StoreError, TransactionalStore,
};
use crate::params::Params;
use crate::primitives::{ExecutionHead, ScanCursor, WithdrawalRequest};
use alloy_primitives::B256;
use std::{
    collections::{BTreeMap, BTreeSet},
    iter::Peekable,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

#[derive(Debug, Default)]
struct SettlementState {
    params: Option<Params>,
    genesis_hash: Option<B256>,
    head: Option<ExecutionHead>,
    /// Queue indexed by sequence; iteration order is arrival order.
    queue: BTreeMap<u64, WithdrawalRequest>,
    cursor: ScanCursor,
    next_sequence: u64,
    /// Bumped on every commit.
    version: u64,
}

/// In-memory settlement storage.
///
/// Uses a `BTreeMap` keyed by sequence for ordered access.
/// Thread-safe via `RwLock`; clones share the same state.
///
/// # Example
///
/// ```ignore
/// use withdrawal_engine::storage::{InMemorySettlementStore, TransactionalStore};
///
/// let store = InMemorySettlementStore::new();
/// let tx = store.begin()?;
/// tx.set_scan_cursor(ScanCursor::new(3))?;
/// store.commit(tx)?;
/// ```
#[derive(Debug, Default)]
pub struct InMemorySettlementStore {
    state: Arc<RwLock<SettlementState>>,
}

impl InMemorySettlementStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of commits applied to this store.
    pub fn version(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.version)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SettlementState>, StoreError> {
        self.state.read().map_err(poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SettlementState>, StoreError> {
        self.state.write().map_err(poisoned)
    }
}

fn poisoned<E: std::fmt::Display>(err: E) -> StoreError {
    StoreError::Database(format!("lock poisoned: {}", err))
}

type Entries<'a> = Box<dyn Iterator<Item = &'a WithdrawalRequest> + 'a>;

/// Walk `queue` from `start` (inclusive) in either direction.
fn walk(queue: &BTreeMap<u64, WithdrawalRequest>, start: Option<u64>, reverse: bool) -> Entries<'_> {
    match (start, reverse) {
        (Some(start), false) => Box::new(queue.range(start..).map(|(_, w)| w)),
        (Some(start), true) => Box::new(queue.range(..=start).rev().map(|(_, w)| w)),
        (None, false) => Box::new(queue.values()),
        (None, true) => Box::new(queue.values().rev()),
    }
}

impl SettlementStoreReader for InMemorySettlementStore {
    fn params(&self) -> Result<Option<Params>, StoreError> {
        Ok(self.read()?.params)
    }

    fn genesis_hash(&self) -> Result<Option<B256>, StoreError> {
        Ok(self.read()?.genesis_hash)
    }

    fn execution_head(&self) -> Result<Option<ExecutionHead>, StoreError> {
        Ok(self.read()?.head)
    }

    fn withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError> {
        Ok(self.read()?.queue.get(&sequence).cloned())
    }

    fn queue_len(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.queue.len() as u64)
    }

    fn withdrawals_from_index(
        &self,
        index: usize,
        limit: usize,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let state = self.read()?;
        Ok(state.queue.values().skip(index).take(limit).cloned().collect())
    }

    fn withdrawals_by_sequence(
        &self,
        start: Option<u64>,
        limit: usize,
        reverse: bool,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let state = self.read()?;
        Ok(walk(&state.queue, start, reverse).take(limit).cloned().collect())
    }

    fn scan_cursor(&self) -> Result<ScanCursor, StoreError> {
        Ok(self.read()?.cursor)
    }

    fn next_sequence(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.next_sequence)
    }
}

impl SettlementStoreWriter for InMemorySettlementStore {
    fn set_params(&self, params: Params) -> Result<(), StoreError> {
        self.write()?.params = Some(params);
        Ok(())
    }

    fn set_genesis_hash(&self, hash: B256) -> Result<(), StoreError> {
        self.write()?.genesis_hash = Some(hash);
        Ok(())
    }

    fn set_execution_head(&self, head: ExecutionHead) -> Result<(), StoreError> {
        self.write()?.head = Some(head);
        Ok(())
    }

    fn insert_withdrawal(&self, request: WithdrawalRequest) -> Result<(), StoreError> {
        let mut state = self.write()?;
        if state.queue.contains_key(&request.sequence) {
            return Err(StoreError::DuplicateSequence(request.sequence));
        }
        state.queue.insert(request.sequence, request);
        Ok(())
    }

    fn remove_withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError> {
        Ok(self.write()?.queue.remove(&sequence))
    }

    fn set_scan_cursor(&self, cursor: ScanCursor) -> Result<(), StoreError> {
        self.write()?.cursor = cursor;
        Ok(())
    }

    fn set_next_sequence(&self, next: u64) -> Result<(), StoreError> {
        self.write()?.next_sequence = next;
        Ok(())
    }
}

impl TransactionalStore for InMemorySettlementStore {
    type Transaction = InMemoryTransaction;

    fn begin(&self) -> Result<Self::Transaction, StoreError> {
        let base_version = self.read()?.version;
        Ok(InMemoryTransaction {
            committed: Arc::clone(&self.state),
            base_version,
            staged: RwLock::new(StagedWrites::default()),
        })
    }

    fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError> {
        if !Arc::ptr_eq(&self.state, &tx.committed) {
            return Err(StoreError::Database("transaction begun on another store".to_string()));
        }
        let base = tx.base_version;
        let staged = tx.staged.into_inner().map_err(poisoned)?;

        let mut state = self.write()?;
        if state.version != base {
            return Err(StoreError::Conflict { base, current: state.version });
        }
        staged.apply(&mut state);
        state.version = base + 1;
        Ok(())
    }
}

impl Clone for InMemorySettlementStore {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}

/// Writes made inside a transaction, not yet visible to the store.
#[derive(Debug, Default)]
struct StagedWrites {
    params: Option<Params>,
    genesis_hash: Option<B256>,
    head: Option<ExecutionHead>,
    cursor: Option<ScanCursor>,
    next_sequence: Option<u64>,
    /// Entries added in this transaction.
    inserted: BTreeMap<u64, WithdrawalRequest>,
    /// Committed entries removed in this transaction.
    removed: BTreeSet<u64>,
}

impl StagedWrites {
    fn apply(self, state: &mut SettlementState) {
        if let Some(params) = self.params {
            state.params = Some(params);
        }
        if let Some(hash) = self.genesis_hash {
            state.genesis_hash = Some(hash);
        }
        if let Some(head) = self.head {
            state.head = Some(head);
        }
        if let Some(cursor) = self.cursor {
            state.cursor = cursor;
        }
        if let Some(next) = self.next_sequence {
            state.next_sequence = next;
        }
        for sequence in &self.removed {
            state.queue.remove(sequence);
        }
        state.queue.extend(self.inserted);
    }
}

/// Two sequence-ordered walks merged into one.
struct Merged<'a> {
    committed: Peekable<Entries<'a>>,
    inserted: Peekable<Entries<'a>>,
    reverse: bool,
}

impl<'a> Iterator for Merged<'a> {
    type Item = &'a WithdrawalRequest;

    fn next(&mut self) -> Option<Self::Item> {
        let take_committed = match (self.committed.peek(), self.inserted.peek()) {
            (Some(c), Some(i)) => (c.sequence < i.sequence) != self.reverse,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if take_committed {
            self.committed.next()
        } else {
            self.inserted.next()
        }
    }
}

/// Transaction over an [`InMemorySettlementStore`].
///
/// Reads see committed state overlaid with this transaction's staged
/// writes. Nothing is copied on `begin`; dropping the transaction discards
/// its writes, and committing after another commit landed fails with
/// [`StoreError::Conflict`].
#[derive(Debug)]
pub struct InMemoryTransaction {
    committed: Arc<RwLock<SettlementState>>,
    /// Store version this transaction was begun from.
    base_version: u64,
    staged: RwLock<StagedWrites>,
}

impl InMemoryTransaction {
    /// Store version this transaction was begun from.
    pub fn base_version(&self) -> u64 {
        self.base_version
    }

    fn committed(&self) -> Result<RwLockReadGuard<'_, SettlementState>, StoreError> {
        self.committed.read().map_err(poisoned)
    }

    fn staged(&self) -> Result<RwLockReadGuard<'_, StagedWrites>, StoreError> {
        self.staged.read().map_err(poisoned)
    }

    fn staged_mut(&self) -> Result<RwLockWriteGuard<'_, StagedWrites>, StoreError> {
        self.staged.write().map_err(poisoned)
    }
}

fn merged<'a>(
    state: &'a SettlementState,
    staged: &'a StagedWrites,
    start: Option<u64>,
    reverse: bool,
) -> Merged<'a> {
    let committed: Entries<'a> = Box::new(
        walk(&state.queue, start, reverse).filter(move |w| !staged.removed.contains(&w.sequence)),
    );
    Merged {
        committed: committed.peekable(),
        inserted: walk(&staged.inserted, start, reverse).peekable(),
        reverse,
    }
}

impl SettlementStoreReader for InMemoryTransaction {
    fn params(&self) -> Result<Option<Params>, StoreError> {
        let staged = self.staged()?.params;
        Ok(staged.or(self.committed()?.params))
    }

    fn genesis_hash(&self) -> Result<Option<B256>, StoreError> {
        let staged = self.staged()?.genesis_hash;
        Ok(staged.or(self.committed()?.genesis_hash))
    }

    fn execution_head(&self) -> Result<Option<ExecutionHead>, StoreError> {
        let staged = self.staged()?.head;
        Ok(staged.or(self.committed()?.head))
    }

    fn withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError> {
        let state = self.committed()?;
        let staged = self.staged()?;
        if let Some(request) = staged.inserted.get(&sequence) {
            return Ok(Some(request.clone()));
        }
        if staged.removed.contains(&sequence) {
            return Ok(None);
        }
        Ok(state.queue.get(&sequence).cloned())
    }

    fn queue_len(&self) -> Result<u64, StoreError> {
        let state = self.committed()?;
        let staged = self.staged()?;
        let len = (state.queue.len() + staged.inserted.len()).saturating_sub(staged.removed.len());
        Ok(len as u64)
    }

    fn withdrawals_from_index(
        &self,
        index: usize,
        limit: usize,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let state = self.committed()?;
        let staged = self.staged()?;
        Ok(merged(&state, &staged, None, false).skip(index).take(limit).cloned().collect())
    }

    fn withdrawals_by_sequence(
        &self,
        start: Option<u64>,
        limit: usize,
        reverse: bool,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        let state = self.committed()?;
        let staged = self.staged()?;
        Ok(merged(&state, &staged, start, reverse).take(limit).cloned().collect())
    }

    fn scan_cursor(&self) -> Result<ScanCursor, StoreError> {
        let staged = self.staged()?.cursor;
        Ok(staged.unwrap_or(self.committed()?.cursor))
    }

    fn next_sequence(&self) -> Result<u64, StoreError> {
        let staged = self.staged()?.next_sequence;
        Ok(staged.unwrap_or(self.committed()?.next_sequence))
    }
}

impl SettlementStoreWriter for InMemoryTransaction {
    fn set_params(&self, params: Params) -> Result<(), StoreError> {
        self.staged_mut()?.params = Some(params);
        Ok(())
    }

    fn set_genesis_hash(&self, hash: B256) -> Result<(), StoreError> {
        self.staged_mut()?.genesis_hash = Some(hash);
        Ok(())
    }

    fn set_execution_head(&self, head: ExecutionHead) -> Result<(), StoreError> {
        self.staged_mut()?.head = Some(head);
        Ok(())
    }

    fn insert_withdrawal(&self, request: WithdrawalRequest) -> Result<(), StoreError> {
        let state = self.committed()?;
        let mut staged = self.staged_mut()?;
        let sequence = request.sequence;
        let committed = state.queue.contains_key(&sequence) && !staged.removed.contains(&sequence);
        if committed || staged.inserted.contains_key(&sequence) {
            return Err(StoreError::DuplicateSequence(sequence));
        }
        staged.inserted.insert(sequence, request);
        Ok(())
    }

    fn remove_withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError> {
        let state = self.committed()?;
        let mut staged = self.staged_mut()?;
        if let Some(request) = staged.inserted.remove(&sequence) {
            return Ok(Some(request));
        }
        if staged.removed.contains(&sequence) {
            return Ok(None);
        }
        let request = state.queue.get(&sequence).cloned();
        if request.is_some() {
            staged.removed.insert(sequence);
        }
        Ok(request)
    }

    fn set_scan_cursor(&self, cursor: ScanCursor) -> Result<(), StoreError> {
        self.staged_mut()?.cursor = Some(cursor);
        Ok(())
    }

    fn set_next_sequence(&self, next: u64) -> Result<(), StoreError> {
        self.staged_mut()?.next_sequence = Some(next);
        Ok(())
    }
}
