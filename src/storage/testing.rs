//! Fault-injecting store wrapper for tests.

use super::traits::{
    SettlementStoreReader, SettlementStoreWriter, StoreError, TransactionalStore,
};
use crate::params::Params;
use crate::primitives::{ExecutionHead, ScanCursor, WithdrawalRequest};
use alloy_primitives::B256;

/// Write fault injected by [`FaultyStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fault {
    /// `execution_head` fails with a database error.
    HeadReads,
    /// `set_execution_head` fails with a database error.
    HeadWrites,
    /// `remove_withdrawal` reports the entry missing and leaves it queued.
    LostRemovals,
}

/// Delegates to `inner`, except for the injected write fault.
///
/// Transactions begun on a faulty store carry the same fault.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore<T> {
    pub(crate) inner: T,
    pub(crate) fault: Option<Fault>,
}

impl<T> FaultyStore<T> {
    pub(crate) fn new(inner: T, fault: Fault) -> Self {
        Self { inner, fault: Some(fault) }
    }

    fn injects(&self, fault: Fault) -> bool {
        self.fault == Some(fault)
    }
}

impl<T: SettlementStoreReader> SettlementStoreReader for FaultyStore<T> {
    fn params(&self) -> Result<Option<Params>, StoreError> {
        self.inner.params()
    }
    fn genesis_hash(&self) -> Result<Option<B256>, StoreError> {
        self.inner.genesis_hash()
    }
    fn execution_head(&self) -> Result<Option<ExecutionHead>, StoreError> {
        if self.injects(Fault::HeadReads) {
            return Err(StoreError::Database("read failed".to_string()));
        }
        self.inner.execution_head()
    }
    fn withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError> {
        self.inner.withdrawal(sequence)
    }
    fn queue_len(&self) -> Result<u64, StoreError> {
        self.inner.queue_len()
    }
    fn withdrawals_from_index(
        &self,
        index: usize,
        limit: usize,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        self.inner.withdrawals_from_index(index, limit)
    }
    fn withdrawals_by_sequence(
        &self,
        start: Option<u64>,
        limit: usize,
        reverse: bool,
    ) -> Result<Vec<WithdrawalRequest>, StoreError> {
        self.inner.withdrawals_by_sequence(start, limit, reverse)
    }
    fn scan_cursor(&self) -> Result<ScanCursor, StoreError> {
        self.inner.scan_cursor()
    }
    fn next_sequence(&self) -> Result<u64, StoreError> {
        self.inner.next_sequence()
    }
}

impl<T: SettlementStoreWriter> SettlementStoreWriter for FaultyStore<T> {
    fn set_params(&self, params: Params) -> Result<(), StoreError> {
        self.inner.set_params(params)
    }
    fn set_genesis_hash(&self, hash: B256) -> Result<(), StoreError> {
        self.inner.set_genesis_hash(hash)
    }
    fn set_execution_head(&self, head: ExecutionHead) -> Result<(), StoreError> {
        if self.injects(Fault::HeadWrites) {
            return Err(StoreError::Database("disk full".to_string()));
        }
        self.inner.set_execution_head(head)
    }
    fn insert_withdrawal(&self, request: WithdrawalRequest) -> Result<(), StoreError> {
        self.inner.insert_withdrawal(request)
    }
    fn remove_withdrawal(&self, sequence: u64) -> Result<Option<WithdrawalRequest>, StoreError> {
        if self.injects(Fault::LostRemovals) {
            return Ok(None);
        }
        self.inner.remove_withdrawal(sequence)
    }
    fn set_scan_cursor(&self, cursor: ScanCursor) -> Result<(), StoreError> {
        self.inner.set_scan_cursor(cursor)
    }
    fn set_next_sequence(&self, next: u64) -> Result<(), StoreError> {
        self.inner.set_next_sequence(next)
    }
}

impl<T: TransactionalStore> TransactionalStore for FaultyStore<T> {
    type Transaction = FaultyStore<T::Transaction>;

    fn begin(&self) -> Result<Self::Transaction, StoreError> {
        Ok(FaultyStore { inner: self.inner.begin()?, fault: self.fault })
    }

    fn commit(&self, tx: Self::Transaction) -> Result<(), StoreError> {
        self.inner.commit(tx.inner)
    }
}
