//! Settlement engine.
//!
//! [`SettlementEngine`] is the host-facing entry point. It owns the store and
//! the execution bridge, runs every mutation inside one store transaction,
//! and latches the first [`FatalFault`] it sees.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                        SettlementEngine                           │
//! ├───────────────────────────────────────────────────────────────────┤
//! │                                                                   │
//! │  init_genesis ──┐                                                 │
//! │  update_params ─┤   begin()    ┌──────────────┐   commit()        │
//! │  enqueue ───────┼────────────▶ │ Transaction  │ ───────────▶ Store│
//! │  process_block ─┘              └──────┬───────┘   (on success)    │
//! │                                       │                           │
//! │                          sweep::process_block                     │
//! │                                       │                           │
//! │                                       ▼                           │
//! │                               ExecutionBridge                     │
//! │                                                                   │
//! │  head / params / query_queue / export_genesis ──▶ committed Store │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Once halted, every mutating call returns [`SettlementError::Halted`].
//! Reads keep working so operators can inspect the last committed state.

use crate::bridge::ExecutionBridge;
use crate::error::{classify_params, classify_queue, FatalFault, SettlementError};
use crate::genesis::{self, GenesisState};
use crate::params::{load_params, store_params, Params};
use crate::primitives::{ExecutionHead, WithdrawalKind, WithdrawalRequest};
use crate::queue::{self, query_withdrawal_queue, PageRequest, PageResponse, QueryConfig};
use crate::storage::{SettlementStoreReader, StoreError, TransactionalStore};
use crate::sweep::{self, BlockReport, SweepConfig};
use alloy_primitives::Address;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, error};

/// Engine configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    /// Per-block sweep behaviour.
    pub sweep: SweepConfig,
    /// Queue query limits.
    pub query: QueryConfig,
}

impl EngineConfig {
    pub fn with_sweep(mut self, sweep: SweepConfig) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn with_query(mut self, query: QueryConfig) -> Self {
        self.query = query;
        self
    }
}

/// Validator withdrawal settlement engine.
pub struct SettlementEngine<S, B> {
    /// Committed settlement state.
    store: Arc<S>,

    /// Execution layer.
    bridge: B,

    /// Configuration.
    config: EngineConfig,

    /// Held for the whole begin-to-commit span of a mutation.
    write_lock: Mutex<()>,

    /// First fatal fault observed.
    halted: RwLock<Option<FatalFault>>,
}

impl<S: TransactionalStore, B: ExecutionBridge> SettlementEngine<S, B> {
    /// Create an engine with default configuration.
    pub fn with_store(store: Arc<S>, bridge: B) -> Self {
        Self::new(store, bridge, EngineConfig::default())
    }

    /// Create a new engine.
    pub fn new(store: Arc<S>, bridge: B, config: EngineConfig) -> Self {
        Self {
            store,
            bridge,
            config,
            write_lock: Mutex::new(()),
            halted: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether a fatal fault has halted the engine.
    pub fn is_halted(&self) -> bool {
        self.halt_reason().is_some()
    }

    /// The fault that halted the engine, if any.
    pub fn halt_reason(&self) -> Option<FatalFault> {
        self.halted.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Anchor genesis. Runs at most once per store.
    pub fn init_genesis(&self, genesis: &GenesisState) -> Result<ExecutionHead, SettlementError> {
        self.ensure_running()?;
        self.transact(FatalFault::GenesisPersist, |tx| {
            genesis::init_genesis(tx, genesis).map_err(SettlementError::from)
        })
    }

    /// Export params and the execution genesis hash they were anchored to.
    pub fn export_genesis(&self) -> Result<GenesisState, SettlementError> {
        self.record(genesis::export_genesis(&*self.store).map_err(SettlementError::from))
    }

    /// Current committed execution head.
    pub fn head(&self) -> Result<ExecutionHead, SettlementError> {
        self.committed_head()?.ok_or(SettlementError::NotInitialized)
    }

    /// Current committed params.
    pub fn params(&self) -> Result<Params, SettlementError> {
        let height = self.head()?.height;
        self.record(load_params(&*self.store).map_err(|err| classify_params(err, height)))
    }

    /// Replace params. Invalid params are rejected with no state change;
    /// accepted params apply from the next processed block.
    pub fn update_params(&self, params: Params) -> Result<(), SettlementError> {
        self.ensure_running()?;
        let height = self.head()?.height;
        self.transact(storage_fault(height), |tx| {
            store_params(tx, params).map_err(|err| classify_params(err, height))
        })
    }

    /// Queue a withdrawal at the tail, returning its sequence number.
    pub fn enqueue(
        &self,
        beneficiary: Address,
        amount: u64,
        kind: WithdrawalKind,
    ) -> Result<u64, SettlementError> {
        self.ensure_running()?;
        let height = self.head()?.height;
        self.transact(storage_fault(height), |tx| {
            queue::enqueue(tx, beneficiary, amount, kind, height)
                .map_err(|err| classify_queue(err, height))
        })
    }

    /// Settle withdrawals for the block at `height`.
    ///
    /// `height` must be exactly one past the current head. On any error
    /// nothing is committed.
    pub fn process_block(&self, height: u64) -> Result<BlockReport, SettlementError> {
        self.ensure_running()?;
        self.transact(storage_fault(height), |tx| {
            sweep::process_block(tx, &self.bridge, height, &self.config.sweep)
                .map_err(SettlementError::from)
        })
    }

    /// Page through the committed queue.
    pub fn query_queue(
        &self,
        request: &PageRequest,
    ) -> Result<PageResponse<WithdrawalRequest>, SettlementError> {
        let height = self.committed_head()?.map_or(0, |head| head.height);
        self.record(
            query_withdrawal_queue(&*self.store, request, &self.config.query)
                .map_err(|err| classify_queue(err, height)),
        )
    }

    fn committed_head(&self) -> Result<Option<ExecutionHead>, SettlementError> {
        let head = self
            .store
            .execution_head()
            .map_err(|source| SettlementError::Fatal(FatalFault::Storage { height: 0, source }));
        self.record(head)
    }

    fn ensure_running(&self) -> Result<(), SettlementError> {
        match self.halt_reason() {
            Some(fault) => Err(SettlementError::Halted(fault)),
            None => Ok(()),
        }
    }

    /// Run `f` in a fresh transaction and commit only if it succeeds.
    fn transact<T, F>(
        &self,
        fault: impl Fn(StoreError) -> FatalFault,
        f: F,
    ) -> Result<T, SettlementError>
    where
        F: FnOnce(&S::Transaction) -> Result<T, SettlementError>,
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let result = self
            .store
            .begin()
            .map_err(|err| SettlementError::Fatal(fault(err)))
            .and_then(|tx| {
                let value = f(&tx)?;
                self.store.commit(tx).map_err(|err| SettlementError::Fatal(fault(err)))?;
                Ok(value)
            });
        self.record(result)
    }

    /// Latch the first fatal fault.
    fn record<T>(&self, result: Result<T, SettlementError>) -> Result<T, SettlementError> {
        if let Err(SettlementError::Fatal(fault)) = &result {
            let mut halted = self.halted.write().unwrap_or_else(PoisonError::into_inner);
            if halted.is_none() {
                error!(target: "withdrawals::engine", %fault, "fatal fault, halting settlement engine");
                *halted = Some(fault.clone());
            } else {
                debug!(target: "withdrawals::engine", %fault, "additional fatal fault while halted");
            }
        }
        result
    }
}

fn storage_fault(height: u64) -> impl Fn(StoreError) -> FatalFault {
    move |source| FatalFault::Storage { height, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{BridgeError, InMemoryExecutionLedger, NotifyingBridge, GWEI_TO_WEI};
    use crate::genesis::GenesisError;
    use crate::params::ParamsError;
    use crate::primitives::ScanCursor;
    use crate::queue::QueueError;
    use crate::storage::testing::{Fault, FaultyStore};
    use crate::storage::{InMemorySettlementStore, StoreError};
    use alloy_primitives::{B256, U256};

    type TestEngine = SettlementEngine<InMemorySettlementStore, InMemoryExecutionLedger>;

    fn genesis_hash() -> B256 {
        B256::repeat_byte(0x42)
    }

    fn engine_with(params: Params) -> (TestEngine, InMemoryExecutionLedger) {
        let ledger = InMemoryExecutionLedger::new(genesis_hash());
        let engine =
            SettlementEngine::with_store(Arc::new(InMemorySettlementStore::new()), ledger.clone());
        engine.init_genesis(&GenesisState::new(params, genesis_hash())).unwrap();
        (engine, ledger)
    }

    fn queued(engine: &TestEngine) -> Vec<u64> {
        engine.store().withdrawals().unwrap().iter().map(|w| w.sequence).collect()
    }

    #[test]
    fn test_settles_across_blocks() {
        let (engine, ledger) = engine_with(Params::new(2, 4, 600_000, 1));
        let a = engine.enqueue(Address::repeat_byte(0xA), 10, WithdrawalKind::Full).unwrap();
        let b = engine.enqueue(Address::repeat_byte(0xB), 100, WithdrawalKind::Partial).unwrap();
        let c = engine.enqueue(Address::repeat_byte(0xC), 20, WithdrawalKind::Full).unwrap();
        let d = engine.enqueue(Address::repeat_byte(0xD), 700_000, WithdrawalKind::Partial).unwrap();

        let first = engine.process_block(1).unwrap();
        assert_eq!(first.selected_sequences(), vec![a, c]);
        assert_eq!(queued(&engine), vec![b, d]);

        let second = engine.process_block(2).unwrap();
        assert_eq!(second.selected_sequences(), vec![d]);
        assert_eq!(queued(&engine), vec![b]);

        assert_eq!(engine.head().unwrap(), second.head);
        assert_eq!(
            ledger.balance_of(&Address::repeat_byte(0xD)),
            U256::from(700_000u64 * GWEI_TO_WEI)
        );
    }

    #[test]
    fn test_enqueue_records_head_height() {
        let (engine, _) = engine_with(Params::default());
        engine.process_block(1).unwrap();

        let seq = engine.enqueue(Address::repeat_byte(1), 5, WithdrawalKind::Full).unwrap();
        let stored = engine.store().withdrawal(seq).unwrap().unwrap();
        assert_eq!(stored.enqueued_at_height, 1);
    }

    #[test]
    fn test_zero_amount_is_recoverable() {
        let (engine, _) = engine_with(Params::default());

        let err = engine.enqueue(Address::repeat_byte(1), 0, WithdrawalKind::Full).unwrap_err();
        assert!(matches!(err, SettlementError::Request(QueueError::InvalidRequest(_))));
        assert!(!engine.is_halted());
        assert!(queued(&engine).is_empty());
    }

    #[test]
    fn test_out_of_order_height_is_recoverable() {
        let (engine, _) = engine_with(Params::default());

        assert_eq!(
            engine.process_block(3),
            Err(SettlementError::OutOfOrderHeight { height: 3, head_height: 0 })
        );
        assert!(!engine.is_halted());
        assert!(engine.process_block(1).is_ok());
    }

    #[test]
    fn test_uninitialized_engine() {
        let engine: TestEngine = SettlementEngine::with_store(
            Arc::new(InMemorySettlementStore::new()),
            InMemoryExecutionLedger::new(genesis_hash()),
        );

        assert_eq!(engine.process_block(1), Err(SettlementError::NotInitialized));
        assert_eq!(engine.head(), Err(SettlementError::NotInitialized));
        assert!(!engine.is_halted());
    }

    #[test]
    fn test_genesis_applied_once() {
        let (engine, _) = engine_with(Params::default());

        let err = engine.init_genesis(&GenesisState::new(Params::default(), genesis_hash()));
        assert_eq!(err, Err(SettlementError::Genesis(GenesisError::AlreadyInitialized(0))));
    }

    #[test]
    fn test_bridge_failure_halts_without_commit() {
        let (engine, ledger) = engine_with(Params::default());
        let seq = engine.enqueue(Address::repeat_byte(1), 5, WithdrawalKind::Full).unwrap();
        ledger.fail_at(1).unwrap();

        let err = engine.process_block(1).unwrap_err();
        assert!(err.is_fatal());
        assert!(matches!(
            err.fault(),
            Some(FatalFault::Bridge { height: 1, source: BridgeError::Unavailable(_) })
        ));
        assert!(engine.is_halted());

        // nothing from the failed block was committed
        assert_eq!(queued(&engine), vec![seq]);
        assert_eq!(engine.head().unwrap().height, 0);
        assert_eq!(engine.store().scan_cursor().unwrap(), ScanCursor::default());

        // mutations are refused, reads still work
        assert!(matches!(engine.process_block(1), Err(SettlementError::Halted(_))));
        assert!(matches!(
            engine.enqueue(Address::repeat_byte(2), 1, WithdrawalKind::Full),
            Err(SettlementError::Halted(_))
        ));
        assert_eq!(engine.query_queue(&PageRequest::first(10)).unwrap().items.len(), 1);
    }

    #[test]
    fn test_invalid_params_update_rejected() {
        let (engine, _) = engine_with(Params::default());

        let bad = Params::default().with_max_sweep_per_block(1);
        assert!(matches!(
            engine.update_params(bad),
            Err(SettlementError::Params(ParamsError::SweepNarrowerThanWithdrawal { .. }))
        ));
        assert_eq!(engine.params().unwrap(), Params::default());
        assert!(!engine.is_halted());
    }

    #[test]
    fn test_params_update_applies_next_block() {
        let (engine, _) = engine_with(Params::new(1, 4, 1, 1_000));
        for i in 0..3u8 {
            engine.enqueue(Address::repeat_byte(i + 1), 1, WithdrawalKind::Full).unwrap();
        }

        assert_eq!(engine.process_block(1).unwrap().selected.len(), 1);

        engine.update_params(Params::new(2, 4, 1, 1_000)).unwrap();
        assert_eq!(engine.process_block(2).unwrap().selected.len(), 2);
    }

    #[test]
    fn test_queue_fault_halts_without_commit() {
        let store = FaultyStore::new(InMemorySettlementStore::new(), Fault::LostRemovals);
        let engine = SettlementEngine::with_store(
            Arc::new(store),
            InMemoryExecutionLedger::new(genesis_hash()),
        );
        engine.init_genesis(&GenesisState::new(Params::default(), genesis_hash())).unwrap();
        let seq = engine.enqueue(Address::repeat_byte(1), 5, WithdrawalKind::Full).unwrap();

        assert_eq!(
            engine.process_block(1),
            Err(SettlementError::Fatal(FatalFault::Queue {
                height: 1,
                source: QueueError::NotFound(seq),
            }))
        );
        assert!(engine.is_halted());

        let committed = engine.store();
        assert_eq!(committed.withdrawals().unwrap().len(), 1);
        assert_eq!(committed.scan_cursor().unwrap(), ScanCursor::default());
        assert_eq!(engine.head().unwrap(), ExecutionHead::genesis(genesis_hash()));
        assert!(matches!(engine.process_block(1), Err(SettlementError::Halted(_))));
    }

    #[test]
    fn test_query_propagates_head_read_failure() {
        let inner = InMemorySettlementStore::new();
        genesis::init_genesis(&inner, &GenesisState::new(Params::default(), genesis_hash()))
            .unwrap();
        let engine = SettlementEngine::with_store(
            Arc::new(FaultyStore::new(inner, Fault::HeadReads)),
            InMemoryExecutionLedger::new(genesis_hash()),
        );

        assert_eq!(
            engine.query_queue(&PageRequest::first(10)),
            Err(SettlementError::Fatal(FatalFault::Storage {
                height: 0,
                source: StoreError::Database("read failed".to_string()),
            }))
        );
        assert!(engine.is_halted());
    }

    #[test]
    fn test_export_returns_genesis_anchor() {
        let (engine, _) = engine_with(Params::default());
        engine.process_block(1).unwrap();
        let report = engine.process_block(2).unwrap();
        assert_ne!(report.head.block_hash, genesis_hash());

        let exported = engine.export_genesis().unwrap();
        assert_eq!(exported, GenesisState::new(Params::default(), genesis_hash()));

        let restarted: TestEngine = SettlementEngine::with_store(
            Arc::new(InMemorySettlementStore::new()),
            InMemoryExecutionLedger::new(genesis_hash()),
        );
        let head = restarted.init_genesis(&exported).unwrap();
        assert_eq!(head, ExecutionHead::genesis(genesis_hash()));
        assert_eq!(restarted.params().unwrap(), Params::default());
    }

    #[test]
    fn test_query_sees_committed_queue() {
        let (engine, _) = engine_with(Params::default());
        for i in 0..5u8 {
            engine.enqueue(Address::repeat_byte(i + 1), 1, WithdrawalKind::Partial).unwrap();
        }

        let page = engine.query_queue(&PageRequest::first(2).with_count_total()).unwrap();
        assert_eq!(page.items.iter().map(|w| w.sequence).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(page.total, Some(5));
        assert!(page.next_key.is_some());
    }

    #[tokio::test]
    async fn test_applied_sets_forwarded() {
        let ledger = InMemoryExecutionLedger::new(genesis_hash());
        let (bridge, mut receiver) = NotifyingBridge::create(ledger);
        let engine =
            SettlementEngine::with_store(Arc::new(InMemorySettlementStore::new()), bridge);
        engine.init_genesis(&GenesisState::new(Params::default(), genesis_hash())).unwrap();
        let seq = engine.enqueue(Address::repeat_byte(7), 9, WithdrawalKind::Full).unwrap();

        let report = engine.process_block(1).unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.height, 1);
        assert_eq!(event.head, report.head);
        assert_eq!(event.withdrawals.iter().map(|w| w.index).collect::<Vec<_>>(), vec![seq]);
    }
}
