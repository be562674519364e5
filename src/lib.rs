//! Validator withdrawal settlement.
//!
//! Moves validator withdrawals from a consensus-side queue to the paired
//! execution layer, one bounded batch per block. Every node that processes
//! the same block from the same state selects the same withdrawals in the
//! same order.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       SettlementEngine                              │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐    │
//! │  │    genesis      │   │     params      │   │     queue       │    │
//! │  │  GenesisState   │   │  Params         │   │  enqueue        │    │
//! │  │  init / export  │   │  validate       │   │  scan_from      │    │
//! │  └────────┬────────┘   └────────┬────────┘   │  remove_set     │    │
//! │           │                     │            │  query          │    │
//! │           │                     ▼            └────────┬────────┘    │
//! │           │            ┌─────────────────┐            │             │
//! │           │            │      gate       │            │             │
//! │           │            │  CutoverPolicy  │            │             │
//! │           │            └────────┬────────┘            │             │
//! │           │                     ▼                     │             │
//! │           │            ┌─────────────────┐            │             │
//! │           │            │      sweep      │◀───────────┘             │
//! │           │            │  process_block  │                          │
//! │           │            └────────┬────────┘                          │
//! │           ▼                     ▼                                   │
//! │  ┌─────────────────┐   ┌─────────────────┐                          │
//! │  │    storage      │   │     bridge      │                          │
//! │  │ TransactionalSt │   │ ExecutionBridge │──▶ execution layer       │
//! │  └─────────────────┘   └─────────────────┘                          │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`params`]: governance-set limits and their validation
//! - [`genesis`]: one-time binding to the execution genesis block hash
//! - [`queue`]: ordered, persisted withdrawal queue
//! - [`gate`]: height-derived cutover policy
//! - [`sweep`]: per-block selection and settlement
//! - [`bridge`]: execution-layer contract and reference ledger
//! - [`storage`]: typed, transactional settlement state
//! - [`engine`]: host-facing facade with halt-on-fatal semantics

#![warn(unused_crate_dependencies)]
// Dependencies used by binaries
use eyre as _;
use tracing_subscriber as _;

pub mod arith;
pub mod bridge;
pub mod engine;
pub mod error;
pub mod gate;
pub mod genesis;
pub mod params;
pub mod primitives;
pub mod queue;
pub mod storage;
pub mod sweep;

pub use bridge::{
    AppliedWithdrawals, BridgeError, ExecutionBridge, InMemoryExecutionLedger, NotifyingBridge,
};
pub use engine::{EngineConfig, SettlementEngine};
pub use error::{FatalFault, SettlementError};
pub use gate::{policy_for, CutoverPolicy};
pub use genesis::{GenesisError, GenesisState};
pub use params::{Params, ParamsError};
pub use primitives::{ExecutionHead, ScanCursor, Withdrawal, WithdrawalKind, WithdrawalRequest};
pub use queue::{PageRequest, PageResponse, QueryConfig, QueueError};
pub use storage::{
    InMemorySettlementStore, InMemoryTransaction, SettlementStore, SettlementStoreReader,
    SettlementStoreWriter, StoreError, TransactionalStore,
};
pub use sweep::{BlockReport, SelectionRule, SweepConfig, SweepError, SELECTION_RULE};
