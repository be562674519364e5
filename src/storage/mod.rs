//! Settlement storage layer.
//!
//! This module provides typed storage for everything the withdrawal engine
//! persists, separate from execution-layer state owned by the bridge.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                  Settlement Storage                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                                                         │
//! │  committed state ──begin()──▶ block transaction         │
//! │   - Params                      (staged overlay)        │
//! │   - GenesisHash                      │                  │
//! │   - ExecutionHead                    │ sweep mutates    │
//! │   - Queue (by sequence)              ▼                  │
//! │   - ScanCursor     ◀──commit()── staged writes          │
//! │   - NextSequence                                        │
//! │                                                         │
//! │  Queries read committed state only.                     │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Implementations
//!
//! - [`InMemorySettlementStore`]: in-memory storage with versioned commits
//! - [`InMemoryTransaction`]: write set over committed state, merged on commit

mod memory;
#[cfg(test)]
pub(crate) mod testing;
mod traits;

pub use memory::{InMemorySettlementStore, InMemoryTransaction};
pub use traits::{
    SettlementStore, SettlementStoreReader, SettlementStoreWriter, StoreError,
    TransactionalStore,
};
