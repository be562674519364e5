//! Execution-layer bridge.
//!
//! The settlement engine hands each block's selected withdrawals to the
//! execution layer through [`ExecutionBridge`] and records the head it
//! reports back. The wire protocol to a real execution client is out of
//! scope; this module defines the contract and two implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ExecutionBridge                          │
//! │                                                             │
//! │  SweepScheduler ──apply(h, withdrawals)──▶ execution layer  │
//! │        ▲                                        │           │
//! │        └──────────── new ExecutionHead ◀────────┘           │
//! │                                                             │
//! │  InMemoryExecutionLedger  - reference ledger (tests, demo)  │
//! │  NotifyingBridge<B>       - forwards applied sets to a      │
//! │                             channel for observers           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `apply` is called at most once per height and is never retried with a
//! different withdrawal set.

mod ledger;
mod notify;

pub use ledger::{InMemoryExecutionLedger, GWEI_TO_WEI};
pub use notify::{AppliedWithdrawals, NotifyingBridge};

use crate::primitives::{ExecutionHead, Withdrawal};

/// Error type for execution bridge operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// The execution client could not be reached.
    #[error("execution layer unavailable: {0}")]
    Unavailable(String),

    /// The execution client refused the withdrawal set.
    #[error("execution layer rejected withdrawals: {0}")]
    Rejected(String),

    /// A withdrawal set was already applied at this height.
    #[error("withdrawals already applied at height {0}")]
    AlreadyApplied(u64),

    /// The height does not directly follow the execution head.
    #[error("height {height} does not extend execution head at height {head_height}")]
    NonSequentialHeight { height: u64, head_height: u64 },

    /// The reported head is not a valid successor of the previous one.
    #[error("invalid head reported: {0}")]
    InvalidHead(String),
}

/// Contract the settlement engine requires from the execution client.
pub trait ExecutionBridge: Send + Sync {
    /// Apply `withdrawals`, in order, to execution-layer state as part of
    /// the block at `height`, returning the resulting head.
    fn apply(&self, height: u64, withdrawals: &[Withdrawal]) -> Result<ExecutionHead, BridgeError>;

    /// Report the current execution head.
    fn head(&self) -> Result<ExecutionHead, BridgeError>;
}

impl<B: ExecutionBridge + ?Sized> ExecutionBridge for std::sync::Arc<B> {
    fn apply(&self, height: u64, withdrawals: &[Withdrawal]) -> Result<ExecutionHead, BridgeError> {
        (**self).apply(height, withdrawals)
    }

    fn head(&self) -> Result<ExecutionHead, BridgeError> {
        (**self).head()
    }
}
