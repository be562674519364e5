//! Primitive types shared by the settlement engine.
//!
//! # Modules
//!
//! - [`withdrawal`]: Withdrawal obligations queued by the staking module
//! - [`head`]: Execution head and scan cursor
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Consensus ⇄ Execution                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  staking module ──▶ WithdrawalRequest ──▶ queue             │
//! │                                             │               │
//! │                          sweep (per block)  ▼               │
//! │  ExecutionHead ◀── bridge ◀── eip4895::Withdrawal[]         │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod head;
pub mod withdrawal;

pub use head::{ExecutionHead, ScanCursor};
pub use withdrawal::{WithdrawalKind, WithdrawalRequest};

pub use alloy_eips::eip4895::Withdrawal;
