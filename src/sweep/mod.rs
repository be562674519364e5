//! Per-block withdrawal sweep.
//!
//! Each block runs one sweep against a store transaction:
//!
//! ```text
//! params ──▶ policy_for(h) ──▶ scan_from(cursor, max_sweep)
//!                                      │
//!                                      ▼
//!                         classify + select (SELECTION_RULE)
//!                                      │
//!              ┌───────────────────────┼──────────────────────┐
//!              ▼                       ▼                      ▼
//!        remove_set(selected)   advance cursor      bridge.apply(h, selected)
//!                                                             │
//!                                                             ▼
//!                                                   store new execution head
//! ```
//!
//! Every failure after the height check is a [`FatalFault`]: the caller must
//! discard the transaction and halt.

mod selection;

pub use selection::{
    advance_cursor, classify, select, Eligibility, SelectionRule, SELECTION_RULE,
};

use crate::arith::SafeArith;
use crate::bridge::{BridgeError, ExecutionBridge};
use crate::error::FatalFault;
use crate::gate::{policy_for, CutoverPolicy};
use crate::params::{load_params, ParamsError};
use crate::primitives::{ExecutionHead, ScanCursor, Withdrawal, WithdrawalRequest};
use crate::queue::{remove_set, scan_from, QueueError};
use crate::storage::{SettlementStoreReader, SettlementStoreWriter};
use tracing::{debug, error, info};

/// Errors returned by [`process_block`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SweepError {
    /// Genesis has not run on this store.
    #[error("settlement state not initialized")]
    NotInitialized,

    /// The height does not directly follow the stored head.
    #[error("block height {height} does not follow head height {head_height}")]
    OutOfOrderHeight { height: u64, head_height: u64 },

    /// Block processing failed and the node must halt.
    #[error(transparent)]
    Fatal(#[from] FatalFault),
}

/// Sweep behaviour knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    /// Require the bridge to report a head at exactly the processed height
    /// with a hash different from its parent.
    pub verify_head_progression: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { verify_head_progression: true }
    }
}

impl SweepConfig {
    pub fn with_verify_head_progression(mut self, verify: bool) -> Self {
        self.verify_head_progression = verify;
        self
    }
}

/// What one block's sweep did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockReport {
    /// Processed height.
    pub height: u64,
    /// Policy in effect at `height`.
    pub policy: CutoverPolicy,
    /// Rule used to pick among eligible candidates.
    pub rule: SelectionRule,
    /// Number of queue entries scanned.
    pub scanned: usize,
    /// Withdrawals settled, in the order handed to the execution layer.
    pub selected: Vec<WithdrawalRequest>,
    /// Cursor before the sweep.
    pub cursor_before: ScanCursor,
    /// Cursor after the sweep.
    pub cursor_after: ScanCursor,
    /// Queue length after removal.
    pub queue_len: usize,
    /// Execution head recorded for `height`.
    pub head: ExecutionHead,
}

impl BlockReport {
    /// Sequences of the settled withdrawals.
    pub fn selected_sequences(&self) -> Vec<u64> {
        self.selected.iter().map(|w| w.sequence).collect()
    }
}

/// Run the withdrawal sweep for the block at `height`.
///
/// `store` should be a transaction; on error the caller discards it, so
/// partial writes made before the failure never become visible.
pub fn process_block<S, B>(
    store: &S,
    bridge: &B,
    height: u64,
    config: &SweepConfig,
) -> Result<BlockReport, SweepError>
where
    S: SettlementStoreReader + SettlementStoreWriter + ?Sized,
    B: ExecutionBridge + ?Sized,
{
    let storage = |source| FatalFault::Storage { height, source };

    let previous = store.execution_head().map_err(storage)?.ok_or(SweepError::NotInitialized)?;
    let expected = previous.height.safe_add(1).ok();
    if expected != Some(height) {
        return Err(SweepError::OutOfOrderHeight { height, head_height: previous.height });
    }

    let params = load_params(store).map_err(|source| match source {
        ParamsError::NotInitialized => SweepError::NotInitialized,
        source => FatalFault::Params { height, source }.into(),
    })?;
    let policy = policy_for(height, &params);

    let queue_fault = |source| FatalFault::Queue { height, source };

    let cursor_before = store.scan_cursor().map_err(storage)?;
    let scan = scan_from(store, cursor_before, params.max_sweep_per_block as usize)
        .map_err(queue_fault)?;

    let selected = select(&scan.entries, &params, policy, SELECTION_RULE);
    let sequences: Vec<u64> = selected.iter().map(|w| w.sequence).collect();
    debug!(
        target: "withdrawals::sweep",
        height,
        ?policy,
        scanned = scan.visited(),
        selected = ?sequences,
        "selected withdrawals"
    );

    remove_set(store, &sequences).map_err(queue_fault)?;
    let cursor_after = advance_cursor(&scan, &sequences).map_err(queue_fault)?;
    store.set_scan_cursor(cursor_after).map_err(storage)?;

    let withdrawals: Vec<Withdrawal> = selected.iter().map(|w| w.to_engine_withdrawal()).collect();
    let head = bridge.apply(height, &withdrawals).map_err(|source| {
        error!(target: "withdrawals::sweep", height, %source, "execution bridge failed");
        FatalFault::Bridge { height, source }
    })?;

    if config.verify_head_progression {
        verify_head(&previous, &head, height)?;
    }
    store.set_execution_head(head).map_err(storage)?;

    let queue_len = scan
        .queue_len
        .safe_sub(sequences.len())
        .map_err(|source| queue_fault(QueueError::Arithmetic(source)))?;
    info!(
        target: "withdrawals::sweep",
        height,
        settled = selected.len(),
        scanned = scan.visited(),
        queue_len,
        block_hash = %head.block_hash,
        "processed block withdrawals"
    );

    Ok(BlockReport {
        height,
        policy,
        rule: SELECTION_RULE,
        scanned: scan.visited(),
        selected,
        cursor_before,
        cursor_after,
        queue_len,
        head,
    })
}

fn verify_head(previous: &ExecutionHead, head: &ExecutionHead, height: u64) -> Result<(), FatalFault> {
    let reason = if head.height != height {
        format!("expected head at height {height}, got {}", head.height)
    } else if head.block_hash == previous.block_hash {
        format!("head hash {} unchanged from parent", head.block_hash)
    } else {
        return Ok(());
    };
    error!(target: "withdrawals::sweep", height, %reason, "execution head did not progress");
    Err(FatalFault::Bridge { height, source: BridgeError::InvalidHead(reason) })
}
