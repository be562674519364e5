//! Reference in-memory execution ledger.
//!
//! Credits each withdrawal to its beneficiary and chains block hashes as
//! `keccak256(rlp(parent_hash, height, withdrawals))`. Good enough to stand
//! in for an execution client in tests and the demo binary.

use super::{BridgeError, ExecutionBridge};
use crate::primitives::{ExecutionHead, Withdrawal};
use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, RwLock},
};
use tracing::{debug, warn};

/// Wei per gwei; withdrawal amounts are denominated in gwei.
pub const GWEI_TO_WEI: u64 = 1_000_000_000;

#[derive(RlpEncodable)]
struct HeadPreimage {
    parent_hash: B256,
    height: u64,
    withdrawals: Vec<Withdrawal>,
}

#[derive(Debug, Default)]
struct LedgerState {
    head: ExecutionHead,
    balances: HashMap<Address, U256>,
    /// Withdrawal sets applied per height.
    applied: BTreeMap<u64, Vec<Withdrawal>>,
    /// Height at which the next `apply` fails, for fault injection.
    fail_at: Option<u64>,
}

/// In-memory execution ledger.
///
/// Thread-safe via `RwLock`; clones share the same ledger.
#[derive(Debug, Default)]
pub struct InMemoryExecutionLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryExecutionLedger {
    /// Create a ledger anchored at the given execution genesis hash.
    pub fn new(genesis_hash: B256) -> Self {
        let state = LedgerState { head: ExecutionHead::genesis(genesis_hash), ..Default::default() };
        Self { state: Arc::new(RwLock::new(state)) }
    }

    /// Make `apply` fail with [`BridgeError::Unavailable`] at `height`.
    pub fn fail_at(&self, height: u64) -> Result<(), BridgeError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| BridgeError::Unavailable(format!("lock poisoned: {}", e)))?;
        state.fail_at = Some(height);
        Ok(())
    }

    /// Balance credited to `address`, in wei.
    pub fn balance_of(&self, address: &Address) -> U256 {
        self.state
            .read()
            .map(|state| state.balances.get(address).copied().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Withdrawals applied at `height`, if any block was applied there.
    pub fn applied_at(&self, height: u64) -> Option<Vec<Withdrawal>> {
        self.state.read().ok().and_then(|state| state.applied.get(&height).cloned())
    }

    /// Number of heights applied so far.
    pub fn applied_count(&self) -> usize {
        self.state.read().map(|state| state.applied.len()).unwrap_or_default()
    }

    fn next_hash(preimage: &HeadPreimage) -> B256 {
        let mut buf = Vec::new();
        preimage.encode(&mut buf);
        keccak256(&buf)
    }
}

impl ExecutionBridge for InMemoryExecutionLedger {
    fn apply(&self, height: u64, withdrawals: &[Withdrawal]) -> Result<ExecutionHead, BridgeError> {
        let mut state = self
            .state
            .write()
            .map_err(|e| BridgeError::Unavailable(format!("lock poisoned: {}", e)))?;

        if state.applied.contains_key(&height) || height <= state.head.height {
            return Err(BridgeError::AlreadyApplied(height));
        }
        if height != state.head.height + 1 {
            return Err(BridgeError::NonSequentialHeight {
                height,
                head_height: state.head.height,
            });
        }
        if state.fail_at == Some(height) {
            warn!(target: "withdrawals::bridge", height, "injected execution failure");
            return Err(BridgeError::Unavailable(format!("injected failure at height {height}")));
        }

        let mut credits: Vec<(Address, U256)> = Vec::with_capacity(withdrawals.len());
        for withdrawal in withdrawals {
            let wei = U256::from(withdrawal.amount)
                .checked_mul(U256::from(GWEI_TO_WEI))
                .ok_or_else(|| {
                    BridgeError::Rejected(format!("amount overflow at index {}", withdrawal.index))
                })?;
            credits.push((withdrawal.address, wei));
        }
        for (address, wei) in credits {
            let balance = state.balances.entry(address).or_default();
            *balance = balance.saturating_add(wei);
        }

        let preimage = HeadPreimage {
            parent_hash: state.head.block_hash,
            height,
            withdrawals: withdrawals.to_vec(),
        };
        let head = ExecutionHead::new(Self::next_hash(&preimage), height);
        state.head = head;
        state.applied.insert(height, preimage.withdrawals);

        debug!(target: "withdrawals::bridge", height, block_hash = %head.block_hash, "applied withdrawals");
        Ok(head)
    }

    fn head(&self) -> Result<ExecutionHead, BridgeError> {
        self.state
            .read()
            .map(|state| state.head)
            .map_err(|e| BridgeError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Clone for InMemoryExecutionLedger {
    fn clone(&self) -> Self {
        Self { state: Arc::clone(&self.state) }
    }
}
