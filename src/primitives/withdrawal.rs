//! Withdrawal obligation primitives.
//!
//! ```text
//! WithdrawalRequest
//! ├── sequence: u64            (assigned at enqueue, arrival order)
//! ├── beneficiary: Address     (execution-layer recipient)
//! ├── amount: u64              (gwei, always > 0)
//! ├── kind: Full | Partial
//! └── enqueued_at_height: u64
//! ```

use alloy_eips::eip4895::Withdrawal;
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Class of a withdrawal obligation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WithdrawalKind {
    /// Withdraws an entire balance. Always eligible once scanned.
    Full,
    /// Withdraws accrued excess. Subject to the minimum partial amount.
    Partial,
}

impl WithdrawalKind {
    /// Returns `true` for [`WithdrawalKind::Full`].
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

/// A pending withdrawal obligation owned by the queue.
///
/// Entries are never mutated in place; a changed amount is a new entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalRequest {
    /// Monotonic sequence number defining arrival order.
    pub sequence: u64,
    /// Execution-layer address credited on settlement.
    pub beneficiary: Address,
    /// Amount in gwei.
    pub amount: u64,
    /// Full or partial obligation.
    pub kind: WithdrawalKind,
    /// Consensus height at which the obligation was enqueued.
    pub enqueued_at_height: u64,
}

impl WithdrawalRequest {
    /// Create a new withdrawal request.
    pub const fn new(
        sequence: u64,
        beneficiary: Address,
        amount: u64,
        kind: WithdrawalKind,
        enqueued_at_height: u64,
    ) -> Self {
        Self { sequence, beneficiary, amount, kind, enqueued_at_height }
    }

    /// Convert into the EIP-4895 withdrawal handed to the execution layer.
    ///
    /// The withdrawal index is the queue sequence; obligations are keyed by
    /// beneficiary so the validator index is always zero.
    pub fn to_engine_withdrawal(&self) -> Withdrawal {
        Withdrawal {
            index: self.sequence,
            validator_index: 0,
            address: self.beneficiary,
            amount: self.amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_withdrawal_conversion() {
        let request =
            WithdrawalRequest::new(7, Address::repeat_byte(0x11), 1_000, WithdrawalKind::Full, 3);
        let withdrawal = request.to_engine_withdrawal();

        assert_eq!(withdrawal.index, 7);
        assert_eq!(withdrawal.validator_index, 0);
        assert_eq!(withdrawal.address, Address::repeat_byte(0x11));
        assert_eq!(withdrawal.amount, 1_000);
    }

    #[test]
    fn test_serde_camel_case() {
        let request =
            WithdrawalRequest::new(1, Address::repeat_byte(0x22), 5, WithdrawalKind::Partial, 9);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["enqueuedAtHeight"], 9);
        assert_eq!(json["kind"], "partial");

        let back: WithdrawalRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, request);
    }
}
