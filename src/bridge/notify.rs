//! Bridge wrapper that forwards applied withdrawal sets to observers.

use super::{BridgeError, ExecutionBridge};
use crate::primitives::{ExecutionHead, Withdrawal};
use tokio::sync::mpsc;
use tracing::warn;

/// A withdrawal set the execution layer accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedWithdrawals {
    /// Consensus height the set was applied at.
    pub height: u64,
    /// Head reported after applying.
    pub head: ExecutionHead,
    /// The withdrawals, in applied order.
    pub withdrawals: Vec<Withdrawal>,
}

/// Channel-forwarding bridge.
///
/// Delegates to an inner bridge and, on success, sends an
/// [`AppliedWithdrawals`] event. A closed receiver never fails the block.
#[derive(Debug, Clone)]
pub struct NotifyingBridge<B> {
    inner: B,
    sender: mpsc::UnboundedSender<AppliedWithdrawals>,
}

impl<B: ExecutionBridge> NotifyingBridge<B> {
    /// Wrap `inner`, sending events to `sender`.
    pub fn new(inner: B, sender: mpsc::UnboundedSender<AppliedWithdrawals>) -> Self {
        Self { inner, sender }
    }

    /// Wrap `inner` and return the event receiver.
    pub fn create(inner: B) -> (Self, mpsc::UnboundedReceiver<AppliedWithdrawals>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(inner, sender), receiver)
    }

    /// The wrapped bridge.
    pub fn inner(&self) -> &B {
        &self.inner
    }
}

impl<B: ExecutionBridge> ExecutionBridge for NotifyingBridge<B> {
    fn apply(&self, height: u64, withdrawals: &[Withdrawal]) -> Result<ExecutionHead, BridgeError> {
        let head = self.inner.apply(height, withdrawals)?;

        let event = AppliedWithdrawals { height, head, withdrawals: withdrawals.to_vec() };
        if self.sender.send(event).is_err() {
            warn!(target: "withdrawals::bridge", height, "applied-withdrawals receiver dropped");
        }
        Ok(head)
    }

    fn head(&self) -> Result<ExecutionHead, BridgeError> {
        self.inner.head()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::InMemoryExecutionLedger;
    use alloy_primitives::{Address, B256};

    #[tokio::test]
    async fn test_forwards_applied_sets() {
        let ledger = InMemoryExecutionLedger::new(B256::repeat_byte(9));
        let (bridge, mut receiver) = NotifyingBridge::create(ledger);

        let withdrawal =
            Withdrawal { index: 3, validator_index: 0, address: Address::repeat_byte(1), amount: 7 };
        let head = bridge.apply(1, std::slice::from_ref(&withdrawal)).unwrap();

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.height, 1);
        assert_eq!(event.head, head);
        assert_eq!(event.withdrawals, vec![withdrawal]);
    }

    #[tokio::test]
    async fn test_failed_apply_not_forwarded() {
        let ledger = InMemoryExecutionLedger::new(B256::repeat_byte(9));
        ledger.fail_at(1).unwrap();
        let (bridge, mut receiver) = NotifyingBridge::create(ledger);

        assert!(bridge.apply(1, &[]).is_err());
        drop(bridge);
        assert!(receiver.recv().await.is_none());
    }

    #[test]
    fn test_dropped_receiver_does_not_fail() {
        let ledger = InMemoryExecutionLedger::new(B256::repeat_byte(9));
        let (bridge, receiver) = NotifyingBridge::create(ledger);
        drop(receiver);

        assert!(bridge.apply(1, &[]).is_ok());
        assert_eq!(bridge.head().unwrap().height, 1);
    }
}
