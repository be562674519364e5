//! Engine-level error classification.
//!
//! Failures fall into two tiers:
//!
//! - **Recoverable**: bad params, bad requests, out-of-order heights. Reported
//!   to the caller with no state change; the chain continues.
//! - **Fatal**: storage failure after genesis validation, any execution
//!   bridge failure during a block, or a queue invariant violation. The
//!   driver must halt block production on a [`FatalFault`].

use crate::bridge::BridgeError;
use crate::genesis::GenesisError;
use crate::params::ParamsError;
use crate::queue::QueueError;
use crate::storage::StoreError;
use crate::sweep::SweepError;

/// A condition after which this node must stop producing blocks.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FatalFault {
    /// Genesis state could not be persisted after validation passed.
    #[error("genesis anchoring failed after validation: {0}")]
    GenesisPersist(StoreError),

    /// Stored genesis state could not be read back.
    #[error("genesis export failed: {0}")]
    GenesisExport(ParamsError),

    /// Queue state diverged from its invariants.
    #[error("withdrawal queue invariant violated at height {height}: {source}")]
    Queue { height: u64, source: QueueError },

    /// The execution bridge rejected a computed withdrawal set.
    #[error("execution bridge failed at height {height}: {source}")]
    Bridge { height: u64, source: BridgeError },

    /// Settlement storage failed mid-block.
    #[error("storage failed at height {height}: {source}")]
    Storage { height: u64, source: StoreError },

    /// Params could not be read mid-block.
    #[error("params unavailable at height {height}: {source}")]
    Params { height: u64, source: ParamsError },
}

/// Top-level error returned by [`SettlementEngine`](crate::engine::SettlementEngine).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettlementError {
    /// Rejected parameter set.
    #[error("invalid params: {0}")]
    Params(ParamsError),

    /// Rejected genesis input.
    #[error("invalid genesis: {0}")]
    Genesis(GenesisError),

    /// Rejected withdrawal request or query.
    #[error("invalid request: {0}")]
    Request(QueueError),

    /// Block height does not extend the current head.
    #[error("block height {height} does not follow head height {head_height}")]
    OutOfOrderHeight { height: u64, head_height: u64 },

    /// Operation requires genesis to have run.
    #[error("engine not initialized: run genesis first")]
    NotInitialized,

    /// A fatal fault occurred; the node must halt.
    #[error("fatal: {0}")]
    Fatal(FatalFault),

    /// The engine already halted on a fatal fault.
    #[error("engine halted after fatal fault: {0}")]
    Halted(FatalFault),
}

impl SettlementError {
    /// Whether the caller must halt block production.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::Halted(_))
    }

    /// The underlying fault, if fatal.
    pub fn fault(&self) -> Option<&FatalFault> {
        match self {
            Self::Fatal(fault) | Self::Halted(fault) => Some(fault),
            _ => None,
        }
    }
}

impl From<FatalFault> for SettlementError {
    fn from(fault: FatalFault) -> Self {
        Self::Fatal(fault)
    }
}

impl From<GenesisError> for SettlementError {
    fn from(err: GenesisError) -> Self {
        match err {
            GenesisError::Fatal(fault) => Self::Fatal(fault),
            other => Self::Genesis(other),
        }
    }
}

impl From<SweepError> for SettlementError {
    fn from(err: SweepError) -> Self {
        match err {
            SweepError::Fatal(fault) => Self::Fatal(fault),
            SweepError::NotInitialized => Self::NotInitialized,
            SweepError::OutOfOrderHeight { height, head_height } => {
                Self::OutOfOrderHeight { height, head_height }
            }
        }
    }
}

/// Classify a params error raised by a governance update at `height`.
pub(crate) fn classify_params(err: ParamsError, height: u64) -> SettlementError {
    match err {
        ParamsError::Storage(source) => SettlementError::Fatal(FatalFault::Storage { height, source }),
        other => SettlementError::Params(other),
    }
}

/// Classify a queue error raised outside block processing.
pub(crate) fn classify_queue(err: QueueError, height: u64) -> SettlementError {
    if err.is_fatal() {
        SettlementError::Fatal(FatalFault::Queue { height, source: err })
    } else {
        SettlementError::Request(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tiers() {
        let recoverable = SettlementError::Params(ParamsError::ZeroMaxSweepPerBlock(0));
        assert!(!recoverable.is_fatal());
        assert!(recoverable.fault().is_none());

        let fault = FatalFault::Bridge { height: 3, source: BridgeError::Unavailable("down".into()) };
        let fatal = SettlementError::from(fault.clone());
        assert!(fatal.is_fatal());
        assert_eq!(fatal.fault(), Some(&fault));
    }

    #[test]
    fn test_queue_classification() {
        let err = classify_queue(QueueError::InvalidRequest("amount must be positive"), 1);
        assert!(matches!(err, SettlementError::Request(_)));

        let err = classify_queue(QueueError::NotFound(4), 1);
        assert!(matches!(err, SettlementError::Fatal(FatalFault::Queue { height: 1, .. })));
    }
}
