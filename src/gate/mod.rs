//! Height-gated withdrawal policy.
//!
//! The policy is a pure function of height and params: replaying any
//! historical height with the same params yields the same policy. No clock
//! or external signal is ever consulted.

use crate::params::Params;
use crate::primitives::WithdrawalKind;
use serde::{Deserialize, Serialize};

/// Withdrawal policy in effect at a given height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CutoverPolicy {
    /// Before the singularity height.
    PreCutover,
    /// At or after the singularity height. Never reverts.
    PostCutover,
}

impl CutoverPolicy {
    /// Whether withdrawals of `kind` may be settled under this policy.
    ///
    /// Full withdrawals are always allowed. Partial withdrawals open only
    /// after the cutover.
    pub const fn allows(&self, kind: WithdrawalKind) -> bool {
        match (self, kind) {
            (_, WithdrawalKind::Full) => true,
            (Self::PreCutover, WithdrawalKind::Partial) => false,
            (Self::PostCutover, WithdrawalKind::Partial) => true,
        }
    }
}

/// Policy for `height` under `params`.
pub fn policy_for(height: u64, params: &Params) -> CutoverPolicy {
    if height < params.singularity_height {
        CutoverPolicy::PreCutover
    } else {
        CutoverPolicy::PostCutover
    }
}
