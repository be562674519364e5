//! Candidate classification, selection, and cursor advancement.
//!
//! Everything here is a pure function of its inputs. Given the same scan,
//! params and policy, every node selects the same withdrawals in the same
//! order and lands on the same cursor.

use crate::arith::SafeArith;
use crate::gate::CutoverPolicy;
use crate::params::Params;
use crate::primitives::{ScanCursor, WithdrawalRequest};
use crate::queue::{QueueResult, ScanResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Tie-break applied when eligible candidates exceed the per-block cap.
///
/// Changing the rule is a consensus change: nodes on different rules
/// disagree on post-state. New rules get a new variant and version; existing
/// variants never change meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionRule {
    /// All eligible full withdrawals, then all eligible partials, each in
    /// scan order, truncated to `max_withdrawal_per_block`.
    FullsBeforePartials,
}

impl SelectionRule {
    /// Protocol version of this rule.
    pub const fn version(&self) -> u32 {
        match self {
            Self::FullsBeforePartials => 1,
        }
    }
}

/// Selection rule in force.
pub const SELECTION_RULE: SelectionRule = SelectionRule::FullsBeforePartials;

/// Why a scanned candidate was or was not eligible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// Partial withdrawal below `min_partial_withdrawal_amount`.
    BelowPartialThreshold,
    /// Withdrawal kind not yet allowed at this height.
    GatedByPolicy,
}

impl Eligibility {
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Classify one candidate.
pub fn classify(
    request: &WithdrawalRequest,
    params: &Params,
    policy: CutoverPolicy,
) -> Eligibility {
    if !policy.allows(request.kind) {
        return Eligibility::GatedByPolicy;
    }
    if !request.kind.is_full() && request.amount < params.min_partial_withdrawal_amount {
        return Eligibility::BelowPartialThreshold;
    }
    Eligibility::Eligible
}

/// Select the withdrawals to settle from scanned candidates.
///
/// Ineligible candidates are skipped and stay queued.
pub fn select(
    candidates: &[WithdrawalRequest],
    params: &Params,
    policy: CutoverPolicy,
    rule: SelectionRule,
) -> Vec<WithdrawalRequest> {
    let cap = params.max_withdrawal_per_block as usize;
    let eligible = candidates.iter().filter(|c| classify(c, params, policy).is_eligible());

    match rule {
        SelectionRule::FullsBeforePartials => {
            let (fulls, partials): (Vec<_>, Vec<_>) =
                eligible.partition(|candidate| candidate.kind.is_full());
            fulls.into_iter().chain(partials).take(cap).cloned().collect()
        }
    }
}

/// Cursor position after removing `removed` from the queue `scan` visited.
///
/// The cursor lands on the first surviving entry after the last scanned
/// one, wrapping to the front, so scanned-but-unselected entries are not
/// rescanned until the rest of the queue has been visited. The cursor is
/// anchored to that entry's sequence.
pub fn advance_cursor(scan: &ScanResult, removed: &[u64]) -> QueueResult<ScanCursor> {
    let len = scan.queue_len;
    if scan.visited() == 0 || len == 0 {
        return Ok(ScanCursor::default());
    }

    let removed: HashSet<u64> = removed.iter().copied().collect();
    let survivors = len.safe_sub(removed.len())?;
    let anchor = scan.following.or_else(|| {
        scan.entries.iter().map(|entry| entry.sequence).find(|sequence| !removed.contains(sequence))
    });
    let Some(anchor) = anchor.filter(|_| survivors > 0) else {
        return Ok(ScanCursor::default());
    };

    // logical index just past the last scanned entry, before removal
    let next_index = scan.start_index.safe_add(scan.visited())?.safe_rem(len)?;

    let mut removed_before_next = 0usize;
    for (offset, entry) in scan.entries.iter().enumerate() {
        if !removed.contains(&entry.sequence) {
            continue;
        }
        if scan.start_index.safe_add(offset)?.safe_rem(len)? < next_index {
            removed_before_next = removed_before_next.safe_add(1)?;
        }
    }

    let position = next_index.safe_sub(removed_before_next)?.safe_rem(survivors)?;
    Ok(ScanCursor::anchored(position as u64, anchor))
}
