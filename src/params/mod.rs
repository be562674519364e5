//! Governance-set withdrawal limits.
//!
//! Params are read once per block. The only way to change them is a
//! validated update through [`store_params`]; a rejected update leaves the
//! stored value untouched.

use crate::storage::{SettlementStoreReader, SettlementStoreWriter, StoreError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default maximum number of withdrawals applied per block.
pub const DEFAULT_MAX_WITHDRAWAL_PER_BLOCK: u32 = 4;

/// Default maximum number of queue entries scanned per block.
pub const DEFAULT_MAX_SWEEP_PER_BLOCK: u32 = 64;

/// Default minimum amount (gwei) for a partial withdrawal to be eligible.
pub const DEFAULT_MIN_PARTIAL_WITHDRAWAL_AMOUNT: u64 = 600_000;

/// Default singularity height: 42 days with 35 second blocks.
pub const DEFAULT_SINGULARITY_HEIGHT: u64 = 1_209_600;

/// Errors produced by parameter validation and access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("max withdrawal per block must be positive: {0}")]
    ZeroMaxWithdrawalPerBlock(u32),

    #[error("max sweep per block must be positive: {0}")]
    ZeroMaxSweepPerBlock(u32),

    #[error(
        "max sweep per block must be greater than or equal to max withdrawal per block: \
         {max_sweep} < {max_withdrawal}"
    )]
    SweepNarrowerThanWithdrawal { max_sweep: u32, max_withdrawal: u32 },

    #[error("min partial withdrawal amount must be positive: {0}")]
    ZeroMinPartialWithdrawalAmount(u64),

    #[error("singularity height must be positive: {0}")]
    ZeroSingularityHeight(u64),

    /// Params were read before genesis stored them.
    #[error("params not initialized")]
    NotInitialized,

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Withdrawal limits set by governance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Params {
    /// Upper bound on withdrawals handed to the execution layer per block.
    pub max_withdrawal_per_block: u32,
    /// Upper bound on queue entries scanned per block.
    pub max_sweep_per_block: u32,
    /// Minimum amount for a partial withdrawal to be eligible.
    pub min_partial_withdrawal_amount: u64,
    /// Height at which the post-cutover policy takes effect.
    pub singularity_height: u64,
}

impl Params {
    /// Create a new parameter set. Does not validate.
    pub const fn new(
        max_withdrawal_per_block: u32,
        max_sweep_per_block: u32,
        min_partial_withdrawal_amount: u64,
        singularity_height: u64,
    ) -> Self {
        Self {
            max_withdrawal_per_block,
            max_sweep_per_block,
            min_partial_withdrawal_amount,
            singularity_height,
        }
    }

    /// Validate every field, then the cross-field rule.
    pub fn validate(&self) -> Result<(), ParamsError> {
        validate_max_withdrawal_per_block(self.max_withdrawal_per_block)?;
        validate_max_sweep_per_block(self.max_sweep_per_block, self.max_withdrawal_per_block)?;
        validate_min_partial_withdrawal_amount(self.min_partial_withdrawal_amount)?;
        validate_singularity_height(self.singularity_height)
    }

    /// Replace the withdrawal cap.
    pub fn with_max_withdrawal_per_block(mut self, value: u32) -> Self {
        self.max_withdrawal_per_block = value;
        self
    }

    /// Replace the scan window.
    pub fn with_max_sweep_per_block(mut self, value: u32) -> Self {
        self.max_sweep_per_block = value;
        self
    }

    /// Replace the partial threshold.
    pub fn with_min_partial_withdrawal_amount(mut self, value: u64) -> Self {
        self.min_partial_withdrawal_amount = value;
        self
    }

    /// Replace the singularity height.
    pub fn with_singularity_height(mut self, value: u64) -> Self {
        self.singularity_height = value;
        self
    }
}

impl Default for Params {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_WITHDRAWAL_PER_BLOCK,
            DEFAULT_MAX_SWEEP_PER_BLOCK,
            DEFAULT_MIN_PARTIAL_WITHDRAWAL_AMOUNT,
            DEFAULT_SINGULARITY_HEIGHT,
        )
    }
}

pub fn validate_max_withdrawal_per_block(value: u32) -> Result<(), ParamsError> {
    if value == 0 {
        return Err(ParamsError::ZeroMaxWithdrawalPerBlock(value));
    }
    Ok(())
}

pub fn validate_max_sweep_per_block(
    max_sweep_per_block: u32,
    max_withdrawal_per_block: u32,
) -> Result<(), ParamsError> {
    if max_sweep_per_block == 0 {
        return Err(ParamsError::ZeroMaxSweepPerBlock(max_sweep_per_block));
    }
    if max_sweep_per_block < max_withdrawal_per_block {
        return Err(ParamsError::SweepNarrowerThanWithdrawal {
            max_sweep: max_sweep_per_block,
            max_withdrawal: max_withdrawal_per_block,
        });
    }
    Ok(())
}

pub fn validate_min_partial_withdrawal_amount(value: u64) -> Result<(), ParamsError> {
    if value == 0 {
        return Err(ParamsError::ZeroMinPartialWithdrawalAmount(value));
    }
    Ok(())
}

pub fn validate_singularity_height(value: u64) -> Result<(), ParamsError> {
    if value == 0 {
        return Err(ParamsError::ZeroSingularityHeight(value));
    }
    Ok(())
}

/// Read the stored params.
pub fn load_params<S: SettlementStoreReader + ?Sized>(store: &S) -> Result<Params, ParamsError> {
    store.params()?.ok_or(ParamsError::NotInitialized)
}

/// Validate and store params. Nothing is written if validation fails.
pub fn store_params<S: SettlementStoreWriter + ?Sized>(
    store: &S,
    params: Params,
) -> Result<(), ParamsError> {
    params.validate()?;
    store.set_params(params)?;
    info!(target: "withdrawals::params", ?params, "params updated");
    Ok(())
}
