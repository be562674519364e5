//! Genesis anchoring.
//!
//! Binds consensus genesis to an execution-layer genesis block hash exactly
//! once at chain start. Validation failures are ordinary errors; a storage
//! failure after validation passed is a [`FatalFault`].

use crate::error::FatalFault;
use crate::params::{load_params, Params, ParamsError};
use crate::primitives::ExecutionHead;
use crate::storage::{SettlementStoreReader, SettlementStoreWriter};
use alloy_primitives::{Bytes, B256};
use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};
use tracing::{error, info};

/// Errors that can occur while anchoring genesis.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GenesisError {
    /// Execution block hash has the wrong length.
    #[error("execution block hash must be 32 bytes, got {0}")]
    InvalidHashLength(usize),

    /// Execution block hash is all zeroes.
    #[error("execution block hash must be non-zero")]
    ZeroHash,

    /// Genesis params failed validation.
    #[error("invalid genesis params: {0}")]
    Params(#[from] ParamsError),

    /// Genesis has already been applied.
    #[error("genesis already applied, head at height {0}")]
    AlreadyInitialized(u64),

    /// Genesis file could not be read or parsed.
    #[error("genesis file error: {0}")]
    File(String),

    /// Storage failed after validation passed.
    #[error(transparent)]
    Fatal(#[from] FatalFault),
}

/// Chain-start input: params plus the execution genesis block hash.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisState {
    /// Initial withdrawal params.
    #[serde(default)]
    pub params: Params,
    /// Execution-layer genesis block hash, 0x-prefixed hex.
    pub genesis_execution_hash: Bytes,
}

impl GenesisState {
    /// Create a genesis state from params and a 32-byte hash.
    pub fn new(params: Params, genesis_execution_hash: B256) -> Self {
        Self { params, genesis_execution_hash: Bytes::copy_from_slice(genesis_execution_hash.as_slice()) }
    }

    /// Parse a genesis state from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, GenesisError> {
        serde_json::from_str(json).map_err(|e| GenesisError::File(e.to_string()))
    }

    /// Load a genesis state from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GenesisError> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| GenesisError::File(format!("{}: {}", path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| GenesisError::File(format!("{}: {}", path.display(), e)))
    }

    /// Validate hash and params without touching state.
    pub fn validate(&self) -> Result<B256, GenesisError> {
        let hash = validate_execution_block_hash(&self.genesis_execution_hash)?;
        self.params.validate()?;
        Ok(hash)
    }
}

/// Check that `hash` is a well-formed, non-zero 32-byte block hash.
pub fn validate_execution_block_hash(hash: &[u8]) -> Result<B256, GenesisError> {
    if hash.len() != B256::len_bytes() {
        return Err(GenesisError::InvalidHashLength(hash.len()));
    }
    let hash = B256::from_slice(hash);
    if hash.is_zero() {
        return Err(GenesisError::ZeroHash);
    }
    Ok(hash)
}

/// Apply genesis: persist params and insert the genesis execution head.
///
/// Fails without touching state if validation fails or genesis already ran.
pub fn init_genesis<S>(store: &S, genesis: &GenesisState) -> Result<ExecutionHead, GenesisError>
where
    S: SettlementStoreReader + SettlementStoreWriter + ?Sized,
{
    if let Some(head) = store.execution_head().map_err(FatalFault::GenesisPersist)? {
        return Err(GenesisError::AlreadyInitialized(head.height));
    }

    let hash = genesis.validate()?;
    let head = ExecutionHead::genesis(hash);

    let persisted = store
        .set_params(genesis.params)
        .and_then(|()| store.set_genesis_hash(hash))
        .and_then(|()| store.set_execution_head(head));
    if let Err(err) = persisted {
        error!(target: "withdrawals::genesis", %err, "failed to persist validated genesis");
        return Err(FatalFault::GenesisPersist(err).into());
    }

    info!(
        target: "withdrawals::genesis",
        execution_hash = %hash,
        params = ?genesis.params,
        "genesis anchored"
    );
    Ok(head)
}

/// Export the stored params and the execution genesis hash they were
/// anchored to.
///
/// Re-importing the export on a fresh store reproduces the original genesis.
/// A read failure here means prior state is already corrupt, so it is fatal.
pub fn export_genesis<S>(store: &S) -> Result<GenesisState, FatalFault>
where
    S: SettlementStoreReader + ?Sized,
{
    let params = load_params(store).map_err(|err| {
        error!(target: "withdrawals::genesis", %err, "failed to read params for export");
        FatalFault::GenesisExport(err)
    })?;
    let hash = store
        .genesis_hash()
        .map_err(|e| FatalFault::GenesisExport(ParamsError::Storage(e)))?
        .ok_or(FatalFault::GenesisExport(ParamsError::NotInitialized))?;

    Ok(GenesisState::new(params, hash))
}
