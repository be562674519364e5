//! Settlement engine demo.
//!
//! Anchors genesis, seeds the withdrawal queue, and drives a run of blocks
//! against the in-memory store and execution ledger, logging each block's
//! sweep.
//!
//! Run with:
//! ```sh
//! RUST_LOG=info,withdrawals=debug cargo run --bin settlement_demo -- \
//!     --blocks 20 --seed-withdrawals 40
//!
//! # with a genesis file
//! cargo run --bin settlement_demo -- --genesis genesis.json --blocks 100
//! ```

use alloy_primitives::{Address, B256};
use eyre::{eyre, WrapErr};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use withdrawal_engine::{
    GenesisState, InMemoryExecutionLedger, InMemorySettlementStore, NotifyingBridge, PageRequest,
    Params, SettlementEngine, WithdrawalKind,
};

const DEFAULT_BLOCKS: u64 = 10;
const DEFAULT_SEED_WITHDRAWALS: u64 = 16;

/// Command line arguments
struct Args {
    /// Genesis JSON file; built-in genesis when absent
    genesis: Option<String>,
    /// Number of blocks to process
    blocks: u64,
    /// Withdrawals queued before the first block
    seed_withdrawals: u64,
}

impl Args {
    fn parse() -> eyre::Result<Self> {
        let args: Vec<String> = std::env::args().collect();
        let mut genesis = None;
        let mut blocks = DEFAULT_BLOCKS;
        let mut seed_withdrawals = DEFAULT_SEED_WITHDRAWALS;

        let mut i = 1;
        while i < args.len() {
            let value = |i: usize| {
                args.get(i + 1).ok_or_else(|| eyre!("missing value for {}", args[i]))
            };
            match args[i].as_str() {
                "--genesis" => {
                    genesis = Some(value(i)?.clone());
                    i += 2;
                }
                "--blocks" => {
                    blocks = value(i)?.parse().wrap_err("invalid --blocks")?;
                    i += 2;
                }
                "--seed-withdrawals" => {
                    seed_withdrawals = value(i)?.parse().wrap_err("invalid --seed-withdrawals")?;
                    i += 2;
                }
                _ => i += 1,
            }
        }

        Ok(Self { genesis, blocks, seed_withdrawals })
    }
}

/// Genesis used when no file is given: partial withdrawals open halfway
/// through the run.
fn builtin_genesis(blocks: u64) -> GenesisState {
    let params = Params::default()
        .with_min_partial_withdrawal_amount(1_000)
        .with_singularity_height((blocks / 2).max(1));
    GenesisState::new(params, B256::repeat_byte(0x42))
}

/// Deterministic mix of full and partial withdrawals, some below the
/// partial threshold.
fn seed_request(i: u64) -> (Address, u64, WithdrawalKind) {
    let beneficiary = Address::left_padding_from(&i.to_be_bytes());
    if i % 3 == 0 {
        (beneficiary, 32_000_000_000, WithdrawalKind::Full)
    } else {
        (beneficiary, 500 * (i % 5 + 1), WithdrawalKind::Partial)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse()?;

    let genesis = match &args.genesis {
        Some(path) => GenesisState::from_json_file(path)?,
        None => builtin_genesis(args.blocks),
    };
    let genesis_hash = genesis.validate()?;

    let ledger = InMemoryExecutionLedger::new(genesis_hash);
    let (bridge, mut applied) = NotifyingBridge::create(ledger.clone());
    let store = Arc::new(InMemorySettlementStore::new());
    let engine = SettlementEngine::with_store(store, bridge);

    let head = engine.init_genesis(&genesis)?;
    info!(
        execution_hash = %head.block_hash,
        params = ?engine.params()?,
        "genesis anchored"
    );

    for i in 0..args.seed_withdrawals {
        let (beneficiary, amount, kind) = seed_request(i);
        engine.enqueue(beneficiary, amount, kind)?;
    }
    info!(queued = args.seed_withdrawals, "seeded withdrawal queue");

    for height in 1..=args.blocks {
        let report = match engine.process_block(height) {
            Ok(report) => report,
            Err(err) if err.is_fatal() => {
                warn!(height, %err, "settlement halted");
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        info!(
            height,
            policy = ?report.policy,
            scanned = report.scanned,
            settled = ?report.selected_sequences(),
            cursor = report.cursor_after.position,
            queue_len = report.queue_len,
            "block processed"
        );

        while let Ok(event) = applied.try_recv() {
            for withdrawal in &event.withdrawals {
                info!(
                    height = event.height,
                    index = withdrawal.index,
                    address = %withdrawal.address,
                    balance = %ledger.balance_of(&withdrawal.address),
                    "withdrawal credited"
                );
            }
        }
    }

    let remaining = engine.query_queue(&PageRequest::first(0).with_count_total())?;
    let exported = engine.export_genesis()?;
    info!(
        remaining = remaining.total.unwrap_or_default(),
        head = %engine.head()?.block_hash,
        export = %serde_json::to_string(&exported)?,
        "run complete"
    );

    Ok(())
}
