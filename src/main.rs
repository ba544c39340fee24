use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::{info, warn};

use pow_ledger::blockchain::pow::DEFAULT_BATCH_SIZE;
use pow_ledger::{BlockData, Blockchain, LedgerConfig, MiningStrategy, Transaction, Wallet};

/// Runs a small mining session against an in-memory ledger
#[derive(Debug, Parser)]
#[command(name = "pow-ledger", version, about)]
struct Args {
    /// TOML file with ledger settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the number of leading zeros a block hash needs
    #[arg(short, long)]
    difficulty: Option<usize>,

    /// Override the mining reward
    #[arg(short, long)]
    reward: Option<f64>,

    /// Search nonces on all cores
    #[arg(long)]
    parallel: bool,
}

fn load_config(args: &Args) -> anyhow::Result<LedgerConfig> {
    let mut config = match &args.config {
        Some(path) => LedgerConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => LedgerConfig::default(),
    };

    if let Some(difficulty) = args.difficulty {
        config.difficulty = difficulty;
    }
    if let Some(reward) = args.reward {
        config.mining_reward = reward;
    }
    if args.parallel {
        config.mining = MiningStrategy::Parallel {
            batch_size: DEFAULT_BATCH_SIZE,
        };
    }

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let args = Args::parse();
    let config = load_config(&args)?;
    let mut ledger = Blockchain::with_config(config.clone())?;

    let miner = Wallet::new();
    let friend = Wallet::new();
    info!("Miner address: {}", miner.address());
    info!("Friend address: {}", friend.address());

    let mut transfer = Transaction::new(miner.address().clone(), friend.address().clone(), 10.0);
    transfer.sign(&miner)?;
    ledger.add_transaction(transfer)?;

    info!("Starting the miner...");
    ledger.mine_pending_transactions(miner.address());
    info!("Balance of miner is {}", ledger.get_balance_of_address(miner.address()));

    info!("Starting the miner again...");
    ledger.mine_pending_transactions(miner.address());
    info!("Balance of miner is {}", ledger.get_balance_of_address(miner.address()));
    info!("Balance of friend is {}", ledger.get_balance_of_address(friend.address()));

    info!("Is chain valid? {}", ledger.is_chain_valid());

    // Tamper with a copy of the chain to show the validator catching it
    let mut blocks = ledger.chain().to_vec();
    if let Some(block) = blocks.get_mut(1) {
        if let BlockData::Transactions(transactions) = &mut block.data {
            if let Some(transaction) = transactions.first_mut() {
                transaction.amount = 1_000.0;
            }
        }
    }
    let tampered = Blockchain::from_blocks(blocks, config)?;
    match tampered.validate_chain() {
        Ok(()) => warn!("Tampered chain was accepted"),
        Err(err) => info!("Tampered chain rejected: {}", err),
    }

    println!("{}", serde_json::to_string_pretty(&ledger)?);

    Ok(())
}
