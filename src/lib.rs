//! A minimal single-node proof-of-work ledger
//!
//! Blocks of signed transfers are linked by SHA-256 hashes and sealed by a
//! leading-zero proof of work. Any holder of the chain can replay it to check
//! integrity or compute balances.
//!
//! ```no_run
//! use pow_ledger::{Blockchain, Transaction, Wallet};
//!
//! let mut ledger = Blockchain::new();
//! let alice = Wallet::new();
//! let bob = Wallet::new();
//!
//! let mut transfer = Transaction::new(alice.address().clone(), bob.address().clone(), 10.0);
//! transfer.sign(&alice).unwrap();
//! ledger.add_transaction(transfer).unwrap();
//!
//! ledger.mine_pending_transactions(alice.address());
//! assert!(ledger.is_chain_valid());
//! ```

#![forbid(unsafe_code)]

pub mod blockchain;
pub mod config;

pub use blockchain::{
    Address, Block, BlockData, Blockchain, BlockchainError, ChainValidationError, MiningStrategy,
    Transaction, TransactionError, Wallet,
};
pub use config::{ConfigError, LedgerConfig};
