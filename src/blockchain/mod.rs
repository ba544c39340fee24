// Blockchain module
//
// This module contains the integrity core of the ledger:
// - Content hashing
// - Cryptography utilities
// - Transaction structure
// - Block structure
// - Proof of work search
// - Blockchain structure

pub mod block;
pub mod chain;
pub mod crypto;
pub mod hash;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, BlockData};
pub use chain::{Blockchain, BlockchainError, ChainValidationError};
pub use crypto::{Address, CryptoError, DigitalSignature, Wallet};
pub use pow::{MiningStrategy, ProofOfWork, SearchState};
pub use transaction::{Transaction, TransactionError};
