use chrono::Utc;
use log::info;
use serde::{Deserialize, Serialize};

use super::hash::meets_difficulty;
use super::pow::{hash_with_nonce, MiningStrategy};
use super::transaction::Transaction;

/// Previous-hash sentinel of the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Content marker carried by the genesis block instead of transactions
pub const GENESIS_MARKER: &str = "Genesis block";

/// Fixed genesis timestamp, 2021-06-28T00:00:00Z in milliseconds
pub const GENESIS_TIMESTAMP: i64 = 1_624_838_400_000;

/// What a block carries: a batch of transactions, or the genesis marker
///
/// Serializes untagged, so the genesis payload hashes as a bare JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlockData {
    Marker(String),
    Transactions(Vec<Transaction>),
}

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Transactions included in this block
    #[serde(rename = "transactions")]
    pub data: BlockData,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Proof of work counter
    pub nonce: u64,

    /// Cached hash over all of the above
    pub hash: String,
}

impl Block {
    /// Creates a new unmined block stamped with the current time
    pub fn new(transactions: Vec<Transaction>, previous_hash: String) -> Self {
        Self::with_timestamp(
            Utc::now().timestamp_millis(),
            BlockData::Transactions(transactions),
            previous_hash,
        )
    }

    /// Creates a block with an explicit timestamp, `nonce = 0` and its hash filled in
    pub fn with_timestamp(timestamp: i64, data: BlockData, previous_hash: String) -> Self {
        let block = Block {
            timestamp,
            data,
            previous_hash,
            nonce: 0,
            hash: String::new(),
        };

        let hash = block.calculate_hash();

        Block { hash, ..block }
    }

    /// The fixed first block of every chain
    pub fn genesis() -> Self {
        Self::with_timestamp(
            GENESIS_TIMESTAMP,
            BlockData::Marker(GENESIS_MARKER.to_string()),
            GENESIS_PREVIOUS_HASH.to_string(),
        )
    }

    /// Transactions in this block, empty for the genesis marker
    pub fn transactions(&self) -> &[Transaction] {
        match &self.data {
            BlockData::Transactions(transactions) => transactions,
            BlockData::Marker(_) => &[],
        }
    }

    /// Everything the hash covers except the nonce: `previous_hash ‖ timestamp ‖ transactions`
    pub fn preimage(&self) -> String {
        // Plain data records always serialize
        let transactions = serde_json::to_string(&self.data).unwrap_or_default();

        format!("{}{}{}", self.previous_hash, self.timestamp, transactions)
    }

    /// Calculates the SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        hash_with_nonce(&self.preimage(), self.nonce)
    }

    /// Mines the block on the calling thread
    pub fn mine(&mut self, difficulty: usize) {
        self.mine_with(difficulty, &MiningStrategy::Sequential);
    }

    /// Searches from the current nonce until the hash has `difficulty` leading zeros
    pub fn mine_with(&mut self, difficulty: usize, strategy: &MiningStrategy) {
        let start_nonce = self.nonce;
        let solution = strategy.search(&self.preimage(), start_nonce, difficulty);

        self.nonce = solution.nonce;
        self.hash = solution.hash;

        info!(
            "Block mined: {} ({} attempts)",
            self.hash,
            self.nonce.wrapping_sub(start_nonce).wrapping_add(1)
        );
    }

    /// Checks if the stored hash meets `difficulty`
    pub fn has_proof_of_work(&self, difficulty: usize) -> bool {
        meets_difficulty(&self.hash, difficulty)
    }

    /// Checks that every transaction verifies, stopping at the first failure
    ///
    /// A transaction whose verification errors counts as invalid.
    pub fn has_valid_transactions(&self) -> bool {
        self.transactions()
            .iter()
            .all(|transaction| matches!(transaction.is_valid(), Ok(true)))
    }
}
