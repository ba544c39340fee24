use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use super::block::{Block, BlockData};
use super::crypto::Address;
use super::pow::MiningStrategy;
use super::transaction::{Transaction, TransactionError};
use crate::config::{ConfigError, LedgerConfig};

/// Errors that can occur during blockchain operations
#[derive(Debug, Error)]
pub enum BlockchainError {
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),

    #[error("Invalid chain: {0}")]
    InvalidChain(String),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// First failing check found while validating a chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainValidationError {
    #[error("Block {index} carries a marker instead of transactions")]
    UnexpectedMarker { index: usize },

    #[error("Block {index} contains an invalid transaction")]
    InvalidTransactions { index: usize },

    #[error("Block {index} hash does not match its contents")]
    HashMismatch { index: usize },

    #[error("Block {index} does not link to the previous block hash")]
    BrokenLink { index: usize },

    #[error("Block {index} hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: usize, difficulty: usize },
}

/// Represents the blockchain
///
/// Owns its blocks and pending pool. Blocks are only ever appended by
/// [`Blockchain::mine_pending_transactions`]; callers get shared references.
#[derive(Debug, Clone, Serialize)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    chain: Vec<Block>,

    /// Pending transactions to be included in the next block
    pending_transactions: Vec<Transaction>,

    /// Mining difficulty (number of leading zeros required in hash)
    difficulty: usize,

    /// Mining reward
    mining_reward: f64,

    /// How nonces are searched for
    #[serde(skip)]
    mining_strategy: MiningStrategy,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates a new blockchain with a genesis block and default settings
    pub fn new() -> Self {
        Self::from_valid_config(LedgerConfig::default(), vec![Self::create_genesis_block()])
    }

    /// Creates a new blockchain with a genesis block
    pub fn with_config(config: LedgerConfig) -> Result<Self, BlockchainError> {
        config.validate()?;

        Ok(Self::from_valid_config(config, vec![Self::create_genesis_block()]))
    }

    /// Adopts an existing sequence of blocks, e.g. a deserialized snapshot
    ///
    /// Only the genesis block is checked here; call [`Blockchain::validate_chain`]
    /// to verify the rest.
    pub fn from_blocks(blocks: Vec<Block>, config: LedgerConfig) -> Result<Self, BlockchainError> {
        config.validate()?;

        match blocks.first() {
            None => {
                return Err(BlockchainError::InvalidChain(
                    "A chain needs at least the genesis block".to_string(),
                ))
            }
            Some(first) if *first != Self::create_genesis_block() => {
                return Err(BlockchainError::InvalidChain(
                    "First block is not the genesis block".to_string(),
                ))
            }
            Some(_) => {}
        }

        Ok(Self::from_valid_config(config, blocks))
    }

    fn from_valid_config(config: LedgerConfig, chain: Vec<Block>) -> Self {
        Blockchain {
            chain,
            pending_transactions: Vec::new(),
            difficulty: config.difficulty,
            mining_reward: config.mining_reward,
            mining_strategy: config.mining,
        }
    }

    /// Creates the genesis block (first block in the chain)
    pub fn create_genesis_block() -> Block {
        Block::genesis()
    }

    /// Gets the last block in the chain
    pub fn get_latest_block(&self) -> &Block {
        // The chain always holds at least the genesis block
        &self.chain[self.chain.len() - 1]
    }

    /// Adds a signed transaction to the pending transactions
    ///
    /// Does not check that the sender can afford the transfer.
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<(), BlockchainError> {
        let has_endpoints = transaction
            .from_address
            .as_ref()
            .is_some_and(|from| !from.is_empty())
            && !transaction.to_address.is_empty();

        if !has_endpoints {
            warn!("Rejected transaction without both addresses");
            return Err(BlockchainError::InvalidTransaction(
                "Transaction must include from and to address".to_string(),
            ));
        }

        if !transaction.amount.is_finite() || transaction.amount < 0.0 {
            warn!("Rejected transaction with amount {}", transaction.amount);
            return Err(BlockchainError::InvalidTransaction(format!(
                "Amount must be a non-negative number, got {}",
                transaction.amount
            )));
        }

        let is_valid = match transaction.is_valid() {
            Ok(is_valid) => is_valid,
            Err(TransactionError::CryptoError(err)) => {
                warn!("Rejected transaction that failed to decode: {}", err);
                return Err(BlockchainError::InvalidTransaction(format!(
                    "Cannot verify transaction: {}",
                    err
                )));
            }
            Err(err) => return Err(err.into()),
        };

        if !is_valid {
            warn!("Rejected transaction with a bad signature");
            return Err(BlockchainError::InvalidTransaction(
                "Cannot add invalid transaction to chain".to_string(),
            ));
        }

        info!(
            "Queued transaction of {} to {}",
            transaction.amount, transaction.to_address
        );
        self.pending_transactions.push(transaction);

        Ok(())
    }

    /// Mines a new block with the pending transactions plus the mining reward
    ///
    /// The reward is the last transaction in the block. Returns the new tip.
    pub fn mine_pending_transactions(&mut self, reward_address: &Address) -> &Block {
        let reward = Transaction::new_reward(reward_address.clone(), self.mining_reward);
        self.pending_transactions.push(reward);

        let transactions = std::mem::take(&mut self.pending_transactions);
        let previous_hash = self.get_latest_block().hash.clone();

        let mut block = Block::new(transactions, previous_hash);
        block.mine_with(self.difficulty, &self.mining_strategy);

        info!(
            "Block {} successfully mined with {} transactions",
            self.chain.len(),
            block.transactions().len()
        );
        self.chain.push(block);

        self.get_latest_block()
    }

    /// Replays every transaction to compute the balance of `address`
    ///
    /// A mining reward only counts once another block has been mined on top
    /// of the block that holds it.
    pub fn get_balance_of_address(&self, address: &Address) -> f64 {
        let tip = self.chain.len() - 1;
        let mut balance = 0.0;

        for (index, block) in self.chain.iter().enumerate() {
            for transaction in block.transactions() {
                if transaction.is_reward() && index == tip {
                    continue;
                }

                if transaction.from_address.as_ref() == Some(address) {
                    balance -= transaction.amount;
                }

                if transaction.to_address == *address {
                    balance += transaction.amount;
                }
            }
        }

        balance
    }

    /// Validates the blockchain
    ///
    /// Returns the first failing check, in chain order.
    pub fn validate_chain(&self) -> Result<(), ChainValidationError> {
        for index in 1..self.chain.len() {
            let current_block = &self.chain[index];
            let previous_block = &self.chain[index - 1];

            // Only genesis may carry a marker payload
            if let BlockData::Marker(_) = current_block.data {
                return Err(ChainValidationError::UnexpectedMarker { index });
            }

            if !current_block.has_valid_transactions() {
                return Err(ChainValidationError::InvalidTransactions { index });
            }

            // Check if the hash is correct
            if current_block.hash != current_block.calculate_hash() {
                return Err(ChainValidationError::HashMismatch { index });
            }

            // Check if the previous hash is correct
            if current_block.previous_hash != previous_block.hash {
                return Err(ChainValidationError::BrokenLink { index });
            }

            if !current_block.has_proof_of_work(self.difficulty) {
                return Err(ChainValidationError::InsufficientWork {
                    index,
                    difficulty: self.difficulty,
                });
            }
        }

        Ok(())
    }

    /// Checks whether the blockchain is valid
    pub fn is_chain_valid(&self) -> bool {
        match self.validate_chain() {
            Ok(()) => true,
            Err(err) => {
                warn!("Chain validation failed: {}", err);
                false
            }
        }
    }

    /// Gets the entire blockchain
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Gets all pending transactions
    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    pub fn mining_reward(&self) -> f64 {
        self.mining_reward
    }

    #[cfg(test)]
    fn transactions_mut(&mut self, index: usize) -> &mut Vec<Transaction> {
        match &mut self.chain[index].data {
            BlockData::Transactions(transactions) => transactions,
            BlockData::Marker(_) => panic!("block {} has no transactions", index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::crypto::{DigitalSignature, Wallet};

    fn test_config(difficulty: usize) -> LedgerConfig {
        LedgerConfig {
            difficulty,
            ..LedgerConfig::default()
        }
    }

    fn signed_transfer(sender: &Wallet, recipient: &Address, amount: f64) -> Transaction {
        let mut transaction = Transaction::new(sender.address().clone(), recipient.clone(), amount);
        transaction.sign(sender).unwrap();
        transaction
    }

    /// Genesis plus two mined blocks, each with one transfer and a reward
    fn three_block_chain() -> (Blockchain, Wallet, Wallet) {
        let mut blockchain = Blockchain::with_config(test_config(1)).unwrap();
        let alice = Wallet::new();
        let bob = Wallet::new();

        blockchain
            .add_transaction(signed_transfer(&alice, bob.address(), 10.0))
            .unwrap();
        blockchain.mine_pending_transactions(alice.address());

        blockchain
            .add_transaction(signed_transfer(&bob, alice.address(), 4.0))
            .unwrap();
        blockchain.mine_pending_transactions(bob.address());

        (blockchain, alice, bob)
    }

    #[test]
    fn test_new_blockchain() {
        let blockchain = Blockchain::new();
        let chain = blockchain.chain();

        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0], Block::genesis());
        assert_eq!(blockchain.difficulty(), 2);
        assert_eq!(blockchain.mining_reward(), 100.0);
        assert!(blockchain.is_chain_valid());
    }

    #[test]
    fn test_add_transaction() {
        let mut blockchain = Blockchain::with_config(test_config(0)).unwrap();
        let sender_wallet = Wallet::new();
        let recipient_wallet = Wallet::new();

        let first = signed_transfer(&sender_wallet, recipient_wallet.address(), 1.0);
        let second = signed_transfer(&sender_wallet, recipient_wallet.address(), 2.0);

        blockchain.add_transaction(first.clone()).unwrap();
        blockchain.add_transaction(second.clone()).unwrap();

        // Arrival order, no solvency check
        assert_eq!(blockchain.pending_transactions(), &[first, second]);
    }

    #[test]
    fn test_add_transaction_rejects_missing_addresses() {
        let mut blockchain = Blockchain::new();
        let wallet = Wallet::new();

        let reward = Transaction::new_reward(wallet.address().clone(), 5.0);
        let result = blockchain.add_transaction(reward);
        assert!(matches!(result, Err(BlockchainError::InvalidTransaction(_))));

        let mut no_recipient = Transaction::new(wallet.address().clone(), Address(String::new()), 5.0);
        no_recipient.sign(&wallet).unwrap();
        let result = blockchain.add_transaction(no_recipient);
        assert!(matches!(result, Err(BlockchainError::InvalidTransaction(_))));

        let no_sender = Transaction::new(Address(String::new()), wallet.address().clone(), 5.0);
        let result = blockchain.add_transaction(no_sender);
        assert!(matches!(result, Err(BlockchainError::InvalidTransaction(_))));

        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_transaction_rejects_bad_signatures() {
        let mut blockchain = Blockchain::new();
        let sender_wallet = Wallet::new();
        let recipient_wallet = Wallet::new();

        let unsigned = Transaction::new(
            sender_wallet.address().clone(),
            recipient_wallet.address().clone(),
            1.0,
        );
        let result = blockchain.add_transaction(unsigned);
        assert!(matches!(
            result,
            Err(BlockchainError::TransactionError(TransactionError::MissingSignature))
        ));

        let mut tampered = signed_transfer(&sender_wallet, recipient_wallet.address(), 1.0);
        tampered.amount = 1000.0;
        let result = blockchain.add_transaction(tampered);
        assert!(matches!(result, Err(BlockchainError::InvalidTransaction(_))));

        let mut negative = Transaction::new(
            sender_wallet.address().clone(),
            recipient_wallet.address().clone(),
            -1.0,
        );
        negative.sign(&sender_wallet).unwrap();
        let result = blockchain.add_transaction(negative);
        assert!(matches!(result, Err(BlockchainError::InvalidTransaction(_))));

        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_add_transaction_rejects_undecodable_keys() {
        let mut blockchain = Blockchain::new();
        let sender_wallet = Wallet::new();
        let recipient_wallet = Wallet::new();

        // Sender that is not a point on the curve
        let mut bad_sender = signed_transfer(&sender_wallet, recipient_wallet.address(), 1.0);
        bad_sender.from_address = Some(Address("02deadbeef".to_string()));
        let result = blockchain.add_transaction(bad_sender);
        assert!(matches!(result, Err(BlockchainError::InvalidTransaction(_))));

        // Signature that is not DER
        let mut bad_signature = signed_transfer(&sender_wallet, recipient_wallet.address(), 1.0);
        bad_signature.signature = Some(DigitalSignature("0badc0de".to_string()));
        let result = blockchain.add_transaction(bad_signature);
        assert!(matches!(result, Err(BlockchainError::InvalidTransaction(_))));

        assert!(blockchain.pending_transactions().is_empty());
    }

    #[test]
    fn test_mine_pending_transactions() {
        let mut blockchain = Blockchain::with_config(test_config(2)).unwrap();
        let sender_wallet = Wallet::new();
        let recipient_wallet = Wallet::new();

        let transfer = signed_transfer(&sender_wallet, recipient_wallet.address(), 10.0);
        blockchain.add_transaction(transfer.clone()).unwrap();

        let genesis_hash = blockchain.get_latest_block().hash.clone();
        let block = blockchain.mine_pending_transactions(sender_wallet.address()).clone();

        assert_eq!(block.previous_hash, genesis_hash);
        assert!(block.hash.starts_with("00"));

        // Submission order, reward last
        let transactions = block.transactions();
        assert_eq!(transactions.len(), 2);
        assert_eq!(transactions[0], transfer);
        assert!(transactions[1].is_reward());
        assert_eq!(transactions[1].to_address, *sender_wallet.address());
        assert_eq!(transactions[1].amount, 100.0);

        assert!(blockchain.pending_transactions().is_empty());
        assert_eq!(blockchain.chain().len(), 2);
        assert_eq!(blockchain.get_latest_block(), &block);
    }

    #[test]
    fn test_reward_matures_after_next_block() {
        let mut blockchain = Blockchain::with_config(test_config(1)).unwrap();
        let miner = Wallet::new();

        blockchain.mine_pending_transactions(miner.address());
        assert_eq!(blockchain.get_balance_of_address(miner.address()), 0.0);

        blockchain.mine_pending_transactions(miner.address());
        assert_eq!(blockchain.get_balance_of_address(miner.address()), 100.0);

        blockchain.mine_pending_transactions(miner.address());
        assert_eq!(blockchain.get_balance_of_address(miner.address()), 200.0);
    }

    #[test]
    fn test_balance_replay() {
        let (blockchain, alice, bob) = three_block_chain();

        // Alice: -10 + 4 + reward from block 1; Bob's reward sits in the tip
        assert_eq!(blockchain.get_balance_of_address(alice.address()), 94.0);
        assert_eq!(blockchain.get_balance_of_address(bob.address()), 6.0);
        assert_eq!(blockchain.get_balance_of_address(Wallet::new().address()), 0.0);
    }

    #[test]
    fn test_blockchain_validity() {
        let (blockchain, _, _) = three_block_chain();

        assert_eq!(blockchain.chain().len(), 3);
        assert_eq!(blockchain.validate_chain(), Ok(()));
        assert!(blockchain.is_chain_valid());
    }

    #[test]
    fn test_detects_tampered_amount() {
        let (mut blockchain, _, _) = three_block_chain();

        blockchain.transactions_mut(1)[0].amount = 1000.0;

        assert!(!blockchain.is_chain_valid());
        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError::InvalidTransactions { index: 1 })
        );
    }

    #[test]
    fn test_detects_stale_hash() {
        let (mut blockchain, _, _) = three_block_chain();

        // Swap in a different, still validly signed payment
        let alice = Wallet::new();
        let replacement = signed_transfer(&alice, &alice.address().clone(), 1.0);
        blockchain.transactions_mut(1)[0] = replacement;

        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError::HashMismatch { index: 1 })
        );
    }

    #[test]
    fn test_detects_broken_link() {
        let (mut blockchain, _, _) = three_block_chain();

        let other_hash = blockchain.chain[2].hash.clone();
        let block = &mut blockchain.chain[1];
        block.previous_hash = other_hash;
        block.hash = block.calculate_hash();

        assert!(!blockchain.is_chain_valid());
        // Block 1 is self-consistent, so the link check trips first
        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError::BrokenLink { index: 1 })
        );
    }

    #[test]
    fn test_detects_removed_block() {
        let (mut blockchain, _, _) = three_block_chain();

        blockchain.chain.remove(1);

        assert_eq!(
            blockchain.validate_chain(),
            Err(ChainValidationError::BrokenLink { index: 1 })
        );
    }

    #[test]
    fn test_detects_marker_after_genesis() {
        let blockchain = Blockchain::with_config(test_config(1)).unwrap();
        let genesis = blockchain.get_latest_block().clone();

        let mut forged = Block::with_timestamp(
            1,
            BlockData::Marker("mint 1000000 to me".to_string()),
            genesis.hash.clone(),
        );
        forged.mine(1);

        let forged_chain = Blockchain::from_blocks(vec![genesis, forged], test_config(1)).unwrap();

        assert!(!forged_chain.is_chain_valid());
        assert_eq!(
            forged_chain.validate_chain(),
            Err(ChainValidationError::UnexpectedMarker { index: 1 })
        );
    }

    #[test]
    fn test_detects_missing_work() {
        let mut blockchain = Blockchain::with_config(test_config(0)).unwrap();
        let miner = Wallet::new();

        // Find a tip whose hash does not start with a zero
        loop {
            blockchain.mine_pending_transactions(miner.address());
            if !blockchain.get_latest_block().hash.starts_with('0') {
                break;
            }
        }

        blockchain.difficulty = 1;
        assert!(matches!(
            blockchain.validate_chain(),
            Err(ChainValidationError::InsufficientWork { difficulty: 1, .. })
        ));
    }

    #[test]
    fn test_from_blocks() {
        let (blockchain, alice, _) = three_block_chain();
        let json = serde_json::to_string(blockchain.chain()).unwrap();
        let blocks: Vec<Block> = serde_json::from_str(&json).unwrap();

        let restored = Blockchain::from_blocks(blocks, test_config(1)).unwrap();
        assert!(restored.is_chain_valid());
        assert_eq!(
            restored.get_balance_of_address(alice.address()),
            blockchain.get_balance_of_address(alice.address())
        );

        let result = Blockchain::from_blocks(Vec::new(), test_config(1));
        assert!(matches!(result, Err(BlockchainError::InvalidChain(_))));

        let fake_genesis = Block::new(Vec::new(), "0".to_string());
        let result = Blockchain::from_blocks(vec![fake_genesis], test_config(1));
        assert!(matches!(result, Err(BlockchainError::InvalidChain(_))));
    }

    #[test]
    fn test_with_config_rejects_invalid() {
        let config = LedgerConfig {
            mining_reward: -1.0,
            ..LedgerConfig::default()
        };

        let result = Blockchain::with_config(config);
        assert!(matches!(result, Err(BlockchainError::Config(_))));
    }

    #[test]
    fn test_independent_ledgers() {
        let mut first = Blockchain::with_config(test_config(0)).unwrap();
        let second = Blockchain::with_config(test_config(0)).unwrap();

        first.mine_pending_transactions(Wallet::new().address());

        assert_eq!(first.chain().len(), 2);
        assert_eq!(second.chain().len(), 1);
    }
}
