use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature, Wallet};
use super::hash::digest_fields;

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Authorization error: {0}")]
    AuthorizationError(String),

    #[error("No signature in this transaction")]
    MissingSignature,

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// Represents a transfer of value between two identities
///
/// A transaction without a sender is a mining reward and needs no signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Sender's address, `None` for a mining reward
    pub from_address: Option<Address>,

    /// Recipient's address
    pub to_address: Address,

    /// Amount being transferred
    pub amount: f64,

    /// Digital signature over the transaction digest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,
}

impl Transaction {
    /// Creates a new unsigned transfer
    pub fn new(from_address: Address, to_address: Address, amount: f64) -> Self {
        Transaction {
            from_address: Some(from_address),
            to_address,
            amount,
            signature: None,
        }
    }

    /// Creates a new reward transaction (no sender, never signed)
    pub fn new_reward(to_address: Address, amount: f64) -> Self {
        Transaction {
            from_address: None,
            to_address,
            amount,
            signature: None,
        }
    }

    /// Checks if the transaction is a mining reward
    pub fn is_reward(&self) -> bool {
        self.from_address.is_none()
    }

    /// Digest of `from ‖ to ‖ amount`, the bytes that get signed
    ///
    /// A reward transaction hashes an empty sender field.
    pub fn calculate_digest(&self) -> [u8; 32] {
        let from = self.from_address.as_ref().map(Address::as_str).unwrap_or("");
        let amount = self.amount.to_string();

        digest_fields([from, self.to_address.as_str(), amount.as_str()])
    }

    /// Signs the transaction with a wallet
    ///
    /// Only the wallet whose address is the sender may sign. Signing again
    /// replaces the previous signature.
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), TransactionError> {
        match &self.from_address {
            Some(sender) if sender == wallet.address() => {}
            _ => {
                return Err(TransactionError::AuthorizationError(
                    "You cannot sign transactions for other wallets".to_string(),
                ))
            }
        }

        let digest = self.calculate_digest();
        self.signature = Some(wallet.sign(&digest));

        Ok(())
    }

    /// Checks the transaction's signature against its sender
    ///
    /// Reward transactions are always valid. A transfer without a signature
    /// is an error, not an invalid result.
    pub fn is_valid(&self) -> Result<bool, TransactionError> {
        let sender = match &self.from_address {
            Some(sender) => sender,
            None => return Ok(true),
        };

        let signature = match &self.signature {
            Some(sig) if !sig.is_empty() => sig,
            _ => return Err(TransactionError::MissingSignature),
        };

        let public_key = sender.to_public_key()?;
        let digest = self.calculate_digest();

        verify_signature(&digest, signature, &public_key).map_err(TransactionError::from)
    }
}
