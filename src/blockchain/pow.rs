// Proof of work
//
// The nonce search is kept apart from Block and Blockchain so the
// strategy can change without touching ledger logic.

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::hash::{hash_fields, meets_difficulty};

/// Nonces handed to the worker pool per round by default
pub const DEFAULT_BATCH_SIZE: u64 = 4096;

/// Hashes a block preimage followed by a candidate nonce
pub fn hash_with_nonce(preimage: &str, nonce: u64) -> String {
    let nonce = nonce.to_string();
    hash_fields([preimage, nonce.as_str()])
}

/// A qualifying nonce and the hash it produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub nonce: u64,
    pub hash: String,
}

/// State of a sequential nonce search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchState {
    Searching { nonce: u64 },
    Found { nonce: u64, hash: String },
}

/// Sequential search, one nonce per step
#[derive(Debug)]
pub struct ProofOfWork<'a> {
    preimage: &'a str,
    difficulty: usize,
    state: SearchState,
}

impl<'a> ProofOfWork<'a> {
    pub fn new(preimage: &'a str, start_nonce: u64, difficulty: usize) -> Self {
        ProofOfWork {
            preimage,
            difficulty,
            state: SearchState::Searching { nonce: start_nonce },
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Tries the current nonce and advances the state
    ///
    /// Once `Found`, further steps leave the state unchanged.
    pub fn step(&mut self) -> &SearchState {
        if let SearchState::Searching { nonce } = self.state {
            let hash = hash_with_nonce(self.preimage, nonce);
            trace!("hash attempt {}: {}", nonce, hash);

            self.state = if meets_difficulty(&hash, self.difficulty) {
                SearchState::Found { nonce, hash }
            } else {
                SearchState::Searching {
                    nonce: nonce.wrapping_add(1),
                }
            };
        }

        &self.state
    }

    /// Steps until a qualifying nonce is found
    pub fn run(mut self) -> Solution {
        loop {
            if let SearchState::Found { nonce, hash } = self.step() {
                return Solution {
                    nonce: *nonce,
                    hash: hash.clone(),
                };
            }
        }
    }
}

/// How a block's nonce is searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MiningStrategy {
    /// One nonce at a time on the calling thread
    #[default]
    Sequential,

    /// Batches of nonces spread over the rayon pool
    ///
    /// Always returns the lowest qualifying nonce, the same one the
    /// sequential search finds.
    Parallel {
        #[serde(default = "default_batch_size")]
        batch_size: u64,
    },
}

fn default_batch_size() -> u64 {
    DEFAULT_BATCH_SIZE
}

impl MiningStrategy {
    /// Finds the first nonce at or after `start_nonce` whose hash meets `difficulty`
    pub fn search(&self, preimage: &str, start_nonce: u64, difficulty: usize) -> Solution {
        match *self {
            MiningStrategy::Sequential => {
                ProofOfWork::new(preimage, start_nonce, difficulty).run()
            }
            MiningStrategy::Parallel { batch_size } => {
                parallel_search(preimage, start_nonce, difficulty, batch_size.max(1))
            }
        }
    }
}

fn parallel_search(preimage: &str, start_nonce: u64, difficulty: usize, batch_size: u64) -> Solution {
    let mut batch_start = start_nonce;

    loop {
        let batch_end = batch_start.saturating_add(batch_size);

        let found = (batch_start..batch_end)
            .into_par_iter()
            .map(|nonce| (nonce, hash_with_nonce(preimage, nonce)))
            .find_first(|(_, hash)| meets_difficulty(hash, difficulty));

        if let Some((nonce, hash)) = found {
            return Solution { nonce, hash };
        }

        debug!("no solution in nonces {}..{}", batch_start, batch_end);
        batch_start = batch_end;
    }
}
