use crate::error::ChainError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::block::{Block, RecordPayload, MAX_DIFFICULTY};
use super::validation::{validate_blocks, validate_difficulty, validate_work};

/// The replicated ledger. Serialized whole, one JSON object per gossip line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    #[serde(rename = "GenesisBlock")]
    pub genesis_block: Block,
    #[serde(rename = "Chain")]
    pub blocks: Vec<Block>,
    #[serde(rename = "Difficulty")]
    pub difficulty: usize,
}

impl Chain {
    /// Create a chain holding only a fresh genesis block.
    pub fn new(difficulty: usize) -> Self {
        let genesis_block = Block::genesis();
        Chain {
            blocks: vec![genesis_block.clone()],
            genesis_block,
            difficulty,
        }
    }

    /// Mine a block carrying `payload` on top of the tip and push it.
    ///
    /// Blocks until the proof of work is found. Refuses difficulties that
    /// could never be met and tips whose height has no successor.
    pub fn append(&mut self, payload: RecordPayload) -> Result<&Block, ChainError> {
        if self.difficulty > MAX_DIFFICULTY {
            return Err(ChainError::InvalidDifficulty(self.difficulty));
        }

        let tip = self.blocks.last().unwrap_or(&self.genesis_block);
        let height = tip
            .height
            .checked_add(1)
            .ok_or(ChainError::HeightOverflow { height: tip.height })?;

        let mut block = Block::new(payload, tip.hash.clone(), height);
        block.mine(self.difficulty);
        self.blocks.push(block);
        Ok(&self.blocks[self.blocks.len() - 1])
    }

    /// Reports the first failing link check, if any.
    pub fn verify(&self) -> Result<(), ChainError> {
        validate_blocks(&self.blocks)
    }

    /// Link checks plus everything needed to trust a chain from a peer:
    /// a minable difficulty, a genesis first block and proof of work on
    /// every other block.
    pub fn verify_full(&self) -> Result<(), ChainError> {
        validate_difficulty(self.difficulty)?;
        validate_work(&self.blocks, self.difficulty)?;
        self.verify()
    }

    pub fn is_valid(&self) -> bool {
        match self.verify() {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Single-line JSON, safe to frame with a trailing newline.
    pub fn to_line(&self) -> Result<String, ChainError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_line(line: &str) -> Result<Self, ChainError> {
        Ok(serde_json::from_str(line.trim_end_matches(['\r', '\n']))?)
    }
}
