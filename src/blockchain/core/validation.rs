use crate::error::ChainError;

use super::block::{meets_difficulty, Block, MAX_DIFFICULTY};

/// Checks one link of the chain: height, then hash, then previous hash.
pub fn validate_link(previous: &Block, current: &Block) -> Result<(), ChainError> {
    let expected = previous
        .height
        .checked_add(1)
        .ok_or(ChainError::HeightOverflow {
            height: previous.height,
        })?;
    if current.height != expected {
        return Err(ChainError::InvalidHeight {
            height: current.height,
            expected,
        });
    }

    if current.hash != current.compute_hash() {
        return Err(ChainError::InvalidHash {
            height: current.height,
        });
    }

    if current.previous_hash != previous.hash {
        return Err(ChainError::InvalidLinkage {
            height: current.height,
        });
    }

    Ok(())
}

/// Validates every adjacent pair, stopping at the first failure.
/// Empty and single-block sequences are trivially valid.
pub fn validate_blocks(blocks: &[Block]) -> Result<(), ChainError> {
    blocks
        .windows(2)
        .try_for_each(|pair| validate_link(&pair[0], &pair[1]))
}

/// A difficulty this node could mine on top of.
pub fn validate_difficulty(difficulty: usize) -> Result<(), ChainError> {
    if difficulty == 0 || difficulty > MAX_DIFFICULTY {
        return Err(ChainError::InvalidDifficulty(difficulty));
    }
    Ok(())
}

/// The first block is a genesis block and every later block carries the
/// required leading zeros.
pub fn validate_work(blocks: &[Block], difficulty: usize) -> Result<(), ChainError> {
    match blocks.first() {
        Some(first) if first.is_genesis() => {}
        Some(_) => return Err(ChainError::InvalidGenesis),
        None => return Ok(()),
    }

    match blocks
        .iter()
        .skip(1)
        .find(|block| !meets_difficulty(&block.hash, difficulty))
    {
        Some(block) => Err(ChainError::InsufficientWork {
            height: block.height,
        }),
        None => Ok(()),
    }
}
