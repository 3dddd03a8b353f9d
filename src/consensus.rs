//! Fork choice between the local chain and a chain received from a peer.

use crate::blockchain::Chain;
use crate::error::ChainError;
use serde::Deserialize;

/// Rule used to decide whether a gossiped chain replaces the local one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum ForkChoice {
    /// Longest chain wins. The candidate is NOT validated: any peer can
    /// replace the local ledger by sending a longer chain, well-formed or not.
    #[default]
    #[serde(rename = "longest")]
    LongestChain,
    /// Longest chain wins, but only if the candidate passes
    /// [`Chain::verify_full`]: minable difficulty, genesis first, proof of
    /// work on every block and every link intact.
    #[serde(rename = "longest-valid")]
    LongestValidChain,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Adopt,
    KeepLocal,
    Reject(ChainError),
}

impl Verdict {
    pub fn is_adopt(&self) -> bool {
        matches!(self, Verdict::Adopt)
    }
}

/// Compares block counts only; ties keep the local chain.
pub fn select(rule: ForkChoice, local: &Chain, candidate: &Chain) -> Verdict {
    if candidate.len() <= local.len() {
        return Verdict::KeepLocal;
    }

    match rule {
        ForkChoice::LongestChain => Verdict::Adopt,
        ForkChoice::LongestValidChain => match candidate.verify_full() {
            Ok(()) => Verdict::Adopt,
            Err(e) => Verdict::Reject(e),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{RecordPayload, MAX_DIFFICULTY};

    fn chain_of(len: usize) -> Chain {
        let mut chain = Chain::new(1);
        for i in 1..len {
            chain.append(RecordPayload::new("pipeline", i as i64)).unwrap();
        }
        chain
    }

    #[test]
    fn test_longer_candidate_wins_by_length() {
        let local = chain_of(3);
        let mut candidate = chain_of(5);
        candidate.blocks[3].previous_hash = "forged".to_string();

        assert_eq!(select(ForkChoice::LongestChain, &local, &candidate), Verdict::Adopt);
    }

    #[test]
    fn test_equal_or_shorter_keeps_local() {
        let local = chain_of(3);
        assert_eq!(select(ForkChoice::LongestChain, &local, &chain_of(3)), Verdict::KeepLocal);
        assert_eq!(select(ForkChoice::LongestChain, &local, &chain_of(2)), Verdict::KeepLocal);
    }

    #[test]
    fn test_longest_valid_rejects_broken_candidate() {
        let local = chain_of(3);
        let mut candidate = chain_of(5);
        candidate.blocks[4].data.location = "forged".to_string();

        assert_eq!(
            select(ForkChoice::LongestValidChain, &local, &candidate),
            Verdict::Reject(ChainError::InvalidHash { height: 4 })
        );
        assert!(select(ForkChoice::LongestValidChain, &local, &chain_of(5)).is_adopt());
    }

    #[test]
    fn test_longest_valid_rejects_unusable_difficulty() {
        let local = chain_of(1);
        let mut candidate = Chain::new(1);
        candidate.append(RecordPayload::new("nazare", 30)).unwrap();

        let mut too_hard = candidate.clone();
        too_hard.difficulty = MAX_DIFFICULTY + 1;
        assert_eq!(
            select(ForkChoice::LongestValidChain, &local, &too_hard),
            Verdict::Reject(ChainError::InvalidDifficulty(MAX_DIFFICULTY + 1))
        );

        let mut free = candidate;
        free.difficulty = 0;
        assert_eq!(
            select(ForkChoice::LongestValidChain, &local, &free),
            Verdict::Reject(ChainError::InvalidDifficulty(0))
        );
    }

    #[test]
    fn test_longest_valid_rejects_missing_work() {
        let local = chain_of(1);
        // Links still verify after re-grinding away the leading zero.
        let mut candidate = chain_of(2);
        let block = &mut candidate.blocks[1];
        while block.hash.starts_with('0') {
            block.pow += 1;
            block.hash = block.compute_hash();
        }
        assert!(candidate.verify().is_ok());

        assert_eq!(
            select(ForkChoice::LongestValidChain, &local, &candidate),
            Verdict::Reject(ChainError::InsufficientWork { height: 1 })
        );
    }

    #[test]
    fn test_rule_names_in_config() {
        #[derive(Deserialize)]
        struct Wrapper {
            rule: ForkChoice,
        }
        let w: Wrapper = toml::from_str(r#"rule = "longest-valid""#).unwrap();
        assert_eq!(w.rule, ForkChoice::LongestValidChain);
        let w: Wrapper = toml::from_str(r#"rule = "longest""#).unwrap();
        assert_eq!(w.rule, ForkChoice::LongestChain);
    }
}
