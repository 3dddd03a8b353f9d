//! The node's current chain, owned by a single task.
//!
//! Readers, writers and the operator loop never touch the chain directly.
//! They send commands through a [`ChainHandle`] and the owner applies them
//! one at a time, so every snapshot, replacement and append is totally
//! ordered by the command queue and no partial update is ever observable.

use crate::consensus::{self, ForkChoice, Verdict};
use crate::error::ChainError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::block::RecordPayload;
use super::chain::Chain;

const COMMAND_QUEUE: usize = 256;

enum Command {
    Snapshot {
        reply: oneshot::Sender<Chain>,
    },
    Offer {
        candidate: Chain,
        reply: oneshot::Sender<Verdict>,
    },
    Append {
        payload: RecordPayload,
        reply: oneshot::Sender<Result<Chain, ChainError>>,
    },
}

/// Cloneable access to the shared chain.
#[derive(Debug, Clone)]
pub struct ChainHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Snapshot { .. } => write!(f, "Snapshot"),
            Command::Offer { candidate, .. } => write!(f, "Offer({} blocks)", candidate.len()),
            Command::Append { payload, .. } => write!(f, "Append({:?})", payload),
        }
    }
}

impl ChainHandle {
    /// Clone of the current chain.
    pub async fn snapshot(&self) -> Result<Chain, ChainError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Offer a chain received from a peer.
    ///
    /// Under [`ForkChoice::LongestChain`] a strictly longer candidate replaces
    /// the local chain without being validated. This is the protocol's trust
    /// assumption: peers are believed. Use [`ForkChoice::LongestValidChain`]
    /// to verify candidates first.
    pub async fn offer(&self, candidate: Chain) -> Result<Verdict, ChainError> {
        self.request(|reply| Command::Offer { candidate, reply }).await
    }

    /// Mine `payload` onto the current chain and return the updated chain.
    ///
    /// Fails with [`ChainError::IntegrityViolation`] when the extended chain
    /// does not verify, or with the mining error when no block can be added
    /// (unminable difficulty, height overflow). The current chain is then
    /// left untouched.
    pub async fn append(&self, payload: RecordPayload) -> Result<Chain, ChainError> {
        self.request(|reply| Command::Append { payload, reply })
            .await?
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ChainError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| ChainError::StateUnavailable)?;
        response.await.map_err(|_| ChainError::StateUnavailable)
    }
}

/// Owner of the current chain.
pub struct SharedChain {
    chain: Chain,
    rule: ForkChoice,
    rx: mpsc::Receiver<Command>,
}

impl SharedChain {
    /// Start the owner task. It stops once every handle is dropped.
    pub fn spawn(chain: Chain, rule: ForkChoice) -> ChainHandle {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
        let owner = SharedChain { chain, rule, rx };
        tokio::spawn(owner.run());
        ChainHandle { tx }
    }

    async fn run(mut self) {
        while let Some(command) = self.rx.recv().await {
            debug!("chain owner: {:?}", command);
            match command {
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.chain.clone());
                }
                Command::Offer { candidate, reply } => {
                    let verdict = self.offer(candidate);
                    let _ = reply.send(verdict);
                }
                Command::Append { payload, reply } => {
                    let result = self.append(payload).await;
                    let _ = reply.send(result);
                }
            }
        }
        debug!("Chain owner stopped");
    }

    fn offer(&mut self, candidate: Chain) -> Verdict {
        let verdict = consensus::select(self.rule, &self.chain, &candidate);
        match &verdict {
            Verdict::Adopt => {
                info!(
                    "Adopted peer chain: {} -> {} blocks (tip {})",
                    self.chain.len(),
                    candidate.len(),
                    candidate.tip().map(|b| b.short_hash()).unwrap_or("-")
                );
                self.chain = candidate;
            }
            Verdict::KeepLocal => {
                debug!(
                    "Ignored peer chain of {} blocks (local has {})",
                    candidate.len(),
                    self.chain.len()
                );
            }
            Verdict::Reject(e) => {
                warn!("Rejected peer chain of {} blocks: {}", candidate.len(), e);
            }
        }
        verdict
    }

    // Mining runs off the async workers, but the owner waits for it, so no
    // offer can land between the append and its verification.
    async fn append(&mut self, payload: RecordPayload) -> Result<Chain, ChainError> {
        let mut next = self.chain.clone();
        let next = tokio::task::spawn_blocking(move || {
            next.append(payload)?;
            Ok::<_, ChainError>(next)
        })
        .await
        .map_err(|e| ChainError::IntegrityViolation(format!("mining task failed: {}", e)))??;

        if let Err(e) = next.verify() {
            error!("Chain isn't valid anymore after local append: {}", e);
            return Err(ChainError::IntegrityViolation(e.to_string()));
        }

        if let Some(tip) = next.tip() {
            info!(
                "Mined block {} ({}) with pow {}",
                tip.height,
                tip.short_hash(),
                tip.pow
            );
        }
        self.chain = next.clone();
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::MAX_DIFFICULTY;
    use std::time::Duration;

    #[tokio::test]
    async fn test_snapshot_starts_at_genesis() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let handle = SharedChain::spawn(Chain::new(1), ForkChoice::LongestChain);
            let chain = handle.snapshot().await.unwrap();
            assert_eq!(chain.len(), 1);
            assert!(chain.blocks[0].is_genesis());
        })
        .await
        .expect("test_snapshot_starts_at_genesis timed out");
    }

    #[tokio::test]
    async fn test_append_commits_mined_block() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let handle = SharedChain::spawn(Chain::new(1), ForkChoice::LongestChain);
            let returned = handle.append(RecordPayload::new("hawaii", 4)).await.unwrap();
            let current = handle.snapshot().await.unwrap();

            assert_eq!(returned, current);
            assert_eq!(current.len(), 2);
            assert!(current.blocks[1].hash.starts_with('0'));
            assert!(current.is_valid());
        })
        .await
        .expect("test_append_commits_mined_block timed out");
    }

    #[tokio::test]
    async fn test_offer_replaces_only_when_longer() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let handle = SharedChain::spawn(Chain::new(0), ForkChoice::LongestChain);
            handle.append(RecordPayload::new("oahu", 6)).await.unwrap();

            let mut same_length = Chain::new(0);
            same_length.append(RecordPayload::new("kauai", 1)).unwrap();
            let mut longer = Chain::new(0);
            longer.append(RecordPayload::new("maui", 2)).unwrap();
            longer.append(RecordPayload::new("maui", 3)).unwrap();

            assert_eq!(handle.offer(same_length).await.unwrap(), Verdict::KeepLocal);
            assert_eq!(handle.offer(longer.clone()).await.unwrap(), Verdict::Adopt);
            assert_eq!(handle.snapshot().await.unwrap(), longer);
        })
        .await
        .expect("test_offer_replaces_only_when_longer timed out");
    }

    #[tokio::test]
    async fn test_append_onto_forged_chain_is_fatal() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let handle = SharedChain::spawn(Chain::new(0), ForkChoice::LongestChain);

            let mut forged = Chain::new(0);
            forged.append(RecordPayload::new("nazare", 30)).unwrap();
            forged.blocks[1].data.wave_height = 80;
            assert!(handle.offer(forged.clone()).await.unwrap().is_adopt());

            let result = handle.append(RecordPayload::new("jaws", 20)).await;
            assert!(matches!(result, Err(ChainError::IntegrityViolation(_))));
            assert_eq!(handle.snapshot().await.unwrap(), forged);
        })
        .await
        .expect("test_append_onto_forged_chain_is_fatal timed out");
    }

    #[tokio::test]
    async fn test_verifying_rule_rejects_forged_chain() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let local = Chain::new(1);
            let handle = SharedChain::spawn(local.clone(), ForkChoice::LongestValidChain);

            let mut forged = Chain::new(1);
            forged.append(RecordPayload::new("nazare", 30)).unwrap();
            forged.blocks[1].previous_hash = "f00d".to_string();

            let verdict = handle.offer(forged).await.unwrap();
            assert!(matches!(verdict, Verdict::Reject(_)));
            assert_eq!(handle.snapshot().await.unwrap(), local);
        })
        .await
        .expect("test_verifying_rule_rejects_forged_chain timed out");
    }

    #[tokio::test]
    async fn test_overflowing_height_leaves_owner_running() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let local = Chain::new(1);
            let handle = SharedChain::spawn(local.clone(), ForkChoice::LongestValidChain);

            let mut hostile = Chain::new(1);
            hostile.append(RecordPayload::new("nazare", 30)).unwrap();
            hostile.blocks[0].height = u64::MAX;

            let verdict = handle.offer(hostile).await.unwrap();
            assert!(matches!(verdict, Verdict::Reject(_)));
            assert_eq!(handle.snapshot().await.unwrap(), local);
        })
        .await
        .expect("test_overflowing_height_leaves_owner_running timed out");
    }

    #[tokio::test]
    async fn test_append_after_adopting_overflowing_height_fails() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let handle = SharedChain::spawn(Chain::new(0), ForkChoice::LongestChain);

            let mut hostile = Chain::new(0);
            hostile.append(RecordPayload::new("nazare", 30)).unwrap();
            hostile.blocks[1].height = u64::MAX;
            assert!(handle.offer(hostile.clone()).await.unwrap().is_adopt());

            let result = handle.append(RecordPayload::new("jaws", 20)).await;
            assert_eq!(
                result,
                Err(ChainError::HeightOverflow { height: u64::MAX })
            );
            assert_eq!(handle.snapshot().await.unwrap(), hostile);
        })
        .await
        .expect("test_append_after_adopting_overflowing_height_fails timed out");
    }

    #[tokio::test]
    async fn test_unminable_difficulty_does_not_stall_owner() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let handle = SharedChain::spawn(Chain::new(1), ForkChoice::LongestChain);

            let mut too_hard = Chain::new(1);
            too_hard.append(RecordPayload::new("nazare", 30)).unwrap();
            too_hard.difficulty = MAX_DIFFICULTY + 1;
            assert!(handle.offer(too_hard.clone()).await.unwrap().is_adopt());

            let result = handle.append(RecordPayload::new("jaws", 20)).await;
            assert_eq!(result, Err(ChainError::InvalidDifficulty(MAX_DIFFICULTY + 1)));
            assert_eq!(handle.snapshot().await.unwrap(), too_hard);
        })
        .await
        .expect("test_unminable_difficulty_does_not_stall_owner timed out");
    }

    #[tokio::test]
    async fn test_verifying_rule_rejects_unminable_difficulty() {
        tokio::time::timeout(Duration::from_secs(5), async {
            let local = Chain::new(1);
            let handle = SharedChain::spawn(local.clone(), ForkChoice::LongestValidChain);

            let mut too_hard = Chain::new(1);
            too_hard.append(RecordPayload::new("nazare", 30)).unwrap();
            too_hard.difficulty = MAX_DIFFICULTY + 1;

            assert_eq!(
                handle.offer(too_hard).await.unwrap(),
                Verdict::Reject(ChainError::InvalidDifficulty(MAX_DIFFICULTY + 1))
            );
            handle.append(RecordPayload::new("jaws", 20)).await.unwrap();
            assert_eq!(handle.snapshot().await.unwrap().len(), 2);
        })
        .await
        .expect("test_verifying_rule_rejects_unminable_difficulty timed out");
    }
}
