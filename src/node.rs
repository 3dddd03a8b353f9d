use crate::blockchain::{Chain, ChainHandle, SharedChain};
use crate::config::{Config, LoggingConfig};
use crate::error::ChainError;
use crate::network::NetworkNode;
use crate::sync::{run_operator, ConnectionContext, Gossip, SyncStats};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufRead;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const HEALTH_INTERVAL: Duration = Duration::from_secs(30);

/// Install the global fmt subscriber. `RUST_LOG` wins over the config level.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,wavechain={}", config.level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

pub struct Node {
    pub config: Config,
    pub chain: ChainHandle,
    pub gossip: Gossip,
    pub stats: Arc<SyncStats>,
    pub network: Arc<NetworkNode>,
    shutdown: broadcast::Sender<()>,
}

impl Node {
    /// Build a node around a fresh genesis chain. Must be called inside a
    /// tokio runtime.
    pub fn new(config: Config) -> Self {
        let chain = SharedChain::spawn(Chain::new(config.chain.difficulty), config.gossip.fork_choice);
        let gossip = Gossip::new(config.gossip.channel_capacity);
        let stats = Arc::new(SyncStats::default());
        let (shutdown, _) = broadcast::channel(1);

        let ctx = ConnectionContext {
            chain: chain.clone(),
            gossip: gossip.clone(),
            stats: stats.clone(),
            announce_on_connect: config.gossip.announce_on_connect,
        };
        let network = Arc::new(NetworkNode::new(ctx, shutdown.clone()));

        Self {
            config,
            chain,
            gossip,
            stats,
            network,
            shutdown,
        }
    }

    /// Listen, dial bootstrap peers plus `extra_peers`, and mine from
    /// `operator` input until Ctrl-C.
    ///
    /// An integrity violation from local mining stops the node with that error.
    pub async fn run<R>(self, operator: R, extra_peers: &[String]) -> Result<(), ChainError>
    where
        R: AsyncBufRead + Unpin,
    {
        info!(
            "Starting WaveChain node (difficulty = {}, fork choice = {:?})",
            self.config.chain.difficulty, self.config.gossip.fork_choice
        );

        let listener = NetworkNode::bind(self.config.network.listen_port).await?;
        let port = listener.local_addr()?.port();
        info!("Run 'wavechain-node --connect 127.0.0.1:{}' on another console.", port);
        info!("Waiting for incoming connections");

        let server = self.network.clone();
        tokio::spawn(async move {
            if let Err(e) = server.start_server(listener).await {
                error!("P2P server failed: {}", e);
            }
        });

        for peer in self.config.network.bootstrap_peers.iter().chain(extra_peers) {
            if let Err(e) = self.network.connect_peer(peer).await {
                warn!("{}", e);
            }
        }

        self.spawn_health_log();

        let outcome = tokio::select! {
            res = run_operator(operator, &self.chain, &self.gossip) => Some(res),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Err(e)) => {
                let _ = self.shutdown.send(());
                return Err(e);
            }
            Some(Ok(())) => {
                info!("Still relaying peer chains; press Ctrl-C to exit");
                let _ = tokio::signal::ctrl_c().await;
            }
            None => {}
        }

        info!("Shutting down");
        let _ = self.shutdown.send(());
        Ok(())
    }

    fn spawn_health_log(&self) {
        let chain = self.chain.clone();
        let gossip = self.gossip.clone();
        let stats = self.stats.clone();
        let mut shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEALTH_INTERVAL);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match chain.snapshot().await {
                            Ok(current) => info!(
                                "Node running: chain length = {}, peers = {}, chains received = {}, adopted = {}, malformed = {}",
                                current.len(),
                                gossip.peer_count(),
                                stats.chains_received(),
                                stats.chains_adopted(),
                                stats.malformed_lines()
                            ),
                            Err(e) => {
                                warn!("{}", e);
                                return;
                            }
                        }
                    }
                    _ = shutdown.recv() => return,
                }
            }
        });
    }
}
