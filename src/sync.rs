//! Chain synchronization by whole-chain gossip.
//!
//! Every established connection runs two tasks:
//! - a reader that decodes one chain per line and offers it to the shared
//!   state, where the fork-choice rule decides whether it replaces ours
//! - a writer that forwards every locally mined chain to the peer
//!
//! A single operator loop per node turns input lines into mined blocks and
//! publishes the resulting chain to all writers at once.

use crate::blockchain::{Chain, ChainHandle, RecordPayload};
use crate::error::ChainError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// One serialized chain, without its trailing newline.
pub type GossipLine = Arc<str>;

/// Fan-out of locally produced chains to every connected peer.
#[derive(Debug, Clone)]
pub struct Gossip {
    tx: broadcast::Sender<GossipLine>,
}

impl Gossip {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GossipLine> {
        self.tx.subscribe()
    }

    /// Queue `chain` for every connected writer; returns how many were reached.
    pub fn publish(&self, chain: &Chain) -> Result<usize, ChainError> {
        let line: GossipLine = Arc::from(chain.to_line()?);
        Ok(self.tx.send(line).unwrap_or(0))
    }

    /// Number of connections currently listening for gossip.
    pub fn peer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Counters for inbound gossip
#[derive(Debug, Default)]
pub struct SyncStats {
    chains_received: AtomicU64,
    chains_adopted: AtomicU64,
    malformed_lines: AtomicU64,
}

impl SyncStats {
    pub fn chains_received(&self) -> u64 {
        self.chains_received.load(Ordering::Relaxed)
    }

    pub fn chains_adopted(&self) -> u64 {
        self.chains_adopted.load(Ordering::Relaxed)
    }

    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines.load(Ordering::Relaxed)
    }
}

/// What a connection needs from the node.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub chain: ChainHandle,
    pub gossip: Gossip,
    pub stats: Arc<SyncStats>,
    /// Send our current chain as soon as the connection opens.
    pub announce_on_connect: bool,
}

/// Reads one newline-terminated line into `buf` as raw bytes.
///
/// Returns `false` at end of stream. Content is not decoded here, so only
/// transport failures surface as errors.
async fn read_raw_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> Result<bool, ChainError>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    Ok(reader.read_until(b'\n', buf).await? > 0)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Reads chains from a peer until end of stream.
///
/// Blank lines are skipped. Lines that are not UTF-8 or not a chain are
/// logged, counted as malformed and skipped. Transport errors end the loop
/// with the error.
pub async fn run_reader<R>(
    peer: &str,
    mut reader: R,
    chain: &ChainHandle,
    stats: &SyncStats,
) -> Result<(), ChainError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    while read_raw_line(&mut reader, &mut buf).await? {
        if is_blank(&buf) {
            continue;
        }

        stats.chains_received.fetch_add(1, Ordering::Relaxed);
        let decoded = std::str::from_utf8(&buf)
            .map_err(|e| ChainError::SerializationError(e.to_string()))
            .and_then(Chain::from_line);
        let candidate = match decoded {
            Ok(candidate) => candidate,
            Err(e) => {
                stats.malformed_lines.fetch_add(1, Ordering::Relaxed);
                warn!("Discarding malformed chain from {}: {}", peer, e);
                continue;
            }
        };

        if chain.offer(candidate).await?.is_adopt() {
            stats.chains_adopted.fetch_add(1, Ordering::Relaxed);
        }
    }

    debug!("{} closed the stream", peer);
    Ok(())
}

/// Writes every published chain to a peer, one line each, flushing after
/// every line.
pub async fn run_writer<W>(
    peer: &str,
    mut writer: W,
    mut feed: broadcast::Receiver<GossipLine>,
    announce: Option<GossipLine>,
) -> Result<(), ChainError>
where
    W: AsyncWrite + Unpin,
{
    if let Some(line) = announce {
        write_line(&mut writer, &line).await?;
    }

    loop {
        match feed.recv().await {
            Ok(line) => write_line(&mut writer, &line).await?,
            // Each line is a whole chain, so only the newest one matters.
            Err(RecvError::Lagged(skipped)) => {
                warn!("Writer for {} skipped {} stale chain(s)", peer, skipped);
            }
            Err(RecvError::Closed) => return Ok(()),
        }
    }
}

async fn write_line<W>(writer: &mut W, line: &str) -> Result<(), ChainError>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

/// Turns operator input into mined blocks and broadcasts the new chain.
///
/// Each input line is a JSON record such as
/// `{"Location": "hawaii", "WaveHeight": 4}`. Bad lines are logged and
/// skipped, including bytes that are not UTF-8. Returns `Ok(())` when input
/// ends, or the append error once a local append fails
/// ([`ChainError::IntegrityViolation`] for an invalid extended chain), after
/// which no further blocks are mined.
pub async fn run_operator<R>(
    mut input: R,
    chain: &ChainHandle,
    gossip: &Gossip,
) -> Result<(), ChainError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();

    while read_raw_line(&mut input, &mut buf).await? {
        if is_blank(&buf) {
            continue;
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim(),
            Err(e) => {
                warn!("Ignoring operator input that is not UTF-8: {}", e);
                continue;
            }
        };

        let payload: RecordPayload = match serde_json::from_str(line) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Ignoring operator input {:?}: {}", line, e);
                continue;
            }
        };

        let updated = match chain.append(payload).await {
            Ok(updated) => updated,
            Err(e) => {
                error!("Stopping local block production: {}", e);
                return Err(e);
            }
        };

        let delivered = gossip.publish(&updated)?;
        info!(
            "Broadcast chain of {} blocks to {} peer(s)",
            updated.len(),
            delivered
        );
    }

    info!("Operator input closed");
    Ok(())
}

/// Runs the reader and writer for one connection until either side finishes
/// or `shutdown` fires. The surviving half is cancelled.
pub async fn serve_connection<R, W>(
    peer: String,
    reader: R,
    writer: W,
    ctx: ConnectionContext,
    mut shutdown: broadcast::Receiver<()>,
) where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    // Subscribe before taking the snapshot so nothing published in between
    // is lost.
    let feed = ctx.gossip.subscribe();
    let announce = if ctx.announce_on_connect {
        match ctx.chain.snapshot().await.and_then(|c| c.to_line()) {
            Ok(line) => Some(GossipLine::from(line)),
            Err(e) => {
                warn!("Could not announce chain to {}: {}", peer, e);
                None
            }
        }
    } else {
        None
    };

    let mut reader_task = tokio::spawn({
        let peer = peer.clone();
        let chain = ctx.chain.clone();
        let stats = ctx.stats.clone();
        async move { run_reader(&peer, reader, &chain, &stats).await }
    });
    let mut writer_task = tokio::spawn({
        let peer = peer.clone();
        async move { run_writer(&peer, writer, feed, announce).await }
    });

    tokio::select! {
        res = &mut reader_task => {
            writer_task.abort();
            log_exit(&peer, "reader", res);
        }
        res = &mut writer_task => {
            reader_task.abort();
            log_exit(&peer, "writer", res);
        }
        _ = shutdown.recv() => {
            reader_task.abort();
            writer_task.abort();
            debug!("Closing connection to {} for shutdown", peer);
        }
    }
}

fn log_exit(peer: &str, half: &str, res: Result<Result<(), ChainError>, JoinError>) {
    match res {
        Ok(Ok(())) => info!("Connection to {} closed ({} finished)", peer, half),
        Ok(Err(e)) => warn!("Connection to {} dropped: {} failed: {}", peer, half, e),
        Err(e) => error!("{} task for {} panicked: {}", half, peer, e),
    }
}
