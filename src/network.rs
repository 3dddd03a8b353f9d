//! TCP transport for gossip connections.
//!
//! Each accepted or dialed stream is split into a buffered reader and writer
//! and handed to [`serve_connection`]. Nothing else about the peer is kept.

use crate::error::ChainError;
use crate::sync::{serve_connection, ConnectionContext};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub struct NetworkNode {
    ctx: ConnectionContext,
    shutdown: broadcast::Sender<()>,
}

impl NetworkNode {
    pub fn new(ctx: ConnectionContext, shutdown: broadcast::Sender<()>) -> Self {
        Self { ctx, shutdown }
    }

    pub async fn bind(port: u16) -> Result<TcpListener, ChainError> {
        let addr = format!("0.0.0.0:{}", port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| ChainError::NetworkError(format!("Failed to listen on {}: {}", addr, e)))
    }

    /// Accepts peers until shutdown.
    pub async fn start_server(self: Arc<Self>, listener: TcpListener) -> Result<(), ChainError> {
        let mut shutdown = self.shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            info!("Stream detected from {}", addr);
                            self.spawn_connection(stream, addr);
                        }
                        Err(e) => error!("Failed to accept peer: {}", e),
                    }
                }
                _ = shutdown.recv() => {
                    info!("P2P listener stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Dials `addr` (`host:port`) and starts gossiping with it.
    pub async fn connect_peer(&self, addr: &str) -> Result<SocketAddr, ChainError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| ChainError::NetworkError(format!("Failed to connect to {}: {}", addr, e)))?;
        let peer_addr = stream.peer_addr()?;
        info!("Established connection to {}", peer_addr);
        self.spawn_connection(stream, peer_addr);
        Ok(peer_addr)
    }

    fn spawn_connection(&self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }
        let (read_half, write_half) = stream.into_split();
        tokio::spawn(serve_connection(
            addr.to_string(),
            BufReader::new(read_half),
            BufWriter::new(write_half),
            self.ctx.clone(),
            self.shutdown.subscribe(),
        ));
    }
}
