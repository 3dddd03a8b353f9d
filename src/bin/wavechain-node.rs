#![forbid(unsafe_code)]
//! WaveChain peer: listens for peers, dials the ones given, and mines a block
//! for every JSON record typed on stdin.

use clap::Parser;
use std::path::PathBuf;
use tokio::io::BufReader;
use wavechain::config::{load_config, load_config_from};
use wavechain::consensus::ForkChoice;
use wavechain::node::{init_logging, Node};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a config file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Port to listen on for peers; 0 picks a free port
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// Peer to connect to, as host:port (repeatable)
    #[arg(long, short = 'd')]
    connect: Vec<String>,

    /// Leading zero hex characters required of mined block hashes
    #[arg(long)]
    difficulty: Option<usize>,

    /// Verify peer chains before adopting them
    #[arg(long)]
    verify_gossip: bool,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(port) = cli.port {
        config.network.listen_port = port;
    }
    if let Some(difficulty) = cli.difficulty {
        config.chain.difficulty = difficulty;
    }
    if cli.verify_gossip {
        config.gossip.fork_choice = ForkChoice::LongestValidChain;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    init_logging(&config.logging);
    println!(r#"Enter records like {{"Location": "hawaii", "WaveHeight": 4}}"#);

    let node = Node::new(config);
    node.run(BufReader::new(tokio::io::stdin()), &cli.connect).await?;
    Ok(())
}
