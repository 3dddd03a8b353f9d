#![forbid(unsafe_code)]

use colored::*;
use wavechain::config::MAX_DIFFICULTY;

fn main() {
    println!("{}", "🌊 WaveChain".bright_cyan().bold());
    println!(
        "{}",
        "Surf reports mined into a proof-of-work chain, shared by whole-chain gossip.".white()
    );
    println!();

    println!("{}", "Binaries".bright_green().underline());
    println!(
        "  {}  {}",
        "wavechain-node   ".bright_white(),
        "run a peer; records typed on stdin are mined and gossiped".dimmed()
    );
    println!(
        "  {}  {}",
        "wavechain-inspect".bright_white(),
        "show a captured chain (one JSON chain per line) and check it".dimmed()
    );
    println!();

    println!("{}", "Operator input".bright_green().underline());
    println!("  {}", r#"{"Location": "hawaii", "WaveHeight": 4}"#.italic());
    println!();

    println!("{}", "config.toml".bright_green().underline());
    println!("  [network]  listen_port, bootstrap_peers = [\"host:port\"]");
    println!("  [chain]    difficulty (1..={}, default 3)", MAX_DIFFICULTY);
    println!("  [gossip]   fork_choice = \"longest\" | \"longest-valid\", channel_capacity, announce_on_connect");
    println!("  [logging]  level; RUST_LOG overrides it");
    println!();

    println!("{}", "Two peers on one host".bright_green().underline());
    println!("{}", "  wavechain-node --port 7000".italic());
    println!(
        "{}",
        "  wavechain-node --port 7001 --connect 127.0.0.1:7000 --verify-gossip".italic()
    );
}
