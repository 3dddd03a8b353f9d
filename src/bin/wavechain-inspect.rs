#![forbid(unsafe_code)]
//! Inspect a captured gossip chain: block table plus an integrity report.

use clap::Parser;
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Color as TableColor;
use comfy_table::{Attribute, Cell, ContentArrangement, Table};
use std::io::Read;
use std::path::PathBuf;
use wavechain::blockchain::{meets_difficulty, Chain};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// File holding one serialized chain per line; "-" reads stdin
    input: PathBuf,

    /// Which chain to show when the file holds several (0-based, default last)
    #[arg(long)]
    index: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut content = String::new();
    if cli.input.as_os_str() == "-" {
        std::io::stdin().read_to_string(&mut content)?;
    } else {
        content = std::fs::read_to_string(&cli.input)
            .map_err(|e| format!("Failed to read {}: {}", cli.input.display(), e))?;
    }

    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return Err("No chain found in input".into());
    }

    let index = cli.index.unwrap_or(lines.len() - 1);
    let line = lines
        .get(index)
        .ok_or_else(|| format!("Input holds {} chain(s), no index {}", lines.len(), index))?;
    let chain = Chain::from_line(line)?;

    println!(
        "{}",
        format!(
            "🌊 Chain {} of {}: {} block(s), difficulty {}",
            index + 1,
            lines.len(),
            chain.len(),
            chain.difficulty
        )
        .bright_cyan()
        .bold()
    );
    println!();

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Height")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Hash")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Previous")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Location")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Wave")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("PoW")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
            Cell::new("Date")
                .fg(TableColor::Cyan)
                .add_attribute(Attribute::Bold),
        ]);

    for block in &chain.blocks {
        let hash_color = if block.is_genesis() || meets_difficulty(&block.hash, chain.difficulty) {
            TableColor::Green
        } else {
            TableColor::Red
        };
        table.add_row(vec![
            Cell::new(format!("#{}", block.height)).fg(TableColor::White),
            Cell::new(shorten(&block.hash)).fg(hash_color),
            Cell::new(shorten(&block.previous_hash)).fg(TableColor::Grey),
            Cell::new(&block.data.location).fg(TableColor::White),
            Cell::new(block.data.wave_height).fg(TableColor::White),
            Cell::new(block.pow).fg(TableColor::Grey),
            Cell::new(format_timestamp_short(block.timestamp)).fg(TableColor::Grey),
        ]);
    }

    println!("{}", table);
    println!();

    match chain.verify() {
        Ok(()) => println!("{}", "✅ Chain is valid".green().bold()),
        Err(e) => println!("{}", format!("❌ Chain is invalid: {}", e).red().bold()),
    }
    if let Err(e) = chain.verify_full() {
        println!(
            "{}",
            format!("⚠️  A verifying peer would reject it: {}", e).yellow()
        );
    }

    Ok(())
}

fn shorten(hash: &str) -> String {
    match (hash.get(..10), hash.get(hash.len().saturating_sub(6)..)) {
        (Some(head), Some(tail)) if hash.len() > 20 => format!("{}...{}", head, tail),
        _ => hash.to_string(),
    }
}

fn format_timestamp_short(timestamp: i64) -> String {
    use chrono::DateTime;

    if let Some(dt) = DateTime::from_timestamp(timestamp, 0) {
        dt.format("%m/%d %H:%M:%S").to_string()
    } else {
        "Invalid".to_string()
    }
}
