//! WaveChain - a proof-of-work ledger of surf reports, replicated by gossip
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Blocks, hashing, mining, chain validation and the task
//!   that owns the node's current chain
//! - [`consensus`] - Fork choice ("longest chain wins")
//!
//! ## Networking
//! - [`sync`] - Whole-chain gossip: per-connection reader/writer and the
//!   operator loop that mines new blocks
//! - [`network`] - TCP listener and dialer
//! - [`node`] - Wiring, logging and shutdown
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Trust model
//!
//! By default a peer's chain is adopted whenever it is longer than ours and
//! is not validated first. Set `gossip.fork_choice = "longest-valid"` to
//! verify candidates before adopting them.

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod consensus;

// ============================================================================
// Networking
// ============================================================================
pub mod network;
pub mod node;
pub mod sync;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
