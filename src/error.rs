//! Error types for WaveChain

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// A block's height is not its predecessor's height plus one.
    InvalidHeight { height: u64, expected: u64 },
    /// A block's stored hash does not match its recomputed hash.
    InvalidHash { height: u64 },
    /// A block's previous hash does not match its predecessor's hash.
    InvalidLinkage { height: u64 },
    /// No block can follow this height without overflowing `u64`.
    HeightOverflow { height: u64 },
    /// The first block is not a genesis block.
    InvalidGenesis,
    /// Difficulty outside `1..=MAX_DIFFICULTY` for a received chain, or
    /// above it for a local append.
    InvalidDifficulty(usize),
    /// A mined block's hash lacks the chain's leading zeros.
    InsufficientWork { height: u64 },
    /// The local chain failed verification right after a local append.
    IntegrityViolation(String),
    SerializationError(String),
    NetworkError(String),
    IoError(String),
    ConfigError(String),
    /// The task owning the shared chain is gone.
    StateUnavailable,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ChainError::InvalidHeight { height, expected } => {
                write!(f, "Bad height: block {} should be {}", height, expected)
            }
            ChainError::InvalidHash { height } => write!(f, "Bad hash at height {}", height),
            ChainError::InvalidLinkage { height } => {
                write!(f, "Bad previous hash at height {}", height)
            }
            ChainError::HeightOverflow { height } => {
                write!(f, "No block can follow height {}", height)
            }
            ChainError::InvalidGenesis => write!(f, "First block is not a genesis block"),
            ChainError::InvalidDifficulty(d) => write!(f, "Unusable difficulty {}", d),
            ChainError::InsufficientWork { height } => {
                write!(f, "Block {} does not meet the chain difficulty", height)
            }
            ChainError::IntegrityViolation(msg) => write!(f, "Chain integrity violated: {}", msg),
            ChainError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::IoError(msg) => write!(f, "IO error: {}", msg),
            ChainError::ConfigError(msg) => write!(f, "Config error: {}", msg),
            ChainError::StateUnavailable => write!(f, "Shared chain state is no longer running"),
        }
    }
}

impl std::error::Error for ChainError {}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::SerializationError(err.to_string())
    }
}

impl From<toml::de::Error> for ChainError {
    fn from(err: toml::de::Error) -> Self {
        ChainError::ConfigError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
