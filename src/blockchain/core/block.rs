use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash stored in the genesis block. It is never recomputed.
pub const GENESIS_HASH: &str = "0";

/// Highest difficulty a SHA-256 hex digest can ever satisfy.
pub const MAX_DIFFICULTY: usize = 64;

/// Surf report recorded in a block.
///
/// Field order is part of the block hash, so it must not change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordPayload {
    #[serde(alias = "location")]
    pub location: String,
    #[serde(alias = "waveHeight", alias = "wave_height")]
    pub wave_height: i64,
}

impl RecordPayload {
    pub fn new(location: impl Into<String>, wave_height: i64) -> Self {
        Self {
            location: location.into(),
            wave_height,
        }
    }

    /// Stable JSON rendering used as hash input.
    pub fn canonical_json(&self) -> String {
        // Two plain fields; serializing them cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub data: RecordPayload,
    pub hash: String,
    pub previous_hash: String,
    /// Unix seconds.
    pub timestamp: i64,
    pub height: u64,
    pub pow: u64,
}

impl Block {
    /// Creates an unmined block on top of `previous_hash`.
    pub fn new(data: RecordPayload, previous_hash: String, height: u64) -> Self {
        Block {
            data,
            hash: String::new(),
            previous_hash,
            timestamp: chrono::Utc::now().timestamp(),
            height,
            pow: 0,
        }
    }

    pub fn genesis() -> Self {
        Block {
            data: RecordPayload::default(),
            hash: GENESIS_HASH.to_string(),
            previous_hash: String::new(),
            timestamp: chrono::Utc::now().timestamp(),
            height: 0,
            pow: 0,
        }
    }

    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.previous_hash.as_bytes());
        hasher.update(self.data.canonical_json().as_bytes());
        hasher.update(self.timestamp.to_string().as_bytes());
        hasher.update(self.height.to_string().as_bytes());
        hasher.update(self.pow.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Grinds `pow` until the hash has `difficulty` leading zero hex digits.
    ///
    /// `pow` itself is tried first, so a block can be accepted without a
    /// single increment and carry `Pow: 0`. Go peers increment before every
    /// attempt and never emit 0; both verify the same way.
    ///
    /// There is no iteration cap. A difficulty above [`MAX_DIFFICULTY`]
    /// never terminates.
    pub fn mine(&mut self, difficulty: usize) {
        self.hash = self.compute_hash();
        while !meets_difficulty(&self.hash, difficulty) {
            self.pow += 1;
            self.hash = self.compute_hash();
        }
    }

    pub fn is_genesis(&self) -> bool {
        self.height == 0 && self.hash == GENESIS_HASH
    }

    /// First characters of the hash, for log lines.
    pub fn short_hash(&self) -> &str {
        let end = self.hash.len().min(12);
        self.hash.get(..end).unwrap_or(&self.hash)
    }
}

/// Difficulty counts hex characters, not bits.
pub fn meets_difficulty(hash: &str, difficulty: usize) -> bool {
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            data: RecordPayload::new("hawaii", 4),
            hash: String::new(),
            previous_hash: GENESIS_HASH.to_string(),
            timestamp: 1_700_000_000,
            height: 1,
            pow: 0,
        }
    }

    #[test]
    fn test_hash_is_deterministic() {
        let block = sample_block();
        assert_eq!(block.compute_hash(), block.compute_hash());
        assert_eq!(block.compute_hash().len(), 64);
        assert!(block
            .compute_hash()
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hash_input_layout() {
        let block = sample_block();
        let preimage = r#"0{"Location":"hawaii","WaveHeight":4}170000000010"#;
        assert_eq!(block.compute_hash(), hex::encode(Sha256::digest(preimage.as_bytes())));
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = sample_block();
        let original = base.compute_hash();

        let mut b = base.clone();
        b.data.wave_height = 5;
        assert_ne!(b.compute_hash(), original);

        let mut b = base.clone();
        b.previous_hash = "1".to_string();
        assert_ne!(b.compute_hash(), original);

        let mut b = base.clone();
        b.timestamp += 1;
        assert_ne!(b.compute_hash(), original);

        let mut b = base.clone();
        b.height = 2;
        assert_ne!(b.compute_hash(), original);

        let mut b = base;
        b.pow = 1;
        assert_ne!(b.compute_hash(), original);
    }

    #[test]
    fn test_mine_postcondition() {
        for difficulty in 0..=2 {
            let mut block = sample_block();
            block.mine(difficulty);
            assert!(block.hash.starts_with(&"0".repeat(difficulty)));
            assert_eq!(block.hash, block.compute_hash());
        }
    }

    #[test]
    fn test_mine_at_zero_difficulty_keeps_pow_zero() {
        let mut block = sample_block();
        block.mine(0);
        assert_eq!(block.pow, 0);
        assert_eq!(block.hash, block.compute_hash());
    }

    #[test]
    fn test_meets_difficulty() {
        assert!(meets_difficulty("00ab", 2));
        assert!(!meets_difficulty("0a0b", 2));
        assert!(meets_difficulty("anything", 0));
        assert!(!meets_difficulty("0", 2));
    }

    #[test]
    fn test_payload_accepts_field_aliases() {
        let canonical: RecordPayload =
            serde_json::from_str(r#"{"Location": "hawaii", "WaveHeight": 4}"#).unwrap();
        let camel: RecordPayload =
            serde_json::from_str(r#"{"location": "hawaii", "waveHeight": 4}"#).unwrap();
        assert_eq!(canonical, RecordPayload::new("hawaii", 4));
        assert_eq!(canonical, camel);
    }

    #[test]
    fn test_genesis_is_fixed() {
        let genesis = Block::genesis();
        assert!(genesis.is_genesis());
        assert_eq!(genesis.hash, "0");
        assert_eq!(genesis.pow, 0);
        assert_eq!(genesis.data, RecordPayload::default());
    }
}
