//! A read-only view of the main chain's evidence, the input the verifier
//! needs without depending on the consensus engine itself (§4.8 "Input").

use std::collections::HashMap;

use ezchain_crypto::bloom::BloomFilter;
use ezchain_crypto::Hash;

/// `{height -> merkle_root}`, `{height -> bloom_filter}`, plus the chain's
/// current height and genesis height. An optional checkpoint height lets
/// verification skip evidence older than a trusted snapshot.
#[derive(Debug, Clone, Default)]
pub struct MainChainInfo {
    pub merkle_roots: HashMap<u64, Hash>,
    pub bloom_filters: HashMap<u64, BloomFilter>,
    pub current_height: u64,
    pub genesis_height: u64,
    pub checkpoint: Option<u64>,
}

impl MainChainInfo {
    pub fn new(genesis_height: u64) -> Self {
        Self {
            merkle_roots: HashMap::new(),
            bloom_filters: HashMap::new(),
            current_height: genesis_height,
            genesis_height,
            checkpoint: None,
        }
    }

    pub fn record(&mut self, height: u64, merkle_root: Hash, bloom_filter: BloomFilter) {
        self.merkle_roots.insert(height, merkle_root);
        self.bloom_filters.insert(height, bloom_filter);
        if height > self.current_height {
            self.current_height = height;
        }
    }

    pub fn with_checkpoint(mut self, height: u64) -> Self {
        self.checkpoint = Some(height);
        self
    }
}
