//! `Block` and `BlockHeader` (§3).

use serde::{Deserialize, Serialize};

use ezchain_crypto::bloom::BloomFilter;
use ezchain_crypto::{digest_canonical, merkle, Hash};

use crate::config::PROTOCOL_VERSION;

/// Header fields hashed to produce the block's identity hash. `pre_hash`
/// links to the parent; the genesis block uses the all-zero hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub index: u64,
    pub pre_hash: Hash,
    pub merkle_root: Hash,
    pub miner: String,
    pub nonce: u64,
    pub timestamp: i64,
    pub protocol_version: String,
}

/// A block: header plus the Bloom filter recording every submitter address
/// included in it. Never mutated once added to the fork tree; only its
/// logical `consensus_status` (tracked by the fork engine, not here) may
/// change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub bloom_filter: BloomFilter,
}

impl Block {
    pub fn new(index: u64, pre_hash: Hash, merkle_root: Hash, miner: String, timestamp: i64) -> Self {
        Self {
            header: BlockHeader {
                index,
                pre_hash,
                merkle_root,
                miner,
                nonce: 0,
                timestamp,
                protocol_version: PROTOCOL_VERSION.to_string(),
            },
            bloom_filter: BloomFilter::new(),
        }
    }

    /// Digest over every header field; this is both the block's identifier
    /// and the value that child blocks reference as `pre_hash`.
    pub fn hash(&self) -> Hash {
        digest_canonical(&self.header)
    }

    pub fn add_submitter(&mut self, submitter: &str) {
        self.bloom_filter.add(submitter.as_bytes());
    }

    /// Merkle-root well-formedness: non-empty (i.e. the zero hash) only
    /// when there truly were zero selected submissions; otherwise it must
    /// differ from the zero sentinel (collisions are cryptographically
    /// negligible for this check).
    pub fn merkle_root_well_formed(&self, selected_count: usize) -> bool {
        if selected_count == 0 {
            self.header.merkle_root == ezchain_crypto::ZERO_HASH
        } else {
            self.header.merkle_root != ezchain_crypto::ZERO_HASH
        }
    }

    /// Recomputes the Merkle root from `leaves` and checks it matches the
    /// header — used during block validation.
    pub fn merkle_root_matches(&self, leaves: &[Hash]) -> bool {
        merkle::merkle_root(leaves) == self.header.merkle_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_crypto::ZERO_HASH;

    #[test]
    fn block_hash_changes_with_any_header_field() {
        let b1 = Block::new(1, ZERO_HASH, ZERO_HASH, "miner-a".to_string(), 100);
        let mut b2 = b1.clone();
        b2.header.nonce = 1;
        assert_ne!(b1.hash(), b2.hash());
    }

    #[test]
    fn empty_block_has_zero_merkle_root() {
        let b = Block::new(1, ZERO_HASH, merkle::merkle_root(&[]), "miner".to_string(), 0);
        assert!(b.merkle_root_well_formed(0));
    }
}
