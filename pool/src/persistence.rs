//! Durable pool snapshot: a flat table keyed by `submit_hash`, with a blob
//! of the canonical encoding plus `processed`/`is_valid` flags (§6
//! "Transaction pool persistence").

use serde::{Deserialize, Serialize};

use ezchain_core::tx::{MultiTransactions, SubmitTxInfo};
use ezchain_crypto::keys::Address;
use ezchain_crypto::{digest_canonical, Hash};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    pub submit_hash: Hash,
    pub multi_tx_hash: Hash,
    pub submitter: Address,
    pub submit_timestamp: String,
    pub version: String,
    pub processed: bool,
    pub is_valid: bool,
    pub sti: SubmitTxInfo,
    pub multi_tx: Option<MultiTransactions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub records: Vec<PoolRecord>,
}

/// A snapshot plus the checksum covering it, the on-disk unit (§6
/// "A checksum over the snapshot... is stored alongside; verification
/// rejects mismatches").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecksummedSnapshot {
    pub snapshot: PoolSnapshot,
    pub checksum: Hash,
}

impl ChecksummedSnapshot {
    pub fn seal(snapshot: PoolSnapshot) -> Self {
        let checksum = digest_canonical(&snapshot);
        Self { snapshot, checksum }
    }

    /// Recomputes the checksum over `self.snapshot` and compares. Mirrors
    /// §7's `INTEGRITY_CHECKSUM_MISMATCH -> refuse to load`.
    pub fn verify(&self) -> bool {
        digest_canonical(&self.snapshot) == self.checksum
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("checksummed snapshot always serializes")
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let parsed: Self = bincode::deserialize(bytes).ok()?;
        if parsed.verify() {
            Some(parsed)
        } else {
            None
        }
    }
}
