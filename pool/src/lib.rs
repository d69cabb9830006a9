//! The transaction pool (§4.5): admits `SubmitTxInfo` entries under a single
//! lock, enforces per-block submitter uniqueness, and maintains three
//! synchronously-updated lookup indices.

mod error;
mod persistence;
mod stats;

use std::collections::HashMap;
use std::sync::Mutex;

use ezchain_core::tx::{MultiTransactions, SubmitTxInfo};
use ezchain_crypto::keys::Address;
use ezchain_crypto::Hash;

pub use error::{PoolError, Result};
pub use persistence::{ChecksummedSnapshot, PoolRecord, PoolSnapshot};
pub use stats::PoolStats;

/// Outcome of an `add` call: `(ok, message)` per the contract in §4.5.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub ok: bool,
    pub message: String,
}

impl AddOutcome {
    fn accepted(message: impl Into<String>) -> Self {
        Self { ok: true, message: message.into() }
    }

    fn rejected(message: impl Into<String>) -> Self {
        Self { ok: false, message: message.into() }
    }
}

struct PoolEntry {
    sti: SubmitTxInfo,
    multi_tx: Option<MultiTransactions>,
    received_at_unix: i64,
    processed: bool,
    is_valid: bool,
}

#[derive(Default)]
struct PoolState {
    entries: Vec<PoolEntry>,
    by_submit_hash: HashMap<Hash, usize>,
    by_multi_tx_hash: HashMap<Hash, usize>,
    by_submitter: HashMap<Address, Vec<usize>>,
    stats: PoolStats,
}

impl PoolState {
    /// Rebuilds all three indices from `entries` from scratch. Called after
    /// every removal: "correctness over efficiency" (§4.5).
    fn rebuild_indices(&mut self) {
        self.by_submit_hash.clear();
        self.by_multi_tx_hash.clear();
        self.by_submitter.clear();
        for (pos, entry) in self.entries.iter().enumerate() {
            self.by_submit_hash.insert(entry.sti.hash(), pos);
            self.by_multi_tx_hash.insert(entry.sti.multi_transactions_hash, pos);
            self.by_submitter.entry(entry.sti.submitter_address.clone()).or_default().push(pos);
        }
    }
}

/// Validates structural well-formedness per §4.5 step 1, independent of
/// signature checking (which `SubmitTxInfo::verify` performs).
fn structural_check(sti: &SubmitTxInfo) -> std::result::Result<(), String> {
    if sti.submitter_address.as_str().is_empty() {
        return Err("submitter address is empty".to_string());
    }
    if sti.signature.as_bytes().is_empty() {
        return Err("signature bytes are missing".to_string());
    }
    if chrono::DateTime::parse_from_rfc3339(&sti.submit_timestamp).is_err() {
        return Err("submit_timestamp is not parseable ISO-8601".to_string());
    }
    if sti.version != ezchain_core::config::PROTOCOL_VERSION {
        return Err("protocol version mismatch".to_string());
    }
    Ok(())
}

/// The transaction pool. All mutating and reading operations serialize
/// through one internal lock, matching the "single mutable critical section
/// per component" concurrency model (§5).
#[derive(Default)]
pub struct TxPool {
    state: Mutex<PoolState>,
}

impl TxPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `sti` (optionally alongside the `multi_tx` it references) if
    /// it passes structural, signature and uniqueness checks.
    pub fn add(&self, sti: SubmitTxInfo, multi_tx: Option<MultiTransactions>, received_at_unix: i64) -> AddOutcome {
        let mut state = self.state.lock().expect("pool lock poisoned");
        state.stats.total_received += 1;

        if let Err(message) = structural_check(&sti) {
            state.stats.invalid_received += 1;
            return AddOutcome::rejected(format!("structurally invalid: {message}"));
        }
        if let Err(e) = sti.verify(multi_tx.as_ref()) {
            state.stats.invalid_received += 1;
            return AddOutcome::rejected(format!("invalid signature: {e}"));
        }
        if state.by_submitter.get(&sti.submitter_address).map(|v| !v.is_empty()).unwrap_or(false) {
            state.stats.duplicates += 1;
            return AddOutcome::rejected("submitter already submitted in this block");
        }

        let pos = state.entries.len();
        state.by_submit_hash.insert(sti.hash(), pos);
        state.by_multi_tx_hash.insert(sti.multi_transactions_hash, pos);
        state.by_submitter.entry(sti.submitter_address.clone()).or_default().push(pos);
        state.entries.push(PoolEntry {
            sti,
            multi_tx,
            received_at_unix,
            processed: false,
            is_valid: true,
        });
        state.stats.valid_received += 1;
        AddOutcome::accepted("SubmitTxInfo added successfully")
    }

    pub fn remove(&self, submit_hash: Hash) -> bool {
        let mut state = self.state.lock().expect("pool lock poisoned");
        match state.by_submit_hash.get(&submit_hash).copied() {
            Some(pos) => {
                state.entries.remove(pos);
                state.rebuild_indices();
                true
            }
            None => false,
        }
    }

    pub fn get_by_submit_hash(&self, submit_hash: Hash) -> Option<SubmitTxInfo> {
        let state = self.state.lock().expect("pool lock poisoned");
        state.by_submit_hash.get(&submit_hash).map(|&pos| state.entries[pos].sti.clone())
    }

    pub fn get_by_multi_tx_hash(&self, multi_tx_hash: Hash) -> Option<SubmitTxInfo> {
        let state = self.state.lock().expect("pool lock poisoned");
        state.by_multi_tx_hash.get(&multi_tx_hash).map(|&pos| state.entries[pos].sti.clone())
    }

    pub fn get_by_submitter(&self, submitter: &Address) -> Vec<SubmitTxInfo> {
        let state = self.state.lock().expect("pool lock poisoned");
        state
            .by_submitter
            .get(submitter)
            .map(|positions| positions.iter().map(|&pos| state.entries[pos].sti.clone()).collect())
            .unwrap_or_default()
    }

    /// A snapshot copy of every admitted `SubmitTxInfo`, in admission order.
    pub fn all(&self) -> Vec<SubmitTxInfo> {
        let state = self.state.lock().expect("pool lock poisoned");
        state.entries.iter().map(|e| e.sti.clone()).collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().expect("pool lock poisoned");
        state.entries.clear();
        state.rebuild_indices();
    }

    pub fn stats(&self) -> PoolStats {
        self.state.lock().expect("pool lock poisoned").stats
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("pool lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every entry whose `submit_timestamp` is older than `max_age`
    /// seconds relative to `now_unix`. Returns the number removed.
    pub fn cleanup_aged(&self, max_age_secs: i64, now_unix: i64) -> usize {
        let mut state = self.state.lock().expect("pool lock poisoned");
        let aged_out: Vec<Hash> = state
            .entries
            .iter()
            .filter(|e| {
                chrono::DateTime::parse_from_rfc3339(&e.sti.submit_timestamp)
                    .map(|ts| now_unix - ts.timestamp() > max_age_secs)
                    .unwrap_or(true)
            })
            .map(|e| e.sti.hash())
            .collect();

        let removed = aged_out.len();
        if removed > 0 {
            state.entries.retain(|e| !aged_out.contains(&e.sti.hash()));
            state.rebuild_indices();
        }
        removed
    }

    /// Marks the given entries `processed` (e.g. once packaged into a
    /// block), without removing them from the pool yet.
    pub fn mark_processed(&self, submit_hash: Hash) -> bool {
        let mut state = self.state.lock().expect("pool lock poisoned");
        match state.by_submit_hash.get(&submit_hash).copied() {
            Some(pos) => {
                state.entries[pos].processed = true;
                true
            }
            None => false,
        }
    }

    /// Builds a checksummed, durable snapshot of every currently-admitted
    /// entry (§6 "Transaction pool persistence").
    pub fn snapshot(&self) -> ChecksummedSnapshot {
        let state = self.state.lock().expect("pool lock poisoned");
        let records = state
            .entries
            .iter()
            .map(|e| PoolRecord {
                submit_hash: e.sti.hash(),
                multi_tx_hash: e.sti.multi_transactions_hash,
                submitter: e.sti.submitter_address.clone(),
                submit_timestamp: e.sti.submit_timestamp.clone(),
                version: e.sti.version.clone(),
                processed: e.processed,
                is_valid: e.is_valid,
                sti: e.sti.clone(),
                multi_tx: e.multi_tx.clone(),
            })
            .collect();
        ChecksummedSnapshot::seal(PoolSnapshot { records })
    }

    /// Writes a checksummed snapshot to `path`, overwriting any existing
    /// file.
    pub fn save_to_file(&self, path: &std::path::Path) -> std::io::Result<()> {
        std::fs::write(path, self.snapshot().to_bytes())
    }

    /// Loads a snapshot from `path` and restores its unprocessed, valid
    /// entries. A checksum mismatch is logged and treated as an empty
    /// starting pool rather than propagated (§7 "refuse to load").
    pub fn load_from_file(&self, path: &std::path::Path, now_unix: i64) -> Result<usize> {
        let bytes = std::fs::read(path).map_err(PoolError::Io)?;
        match ChecksummedSnapshot::from_bytes(&bytes) {
            Some(snapshot) => Ok(self.restore(&snapshot, now_unix)),
            None => {
                tracing::warn!(path = %path.display(), "pool snapshot failed integrity check, starting fresh");
                Ok(0)
            }
        }
    }

    /// Rehydrates the pool from a previously-verified snapshot's unprocessed
    /// entries (§6 "On startup, unprocessed valid entries are re-loaded").
    pub fn restore(&self, snapshot: &ChecksummedSnapshot, now_unix: i64) -> usize {
        if !snapshot.verify() {
            tracing::warn!("pool snapshot checksum mismatch, refusing to load");
            return 0;
        }
        let mut restored = 0;
        for record in &snapshot.snapshot.records {
            if record.processed || !record.is_valid {
                continue;
            }
            let outcome = self.add(record.sti.clone(), record.multi_tx.clone(), now_unix);
            if outcome.ok {
                restored += 1;
            }
        }
        restored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_core::tx::{MultiTransactions, Transaction};
    use ezchain_core::value::{Value, ValueState};
    use ezchain_crypto::keys::SigningKey;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn key(seed: u64) -> SigningKey {
        let mut rng = StdRng::seed_from_u64(seed);
        SigningKey::generate(&mut rng)
    }

    fn submission(seed: u64, nonce: u64) -> (SigningKey, SubmitTxInfo, MultiTransactions) {
        let sender = key(seed);
        let recipient = key(seed + 100).address();
        let tx = Transaction::new(sender.address(), recipient, nonce, vec![Value::new(0, 10, ValueState::Selected).unwrap()], 1);
        let mut mt = MultiTransactions::new(sender.address(), vec![tx]).unwrap();
        mt.sign(&sender);
        let sti = SubmitTxInfo::create(&mt, &sender, "2024-01-01T00:00:00Z".to_string()).unwrap();
        (sender, sti, mt)
    }

    #[test]
    fn add_accepts_first_submission_and_rejects_duplicate_submitter() {
        let pool = TxPool::new();
        let (_sender, sti, mt) = submission(1, 0);
        let first = pool.add(sti.clone(), Some(mt.clone()), 0);
        assert!(first.ok);

        let (_sender2, sti2, mt2) = {
            // Same sender key, different nonce: still the same submitter.
            let sender = key(1);
            let recipient = key(2).address();
            let tx = Transaction::new(sender.address(), recipient, 1, vec![Value::new(20, 5, ValueState::Selected).unwrap()], 2);
            let mut mt = MultiTransactions::new(sender.address(), vec![tx]).unwrap();
            mt.sign(&sender);
            let sti = SubmitTxInfo::create(&mt, &sender, "2024-01-01T00:00:01Z".to_string()).unwrap();
            (sender, sti, mt)
        };
        let second = pool.add(sti2, Some(mt2), 1);
        assert!(!second.ok);
        assert!(second.message.contains("already submitted"));

        let stats = pool.stats();
        assert_eq!(stats.valid_received, 1);
        assert_eq!(stats.duplicates, 1);
    }

    #[test]
    fn remove_then_lookup_misses() {
        let pool = TxPool::new();
        let (_sender, sti, mt) = submission(5, 0);
        pool.add(sti.clone(), Some(mt), 0);
        assert!(pool.remove(sti.hash()));
        assert!(pool.get_by_submit_hash(sti.hash()).is_none());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn snapshot_and_restore_roundtrip() {
        let pool = TxPool::new();
        let (_sender, sti, mt) = submission(7, 0);
        pool.add(sti.clone(), Some(mt), 0);
        let snap = pool.snapshot();
        assert!(snap.verify());

        let pool2 = TxPool::new();
        let restored = pool2.restore(&snap, 0);
        assert_eq!(restored, 1);
        assert!(pool2.get_by_submit_hash(sti.hash()).is_some());
    }

    #[test]
    fn cleanup_aged_removes_old_entries() {
        let pool = TxPool::new();
        let (_sender, sti, mt) = submission(9, 0);
        pool.add(sti, Some(mt), 0);
        let removed = pool.cleanup_aged(60, 2_000_000_000);
        assert_eq!(removed, 1);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn save_and_load_from_file_roundtrip() {
        let pool = TxPool::new();
        let (_sender, sti, mt) = submission(11, 0);
        pool.add(sti.clone(), Some(mt), 0);

        let path = std::env::temp_dir().join(format!("ezchain-pool-test-{}.bin", std::process::id()));
        pool.save_to_file(&path).unwrap();

        let pool2 = TxPool::new();
        let restored = pool2.load_from_file(&path, 0).unwrap();
        assert_eq!(restored, 1);
        assert!(pool2.get_by_submit_hash(sti.hash()).is_some());

        std::fs::remove_file(&path).ok();
    }
}
