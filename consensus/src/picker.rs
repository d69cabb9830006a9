//! The block assembler (§4.6): snapshots the pool, orders and caps the
//! selection, builds the Merkle commitment, and assembles a `Block`.

use std::collections::HashSet;

use ezchain_core::block::Block;
use ezchain_core::tx::SubmitTxInfo;
use ezchain_crypto::keys::Address;
use ezchain_crypto::{merkle, Hash};
use ezchain_pool::TxPool;

/// Default cap on submissions per block (§4.6 step 4).
pub const MAX_SUBMISSIONS_PER_BLOCK: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickStrategy {
    /// Preserves the pool's insertion order.
    Fifo,
    /// Sorts by descending `submit_timestamp`, used as a priority proxy in
    /// the absence of an explicit fee field (§9 open question).
    Fee,
}

/// The output of a pick: an ordered, deduplicated selection plus its Merkle
/// commitment.
#[derive(Debug, Clone)]
pub struct PackagedBlockData {
    pub selected: Vec<SubmitTxInfo>,
    pub merkle_root: Hash,
    /// Ordered, unique submitter addresses; `submitter_addresses[i]` is the
    /// submitter of `selected[i]`.
    pub submitter_addresses: Vec<Address>,
    pub assembled_at_unix: i64,
}

/// One selected entry's Merkle inclusion proof, aligned by index with
/// `PackagedBlockData::selected`/`submitter_addresses`.
#[derive(Debug, Clone)]
pub struct ProofEntry {
    pub multi_transactions_hash: Hash,
    pub inclusion_proof: Vec<Hash>,
}

/// Snapshots `pool`, orders by `strategy`, filters to one entry per
/// submitter (defense in depth — the pool already enforces this), and caps
/// at [`MAX_SUBMISSIONS_PER_BLOCK`].
pub fn pick(pool: &TxPool, strategy: PickStrategy, now_unix: i64) -> PackagedBlockData {
    let mut entries = pool.all();
    if strategy == PickStrategy::Fee {
        entries.sort_by(|a, b| b.submit_timestamp.cmp(&a.submit_timestamp));
    }

    let mut seen = HashSet::new();
    entries.retain(|e| seen.insert(e.submitter_address.clone()));
    entries.truncate(MAX_SUBMISSIONS_PER_BLOCK);

    let leaves: Vec<Hash> = entries.iter().map(|e| e.multi_transactions_hash).collect();
    let merkle_root = merkle::merkle_root(&leaves);
    let submitter_addresses = entries.iter().map(|e| e.submitter_address.clone()).collect();

    PackagedBlockData {
        selected: entries,
        merkle_root,
        submitter_addresses,
        assembled_at_unix: now_unix,
    }
}

/// As [`pick`], but also returns each selected entry's inclusion proof.
/// `proofs[i]` and `package.submitter_addresses[i]` describe the same
/// selected entry — callers rely on this positional correspondence, not on
/// a lookup (§5 "Ordering guarantees").
pub fn pick_with_proofs(pool: &TxPool, strategy: PickStrategy, now_unix: i64) -> (PackagedBlockData, Vec<ProofEntry>) {
    let package = pick(pool, strategy, now_unix);
    let leaves: Vec<Hash> = package.selected.iter().map(|e| e.multi_transactions_hash).collect();
    let proofs = leaves
        .iter()
        .enumerate()
        .map(|(i, leaf)| ProofEntry {
            multi_transactions_hash: *leaf,
            inclusion_proof: merkle::merkle_proof(&leaves, i).expect("index is within the just-built leaf set"),
        })
        .collect();
    (package, proofs)
}

/// Assembles a `Block` from `package`, linking it to `previous_hash` at
/// `index` and recording every selected submitter in its Bloom filter.
pub fn create_block(package: &PackagedBlockData, miner: String, previous_hash: Hash, index: u64, timestamp: i64) -> Block {
    let mut block = Block::new(index, previous_hash, package.merkle_root, miner, timestamp);
    for address in &package.submitter_addresses {
        block.add_submitter(address.as_str());
    }
    block
}

/// Removes every entry in `package` from `pool`. Returns the number
/// actually removed (entries may already be gone if the pool was mutated
/// concurrently between pick and removal).
pub fn remove_picked(pool: &TxPool, package: &PackagedBlockData) -> usize {
    package.selected.iter().filter(|e| pool.remove(e.hash())).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_core::tx::{MultiTransactions, Transaction};
    use ezchain_core::value::{Value, ValueState};
    use ezchain_crypto::keys::SigningKey;
    use ezchain_crypto::ZERO_HASH;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn key(seed: u64) -> SigningKey {
        let mut rng = StdRng::seed_from_u64(seed);
        SigningKey::generate(&mut rng)
    }

    fn submit(seed: u64, ts: &str) -> SubmitTxInfo {
        let sender = key(seed);
        let recipient = key(seed + 100).address();
        let tx = Transaction::new(sender.address(), recipient, 0, vec![Value::new(0, 10, ValueState::Selected).unwrap()], 1);
        let mut mt = MultiTransactions::new(sender.address(), vec![tx]).unwrap();
        mt.sign(&sender);
        SubmitTxInfo::create(&mt, &sender, ts.to_string()).unwrap()
    }

    #[test]
    fn empty_pool_yields_empty_well_formed_package() {
        let pool = TxPool::new();
        let package = pick(&pool, PickStrategy::Fifo, 0);
        assert!(package.selected.is_empty());
        assert_eq!(package.merkle_root, ZERO_HASH);

        let block = create_block(&package, "miner".to_string(), ZERO_HASH, 1, 0);
        assert!(block.merkle_root_well_formed(0));
    }

    #[test]
    fn single_submission_proof_equals_root() {
        let pool = TxPool::new();
        let sti = submit(1, "2024-01-01T00:00:00Z");
        pool.add(sti.clone(), None, 0);

        let (package, proofs) = pick_with_proofs(&pool, PickStrategy::Fifo, 0);
        assert_eq!(package.selected.len(), 1);
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].inclusion_proof, vec![package.merkle_root]);
    }

    #[test]
    fn remove_picked_clears_pool() {
        let pool = TxPool::new();
        let sti = submit(2, "2024-01-01T00:00:00Z");
        pool.add(sti, None, 0);
        let package = pick(&pool, PickStrategy::Fifo, 0);
        let removed = remove_picked(&pool, &package);
        assert_eq!(removed, 1);
        assert!(pool.is_empty());
    }
}
