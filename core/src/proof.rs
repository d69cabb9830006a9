//! `ProofUnit`, `BlockIndexList` and `ProofMap` — the provenance evidence
//! half of the VPB triple (§3, component C4's supporting types).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use ezchain_crypto::keys::Address;
use ezchain_crypto::Hash;

use crate::tx::MultiTransactions;

/// Proves ownership of a value at one block height: the owner's
/// `MultiTransactions` (whose hash is the Merkle leaf) plus the inclusion
/// proof that folds that leaf up to the block's Merkle root.
///
/// `leaf_index`/`leaf_count` are carried alongside the sibling list because
/// the proof itself stores no left/right orientation flags — verification
/// derives orientation from the leaf's position among the block's total
/// leaf count (§9). For the genesis single-leaf tree, `inclusion_proof ==
/// [root]`, `leaf_index == 0`, `leaf_count == 1`, and `leaf == root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofUnit {
    pub owner_address: Address,
    pub owner_multi_transactions: MultiTransactions,
    pub inclusion_proof: Vec<Hash>,
    pub leaf_index: u64,
    pub leaf_count: u64,
}

/// An owner annotation at one height: who held the value at that point in
/// the chain, recorded for audit even after the value moves on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightOwner {
    pub height: u64,
    pub owner: Address,
}

/// Ordered, strictly-increasing list of block heights at which a value (or
/// its ancestors) appeared, each annotated with the owning account at that
/// height.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockIndexList {
    entries: Vec<HeightOwner>,
}

impl BlockIndexList {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn genesis(owner: Address) -> Self {
        let mut list = Self::new();
        list.push(0, owner);
        list
    }

    /// Appends `height` (must be strictly greater than the current last
    /// entry, if any).
    pub fn push(&mut self, height: u64, owner: Address) {
        debug_assert!(
            self.entries.last().map(|e| height > e.height).unwrap_or(true),
            "block heights must be strictly increasing"
        );
        self.entries.push(HeightOwner { height, owner });
    }

    pub fn heights(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.height).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&HeightOwner> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[HeightOwner] {
        &self.entries
    }
}

/// `Value -> [ProofUnit]` map, keyed by a value's `begin_index` (its stable
/// identity within an account's collection). Invariant: for each key, the
/// entry's length equals the length of the matching `BlockIndexList`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProofMap {
    units: HashMap<u128, Vec<ProofUnit>>,
}

impl ProofMap {
    pub fn new() -> Self {
        Self { units: HashMap::new() }
    }

    pub fn push(&mut self, begin_index: u128, unit: ProofUnit) {
        self.units.entry(begin_index).or_default().push(unit);
    }

    pub fn get(&self, begin_index: u128) -> Option<&[ProofUnit]> {
        self.units.get(&begin_index).map(|v| v.as_slice())
    }

    pub fn set(&mut self, begin_index: u128, units: Vec<ProofUnit>) {
        self.units.insert(begin_index, units);
    }

    pub fn remove(&mut self, begin_index: u128) -> Option<Vec<ProofUnit>> {
        self.units.remove(&begin_index)
    }

    pub fn len_for(&self, begin_index: u128) -> usize {
        self.units.get(&begin_index).map(|v| v.len()).unwrap_or(0)
    }

    pub fn keys(&self) -> impl Iterator<Item = &u128> {
        self.units.keys()
    }
}
