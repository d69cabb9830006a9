//! Deterministic genesis construction (§4.9, §3 "Value created... at genesis").
//!
//! A single unified `MultiTransactions` distributes the configured
//! denomination schedule to every account, wrapped in one `SubmitTxInfo` and
//! committed via a single-leaf Merkle tree whose root equals its only leaf.

use std::collections::HashMap;

use ezchain_crypto::keys::{Address, SigningKey};
use ezchain_crypto::{merkle, Hash, ZERO_HASH};

use crate::block::Block;
use crate::config::GenesisConfig;
use crate::error::{CoreError, Result};
use crate::proof::{BlockIndexList, ProofUnit};
use crate::tx::{MultiTransactions, SubmitTxInfo, Transaction};
use crate::value::{Value, ValueState};

/// Everything a single account needs to initialise its VPB state from
/// genesis.
#[derive(Debug, Clone)]
pub struct AccountGenesisShare {
    pub values: Vec<Value>,
    pub proof_units: Vec<ProofUnit>,
    pub block_index_list: BlockIndexList,
}

/// The chain-wide artifacts produced by genesis construction.
#[derive(Debug, Clone)]
pub struct GenesisOutput {
    pub block: Block,
    pub submit_tx_info: SubmitTxInfo,
    pub multi_transactions: MultiTransactions,
    pub leaf: Hash,
}

/// Deterministically allocates non-overlapping intervals for `accounts`
/// under `config`'s denomination schedule: accounts in order, denominations
/// in order, `count` values of size `amount` each.
fn allocate_intervals(accounts: &[Address], config: &GenesisConfig) -> Result<Vec<(Address, Value)>> {
    let mut allocations = Vec::new();
    let mut next_begin: u128 = 0;
    for account in accounts {
        for (amount, count) in &config.denomination_config {
            for _ in 0..*count {
                let value = Value::new(next_begin, *amount, ValueState::Unspent)?;
                next_begin = value
                    .end_index()
                    .checked_add(1)
                    .ok_or(CoreError::IntervalOverflow)?;
                allocations.push((account.clone(), value));
            }
        }
    }
    Ok(allocations)
}

/// Builds the unified genesis block and, for each account, the VPB share it
/// should be initialised with.
pub fn build_genesis(
    genesis_key: &SigningKey,
    accounts: &[Address],
    config: &GenesisConfig,
    timestamp: i64,
) -> Result<(GenesisOutput, HashMap<Address, AccountGenesisShare>)> {
    if accounts.is_empty() {
        return Err(CoreError::StructuralInvalid("genesis requires at least one account"));
    }

    let allocations = allocate_intervals(accounts, config)?;
    let genesis_address = genesis_key.address();

    let transactions: Vec<Transaction> = allocations
        .iter()
        .enumerate()
        .map(|(nonce, (recipient, value))| {
            Transaction::new(genesis_address.clone(), recipient.clone(), nonce as u64, vec![value.clone()], timestamp)
        })
        .collect();

    let mut multi_tx = MultiTransactions::new(genesis_address.clone(), transactions)?;
    multi_tx.sign(genesis_key);

    let submit_timestamp = chrono::DateTime::from_timestamp(timestamp, 0)
        .unwrap_or_default()
        .to_rfc3339();
    let submit_tx_info = SubmitTxInfo::create(&multi_tx, genesis_key, submit_timestamp)?;

    let leaf = submit_tx_info.multi_transactions_hash;
    let root = merkle::merkle_root(&[leaf]);
    if root != leaf {
        return Err(CoreError::GenesisMerkleMismatch);
    }

    let mut block = Block::new(0, ZERO_HASH, root, config.miner.clone(), timestamp);
    block.add_submitter(genesis_address.as_str());

    let mut shares: HashMap<Address, AccountGenesisShare> = accounts
        .iter()
        .map(|a| {
            (
                a.clone(),
                AccountGenesisShare {
                    values: Vec::new(),
                    proof_units: Vec::new(),
                    block_index_list: BlockIndexList::genesis(a.clone()),
                },
            )
        })
        .collect();

    for (recipient, value) in &allocations {
        let share = shares.get_mut(recipient).expect("recipient was seeded above");
        share.values.push(value.clone());
        share.proof_units.push(ProofUnit {
            owner_address: recipient.clone(),
            owner_multi_transactions: multi_tx.clone(),
            inclusion_proof: vec![root],
            leaf_index: 0,
            leaf_count: 1,
        });
    }

    Ok((
        GenesisOutput {
            block,
            submit_tx_info,
            multi_transactions: multi_tx,
            leaf,
        },
        shares,
    ))
}
