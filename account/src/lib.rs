//! The per-account VPB manager (§4.4): owns private key material, the value
//! ledger, provenance evidence, and the single account-scoped lock that
//! serializes every mutation (§5 "single-writer per component").

mod error;

use std::collections::HashMap;
use std::sync::Mutex;

use ezchain_core::proof::{BlockIndexList, ProofMap, ProofUnit};
use ezchain_core::tx::{MultiTransactions, SubmitTxInfo, Transaction};
use ezchain_core::value::{AccountValueCollection, Value, ValueSelectionStrategy, ValueState};
use ezchain_crypto::keys::{Address, SigningKey};
use ezchain_crypto::Hash;
use ezchain_verify::{verify_vpb, MainChainInfo, VerificationReport};

pub use error::{AccountError, Result};

/// One leg of a `create_batch_transactions` call: send `amount` to `recipient`.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub recipient: Address,
    pub amount: u64,
}

/// Result of a successful batch build, ready to be wrapped in a
/// `SubmitTxInfo` and handed to the pool.
#[derive(Debug, Clone)]
pub struct BatchTransactionsResult {
    pub multi_transactions: MultiTransactions,
    pub recipients: Vec<Address>,
    pub total_amount: u64,
    pub transaction_count: usize,
}

struct Ledger {
    collection: AccountValueCollection,
    proofs: ProofMap,
    block_indices: HashMap<u128, BlockIndexList>,
}

impl Ledger {
    fn new() -> Self {
        Self {
            collection: AccountValueCollection::new(),
            proofs: ProofMap::new(),
            block_indices: HashMap::new(),
        }
    }
}

/// An account: a keypair plus the VPB state it custodies. All mutating
/// methods take `&self` and serialize through one internal lock, matching
/// the "single mutable critical section per component" concurrency model.
pub struct Account {
    signing_key: SigningKey,
    address: Address,
    ledger: Mutex<Ledger>,
}

impl Account {
    pub fn new(signing_key: SigningKey) -> Self {
        let address = signing_key.address();
        Self {
            signing_key,
            address,
            ledger: Mutex::new(Ledger::new()),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Seeds the ledger with a genesis (or other pre-verified) VPB share.
    /// Unlike `receive_vpb_from_others`, this bypasses the verifier: genesis
    /// distribution predates any main-chain view to verify against.
    pub fn seed(&self, values: Vec<Value>, proof_units: Vec<ProofUnit>, block_index: BlockIndexList) -> Result<()> {
        let mut ledger = self.ledger.lock().expect("account lock poisoned");
        for (value, proof_unit) in values.into_iter().zip(proof_units.into_iter()) {
            let begin = value.begin_index;
            ledger.collection.insert(value)?;
            ledger.proofs.push(begin, proof_unit);
            ledger.block_indices.insert(begin, block_index.clone());
        }
        Ok(())
    }

    pub fn balance(&self, state: ValueState) -> u64 {
        let ledger = self.ledger.lock().expect("account lock poisoned");
        ledger.collection.total(state)
    }

    /// Builds and signs one `Transaction` per request, then bundles them
    /// into a single aggregately-signed `MultiTransactions`.
    ///
    /// Picking happens against a scratch copy of the collection; the real
    /// collection is only replaced once every request in the batch has
    /// succeeded, so a failure partway through leaves no values SELECTED.
    pub fn create_batch_transactions(&self, requests: &[TransferRequest], timestamp: i64) -> Result<BatchTransactionsResult> {
        if requests.is_empty() {
            return Err(AccountError::EmptyRequest);
        }
        let mut ledger = self.ledger.lock().expect("account lock poisoned");

        let mut scratch = ledger.collection.clone();
        let mut transactions = Vec::with_capacity(requests.len());
        let mut recipients = Vec::with_capacity(requests.len());
        let mut total_amount = 0u64;

        for (nonce, request) in requests.iter().enumerate() {
            let picked = scratch.pick_values(request.amount, ValueSelectionStrategy::default())?;
            let mut tx = Transaction::new(self.address.clone(), request.recipient.clone(), nonce as u64, picked, timestamp);
            tx.sign(&self.signing_key);
            total_amount += request.amount;
            recipients.push(request.recipient.clone());
            transactions.push(tx);
        }

        let transaction_count = transactions.len();
        let mut multi_tx = MultiTransactions::new(self.address.clone(), transactions)?;
        multi_tx.sign(&self.signing_key);

        ledger.collection = scratch;

        Ok(BatchTransactionsResult {
            multi_transactions: multi_tx,
            recipients,
            total_amount,
            transaction_count,
        })
    }

    pub fn create_submit_tx_info(&self, result: &BatchTransactionsResult, submit_timestamp: String) -> Result<SubmitTxInfo> {
        Ok(SubmitTxInfo::create(&result.multi_transactions, &self.signing_key, submit_timestamp)?)
    }

    /// Applies the local-commit bookkeeping for a batch this account sent,
    /// once it has been included (but not yet confirmed) in a block.
    ///
    /// `leaf_index`/`leaf_count` describe `mt_proof`'s position in that
    /// block's Merkle tree, needed later to re-verify the evidence this call
    /// records.
    pub fn update_vpb_after_transaction_sent(
        &self,
        confirmed_multi_txns: &MultiTransactions,
        mt_proof: &[Hash],
        leaf_index: u64,
        leaf_count: u64,
        block_height: u64,
        recipient_address: &Address,
    ) -> Result<()> {
        let mut ledger = self.ledger.lock().expect("account lock poisoned");
        for tx in &confirmed_multi_txns.transactions {
            for value in &tx.values {
                let begin = value.begin_index;
                ledger.collection.transition(begin, ValueState::LocalCommitted)?;

                ledger
                    .block_indices
                    .entry(begin)
                    .or_insert_with(BlockIndexList::new)
                    .push(block_height, recipient_address.clone());

                ledger.proofs.push(
                    begin,
                    ProofUnit {
                        owner_address: self.address.clone(),
                        owner_multi_transactions: confirmed_multi_txns.clone(),
                        inclusion_proof: mt_proof.to_vec(),
                        leaf_index,
                        leaf_count,
                    },
                );
            }
        }
        Ok(())
    }

    /// Promotes every `LOCAL_COMMITTED` value whose last recorded height is
    /// at or below `confirmed_up_to_height` to `CONFIRMED`. Run this after
    /// the consensus layer advances its confirmation frontier.
    pub fn promote_confirmed(&self, confirmed_up_to_height: u64) -> Result<usize> {
        let mut ledger = self.ledger.lock().expect("account lock poisoned");
        let begins: Vec<u128> = ledger
            .collection
            .find_by_state(ValueState::LocalCommitted)
            .into_iter()
            .map(|v| v.begin_index)
            .collect();

        let mut promoted = 0;
        for begin in begins {
            let ready = ledger
                .block_indices
                .get(&begin)
                .and_then(|b| b.last())
                .map(|entry| entry.height <= confirmed_up_to_height)
                .unwrap_or(false);
            if ready {
                ledger.collection.transition(begin, ValueState::Confirmed)?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    /// Verifies an incoming VPB against `chain`'s evidence; on success,
    /// inserts the value as `UNSPENT` and stores its evidence verbatim. On
    /// failure, leaves the account state untouched.
    pub fn receive_vpb_from_others(
        &self,
        value: Value,
        proof_units: Vec<ProofUnit>,
        block_index: BlockIndexList,
        chain: &MainChainInfo,
    ) -> Result<VerificationReport> {
        let report = verify_vpb(&value, &proof_units, &block_index, chain);
        if !report.is_valid {
            return Ok(report);
        }

        let mut ledger = self.ledger.lock().expect("account lock poisoned");
        let begin = value.begin_index;
        ledger.collection.insert(value)?;
        ledger.proofs.set(begin, proof_units);
        ledger.block_indices.insert(begin, block_index);
        Ok(report)
    }

    /// Checks the invariants of §4.4: proof-unit/block-index lengths match
    /// per value, and the proof map has no orphaned keys. Overlap-freedom
    /// and balance consistency are enforced continuously by
    /// `AccountValueCollection` itself, so they're not re-checked here.
    pub fn validate_integrity(&self) -> Result<()> {
        let ledger = self.ledger.lock().expect("account lock poisoned");
        for value in ledger.collection.all() {
            let proof_len = ledger.proofs.len_for(value.begin_index);
            let block_len = ledger.block_indices.get(&value.begin_index).map(|b| b.len()).unwrap_or(0);
            if proof_len != block_len {
                return Err(AccountError::IntegrityViolation(format!(
                    "value {} has {} proof units but {} block-index entries",
                    value.begin_index, proof_len, block_len
                )));
            }
        }
        for key in ledger.proofs.keys() {
            if !ledger.collection.all().iter().any(|v| v.begin_index == *key) {
                return Err(AccountError::IntegrityViolation(format!("proof map has orphaned key {key}")));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezchain_core::config::GenesisConfig;
    use ezchain_core::genesis::build_genesis;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn key(seed: u64) -> SigningKey {
        let mut rng = StdRng::seed_from_u64(seed);
        SigningKey::generate(&mut rng)
    }

    fn seeded_account(seed: u64, genesis_key: &SigningKey, config: &GenesisConfig) -> (Account, ezchain_core::genesis::GenesisOutput) {
        let account = Account::new(key(seed));
        let (output, mut shares) = build_genesis(genesis_key, &[account.address().clone()], config, 0).unwrap();
        let share = shares.remove(account.address()).unwrap();
        account.seed(share.values, share.proof_units, share.block_index_list).unwrap();
        (account, output)
    }

    #[test]
    fn create_batch_transactions_moves_balance_from_unspent_to_selected() {
        let genesis_key = key(1000);
        let config = GenesisConfig {
            denomination_config: vec![(100, 1)],
            miner: "genesis_miner".to_string(),
        };
        let (alice, _genesis) = seeded_account(1, &genesis_key, &config);
        let bob_address = key(2).address();

        assert_eq!(alice.balance(ValueState::Unspent), 100);

        let result = alice
            .create_batch_transactions(&[TransferRequest { recipient: bob_address, amount: 40 }], 1)
            .unwrap();
        assert_eq!(result.total_amount, 40);
        assert_eq!(alice.balance(ValueState::Selected), 40);
        assert_eq!(alice.balance(ValueState::Unspent), 60);
        assert!(result.multi_transactions.verify().is_ok());
    }

    #[test]
    fn failed_request_in_batch_reverts_all_selections() {
        let genesis_key = key(1001);
        let config = GenesisConfig {
            denomination_config: vec![(100, 1)],
            miner: "genesis_miner".to_string(),
        };
        let (alice, _genesis) = seeded_account(3, &genesis_key, &config);
        let bob_address = key(4).address();

        let requests = vec![
            TransferRequest { recipient: bob_address.clone(), amount: 60 },
            TransferRequest { recipient: bob_address, amount: 1000 },
        ];
        assert!(alice.create_batch_transactions(&requests, 1).is_err());
        assert_eq!(alice.balance(ValueState::Unspent), 100);
        assert_eq!(alice.balance(ValueState::Selected), 0);
    }

    #[test]
    fn validate_integrity_passes_after_genesis_seed() {
        let genesis_key = key(1002);
        let config = GenesisConfig {
            denomination_config: vec![(100, 1)],
            miner: "genesis_miner".to_string(),
        };
        let (alice, _genesis) = seeded_account(5, &genesis_key, &config);
        assert!(alice.validate_integrity().is_ok());
    }
}
