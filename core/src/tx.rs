//! Transaction, `MultiTransactions` and `SubmitTxInfo` — the signed batch
//! submission protocol (§3, §4.3).

use serde::{Deserialize, Serialize};

use ezchain_crypto::keys::{verify, Address, PublicKey, Signature, SigningKey};
use ezchain_crypto::{digest_canonical, Hash};

use crate::config::PROTOCOL_VERSION;
use crate::error::{CoreError, Result};
use crate::value::Value;

/// A single transfer of value from `sender` to `recipient`.
///
/// The signature covers the canonical encoding of the first six fields
/// (sender, recipient, nonce, values, timestamp) — everything except the
/// signature and pubkey themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: Address,
    pub recipient: Address,
    pub nonce: u64,
    pub values: Vec<Value>,
    pub timestamp: i64,
    pub signature: Option<Signature>,
    pub sender_pubkey: Option<PublicKey>,
}

#[derive(Serialize)]
struct TransactionSigningPayload<'a> {
    sender: &'a Address,
    recipient: &'a Address,
    nonce: u64,
    values: &'a [Value],
    timestamp: i64,
}

impl Transaction {
    pub fn new(sender: Address, recipient: Address, nonce: u64, values: Vec<Value>, timestamp: i64) -> Self {
        Self {
            sender,
            recipient,
            nonce,
            values,
            timestamp,
            signature: None,
            sender_pubkey: None,
        }
    }

    fn signing_payload(&self) -> TransactionSigningPayload<'_> {
        TransactionSigningPayload {
            sender: &self.sender,
            recipient: &self.recipient,
            nonce: self.nonce,
            values: &self.values,
            timestamp: self.timestamp,
        }
    }

    /// The deterministic digest over `(sender, recipient, nonce, values, timestamp)`.
    pub fn message_digest(&self) -> Hash {
        digest_canonical(&self.signing_payload())
    }

    /// Content-addressable transaction hash, used as the identity of this
    /// transaction wherever it is referenced (e.g. value-transfer
    /// continuity checks during verification).
    pub fn hash(&self) -> Hash {
        digest_canonical(&self.signing_payload())
    }

    pub fn sign(&mut self, key: &SigningKey) {
        let digest = self.message_digest();
        self.signature = Some(key.sign(&digest));
        self.sender_pubkey = Some(key.public_key());
    }

    pub fn verify(&self) -> Result<()> {
        let sig = self.signature.as_ref().ok_or(CoreError::StructuralInvalid("transaction missing signature"))?;
        let pubkey = self
            .sender_pubkey
            .as_ref()
            .ok_or(CoreError::StructuralInvalid("transaction missing sender pubkey"))?;
        let digest = self.message_digest();
        verify(pubkey, &digest, sig).map_err(CoreError::Crypto)
    }
}

/// A batch of transactions sharing one sender, authorised by a single
/// aggregate signature over their combined digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiTransactions {
    pub sender: Address,
    pub transactions: Vec<Transaction>,
    pub aggregate_signature: Option<Signature>,
    pub sender_pubkey: Option<PublicKey>,
    pub digest: Option<Hash>,
}

impl MultiTransactions {
    /// Builds an (unsigned) batch, failing if the inner transactions don't
    /// all share `sender` or if the batch is empty.
    pub fn new(sender: Address, transactions: Vec<Transaction>) -> Result<Self> {
        if transactions.is_empty() {
            return Err(CoreError::EmptyBatch);
        }
        if transactions.iter().any(|t| t.sender != sender) {
            return Err(CoreError::MixedSenders);
        }
        Ok(Self {
            sender,
            transactions,
            aggregate_signature: None,
            sender_pubkey: None,
            digest: None,
        })
    }

    /// `digest = H(sender || H(inner digests in order))`.
    pub fn compute_digest(&self) -> Hash {
        let inner_digests: Vec<Hash> = self.transactions.iter().map(|t| t.hash()).collect();
        let inner_root = digest_canonical(&inner_digests);
        digest_canonical(&(self.sender.clone(), inner_root))
    }

    /// Signs every inner transaction individually, then computes and signs
    /// the batch digest.
    pub fn sign(&mut self, key: &SigningKey) {
        for tx in &mut self.transactions {
            tx.sign(key);
        }
        let digest = self.compute_digest();
        self.digest = Some(digest);
        self.aggregate_signature = Some(key.sign(&digest));
        self.sender_pubkey = Some(key.public_key());
    }

    /// Checks the aggregate signature and every inner transaction's
    /// signature.
    pub fn verify(&self) -> Result<()> {
        let digest = self.digest.ok_or(CoreError::StructuralInvalid("multi-transactions missing digest"))?;
        if digest != self.compute_digest() {
            return Err(CoreError::IdentityMismatch("multi-transactions digest does not match contents"));
        }
        let sig = self
            .aggregate_signature
            .as_ref()
            .ok_or(CoreError::StructuralInvalid("multi-transactions missing aggregate signature"))?;
        let pubkey = self
            .sender_pubkey
            .as_ref()
            .ok_or(CoreError::StructuralInvalid("multi-transactions missing sender pubkey"))?;
        verify(pubkey, &digest, sig).map_err(CoreError::Crypto)?;
        for tx in &self.transactions {
            if tx.sender != self.sender {
                return Err(CoreError::MixedSenders);
            }
            tx.verify()?;
        }
        Ok(())
    }
}

/// The envelope by which an account announces a `MultiTransactions` to the
/// pool: `(multi_tx_hash, submit_timestamp, version, submitter, signature,
/// pubkey)`. Signature covers the first four fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTxInfo {
    pub multi_transactions_hash: Hash,
    pub submit_timestamp: String,
    pub version: String,
    pub submitter_address: Address,
    pub signature: Signature,
    pub submitter_pubkey: PublicKey,
}

#[derive(Serialize)]
struct SubmitSigningPayload<'a> {
    multi_transactions_hash: &'a Hash,
    submit_timestamp: &'a str,
    version: &'a str,
    submitter_address: &'a Address,
}

impl SubmitTxInfo {
    /// Builds and signs a `SubmitTxInfo` for an already-signed, verified
    /// `multi_tx`. `submit_timestamp` must be ISO-8601 (RFC 3339).
    pub fn create(multi_tx: &MultiTransactions, key: &SigningKey, submit_timestamp: String) -> Result<Self> {
        multi_tx.verify()?;
        let digest = multi_tx.digest.ok_or(CoreError::StructuralInvalid("multi-transactions missing digest"))?;
        let submitter_address = key.address();
        let payload = SubmitSigningPayload {
            multi_transactions_hash: &digest,
            submit_timestamp: &submit_timestamp,
            version: PROTOCOL_VERSION,
            submitter_address: &submitter_address,
        };
        let msg = digest_canonical(&payload);
        Ok(Self {
            multi_transactions_hash: digest,
            submit_timestamp,
            version: PROTOCOL_VERSION.to_string(),
            submitter_address,
            signature: key.sign(&msg),
            submitter_pubkey: key.public_key(),
        })
    }

    fn signing_digest(&self) -> Hash {
        let payload = SubmitSigningPayload {
            multi_transactions_hash: &self.multi_transactions_hash,
            submit_timestamp: &self.submit_timestamp,
            version: &self.version,
            submitter_address: &self.submitter_address,
        };
        digest_canonical(&payload)
    }

    /// This submission's own identity hash: the digest of all six fields,
    /// used as the pool's primary key.
    pub fn hash(&self) -> Hash {
        digest_canonical(&(
            self.multi_transactions_hash,
            self.submit_timestamp.clone(),
            self.version.clone(),
            self.submitter_address.clone(),
            self.signature.clone(),
            self.submitter_pubkey.clone(),
        ))
    }

    /// Validates version, timestamp parseability and the signature over the
    /// four-field tuple. If `multi_tx` is supplied, also checks digest and
    /// sender identity consistency.
    pub fn verify(&self, multi_tx: Option<&MultiTransactions>) -> Result<()> {
        if self.version != PROTOCOL_VERSION {
            return Err(CoreError::VersionMismatch);
        }
        chrono::DateTime::parse_from_rfc3339(&self.submit_timestamp)
            .map_err(|_| CoreError::StructuralInvalid("submit_timestamp is not valid ISO-8601"))?;
        let digest = self.signing_digest();
        verify(&self.submitter_pubkey, &digest, &self.signature).map_err(CoreError::Crypto)?;

        if let Some(mt) = multi_tx {
            if mt.digest != Some(self.multi_transactions_hash) {
                return Err(CoreError::IdentityMismatch("multi_tx.digest != multi_transactions_hash"));
            }
            if mt.sender != self.submitter_address {
                return Err(CoreError::IdentityMismatch("multi_tx.sender != submitter_address"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueState;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn key(seed: u64) -> SigningKey {
        let mut rng = StdRng::seed_from_u64(seed);
        SigningKey::generate(&mut rng)
    }

    fn value(begin: u128, num: u64) -> Value {
        Value::new(begin, num, ValueState::Selected).unwrap()
    }

    #[test]
    fn transaction_sign_verify_roundtrip() {
        let sender = key(1);
        let recipient = key(2).address();
        let mut tx = Transaction::new(sender.address(), recipient, 0, vec![value(0, 10)], 1000);
        tx.sign(&sender);
        assert!(tx.verify().is_ok());
    }

    #[test]
    fn transaction_verify_fails_without_signature() {
        let sender = key(1);
        let recipient = key(2).address();
        let tx = Transaction::new(sender.address(), recipient, 0, vec![value(0, 10)], 1000);
        assert!(tx.verify().is_err());
    }

    #[test]
    fn multi_transactions_rejects_mixed_senders() {
        let a = key(1).address();
        let b = key(2).address();
        let tx1 = Transaction::new(a.clone(), b.clone(), 0, vec![value(0, 5)], 1);
        let tx2 = Transaction::new(b.clone(), a, 1, vec![value(10, 5)], 1);
        assert_eq!(MultiTransactions::new(tx1.sender.clone(), vec![tx1, tx2]), Err(CoreError::MixedSenders));
    }

    #[test]
    fn multi_transactions_sign_verify_roundtrip() {
        let sender = key(1);
        let r1 = key(2).address();
        let r2 = key(3).address();
        let tx1 = Transaction::new(sender.address(), r1, 0, vec![value(0, 5)], 1);
        let tx2 = Transaction::new(sender.address(), r2, 1, vec![value(10, 5)], 1);
        let mut mt = MultiTransactions::new(sender.address(), vec![tx1, tx2]).unwrap();
        mt.sign(&sender);
        assert!(mt.verify().is_ok());
    }

    #[test]
    fn submit_tx_info_roundtrip() {
        let sender = key(1);
        let recipient = key(2).address();
        let tx = Transaction::new(sender.address(), recipient, 0, vec![value(0, 5)], 1);
        let mut mt = MultiTransactions::new(sender.address(), vec![tx]).unwrap();
        mt.sign(&sender);
        let sti = SubmitTxInfo::create(&mt, &sender, "2024-01-01T00:00:00Z".to_string()).unwrap();
        assert!(sti.verify(Some(&mt)).is_ok());
    }

    #[test]
    fn submit_tx_info_rejects_mismatched_multi_tx() {
        let sender = key(1);
        let other_sender = key(4);
        let recipient = key(2).address();
        let tx = Transaction::new(sender.address(), recipient.clone(), 0, vec![value(0, 5)], 1);
        let mut mt = MultiTransactions::new(sender.address(), vec![tx]).unwrap();
        mt.sign(&sender);
        let sti = SubmitTxInfo::create(&mt, &sender, "2024-01-01T00:00:00Z".to_string()).unwrap();

        let other_tx = Transaction::new(other_sender.address(), recipient, 0, vec![value(100, 5)], 1);
        let mut other_mt = MultiTransactions::new(other_sender.address(), vec![other_tx]).unwrap();
        other_mt.sign(&other_sender);
        assert!(sti.verify(Some(&other_mt)).is_err());
    }
}
