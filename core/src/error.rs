//! Error types shared by the value ledger, transaction types and genesis
//! builder (§7 "Ledger" and part of "Admission").

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CoreError {
    /// A `Value`'s interval intersects an existing UNSPENT/SELECTED interval.
    #[error("value interval overlaps an existing unspent/selected value")]
    Overlap,

    /// Total UNSPENT balance is smaller than the requested amount.
    #[error("insufficient unspent balance")]
    InsufficientBalance,

    /// Attempted state transition is not allowed by the state DAG.
    #[error("illegal value state transition")]
    StateTransitionIllegal,

    /// Referenced value is not present in the collection.
    #[error("value not found in collection")]
    ValueNotFound,

    /// `begin_index + value_num` overflowed the interval's fixed width.
    #[error("value interval arithmetic overflowed")]
    IntervalOverflow,

    /// `value_num == 0`, violating the minimum-size invariant.
    #[error("value_num must be at least 1")]
    EmptyValue,

    /// A `MultiTransactions` was built from transactions with different senders.
    #[error("all transactions in a MultiTransactions batch must share one sender")]
    MixedSenders,

    /// A `MultiTransactions` or genesis batch had zero inner transactions.
    #[error("transaction batch must not be empty")]
    EmptyBatch,

    /// A structural field required by the wire format was missing or empty.
    #[error("structurally invalid: {0}")]
    StructuralInvalid(&'static str),

    /// `SubmitTxInfo.version` did not match the supported protocol version.
    #[error("protocol version mismatch")]
    VersionMismatch,

    /// A digest/signature consistency check failed (e.g. multi_tx.digest
    /// does not match the submitted hash, or sender != submitter_address).
    #[error("digest or identity mismatch: {0}")]
    IdentityMismatch(&'static str),

    /// The unified genesis Merkle root did not equal its only leaf.
    #[error("genesis single-leaf merkle tree invariant violated")]
    GenesisMerkleMismatch,

    #[error(transparent)]
    Crypto(#[from] ezchain_crypto::CryptoError),
}

pub type Result<T> = core::result::Result<T, CoreError>;
