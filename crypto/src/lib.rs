//! EZchain cryptographic primitives.
//!
//! Everything else in the workspace builds digests, signatures, Merkle
//! proofs and Bloom filters on top of this crate so that there is exactly
//! one place that decides what "hash" and "sign" mean.

use blake2::{Blake2b512, Digest as _};
use serde::Serialize;

pub mod bloom;
pub mod error;
pub mod keys;
pub mod merkle;

pub use error::{CryptoError, Result};

/// A fixed 256-bit content hash, used everywhere a "digest" is mentioned in
/// the data model: transaction hashes, block hashes, Merkle nodes.
pub type Hash = [u8; 32];

/// The all-zero hash, used as the Merkle root of an empty leaf set and as
/// the genesis block's `pre_hash`.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Hashes raw bytes with the primitive used throughout the crate
/// (Blake2b-512, truncated to 256 bits).
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let digest = Blake2b512::digest(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

/// Hashes the canonical (bincode) encoding of a serializable value.
///
/// This is the "canonical, deterministic byte serialization" referenced
/// throughout the data model: field order follows struct declaration order,
/// integers are encoded fixed-width little-endian by `bincode`'s default
/// configuration, byte strings are length-prefixed. Every digest in the
/// system (transaction hash, block hash, MultiTransactions digest,
/// SubmitTxInfo identity hash) goes through this one function, so the
/// choice of endianness is internally consistent even though it departs
/// from the data model's literal "big-endian" wording — see DESIGN.md's
/// Open Question decisions for why this deviation is deliberate.
pub fn digest_canonical<T: Serialize>(value: &T) -> Hash {
    let encoded = bincode::serialize(value).expect("canonical encoding never fails");
    hash_bytes(&encoded)
}

/// `H(left || right)`, the internal-node hash used by the Merkle tree.
pub fn hash_pair(left: &Hash, right: &Hash) -> Hash {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(left);
    buf.extend_from_slice(right);
    hash_bytes(&buf)
}

/// Hex-encodes a hash the way the wire protocol does at message boundaries.
pub fn hex_encode(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Parses a lowercase hex string back into a [`Hash`].
pub fn hex_decode(s: &str) -> Result<Hash> {
    let bytes = hex::decode(s).map_err(|_| CryptoError::MalformedHex)?;
    if bytes.len() != 32 {
        return Err(CryptoError::MalformedHex);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}
