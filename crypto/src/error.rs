//! Error types for the **ezchain-crypto** crate.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum CryptoError {
    #[error("signature verification failed")]
    BadSignature,

    #[error("malformed public key bytes")]
    MalformedPublicKey,

    #[error("malformed private key bytes")]
    MalformedPrivateKey,

    #[error("malformed signature bytes")]
    MalformedSignature,

    #[error("malformed hex string")]
    MalformedHex,

    #[error("merkle proof index out of range")]
    MerkleIndexOutOfRange,

    #[error("merkle proof does not verify against the given root")]
    MerkleProofInvalid,
}

pub type Result<T> = core::result::Result<T, CryptoError>;
