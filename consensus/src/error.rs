//! Errors surfaced by the block assembler and fork engine (§4.6, §4.7, §7 "Chain").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Core(#[from] ezchain_core::error::CoreError),

    #[error("block references a parent hash not present in the fork tree")]
    MissingParent,

    #[error("block index/pre_hash link does not match its claimed parent")]
    InvalidLink,

    #[error("block's merkle root is not well-formed for its selected-entry count")]
    MalformedMerkleRoot,

    #[error("persisted snapshot failed its integrity checksum")]
    IntegrityChecksumMismatch,

    #[error("persistence I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot failed to deserialize: {0}")]
    CorruptRecord(String),
}

pub type Result<T> = core::result::Result<T, ChainError>;
