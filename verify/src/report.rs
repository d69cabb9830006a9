//! The verifier's structured output (§4.8 "Output").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationErrorType {
    MissingGenesisValueDistribution,
    NoValidTargetValueTransfer,
    DoubleSpendDetected,
    MerkleProofVerificationFailed,
    BloomFilterValidationFailed,
    DataStructureValidationFailed,
    ProofUnitValidationFailed,
    VerificationException,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationError {
    pub error_type: VerificationErrorType,
    pub block_height: Option<u64>,
    pub proof_index: Option<usize>,
    pub message: String,
}

impl VerificationError {
    pub fn new(error_type: VerificationErrorType, block_height: Option<u64>, proof_index: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            error_type,
            block_height,
            proof_index,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub is_valid: bool,
    pub errors: Vec<VerificationError>,
    pub checkpoint_used: Option<u64>,
    pub verification_time_ms: u64,
}

impl VerificationReport {
    pub fn pass(checkpoint_used: Option<u64>, verification_time_ms: u64) -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            checkpoint_used,
            verification_time_ms,
        }
    }

    pub fn fail(errors: Vec<VerificationError>, checkpoint_used: Option<u64>, verification_time_ms: u64) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            checkpoint_used,
            verification_time_ms,
        }
    }
}
