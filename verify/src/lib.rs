//! The VPB verifier (§4.8): checks that a (Value, proof_units,
//! block_index_list) triple received from another account is a legitimate,
//! non-double-spent provenance chain back to genesis.

pub mod main_chain;
pub mod report;

use ezchain_core::proof::{BlockIndexList, ProofUnit};
use ezchain_core::value::Value;
use ezchain_crypto::merkle::verify_merkle_proof;
use tracing::warn;

pub use main_chain::MainChainInfo;
pub use report::{VerificationError, VerificationErrorType, VerificationReport};

/// One (height, proof_unit) pairing sliced from the evidence trail.
struct Epoch<'a> {
    height: u64,
    owner: &'a ezchain_crypto::keys::Address,
    proof_unit: &'a ProofUnit,
}

fn slice_epochs<'a>(proof_units: &'a [ProofUnit], block_index: &'a BlockIndexList) -> Result<Vec<Epoch<'a>>, VerificationError> {
    let entries = block_index.entries();
    if entries.len() != proof_units.len() {
        return Err(VerificationError::new(
            VerificationErrorType::DataStructureValidationFailed,
            None,
            None,
            "proof_units length does not match block_index_list length",
        ));
    }
    Ok(entries
        .iter()
        .zip(proof_units.iter())
        .map(|(entry, unit)| Epoch {
            height: entry.height,
            owner: &entry.owner,
            proof_unit: unit,
        })
        .collect())
}

/// Verifies `value`'s provenance given its `proof_units` and `block_index`
/// against `chain`'s evidence. Never panics: internal errors are reported as
/// `VerificationException` rather than propagated.
pub fn verify_vpb(value: &Value, proof_units: &[ProofUnit], block_index: &BlockIndexList, chain: &MainChainInfo) -> VerificationReport {
    let start = std::time::Instant::now();
    let checkpoint_used = chain.checkpoint;

    let epochs = match slice_epochs(proof_units, block_index) {
        Ok(e) => e,
        Err(e) => return VerificationReport::fail(vec![e], checkpoint_used, elapsed_ms(start)),
    };
    if epochs.is_empty() {
        return VerificationReport::fail(
            vec![VerificationError::new(
                VerificationErrorType::DataStructureValidationFailed,
                None,
                None,
                "value has no provenance evidence at all",
            )],
            checkpoint_used,
            elapsed_ms(start),
        );
    }

    let mut errors = Vec::new();

    for (i, epoch) in epochs.iter().enumerate() {
        let below_checkpoint = checkpoint_used.map(|cp| epoch.height < cp).unwrap_or(false);

        // Step 2: data-structure validation always runs, even under a
        // checkpoint, since it's cheap and catches malformed evidence early.
        if let Err(e) = epoch.proof_unit.owner_multi_transactions.verify() {
            errors.push(VerificationError::new(
                VerificationErrorType::ProofUnitValidationFailed,
                Some(epoch.height),
                Some(i),
                format!("owner_multi_transactions failed to verify: {e}"),
            ));
            continue;
        }

        if below_checkpoint {
            continue;
        }

        let leaf = epoch.proof_unit.owner_multi_transactions.compute_digest();
        let root = match chain.merkle_roots.get(&epoch.height) {
            Some(r) => *r,
            None => {
                errors.push(VerificationError::new(
                    VerificationErrorType::DataStructureValidationFailed,
                    Some(epoch.height),
                    Some(i),
                    "no recorded merkle root at this height",
                ));
                continue;
            }
        };

        if i == 0 {
            // Genesis epoch: the single-leaf tree collapses root == leaf.
            let well_formed = epoch.proof_unit.inclusion_proof == vec![root] && leaf == root;
            if !well_formed {
                errors.push(VerificationError::new(
                    VerificationErrorType::MissingGenesisValueDistribution,
                    Some(epoch.height),
                    Some(i),
                    "value is not traceable to the unified genesis distribution",
                ));
            }
        } else {
            let ok = verify_merkle_proof(
                leaf,
                epoch.proof_unit.leaf_index as usize,
                epoch.proof_unit.leaf_count as usize,
                &epoch.proof_unit.inclusion_proof,
                root,
            );
            if !ok {
                errors.push(VerificationError::new(
                    VerificationErrorType::MerkleProofVerificationFailed,
                    Some(epoch.height),
                    Some(i),
                    "inclusion proof does not fold up to the recorded merkle root",
                ));
            }
        }

        // Step 4: value transfer continuity into the next epoch's owner.
        if let Some(next) = epochs.get(i + 1) {
            let continuity = epoch.proof_unit.owner_multi_transactions.transactions.iter().any(|tx| {
                tx.recipient == *next.owner
                    && tx
                        .values
                        .iter()
                        .any(|v| v.begin_index <= value.begin_index && v.end_index() >= value.end_index())
            });
            if !continuity {
                errors.push(VerificationError::new(
                    VerificationErrorType::NoValidTargetValueTransfer,
                    Some(epoch.height),
                    Some(i),
                    "no transaction in this epoch transfers the target interval to the next owner",
                ));
            }

            // Step 5: double-spend check over the open height range between
            // this epoch and the next.
            for h in (epoch.height + 1)..next.height {
                if let Some(bloom) = chain.bloom_filters.get(&h) {
                    if bloom.probably_contains(epoch.owner.as_str().as_bytes()) {
                        warn!(height = h, owner = %epoch.owner, "possible double spend: claimant appears in bloom filter between epochs");
                        errors.push(VerificationError::new(
                            VerificationErrorType::DoubleSpendDetected,
                            Some(h),
                            Some(i),
                            format!("claimant address appears in the bloom filter at height {h}, between consecutive epochs"),
                        ));
                    }
                } else {
                    warn!(height = h, "no recorded bloom filter at this height, cannot rule out double spend");
                    errors.push(VerificationError::new(
                        VerificationErrorType::BloomFilterValidationFailed,
                        Some(h),
                        Some(i),
                        "no recorded bloom filter at this height",
                    ));
                }
            }
        }
    }

    if errors.is_empty() {
        VerificationReport::pass(checkpoint_used, elapsed_ms(start))
    } else {
        VerificationReport::fail(errors, checkpoint_used, elapsed_ms(start))
    }
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
