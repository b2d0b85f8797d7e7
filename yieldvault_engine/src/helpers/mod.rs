//! Input validation helpers for user-supplied payment proofs.
use regex::Regex;

use crate::{
    api::position_objects::PaymentProof,
    db_types::{PaymentChannel, ValidationError},
};

/// Check that a manual-channel payment proof is plausibly shaped before it is attached to a
/// position. Crypto proofs are transaction hashes; wire proofs are a reference number plus the
/// sender's identity.
pub fn validate_payment_proof(channel: PaymentChannel, proof: &PaymentProof) -> Result<(), ValidationError> {
    match channel {
        PaymentChannel::Crypto => {
            let re = Regex::new(r"^(0x)?[A-Fa-f0-9]{32,128}$").unwrap();
            if !re.is_match(proof.reference.trim()) {
                return Err(ValidationError::InvalidProof(format!(
                    "'{}' does not look like a transaction hash",
                    proof.reference
                )));
            }
            Ok(())
        },
        PaymentChannel::Wire => {
            let re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 /-]{5,63}$").unwrap();
            if !re.is_match(proof.reference.trim()) {
                return Err(ValidationError::InvalidProof(format!(
                    "'{}' does not look like a wire reference number",
                    proof.reference
                )));
            }
            if proof.sender_identity.as_deref().map(str::trim).unwrap_or("").is_empty() {
                return Err(ValidationError::InvalidProof("Wire proofs require the sender's name".to_string()));
            }
            Ok(())
        },
        PaymentChannel::Card | PaymentChannel::Wallet => Err(ValidationError::InvalidProof(format!(
            "{channel} payments are confirmed automatically and take no manual proof"
        ))),
    }
}
