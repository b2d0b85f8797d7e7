//! Payment adapters: one per channel, each producing a normalized [`PaymentEvent`].
//!
//! Instant channels (card, wallet) hand the charge to an external processor and only ever return
//! a correlation handle — the ledger is untouched until the signed callback arrives. Manual
//! channels (crypto, wire) return payment instructions immediately and leave the position pending
//! until an admin approves the user-submitted proof.
mod instant;
mod manual;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use yv_common::UsdCents;

use crate::db_types::{PaymentChannel, UserId};

pub use instant::{ChargeRequest, CorrelationHandle, InstantAdapter};
pub use manual::{ManualChannelDefaults, PaymentInstructions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentEventOutcome {
    /// Funds confirmed; the reconciliation engine may activate the position.
    Confirmed,
    /// The charge exists at the processor but has not settled yet.
    Submitted,
    /// The processor reported a terminal failure.
    Failed,
}

/// Position parameters carried round-trip through the external processor, echoed back on the
/// callback so reconciliation needs no state between charge and confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    pub user_id: UserId,
    pub category: String,
    pub tier: String,
    pub duration_weeks: i64,
    #[serde(default)]
    pub auto_reinvest: bool,
}

/// The single shape every channel reduces to before it reaches the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    pub channel: PaymentChannel,
    /// The idempotency key: the processor's charge reference, or the user-submitted proof.
    pub external_reference: String,
    pub amount: UsdCents,
    pub outcome: PaymentEventOutcome,
    pub metadata: EventMetadata,
    /// Set for manual-channel approvals, where the pending position already exists.
    pub position_id: Option<i64>,
}

#[derive(Debug, Clone, Error)]
pub enum PaymentAdapterError {
    #[error("Invalid charge request: {0}")]
    Validation(String),
    #[error("The payment processor is unreachable: {0}")]
    Unavailable(String),
    #[error("The payment processor rejected the request. Error {status}. {message}")]
    Remote { status: u16, message: String },
}

impl PaymentAdapterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Remote { status: 500..=599, .. })
    }
}
