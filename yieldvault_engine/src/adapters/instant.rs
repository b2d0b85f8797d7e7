use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yv_common::UsdCents;

use crate::{
    adapters::{EventMetadata, PaymentAdapterError},
    db_types::PaymentChannel,
};

/// A charge to be created at an external processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeRequest {
    pub amount: UsdCents,
    pub metadata: EventMetadata,
}

/// The handle an instant adapter returns. Nothing in the ledger changes until the processor's
/// signed callback carries the `reference` back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationHandle {
    pub channel: PaymentChannel,
    pub reference: String,
    pub checkout_url: String,
    pub created_at: DateTime<Utc>,
}

/// An instant-confirm payment channel. Implementations wrap the concrete processor clients; the
/// engine only sees this trait, so processors are swappable.
#[allow(async_fn_in_trait)]
pub trait InstantAdapter: Send + Sync {
    fn channel(&self) -> PaymentChannel;

    /// Create the charge and return the correlation handle. Must not mutate any ledger state.
    async fn create_charge(&self, request: &ChargeRequest) -> Result<CorrelationHandle, PaymentAdapterError>;
}
