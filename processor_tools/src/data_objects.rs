use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use yv_common::UsdCents;

/// Correlation metadata carried round-trip through the processor. The webhook callback echoes this
/// back verbatim, so the reconciliation engine can rebuild the position parameters without holding
/// any state between the charge request and the confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeMetadata {
    pub user_id: String,
    pub category: String,
    pub tier: String,
    pub duration_weeks: i64,
    #[serde(default)]
    pub auto_reinvest: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewChargeRequest {
    pub amount: UsdCents,
    pub currency: String,
    pub metadata: ChargeMetadata,
}

/// The processor's correlation handle for a freshly created charge. The `reference` is the
/// idempotency key the webhook will carry; `checkout_url` is where the client completes payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargeHandle {
    pub reference: String,
    pub checkout_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    Created,
    Succeeded,
    Failed,
    Expired,
}

/// A charge as reported by the processor's query endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCharge {
    pub reference: String,
    pub amount: UsdCents,
    pub currency: String,
    pub state: ChargeState,
    pub metadata: ChargeMetadata,
    pub created_at: DateTime<Utc>,
}
