use serde::{Deserialize, Serialize};
use yv_common::UsdCents;

use crate::db_types::{Category, PaymentChannel, Tier};

/// A client's request to open a new position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPositionRequest {
    pub category: Category,
    pub tier: Tier,
    pub principal: UsdCents,
    pub duration_weeks: i64,
    pub channel: PaymentChannel,
    #[serde(default)]
    pub auto_reinvest: bool,
}

/// User-supplied evidence that a manual-channel payment was made: a transaction hash for crypto,
/// or a wire reference number plus the sender's name for bank transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentProof {
    pub reference: String,
    #[serde(default)]
    pub sender_identity: Option<String>,
}
