use std::fmt::Display;

use serde::{Deserialize, Serialize};
use yieldvault_engine::{
    adapters::{CorrelationHandle, PaymentInstructions},
    db_types::{Position, WithdrawalMethod},
    returns::ReturnPreview,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Response to an instant-channel position request: the charge handle the client completes
/// payment with, plus the payout curve the position will carry once confirmed.
#[derive(Debug, Clone, Serialize)]
pub struct InstantChargeResponse {
    pub handle: CorrelationHandle,
    pub preview: ReturnPreview,
}

/// Response to a manual-channel position request: the pending position and where to send funds.
#[derive(Debug, Clone, Serialize)]
pub struct ManualPositionResponse {
    pub position: Position,
    pub instructions: PaymentInstructions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalParams {
    pub method: WithdrawalMethod,
    pub destination: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RejectParams {
    #[serde(default)]
    pub reason: Option<String>,
}
