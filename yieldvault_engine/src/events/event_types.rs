use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::PaymentInstructions,
    db_types::{PaymentChannel, PositionStatus, UserId},
};

/// Pushed when admin-composed payment instructions become available for a pending position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInstructionsReadyEvent {
    pub position_id: i64,
    pub user_id: UserId,
    pub channel: PaymentChannel,
    pub instructions: PaymentInstructions,
    pub timestamp: DateTime<Utc>,
}

impl PaymentInstructionsReadyEvent {
    pub fn new(position_id: i64, user_id: UserId, instructions: PaymentInstructions) -> Self {
        let channel = instructions.channel();
        Self { position_id, user_id, channel, instructions, timestamp: Utc::now() }
    }
}

/// Pushed whenever a position changes status (activated, completed, withdrawn, rejected).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionStatusChangedEvent {
    pub position_id: i64,
    pub user_id: UserId,
    pub status: PositionStatus,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl PositionStatusChangedEvent {
    pub fn new<S: Into<String>>(position_id: i64, user_id: UserId, status: PositionStatus, message: S) -> Self {
        Self { position_id, user_id, status, message: message.into(), timestamp: Utc::now() }
    }
}
