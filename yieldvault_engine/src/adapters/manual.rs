use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::PaymentChannel;

/// Channel-specific payment instructions for the manual channels. Returned to the user at
/// submission time from the platform defaults, and later replaced when an admin composes
/// position-specific instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum PaymentInstructions {
    Crypto {
        address: String,
        network: String,
    },
    Wire {
        bank_name: String,
        account_name: String,
        account_number: String,
        routing_number: String,
        reference: String,
    },
}

impl PaymentInstructions {
    pub fn channel(&self) -> PaymentChannel {
        match self {
            PaymentInstructions::Crypto { .. } => PaymentChannel::Crypto,
            PaymentInstructions::Wire { .. } => PaymentChannel::Wire,
        }
    }
}

/// Platform-level deposit details handed out while no admin-composed instructions exist yet.
#[derive(Debug, Clone, Default)]
pub struct ManualChannelDefaults {
    pub crypto_address: String,
    pub crypto_network: String,
    pub bank_name: String,
    pub bank_account_name: String,
    pub bank_account_number: String,
    pub bank_routing_number: String,
}

impl ManualChannelDefaults {
    pub fn from_env_or_default() -> Self {
        let var = |name: &str, fallback: &str| {
            std::env::var(name).unwrap_or_else(|_| {
                warn!("💸️ {name} is not set. Using a placeholder value.");
                fallback.to_string()
            })
        };
        Self {
            crypto_address: var("YV_CRYPTO_DEPOSIT_ADDRESS", "bc1q-unconfigured"),
            crypto_network: var("YV_CRYPTO_NETWORK", "bitcoin"),
            bank_name: var("YV_WIRE_BANK_NAME", "Unconfigured Bank"),
            bank_account_name: var("YV_WIRE_ACCOUNT_NAME", "YieldVault Ltd"),
            bank_account_number: var("YV_WIRE_ACCOUNT_NUMBER", "00000000"),
            bank_routing_number: var("YV_WIRE_ROUTING_NUMBER", "000000000"),
        }
    }

    /// The default instructions for a manual channel. `reference` ties a wire transfer back to the
    /// position it pays for.
    pub fn instructions_for(&self, channel: PaymentChannel, reference: &str) -> Option<PaymentInstructions> {
        match channel {
            PaymentChannel::Crypto => Some(PaymentInstructions::Crypto {
                address: self.crypto_address.clone(),
                network: self.crypto_network.clone(),
            }),
            PaymentChannel::Wire => Some(PaymentInstructions::Wire {
                bank_name: self.bank_name.clone(),
                account_name: self.bank_account_name.clone(),
                account_number: self.bank_account_number.clone(),
                routing_number: self.bank_routing_number.clone(),
                reference: reference.to_string(),
            }),
            PaymentChannel::Card | PaymentChannel::Wallet => None,
        }
    }
}
