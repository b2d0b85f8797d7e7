//! Glue between the engine's adapter abstractions and the concrete processor clients.
use chrono::{DateTime, Utc};
use processor_tools::{ChargeMetadata, ChargeState, NewChargeRequest, ProcessorApi, ProcessorApiError};
use serde::Deserialize;
use yieldvault_engine::{
    adapters::{ChargeRequest, CorrelationHandle, EventMetadata, InstantAdapter, PaymentAdapterError, PaymentEvent, PaymentEventOutcome},
    db_types::{PaymentChannel, UserId},
};
use yv_common::{UsdCents, USD_CURRENCY_CODE};

/// An instant-channel adapter backed by one of the processor REST clients. The engine only sees
/// the [`InstantAdapter`] trait, so either processor (or a fake in tests) slots in unchanged.
#[derive(Clone)]
pub struct ProcessorAdapter {
    api: ProcessorApi,
    channel: PaymentChannel,
}

impl ProcessorAdapter {
    pub fn card(api: ProcessorApi) -> Self {
        Self { api, channel: PaymentChannel::Card }
    }

    pub fn wallet(api: ProcessorApi) -> Self {
        Self { api, channel: PaymentChannel::Wallet }
    }
}

impl InstantAdapter for ProcessorAdapter {
    fn channel(&self) -> PaymentChannel {
        self.channel
    }

    async fn create_charge(&self, request: &ChargeRequest) -> Result<CorrelationHandle, PaymentAdapterError> {
        let charge = NewChargeRequest {
            amount: request.amount,
            currency: USD_CURRENCY_CODE.to_string(),
            metadata: ChargeMetadata {
                user_id: request.metadata.user_id.to_string(),
                category: request.metadata.category.clone(),
                tier: request.metadata.tier.clone(),
                duration_weeks: request.metadata.duration_weeks,
                auto_reinvest: request.metadata.auto_reinvest,
            },
        };
        let handle = self.api.create_charge(&charge).await.map_err(adapter_error)?;
        Ok(CorrelationHandle {
            channel: self.channel,
            reference: handle.reference,
            checkout_url: handle.checkout_url,
            created_at: handle.created_at,
        })
    }
}

/// Both instant adapters, bundled for injection into the request handlers.
#[derive(Clone)]
pub struct InstantAdapters {
    pub card: ProcessorAdapter,
    pub wallet: ProcessorAdapter,
}

fn adapter_error(e: ProcessorApiError) -> PaymentAdapterError {
    match e {
        ProcessorApiError::InvalidCurrencyAmount(m) => PaymentAdapterError::Validation(m),
        ProcessorApiError::QueryError { status, message } => PaymentAdapterError::Remote { status, message },
        other => PaymentAdapterError::Unavailable(other.to_string()),
    }
}

/// The signed callback body both processors deliver. The signature itself is checked by the
/// webhook middleware before deserialization ever happens.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorCallback {
    pub reference: String,
    pub amount_minor_units: i64,
    pub currency: String,
    pub state: ChargeState,
    pub metadata: ChargeMetadata,
    pub created_at: DateTime<Utc>,
}

impl ProcessorCallback {
    /// Reduce the processor-specific payload to the engine's normalized event shape.
    pub fn normalize(self, channel: PaymentChannel) -> PaymentEvent {
        let outcome = match self.state {
            ChargeState::Succeeded => PaymentEventOutcome::Confirmed,
            ChargeState::Created => PaymentEventOutcome::Submitted,
            ChargeState::Failed | ChargeState::Expired => PaymentEventOutcome::Failed,
        };
        PaymentEvent {
            channel,
            external_reference: self.reference,
            amount: UsdCents::from_cents(self.amount_minor_units),
            outcome,
            metadata: EventMetadata {
                user_id: UserId::from(self.metadata.user_id),
                category: self.metadata.category,
                tier: self.metadata.tier,
                duration_weeks: self.metadata.duration_weeks,
                auto_reinvest: self.metadata.auto_reinvest,
            },
            position_id: None,
        }
    }
}
