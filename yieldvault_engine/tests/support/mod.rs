//! Shared fixtures for the engine integration tests. Every test gets its own throwaway SQLite
//! database, migrated to the current schema.
use yieldvault_engine::{
    adapters::{EventMetadata, PaymentEvent, PaymentEventOutcome},
    db_types::{Category, PaymentChannel, Tier, UserId},
    events::EventProducers,
    position_objects::NewPositionRequest,
    test_utils::{prepare_test_env, random_db_path},
    AccountApi,
    PositionFlowApi,
    SqliteDatabase,
};
use yv_common::UsdCents;

pub struct TestContext {
    pub db: SqliteDatabase,
    pub flow: PositionFlowApi<SqliteDatabase>,
    pub accounts: AccountApi<SqliteDatabase>,
}

pub async fn new_test_context() -> TestContext {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error connecting to test database");
    let flow = PositionFlowApi::new(db.clone(), EventProducers::default());
    let accounts = AccountApi::new(db.clone());
    TestContext { db, flow, accounts }
}

/// A confirmed card-processor callback for a new position, gold tier over 4 weeks.
pub fn card_payment(user: &str, reference: &str, amount: UsdCents) -> PaymentEvent {
    PaymentEvent {
        channel: PaymentChannel::Card,
        external_reference: reference.to_string(),
        amount,
        outcome: PaymentEventOutcome::Confirmed,
        metadata: EventMetadata {
            user_id: UserId::from(user),
            category: "Stocks".to_string(),
            tier: "Gold".to_string(),
            duration_weeks: 4,
            auto_reinvest: false,
        },
        position_id: None,
    }
}

pub fn crypto_position_request(principal: UsdCents) -> NewPositionRequest {
    NewPositionRequest {
        category: Category::Crypto,
        tier: Tier::Gold,
        principal,
        duration_weeks: 4,
        channel: PaymentChannel::Crypto,
        auto_reinvest: false,
    }
}
