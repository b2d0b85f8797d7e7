use chrono::{DateTime, Utc};
use thiserror::Error;
use yv_common::UsdCents;

use crate::{
    adapters::{PaymentAdapterError, PaymentInstructions},
    db_types::{
        LedgerEvent,
        NewLedgerEvent,
        NewPosition,
        NewWithdrawalRequest,
        Position,
        ValidationError,
        WithdrawalRequest,
    },
    traits::AccountApiError,
};

/// The highest-level behaviour contract for backends supporting the YieldVault engine.
///
/// Every mutating method is atomic: the position row, its ledger event, and the owner totals move
/// together or not at all. Methods that take a `version` argument are compare-and-swap updates —
/// a stale version affects zero rows and surfaces as [`LedgerError::ConcurrentModification`].
#[allow(async_fn_in_trait)]
pub trait LedgerDatabase: Clone + crate::traits::AccountManagement {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// Look up the ledger event carrying the given external reference, if any. This is the
    /// idempotency probe: a `Completed` hit means the payment was already reconciled.
    async fn fetch_ledger_event_by_reference(&self, reference: &str) -> Result<Option<LedgerEvent>, LedgerError>;

    /// Instant-channel reconciliation. In a single transaction: insert the position as `Active`,
    /// append the `Completed` credit event, and increment the owner's invested totals.
    ///
    /// A concurrent duplicate delivery loses the unique-index race on the event's external
    /// reference and returns [`LedgerError::DuplicateEvent`].
    async fn insert_confirmed_position(
        &self,
        position: NewPosition,
        event: NewLedgerEvent,
    ) -> Result<Position, LedgerError>;

    /// Manual-channel submission. In a single transaction: insert the position as `Pending` and
    /// append a `Pending` credit event with no external reference yet. Owner totals are untouched
    /// until approval.
    async fn insert_pending_position(&self, position: NewPosition, event: NewLedgerEvent)
        -> Result<Position, LedgerError>;

    /// Attach a user-submitted payment proof to a pending position and its pending ledger event.
    /// The proof becomes the event's external reference; a proof already used by any other event
    /// is rejected with [`LedgerError::ProofAlreadyUsed`].
    async fn attach_payment_proof(&self, position_id: i64, reference: &str) -> Result<Position, LedgerError>;

    /// Manual-channel approval. In a single transaction: CAS the position from `Pending` to
    /// `Active` (re-stamping `started_at`/`matures_at` from `now`), complete the pending ledger
    /// event, and increment the owner's invested totals.
    async fn activate_position(
        &self,
        position_id: i64,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError>;

    /// Admin denial or expiry. CAS the position from `Pending` to `Rejected` and mark its pending
    /// ledger event `Failed`. Owner totals are not touched.
    async fn reject_position(
        &self,
        position_id: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError>;

    /// Store admin-composed payment instructions on a pending position.
    async fn set_payment_instructions(
        &self,
        position_id: i64,
        instructions: &PaymentInstructions,
    ) -> Result<Position, LedgerError>;

    /// Persist a scheduler valuation tick. CAS on `(position_id, version)`.
    async fn persist_valuation(
        &self,
        position_id: i64,
        version: i64,
        value: UsdCents,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError>;

    /// Settle a matured position. In a single transaction: CAS from `Active` to `Completed` at
    /// exactly `principal + expected_payout`, append the `Completed` accrual event for the profit,
    /// and move the owner totals from invested to earned.
    async fn complete_position(&self, position_id: i64, version: i64, now: DateTime<Utc>)
        -> Result<Position, LedgerError>;

    /// Create a withdrawal request. In a single transaction: CAS the position from `Active` to
    /// `Withdrawn`, insert the request, append the `Completed` debit event (and a `Fee` event when
    /// `fee` is non-zero), and update the owner's withdrawn totals.
    async fn create_withdrawal(
        &self,
        position_id: i64,
        version: i64,
        request: NewWithdrawalRequest,
        fee: Option<UsdCents>,
        now: DateTime<Utc>,
    ) -> Result<(Position, WithdrawalRequest), LedgerError>;

    /// All positions currently accruing value.
    async fn fetch_active_positions(&self) -> Result<Vec<Position>, LedgerError>;

    /// Pending positions whose payment window has lapsed (no update since `cutoff`).
    async fn fetch_stale_pending_positions(&self, cutoff: DateTime<Utc>) -> Result<Vec<Position>, LedgerError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), LedgerError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("A ledger event already exists for external reference {0}")]
    DuplicateEvent(String),
    #[error("The payment proof {0} is already attached to another ledger event")]
    ProofAlreadyUsed(String),
    #[error("The requested position {0} does not exist")]
    PositionNotFound(i64),
    #[error("No ledger event found for external reference {0}")]
    EventNotFound(String),
    #[error("Illegal position state change: {0}")]
    StateViolation(String),
    #[error("Concurrent modification of position {0}; the write was stale and must be retried")]
    ConcurrentModification(i64),
    #[error("{0}")]
    AccountError(#[from] AccountApiError),
    #[error("{0}")]
    AdapterError(#[from] PaymentAdapterError),
}

impl LedgerError {
    /// Idempotency hits are not failures: callers treat them as a success no-op.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::DuplicateEvent(_))
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
