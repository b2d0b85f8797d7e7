use thiserror::Error;

use crate::db_types::{AccountSummary, LedgerEvent, Position, UserId, WithdrawalRequest};

/// Read-side queries backing the pull/refresh endpoints. Everything a user can be pushed over the
/// notification channel must also be recoverable from here.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// The owner's running totals, or `None` if the user has never invested.
    async fn fetch_account(&self, user_id: &UserId) -> Result<Option<AccountSummary>, AccountApiError>;

    async fn fetch_position(&self, position_id: i64) -> Result<Option<Position>, AccountApiError>;

    /// All positions for the user, newest first.
    async fn fetch_positions_for_user(&self, user_id: &UserId) -> Result<Vec<Position>, AccountApiError>;

    /// The user's audit trail, newest first.
    async fn fetch_ledger_events_for_user(&self, user_id: &UserId) -> Result<Vec<LedgerEvent>, AccountApiError>;

    async fn fetch_withdrawals_for_user(&self, user_id: &UserId) -> Result<Vec<WithdrawalRequest>, AccountApiError>;

    /// The admin approval queue: all positions awaiting payment verification, oldest first.
    async fn fetch_pending_positions(&self) -> Result<Vec<Position>, AccountApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested position {0} does not exist")]
    PositionNotFound(i64),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        AccountApiError::DatabaseError(e.to_string())
    }
}
