use crate::{
    db_types::{AccountSummary, LedgerEvent, Position, UserId, WithdrawalRequest},
    traits::{AccountApiError, AccountManagement},
};

/// The read side of the engine: everything the pull/refresh endpoints serve. A user who missed
/// every push notification can always recover the full picture from here.
#[derive(Debug, Clone)]
pub struct AccountApi<B> {
    db: B,
}

impl<B> AccountApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AccountApi<B>
where B: AccountManagement
{
    pub async fn account(&self, user_id: &UserId) -> Result<Option<AccountSummary>, AccountApiError> {
        self.db.fetch_account(user_id).await
    }

    pub async fn position(&self, position_id: i64) -> Result<Option<Position>, AccountApiError> {
        self.db.fetch_position(position_id).await
    }

    /// A position, only if it belongs to the given user.
    pub async fn position_for_user(
        &self,
        user_id: &UserId,
        position_id: i64,
    ) -> Result<Option<Position>, AccountApiError> {
        let position = self.db.fetch_position(position_id).await?;
        Ok(position.filter(|p| &p.user_id == user_id))
    }

    pub async fn positions_for_user(&self, user_id: &UserId) -> Result<Vec<Position>, AccountApiError> {
        self.db.fetch_positions_for_user(user_id).await
    }

    pub async fn history_for_user(&self, user_id: &UserId) -> Result<Vec<LedgerEvent>, AccountApiError> {
        self.db.fetch_ledger_events_for_user(user_id).await
    }

    pub async fn withdrawals_for_user(&self, user_id: &UserId) -> Result<Vec<WithdrawalRequest>, AccountApiError> {
        self.db.fetch_withdrawals_for_user(user_id).await
    }

    /// The admin verification queue.
    pub async fn pending_positions(&self) -> Result<Vec<Position>, AccountApiError> {
        self.db.fetch_pending_positions().await
    }
}
