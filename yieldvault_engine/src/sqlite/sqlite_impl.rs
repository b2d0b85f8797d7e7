//! `SqliteDatabase` is a concrete implementation of a YieldVault engine backend.
//!
//! Every mutating method composes the low-level functions in [`super::db`] inside a single
//! transaction, so a position, its ledger event, and the owner totals always move together.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;
use yv_common::UsdCents;

use super::db::{accounts, db_url, ledger_events, new_pool, positions, withdrawals};
use crate::{
    adapters::PaymentInstructions,
    db_types::{
        AccountSummary,
        LedgerEvent,
        LedgerEventKind,
        LedgerEventState,
        NewLedgerEvent,
        NewPosition,
        NewWithdrawalRequest,
        Position,
        PositionStatus,
        UserId,
        WithdrawalRequest,
    },
    traits::{AccountApiError, AccountManagement, LedgerDatabase, LedgerError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Connect using the `YV_DATABASE_URL` environment variable, or the default URL.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl LedgerDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_ledger_event_by_reference(&self, reference: &str) -> Result<Option<LedgerEvent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let event = ledger_events::fetch_by_reference(reference, &mut conn).await?;
        Ok(event)
    }

    async fn insert_confirmed_position(
        &self,
        position: NewPosition,
        event: NewLedgerEvent,
    ) -> Result<Position, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let user_id = position.user_id.clone();
        let principal = position.principal;
        let position = positions::insert(position, now, &mut tx).await?;
        ledger_events::insert(event.for_position(position.id), now, &mut tx).await?;
        accounts::fetch_or_create(&user_id, now, &mut tx).await?;
        accounts::adjust_totals(&user_id, principal, UsdCents::default(), UsdCents::default(), 1, now, &mut tx)
            .await?;
        tx.commit().await?;
        debug!("🗃️ Position #{} reconciled and credited to {user_id}", position.id);
        Ok(position)
    }

    async fn insert_pending_position(
        &self,
        position: NewPosition,
        event: NewLedgerEvent,
    ) -> Result<Position, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let position = positions::insert(position, now, &mut tx).await?;
        ledger_events::insert(event.for_position(position.id), now, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Pending position #{} awaiting {} payment", position.id, position.payment_channel);
        Ok(position)
    }

    async fn attach_payment_proof(&self, position_id: i64, reference: &str) -> Result<Position, LedgerError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let current = positions::fetch_by_id(position_id, &mut tx)
            .await?
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        let updated = positions::attach_reference(position_id, current.version, reference, now, &mut tx).await?;
        let Some(updated) = updated else {
            let err = positions::resolve_cas_miss(position_id, PositionStatus::Pending, &mut tx).await;
            return Err(err);
        };
        ledger_events::set_reference_for_position(position_id, reference, now, &mut tx).await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn activate_position(
        &self,
        position_id: i64,
        reference: &str,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let current = positions::fetch_by_id(position_id, &mut tx)
            .await?
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        let activated = positions::mark_active(&current, reference, now, &mut tx).await?;
        let Some(activated) = activated else {
            let err = positions::resolve_cas_miss(position_id, PositionStatus::Pending, &mut tx).await;
            return Err(err);
        };
        ledger_events::complete_for_position(position_id, reference, now, &mut tx).await?;
        accounts::fetch_or_create(&activated.user_id, now, &mut tx).await?;
        accounts::adjust_totals(
            &activated.user_id,
            activated.principal,
            UsdCents::default(),
            UsdCents::default(),
            1,
            now,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Position #{position_id} activated. {} credited to {}", activated.principal, activated.user_id);
        Ok(activated)
    }

    async fn reject_position(
        &self,
        position_id: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let current = positions::fetch_by_id(position_id, &mut tx)
            .await?
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        let rejected = positions::mark_rejected(position_id, current.version, now, &mut tx).await?;
        let Some(rejected) = rejected else {
            let err = positions::resolve_cas_miss(position_id, PositionStatus::Pending, &mut tx).await;
            return Err(err);
        };
        ledger_events::fail_for_position(position_id, reason, now, &mut tx).await?;
        tx.commit().await?;
        Ok(rejected)
    }

    async fn set_payment_instructions(
        &self,
        position_id: i64,
        instructions: &PaymentInstructions,
    ) -> Result<Position, LedgerError> {
        let now = Utc::now();
        let json = serde_json::to_string(instructions)
            .map_err(|e| LedgerError::DatabaseError(format!("Could not serialize instructions: {e}")))?;
        let mut tx = self.pool.begin().await?;
        let current = positions::fetch_by_id(position_id, &mut tx)
            .await?
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        let updated = positions::set_instructions(position_id, current.version, &json, now, &mut tx).await?;
        let Some(updated) = updated else {
            let err = positions::resolve_cas_miss(position_id, PositionStatus::Pending, &mut tx).await;
            return Err(err);
        };
        tx.commit().await?;
        Ok(updated)
    }

    async fn persist_valuation(
        &self,
        position_id: i64,
        version: i64,
        value: UsdCents,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let updated = positions::update_value(position_id, version, value, now, &mut conn).await?;
        match updated {
            Some(position) => Ok(position),
            None => Err(positions::resolve_cas_miss(position_id, PositionStatus::Active, &mut conn).await),
        }
    }

    async fn complete_position(
        &self,
        position_id: i64,
        version: i64,
        now: DateTime<Utc>,
    ) -> Result<Position, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let current = positions::fetch_by_id(position_id, &mut tx)
            .await?
            .ok_or(LedgerError::PositionNotFound(position_id))?;
        let final_value = current.value_at_maturity();
        let completed = positions::mark_completed(position_id, version, final_value, now, &mut tx).await?;
        let Some(completed) = completed else {
            let err = positions::resolve_cas_miss(position_id, PositionStatus::Active, &mut tx).await;
            return Err(err);
        };
        let payout_event = NewLedgerEvent::new(
            completed.user_id.clone(),
            LedgerEventKind::Accrual,
            completed.expected_payout,
            completed.payment_channel,
        )
        .for_position(position_id)
        .with_state(LedgerEventState::Completed)
        .with_note(format!("Maturity payout for position #{position_id}"));
        ledger_events::insert(payout_event, now, &mut tx).await?;
        accounts::adjust_totals(
            &completed.user_id,
            UsdCents::default(),
            completed.expected_payout,
            UsdCents::default(),
            -1,
            now,
            &mut tx,
        )
        .await?;
        tx.commit().await?;
        debug!("🗃️ Position #{position_id} settled at {final_value}");
        Ok(completed)
    }

    async fn create_withdrawal(
        &self,
        position_id: i64,
        version: i64,
        request: NewWithdrawalRequest,
        fee: Option<UsdCents>,
        now: DateTime<Utc>,
    ) -> Result<(Position, WithdrawalRequest), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let withdrawn = positions::mark_withdrawn(position_id, version, now, &mut tx).await?;
        let Some(withdrawn) = withdrawn else {
            let err = positions::resolve_cas_miss(position_id, PositionStatus::Active, &mut tx).await;
            return Err(err);
        };
        let payout = request.principal + request.profit;
        let request = withdrawals::insert(request, now, &mut tx).await?;
        let debit = NewLedgerEvent::new(withdrawn.user_id.clone(), LedgerEventKind::Debit, payout, withdrawn.payment_channel)
            .for_position(position_id)
            .with_state(LedgerEventState::Completed)
            .with_note(format!("Withdrawal #{} via {}", request.id, request.method));
        ledger_events::insert(debit, now, &mut tx).await?;
        if let Some(fee) = fee {
            let fee_event =
                NewLedgerEvent::new(withdrawn.user_id.clone(), LedgerEventKind::Fee, fee, withdrawn.payment_channel)
                    .for_position(position_id)
                    .with_state(LedgerEventState::Completed)
                    .with_note(format!("Processing fee for withdrawal #{}", request.id));
            ledger_events::insert(fee_event, now, &mut tx).await?;
        }
        accounts::adjust_totals(&withdrawn.user_id, UsdCents::default(), UsdCents::default(), payout, -1, now, &mut tx)
            .await?;
        tx.commit().await?;
        debug!("🗃️ Position #{position_id} withdrawn. Payout {payout} to {}", withdrawn.user_id);
        Ok((withdrawn, request))
    }

    async fn fetch_active_positions(&self) -> Result<Vec<Position>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let list = positions::fetch_by_status(PositionStatus::Active, &mut conn).await?;
        Ok(list)
    }

    async fn fetch_stale_pending_positions(&self, cutoff: DateTime<Utc>) -> Result<Vec<Position>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let list = positions::fetch_stale_pending(cutoff, &mut conn).await?;
        Ok(list)
    }
}

impl AccountManagement for SqliteDatabase {
    async fn fetch_account(&self, user_id: &UserId) -> Result<Option<AccountSummary>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        accounts::fetch(user_id, &mut conn).await
    }

    async fn fetch_position(&self, position_id: i64) -> Result<Option<Position>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let position = positions::fetch_by_id(position_id, &mut conn).await?;
        Ok(position)
    }

    async fn fetch_positions_for_user(&self, user_id: &UserId) -> Result<Vec<Position>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let list = positions::fetch_for_user(user_id, &mut conn).await?;
        Ok(list)
    }

    async fn fetch_ledger_events_for_user(&self, user_id: &UserId) -> Result<Vec<LedgerEvent>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let list = ledger_events::fetch_for_user(user_id, &mut conn).await?;
        Ok(list)
    }

    async fn fetch_withdrawals_for_user(&self, user_id: &UserId) -> Result<Vec<WithdrawalRequest>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let list = withdrawals::fetch_for_user(user_id, &mut conn).await?;
        Ok(list)
    }

    async fn fetch_pending_positions(&self) -> Result<Vec<Position>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let list = positions::fetch_by_status(PositionStatus::Pending, &mut conn).await?;
        Ok(list)
    }
}
