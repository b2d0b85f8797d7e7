use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use yv_common::UsdCents;

use crate::{
    db_types::{AccountSummary, UserId},
    traits::AccountApiError,
};

pub async fn fetch(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Option<AccountSummary>, AccountApiError> {
    let account = sqlx::query_as("SELECT * FROM accounts WHERE user_id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(account)
}

pub async fn fetch_or_create(
    user_id: &UserId,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<AccountSummary, AccountApiError> {
    sqlx::query("INSERT INTO accounts (user_id, created_at, updated_at) VALUES ($1, $2, $2) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    let account = sqlx::query_as("SELECT * FROM accounts WHERE user_id = $1").bind(user_id).fetch_one(conn).await?;
    Ok(account)
}

/// Apply deltas to the owner's running totals. Called inside the same transaction as the position
/// mutation the deltas describe, so the totals can never disagree with the ledger.
pub async fn adjust_totals(
    user_id: &UserId,
    invested: UsdCents,
    earned: UsdCents,
    withdrawn: UsdCents,
    active_delta: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), AccountApiError> {
    sqlx::query(
        r#"
            UPDATE accounts
            SET total_invested = total_invested + $2,
                total_earned = total_earned + $3,
                total_withdrawn = total_withdrawn + $4,
                active_positions = active_positions + $5,
                updated_at = $6
            WHERE user_id = $1;
        "#,
    )
    .bind(user_id)
    .bind(invested)
    .bind(earned)
    .bind(withdrawn)
    .bind(active_delta)
    .bind(now)
    .execute(conn)
    .await?;
    Ok(())
}
