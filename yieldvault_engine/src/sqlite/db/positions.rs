use chrono::{DateTime, Duration, Utc};
use log::debug;
use sqlx::SqliteConnection;
use yv_common::UsdCents;

use crate::{
    db_types::{NewPosition, Position, PositionStatus, UserId},
    traits::LedgerError,
};

pub async fn insert(
    position: NewPosition,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Position, LedgerError> {
    let inserted: Position = sqlx::query_as(
        r#"
            INSERT INTO positions (
                user_id,
                category,
                tier,
                principal,
                duration_weeks,
                annual_rate_pct,
                expected_payout,
                current_value,
                per_period_accrual,
                status,
                started_at,
                matures_at,
                last_valued_at,
                payment_channel,
                payment_state,
                external_reference,
                auto_reinvest,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $18)
            RETURNING *;
        "#,
    )
    .bind(position.user_id)
    .bind(position.category)
    .bind(position.tier)
    .bind(position.principal)
    .bind(position.duration_weeks)
    .bind(position.annual_rate_pct)
    .bind(position.expected_payout)
    .bind(position.principal) // current_value starts at principal
    .bind(position.per_period_accrual)
    .bind(position.status)
    .bind(position.started_at)
    .bind(position.matures_at)
    .bind(position.started_at)
    .bind(position.payment_channel)
    .bind(position.payment_state)
    .bind(position.external_reference)
    .bind(position.auto_reinvest)
    .bind(now)
    .fetch_one(conn)
    .await?;
    debug!("📝️ Position #{} inserted for {}", inserted.id, inserted.user_id);
    Ok(inserted)
}

pub async fn fetch_by_id(position_id: i64, conn: &mut SqliteConnection) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM positions WHERE id = $1").bind(position_id).fetch_optional(conn).await
}

pub async fn fetch_for_user(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Vec<Position>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM positions WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_by_status(
    status: PositionStatus,
    conn: &mut SqliteConnection,
) -> Result<Vec<Position>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM positions WHERE status = $1 ORDER BY created_at ASC")
        .bind(status)
        .fetch_all(conn)
        .await
}

/// Pending positions that have not been touched since `cutoff`.
pub async fn fetch_stale_pending(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Position>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM positions WHERE status = 'Pending' AND updated_at < $1 ORDER BY created_at ASC")
        .bind(cutoff)
        .fetch_all(conn)
        .await
}

/// Classify a compare-and-swap miss. The update matched zero rows because the position is gone,
/// is in the wrong state, or was modified concurrently — in that priority order.
pub async fn resolve_cas_miss(
    position_id: i64,
    expected: PositionStatus,
    conn: &mut SqliteConnection,
) -> LedgerError {
    match fetch_by_id(position_id, conn).await {
        Err(e) => LedgerError::from(e),
        Ok(None) => LedgerError::PositionNotFound(position_id),
        Ok(Some(p)) if p.status != expected => LedgerError::StateViolation(format!(
            "Position #{position_id} is {}, expected {expected}",
            p.status
        )),
        Ok(Some(_)) => LedgerError::ConcurrentModification(position_id),
    }
}

/// Scheduler valuation tick. CAS on `(id, version)`; the status predicate keeps a concurrent
/// withdrawal or completion from being silently overwritten.
pub async fn update_value(
    position_id: i64,
    version: i64,
    value: UsdCents,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE positions
            SET current_value = $3, last_valued_at = $4, updated_at = $4, version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'Active'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(version)
    .bind(value)
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// Activate a pending position. Re-stamps the accrual clock: `started_at = now`,
/// `matures_at = now + duration`.
pub async fn mark_active(
    position: &Position,
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Position>, sqlx::Error> {
    let matures_at = now + Duration::weeks(position.duration_weeks);
    sqlx::query_as(
        r#"
            UPDATE positions
            SET status = 'Active', payment_state = 'Confirmed', external_reference = $3,
                started_at = $4, matures_at = $5, last_valued_at = $4, updated_at = $4,
                version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(position.id)
    .bind(position.version)
    .bind(reference)
    .bind(now)
    .bind(matures_at)
    .fetch_optional(conn)
    .await
}

pub async fn mark_rejected(
    position_id: i64,
    version: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE positions
            SET status = 'Rejected', payment_state = 'Failed', updated_at = $3, version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(version)
    .bind(now)
    .fetch_optional(conn)
    .await
}

/// Settle a matured position at exactly `principal + expected_payout`.
pub async fn mark_completed(
    position_id: i64,
    version: i64,
    final_value: UsdCents,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE positions
            SET status = 'Completed', current_value = $3, last_valued_at = $4, updated_at = $4,
                version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'Active'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(version)
    .bind(final_value)
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn mark_withdrawn(
    position_id: i64,
    version: i64,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE positions
            SET status = 'Withdrawn', updated_at = $3, version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'Active'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(version)
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn attach_reference(
    position_id: i64,
    version: i64,
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE positions
            SET external_reference = $3, updated_at = $4, version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(version)
    .bind(reference)
    .bind(now)
    .fetch_optional(conn)
    .await
}

pub async fn set_instructions(
    position_id: i64,
    version: i64,
    instructions_json: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Position>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE positions
            SET instructions = $3, updated_at = $4, version = version + 1
            WHERE id = $1 AND version = $2 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(version)
    .bind(instructions_json)
    .bind(now)
    .fetch_optional(conn)
    .await
}
