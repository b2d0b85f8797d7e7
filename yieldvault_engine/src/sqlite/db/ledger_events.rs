use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{LedgerEvent, NewLedgerEvent, UserId},
    traits::LedgerError,
};

/// Append an event to the audit trail. A unique-index hit on the external reference means the
/// payment was already recorded — the caller treats that as an idempotency signal, not a failure.
pub async fn insert(
    event: NewLedgerEvent,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEvent, LedgerError> {
    let reference = event.external_reference.clone();
    let inserted: LedgerEvent = sqlx::query_as(
        r#"
            INSERT INTO ledger_events (user_id, position_id, kind, amount, state, channel, external_reference, note,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
            RETURNING *;
        "#,
    )
    .bind(event.user_id)
    .bind(event.position_id)
    .bind(event.kind)
    .bind(event.amount)
    .bind(event.state)
    .bind(event.channel)
    .bind(event.external_reference)
    .bind(event.note)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            LedgerError::DuplicateEvent(reference.unwrap_or_default())
        },
        _ => LedgerError::from(e),
    })?;
    debug!("📝️ Ledger event #{} ({} {}) appended", inserted.id, inserted.kind, inserted.amount);
    Ok(inserted)
}

pub async fn fetch_by_reference(
    reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ledger_events WHERE external_reference = $1")
        .bind(reference)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_for_user(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Vec<LedgerEvent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ledger_events WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await
}

/// Complete the pending event belonging to a position, stamping the reconciled reference onto it.
pub async fn complete_for_position(
    position_id: i64,
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEvent, LedgerError> {
    sqlx::query_as(
        r#"
            UPDATE ledger_events
            SET state = 'Completed', external_reference = $2, updated_at = $3
            WHERE position_id = $1 AND state = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(reference)
    .bind(now)
    .fetch_optional(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => LedgerError::ProofAlreadyUsed(reference.to_string()),
        _ => LedgerError::from(e),
    })?
    .ok_or_else(|| LedgerError::EventNotFound(format!("pending event for position #{position_id}")))
}

/// Mark the pending event belonging to a position as failed, recording the denial reason.
pub async fn fail_for_position(
    position_id: i64,
    reason: Option<&str>,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<LedgerEvent>, LedgerError> {
    let event = sqlx::query_as(
        r#"
            UPDATE ledger_events
            SET state = 'Failed', note = COALESCE($2, note), updated_at = $3
            WHERE position_id = $1 AND state = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(reason)
    .bind(now)
    .fetch_optional(conn)
    .await?;
    Ok(event)
}

/// Attach the user-submitted proof to the position's pending event. The unique index rejects a
/// proof that is already attached to any other event.
pub async fn set_reference_for_position(
    position_id: i64,
    reference: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEvent, LedgerError> {
    sqlx::query_as(
        r#"
            UPDATE ledger_events
            SET external_reference = $2, updated_at = $3
            WHERE position_id = $1 AND state = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(position_id)
    .bind(reference)
    .bind(now)
    .fetch_optional(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => LedgerError::ProofAlreadyUsed(reference.to_string()),
        _ => LedgerError::from(e),
    })?
    .ok_or_else(|| LedgerError::EventNotFound(format!("pending event for position #{position_id}")))
}
