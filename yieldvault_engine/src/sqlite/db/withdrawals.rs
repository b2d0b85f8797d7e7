use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewWithdrawalRequest, UserId, WithdrawalRequest},
    traits::LedgerError,
};

pub async fn insert(
    request: NewWithdrawalRequest,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<WithdrawalRequest, LedgerError> {
    let inserted = sqlx::query_as(
        r#"
            INSERT INTO withdrawal_requests (user_id, position_id, principal, profit, method, destination,
                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
            RETURNING *;
        "#,
    )
    .bind(request.user_id)
    .bind(request.position_id)
    .bind(request.principal)
    .bind(request.profit)
    .bind(request.method)
    .bind(request.destination)
    .bind(now)
    .fetch_one(conn)
    .await?;
    Ok(inserted)
}

pub async fn fetch_for_user(
    user_id: &UserId,
    conn: &mut SqliteConnection,
) -> Result<Vec<WithdrawalRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM withdrawal_requests WHERE user_id = $1 ORDER BY created_at DESC")
        .bind(user_id)
        .fetch_all(conn)
        .await
}
