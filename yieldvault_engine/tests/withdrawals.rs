//! Withdrawal eligibility, the atomic flip to `Withdrawn`, and the optimistic-lock behaviour the
//! scheduler/withdrawal race depends on.
use chrono::{Duration, Utc};
use yieldvault_engine::{
    db_types::{LedgerEventKind, PositionStatus, UserId, WithdrawalMethod, WithdrawalState},
    LedgerDatabase,
    LedgerError,
};
use yv_common::UsdCents;

mod support;
use support::{card_payment, new_test_context};

#[tokio::test]
async fn holding_window_blocks_a_fresh_active_position() {
    let ctx = new_test_context().await;
    let position =
        ctx.flow.apply_payment_event(card_payment("gina", "ch_1001", UsdCents::from_dollars(500))).await.unwrap();
    assert_eq!(position.status, PositionStatus::Active);

    // Active, but held for zero days: a 14-day window must reject it regardless of status.
    let err = ctx
        .flow
        .request_withdrawal(
            &UserId::from("gina"),
            position.id,
            WithdrawalMethod::Wire,
            "GB29NWBK60161331926819".to_string(),
            Duration::days(14),
            0,
        )
        .await
        .expect_err("withdrawal before the holding window");
    assert!(matches!(err, LedgerError::StateViolation(_)));
    let unchanged = ctx.accounts.position(position.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, PositionStatus::Active);
}

#[tokio::test]
async fn withdrawal_flips_the_position_and_books_the_payout() {
    let ctx = new_test_context().await;
    let user = UserId::from("hana");
    let position =
        ctx.flow.apply_payment_event(card_payment("hana", "ch_1002", UsdCents::from_dollars(500))).await.unwrap();

    let outcome = ctx
        .flow
        .request_withdrawal(&user, position.id, WithdrawalMethod::Crypto, "bc1qdest".to_string(), Duration::zero(), 0)
        .await
        .expect("withdrawal failed");
    assert_eq!(outcome.position.status, PositionStatus::Withdrawn);
    assert_eq!(outcome.request.state, WithdrawalState::Pending);
    assert_eq!(outcome.request.principal, UsdCents::from_dollars(500));

    let account = ctx.accounts.account(&user).await.unwrap().unwrap();
    assert_eq!(account.active_positions, 0);
    assert_eq!(account.total_withdrawn, outcome.request.principal + outcome.request.profit);

    let history = ctx.accounts.history_for_user(&user).await.unwrap();
    assert!(history.iter().any(|e| e.kind == LedgerEventKind::Debit));

    // Withdrawn is terminal: a second request must fail, not double-pay.
    let err = ctx
        .flow
        .request_withdrawal(&user, position.id, WithdrawalMethod::Crypto, "bc1qdest".to_string(), Duration::zero(), 0)
        .await
        .expect_err("double withdrawal");
    assert!(matches!(err, LedgerError::StateViolation(_)));
    let withdrawals = ctx.accounts.withdrawals_for_user(&user).await.unwrap();
    assert_eq!(withdrawals.len(), 1);
}

#[tokio::test]
async fn a_withdrawal_fee_books_a_fee_event() {
    let ctx = new_test_context().await;
    let user = UserId::from("iris");
    let position =
        ctx.flow.apply_payment_event(card_payment("iris", "ch_1003", UsdCents::from_dollars(500))).await.unwrap();

    // 150 bps of the $500.00 payout = $7.50.
    let outcome = ctx
        .flow
        .request_withdrawal(&user, position.id, WithdrawalMethod::Wire, "DE89370400440532013000".to_string(), Duration::zero(), 150)
        .await
        .unwrap();
    let history = ctx.accounts.history_for_user(&user).await.unwrap();
    let fee = history.iter().find(|e| e.kind == LedgerEventKind::Fee).expect("fee event missing");
    assert_eq!(fee.amount, UsdCents::from_cents(750));
    assert_eq!(fee.position_id, Some(outcome.position.id));
}

#[tokio::test]
async fn a_stale_write_is_rejected_not_silently_applied() {
    let ctx = new_test_context().await;
    let position =
        ctx.flow.apply_payment_event(card_payment("jan", "ch_1004", UsdCents::from_dollars(500))).await.unwrap();
    let now = Utc::now();

    // First writer wins and bumps the version.
    let updated = ctx
        .db
        .persist_valuation(position.id, position.version, UsdCents::from_cents(50100), now)
        .await
        .expect("first write failed");
    assert_eq!(updated.version, position.version + 1);

    // Second writer re-uses the stale version: exactly one winner, the loser sees a conflict.
    let err = ctx
        .db
        .persist_valuation(position.id, position.version, UsdCents::from_cents(50050), now)
        .await
        .expect_err("stale write must not succeed");
    assert!(matches!(err, LedgerError::ConcurrentModification(_)));

    let current = ctx.accounts.position(position.id).await.unwrap().unwrap();
    assert_eq!(current.current_value, UsdCents::from_cents(50100), "the losing write must not clobber the winner");
}

#[tokio::test]
async fn valuation_cas_respects_a_concurrent_withdrawal() {
    let ctx = new_test_context().await;
    let user = UserId::from("kim");
    let position =
        ctx.flow.apply_payment_event(card_payment("kim", "ch_1005", UsdCents::from_dollars(500))).await.unwrap();

    // The withdrawal lands first.
    ctx.flow
        .request_withdrawal(&user, position.id, WithdrawalMethod::Crypto, "bc1qdest".to_string(), Duration::zero(), 0)
        .await
        .unwrap();

    // A scheduler tick holding the pre-withdrawal snapshot must not resurrect the position.
    let err = ctx
        .db
        .persist_valuation(position.id, position.version, UsdCents::from_cents(50100), Utc::now())
        .await
        .expect_err("tick against a withdrawn position");
    assert!(matches!(err, LedgerError::StateViolation(_)));
    let current = ctx.accounts.position(position.id).await.unwrap().unwrap();
    assert_eq!(current.status, PositionStatus::Withdrawn);
}
