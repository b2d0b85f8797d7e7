//! The valuation batch: advancing values, settling matured positions, auto-reinvesting, and
//! expiring stale pending submissions.
use chrono::{Duration, Utc};
use yieldvault_engine::{
    adapters::ManualChannelDefaults,
    db_types::{PositionStatus, UserId},
    valuation::NoJitter,
};
use yv_common::UsdCents;

mod support;
use support::{card_payment, crypto_position_request, new_test_context};

#[tokio::test]
async fn a_tick_advances_active_positions() {
    let ctx = new_test_context().await;
    let position =
        ctx.flow.apply_payment_event(card_payment("lena", "ch_2001", UsdCents::from_dollars(500))).await.unwrap();

    // Day 14 of 28: $500 + $11.54 / 2.
    let summary = ctx.flow.revalue_active_positions(Utc::now() + Duration::days(14), &NoJitter).await.unwrap();
    assert_eq!(summary.advanced, vec![position.id]);
    assert!(summary.matured.is_empty());
    assert!(summary.failed.is_empty());

    let current = ctx.accounts.position(position.id).await.unwrap().unwrap();
    assert_eq!(current.current_value, UsdCents::from_cents(50577));
    assert_eq!(current.status, PositionStatus::Active);
}

#[tokio::test]
async fn maturity_settles_at_principal_plus_payout() {
    let ctx = new_test_context().await;
    let user = UserId::from("marc");
    let position =
        ctx.flow.apply_payment_event(card_payment("marc", "ch_2002", UsdCents::from_dollars(500))).await.unwrap();

    let summary = ctx.flow.revalue_active_positions(Utc::now() + Duration::weeks(5), &NoJitter).await.unwrap();
    assert_eq!(summary.matured, vec![position.id]);

    let settled = ctx.accounts.position(position.id).await.unwrap().unwrap();
    assert_eq!(settled.status, PositionStatus::Completed);
    assert_eq!(settled.current_value, UsdCents::from_cents(51154));

    let account = ctx.accounts.account(&user).await.unwrap().unwrap();
    assert_eq!(account.total_earned, UsdCents::from_cents(1154));
    assert_eq!(account.active_positions, 0);

    // Completed is terminal: the next tick must leave the position alone.
    let summary = ctx.flow.revalue_active_positions(Utc::now() + Duration::weeks(6), &NoJitter).await.unwrap();
    assert!(summary.advanced.is_empty());
}

#[tokio::test]
async fn auto_reinvest_rolls_the_matured_value_forward() {
    let ctx = new_test_context().await;
    let user = UserId::from("nora");
    let mut event = card_payment("nora", "ch_2003", UsdCents::from_dollars(500));
    event.metadata.auto_reinvest = true;
    let position = ctx.flow.apply_payment_event(event).await.unwrap();

    let summary = ctx.flow.revalue_active_positions(Utc::now() + Duration::weeks(5), &NoJitter).await.unwrap();
    assert_eq!(summary.matured, vec![position.id]);
    assert_eq!(summary.reinvested.len(), 1);

    let positions = ctx.accounts.positions_for_user(&user).await.unwrap();
    assert_eq!(positions.len(), 2);
    let fresh = positions.iter().find(|p| p.status == PositionStatus::Active).expect("reinvested position");
    assert_eq!(fresh.principal, UsdCents::from_cents(51154), "the full matured value rolls forward");
    assert_eq!(fresh.tier, position.tier);
    assert!(fresh.auto_reinvest);
}

#[tokio::test]
async fn stale_pending_positions_are_expired() {
    let ctx = new_test_context().await;
    let defaults = ManualChannelDefaults::default();
    let user = UserId::from("olaf");
    let (position, _) = ctx
        .flow
        .submit_manual_position(user.clone(), &crypto_position_request(UsdCents::from_dollars(400)), &defaults)
        .await
        .unwrap();

    // Inside the window: nothing expires.
    let expired = ctx.flow.expire_stale_pending(Utc::now(), Duration::days(7)).await.unwrap();
    assert!(expired.is_empty());

    // A week later the payment never arrived.
    let expired = ctx.flow.expire_stale_pending(Utc::now() + Duration::days(8), Duration::days(7)).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].id, position.id);
    assert_eq!(expired[0].status, PositionStatus::Rejected);
}
