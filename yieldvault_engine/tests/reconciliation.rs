//! End-to-end reconciliation flows against a real SQLite backend: webhook idempotency, the manual
//! proof-and-approval path, and admin denial.
use yieldvault_engine::{
    adapters::ManualChannelDefaults,
    db_types::{LedgerEventKind, LedgerEventState, PaymentState, PositionStatus, UserId},
    position_objects::PaymentProof,
    LedgerError,
};
use yv_common::UsdCents;

mod support;
use support::{card_payment, crypto_position_request, new_test_context};

const TX_HASH: &str = "4a5c9b1e2f3d4c5b6a798081726354453627181920212223242526272829fefe";

#[tokio::test]
async fn replayed_callback_credits_exactly_once() {
    let ctx = new_test_context().await;
    let event = card_payment("alice", "ch_0001", UsdCents::from_dollars(500));

    let first = ctx.flow.apply_payment_event(event.clone()).await.expect("first delivery failed");
    assert_eq!(first.status, PositionStatus::Active);
    assert_eq!(first.expected_payout, UsdCents::from_cents(1154));

    // At-least-once delivery: the processor sends the identical signed payload again.
    let second = ctx.flow.apply_payment_event(event).await.expect("replay should be a success no-op");
    assert_eq!(second.id, first.id);

    let user = UserId::from("alice");
    let history = ctx.accounts.history_for_user(&user).await.unwrap();
    assert_eq!(history.len(), 1, "replay must not append a second ledger event");
    assert_eq!(history[0].external_reference.as_deref(), Some("ch_0001"));
    assert_eq!(history[0].state, LedgerEventState::Completed);

    let account = ctx.accounts.account(&user).await.unwrap().expect("account should exist");
    assert_eq!(account.total_invested, UsdCents::from_dollars(500), "totals must increment once, not twice");
    assert_eq!(account.active_positions, 1);
}

#[tokio::test]
async fn manual_submission_stays_pending_until_approved() {
    let ctx = new_test_context().await;
    let defaults = ManualChannelDefaults::default();
    let user = UserId::from("bob");

    let (position, instructions) = ctx
        .flow
        .submit_manual_position(user.clone(), &crypto_position_request(UsdCents::from_dollars(1000)), &defaults)
        .await
        .expect("submission failed");
    assert_eq!(position.status, PositionStatus::Pending);
    assert_eq!(position.payment_state, PaymentState::AwaitingPayment);
    assert!(position.external_reference.is_none());
    assert!(matches!(instructions, yieldvault_engine::adapters::PaymentInstructions::Crypto { .. }));

    // No admin action: the position stays pending indefinitely and is visible via the pull path.
    let pulled = ctx.accounts.positions_for_user(&user).await.unwrap();
    assert_eq!(pulled.len(), 1);
    assert_eq!(pulled[0].status, PositionStatus::Pending);
    assert!(pulled[0].instructions.is_some());

    // Totals untouched before approval.
    let account = ctx.accounts.account(&user).await.unwrap();
    assert!(account.is_none() || account.unwrap().total_invested == UsdCents::default());

    let proof = PaymentProof { reference: TX_HASH.to_string(), sender_identity: None };
    ctx.flow.attach_payment_proof(&user, position.id, &proof).await.expect("proof attach failed");

    let approved = ctx.flow.approve_position(position.id).await.expect("approval failed");
    assert_eq!(approved.status, PositionStatus::Active);
    assert_eq!(approved.payment_state, PaymentState::Confirmed);
    assert_eq!(approved.external_reference.as_deref(), Some(TX_HASH));

    // Approval is routed through the reconciliation entry point, so re-approving dedups.
    let again = ctx.flow.approve_position(position.id).await.expect_err("re-approval of active position");
    assert!(matches!(again, LedgerError::StateViolation(_)));

    let account = ctx.accounts.account(&user).await.unwrap().expect("account should exist after approval");
    assert_eq!(account.total_invested, UsdCents::from_dollars(1000));
    assert_eq!(account.active_positions, 1);

    let history = ctx.accounts.history_for_user(&user).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].kind, LedgerEventKind::Credit);
    assert_eq!(history[0].state, LedgerEventState::Completed);
}

#[tokio::test]
async fn rejection_is_terminal_and_leaves_totals_alone() {
    let ctx = new_test_context().await;
    let defaults = ManualChannelDefaults::default();
    let user = UserId::from("carol");

    let (position, _) = ctx
        .flow
        .submit_manual_position(user.clone(), &crypto_position_request(UsdCents::from_dollars(250)), &defaults)
        .await
        .unwrap();

    let rejected = ctx.flow.reject_position(position.id, Some("No matching transfer found")).await.unwrap();
    assert_eq!(rejected.status, PositionStatus::Rejected);

    let history = ctx.accounts.history_for_user(&user).await.unwrap();
    assert_eq!(history[0].state, LedgerEventState::Failed);
    assert_eq!(history[0].note.as_deref(), Some("No matching transfer found"));
    assert!(ctx.accounts.account(&user).await.unwrap().is_none(), "rejection must not create or touch totals");

    // No code path leaves Rejected.
    let err = ctx.flow.approve_position(position.id).await.expect_err("approve after reject");
    assert!(matches!(err, LedgerError::StateViolation(_)));
    let err = ctx.flow.reject_position(position.id, None).await.expect_err("double reject");
    assert!(matches!(err, LedgerError::StateViolation(_)));
}

#[tokio::test]
async fn a_payment_proof_cannot_back_two_positions() {
    let ctx = new_test_context().await;
    let defaults = ManualChannelDefaults::default();
    let user = UserId::from("dave");

    let (first, _) = ctx
        .flow
        .submit_manual_position(user.clone(), &crypto_position_request(UsdCents::from_dollars(300)), &defaults)
        .await
        .unwrap();
    let (second, _) = ctx
        .flow
        .submit_manual_position(user.clone(), &crypto_position_request(UsdCents::from_dollars(400)), &defaults)
        .await
        .unwrap();

    let proof = PaymentProof { reference: TX_HASH.to_string(), sender_identity: None };
    ctx.flow.attach_payment_proof(&user, first.id, &proof).await.unwrap();
    let err = ctx.flow.attach_payment_proof(&user, second.id, &proof).await.expect_err("proof reuse");
    assert!(matches!(err, LedgerError::ProofAlreadyUsed(_)));
}

#[tokio::test]
async fn malformed_proofs_are_rejected_before_storage() {
    let ctx = new_test_context().await;
    let defaults = ManualChannelDefaults::default();
    let user = UserId::from("erin");

    let (position, _) = ctx
        .flow
        .submit_manual_position(user.clone(), &crypto_position_request(UsdCents::from_dollars(300)), &defaults)
        .await
        .unwrap();
    let proof = PaymentProof { reference: "definitely not a hash".to_string(), sender_identity: None };
    let err = ctx.flow.attach_payment_proof(&user, position.id, &proof).await.expect_err("bad proof");
    assert!(matches!(err, LedgerError::Validation(_)));

    let unchanged = ctx.accounts.position(position.id).await.unwrap().unwrap();
    assert!(unchanged.external_reference.is_none());
}

#[tokio::test]
async fn below_minimum_principal_is_rejected_up_front() {
    let ctx = new_test_context().await;
    let event = card_payment("frank", "ch_0002", UsdCents::from_dollars(5));
    let err = ctx.flow.apply_payment_event(event).await.expect_err("tiny principal");
    assert!(matches!(err, LedgerError::Validation(_)));
    assert!(ctx.accounts.account(&UserId::from("frank")).await.unwrap().is_none());
}
