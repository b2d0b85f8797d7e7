use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use yv_common::UsdCents;

use crate::{
    adapters::{ManualChannelDefaults, PaymentEvent, PaymentEventOutcome, PaymentInstructions},
    api::position_objects::{NewPositionRequest, PaymentProof},
    db_types::{
        LedgerEventKind,
        LedgerEventState,
        NewLedgerEvent,
        NewWithdrawalRequest,
        Position,
        PositionStatus,
        UserId,
        ValidationError,
        WithdrawalMethod,
    },
    events::{EventProducers, PaymentInstructionsReadyEvent, PositionStatusChangedEvent},
    returns,
    traits::{LedgerDatabase, LedgerError, RevaluationSummary, WithdrawalOutcome},
    valuation::{self, ValuationJitter},
};

/// How many times a compare-and-swap conflict is retried internally before it is surfaced.
const MAX_CAS_RETRIES: usize = 3;

/// `PositionFlowApi` is the primary API for every ledger-mutating flow: reconciling payment
/// events, manual submissions and approvals, withdrawals, and the valuation batch.
///
/// Notification publishing is fire-and-forget; nothing here can fail because a subscriber is slow
/// or gone.
pub struct PositionFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for PositionFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PositionFlowApi")
    }
}

impl<B> PositionFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> PositionFlowApi<B>
where B: LedgerDatabase
{
    /// Reconcile a confirmed payment event into the ledger, exactly once.
    ///
    /// Idempotent on `external_reference`: a replayed callback (at-least-once delivery is assumed
    /// from the processors) finds the already-completed ledger event and returns the existing
    /// position unchanged — no second credit, no second totals increment.
    ///
    /// Instant channels create the position here (`started_at = now`); manual approvals carry a
    /// `position_id` and activate the existing pending position instead.
    pub async fn apply_payment_event(&self, event: PaymentEvent) -> Result<Position, LedgerError> {
        if event.outcome != PaymentEventOutcome::Confirmed {
            return Err(LedgerError::StateViolation(format!(
                "Only confirmed payment events can be reconciled; got {:?} for [{}]",
                event.outcome, event.external_reference
            )));
        }
        if let Some(position) = self.find_reconciled(&event.external_reference).await? {
            info!(
                "🔄️💰️ Payment event [{}] was already reconciled. Returning position #{} unchanged",
                event.external_reference, position.id
            );
            return Ok(position);
        }
        let now = Utc::now();
        let position = match event.position_id {
            Some(position_id) => {
                trace!("🔄️💰️ Activating pending position #{position_id} for [{}]", event.external_reference);
                self.db.activate_position(position_id, &event.external_reference, now).await?
            },
            None => self.reconcile_new_position(&event, now).await?,
        };
        debug!(
            "🔄️💰️ Payment [{}] reconciled. Position #{} is active for {}",
            event.external_reference, position.id, position.user_id
        );
        self.notify_status(&position, "Payment confirmed. Your position is now active.").await;
        Ok(position)
    }

    /// The instant-channel path: build the position from the metadata the adapter carried
    /// round-trip, and insert it fully confirmed.
    async fn reconcile_new_position(&self, event: &PaymentEvent, now: DateTime<Utc>) -> Result<Position, LedgerError> {
        if !event.amount.is_positive() {
            return Err(ValidationError::InvalidAmount(format!(
                "Payment amount must be positive, got {}",
                event.amount
            ))
            .into());
        }
        let tier = event
            .metadata
            .tier
            .parse()
            .map_err(|_| ValidationError::UnknownTier(event.metadata.tier.clone()))?;
        let category = event
            .metadata
            .category
            .parse()
            .map_err(|_| ValidationError::UnknownCategory(event.metadata.category.clone()))?;
        let new_position = returns::commit(
            event.metadata.user_id.clone(),
            category,
            tier,
            event.amount,
            event.metadata.duration_weeks,
            event.channel,
            Some(event.external_reference.clone()),
            event.metadata.auto_reinvest,
            now,
        )?;
        let ledger_event =
            NewLedgerEvent::new(event.metadata.user_id.clone(), LedgerEventKind::Credit, event.amount, event.channel)
                .with_state(LedgerEventState::Completed)
                .with_reference(event.external_reference.clone())
                .with_note(format!("{} payment confirmed by processor callback", event.channel));
        match self.db.insert_confirmed_position(new_position, ledger_event).await {
            Ok(position) => Ok(position),
            // Lost the unique-index race against a concurrent duplicate delivery. The winner has
            // committed, so the re-probe must find it.
            Err(e) if e.is_duplicate() => {
                debug!("🔄️💰️ Concurrent duplicate delivery for [{}]; deferring to the winner", event.external_reference);
                self.find_reconciled(&event.external_reference)
                    .await?
                    .ok_or_else(|| LedgerError::EventNotFound(event.external_reference.clone()))
            },
            Err(e) => Err(e),
        }
    }

    async fn find_reconciled(&self, reference: &str) -> Result<Option<Position>, LedgerError> {
        let Some(existing) = self.db.fetch_ledger_event_by_reference(reference).await? else {
            return Ok(None);
        };
        if existing.state != LedgerEventState::Completed {
            return Ok(None);
        }
        let position_id = existing.position_id.ok_or_else(|| {
            LedgerError::StateViolation(format!("Completed ledger event [{reference}] has no position attached"))
        })?;
        let position =
            self.db.fetch_position(position_id).await?.ok_or(LedgerError::PositionNotFound(position_id))?;
        Ok(Some(position))
    }

    /// Create a manual-channel position in `Pending`/awaiting-payment state and return it together
    /// with the channel's payment instructions. Owner totals stay untouched until approval.
    pub async fn submit_manual_position(
        &self,
        user_id: UserId,
        request: &NewPositionRequest,
        defaults: &ManualChannelDefaults,
    ) -> Result<(Position, PaymentInstructions), LedgerError> {
        if request.channel.is_instant() {
            return Err(LedgerError::StateViolation(format!(
                "{} positions are created by the processor callback, not by direct submission",
                request.channel
            )));
        }
        let now = Utc::now();
        let new_position = returns::commit(
            user_id.clone(),
            request.category,
            request.tier,
            request.principal,
            request.duration_weeks,
            request.channel,
            None,
            request.auto_reinvest,
            now,
        )?;
        let ledger_event = NewLedgerEvent::new(user_id, LedgerEventKind::Credit, request.principal, request.channel)
            .with_note(format!("Awaiting {} payment", request.channel));
        let position = self.db.insert_pending_position(new_position, ledger_event).await?;
        let instructions = defaults
            .instructions_for(request.channel, &format!("YV-{}", position.id))
            .ok_or_else(|| LedgerError::StateViolation(format!("No instructions for {}", request.channel)))?;
        let position = self.db.set_payment_instructions(position.id, &instructions).await?;
        debug!("🔄️📦️ Manual {} position #{} submitted by {}", request.channel, position.id, position.user_id);
        Ok((position, instructions))
    }

    /// Attach the user's self-reported payment proof to a pending position. The proof becomes the
    /// idempotency reference the admin approval will reconcile under.
    pub async fn attach_payment_proof(
        &self,
        user_id: &UserId,
        position_id: i64,
        proof: &PaymentProof,
    ) -> Result<Position, LedgerError> {
        let position = self.fetch_owned(user_id, position_id).await?;
        if position.status != PositionStatus::Pending {
            return Err(LedgerError::StateViolation(format!(
                "Payment proof can only be attached to a pending position; position #{position_id} is {}",
                position.status
            )));
        }
        crate::helpers::validate_payment_proof(position.payment_channel, proof)?;
        let position = self.db.attach_payment_proof(position_id, proof.reference.trim()).await?;
        debug!("🔄️🧾️ Proof attached to position #{position_id}");
        Ok(position)
    }

    /// Admin approval of a manual-channel payment. Routes through [`Self::apply_payment_event`],
    /// so approvals share the reconciliation idempotency guarantees.
    pub async fn approve_position(&self, position_id: i64) -> Result<Position, LedgerError> {
        let position =
            self.db.fetch_position(position_id).await?.ok_or(LedgerError::PositionNotFound(position_id))?;
        if position.status != PositionStatus::Pending {
            return Err(LedgerError::StateViolation(format!(
                "Only pending positions can be approved; position #{position_id} is {}",
                position.status
            )));
        }
        let reference = position.external_reference.clone().ok_or_else(|| {
            LedgerError::StateViolation(format!("Position #{position_id} has no payment proof attached yet"))
        })?;
        let event = PaymentEvent {
            channel: position.payment_channel,
            external_reference: reference,
            amount: position.principal,
            outcome: PaymentEventOutcome::Confirmed,
            metadata: crate::adapters::EventMetadata {
                user_id: position.user_id.clone(),
                category: position.category.to_string(),
                tier: position.tier.to_string(),
                duration_weeks: position.duration_weeks,
                auto_reinvest: position.auto_reinvest,
            },
            position_id: Some(position_id),
        };
        self.apply_payment_event(event).await
    }

    /// Admin denial. Appends a `Failed` ledger event and moves the position to `Rejected` without
    /// touching owner totals.
    pub async fn reject_position(&self, position_id: i64, reason: Option<&str>) -> Result<Position, LedgerError> {
        let position = self.db.reject_position(position_id, reason, Utc::now()).await?;
        info!("🔄️❌️ Position #{position_id} rejected. Reason: {}", reason.unwrap_or("none given"));
        let message = match reason {
            Some(r) => format!("Your payment could not be verified: {r}"),
            None => "Your payment could not be verified.".to_string(),
        };
        self.notify_status(&position, &message).await;
        Ok(position)
    }

    /// Store admin-composed payment instructions on a pending position and push them to the
    /// owner's notification channel.
    pub async fn compose_instructions(
        &self,
        position_id: i64,
        instructions: PaymentInstructions,
    ) -> Result<Position, LedgerError> {
        let position =
            self.db.fetch_position(position_id).await?.ok_or(LedgerError::PositionNotFound(position_id))?;
        if position.status != PositionStatus::Pending {
            return Err(LedgerError::StateViolation(format!(
                "Instructions can only be composed for a pending position; position #{position_id} is {}",
                position.status
            )));
        }
        if instructions.channel() != position.payment_channel {
            return Err(LedgerError::StateViolation(format!(
                "Instructions are for {}, but position #{position_id} pays via {}",
                instructions.channel(),
                position.payment_channel
            )));
        }
        let position = self.db.set_payment_instructions(position_id, &instructions).await?;
        let event = PaymentInstructionsReadyEvent::new(position.id, position.user_id.clone(), instructions);
        for producer in &self.producers.instructions_ready_producer {
            producer.publish_event(event.clone()).await;
        }
        Ok(position)
    }

    /// Request a payout for an active position.
    ///
    /// The position must be `Active` and must have been held for at least `holding_window` —
    /// a stricter predicate than maturity. The flip to `Withdrawn` is a CAS racing the valuation
    /// scheduler; a stale read is retried a bounded number of times.
    pub async fn request_withdrawal(
        &self,
        user_id: &UserId,
        position_id: i64,
        method: WithdrawalMethod,
        destination: String,
        holding_window: Duration,
        fee_bps: i64,
    ) -> Result<WithdrawalOutcome, LedgerError> {
        let now = Utc::now();
        let mut attempt = 0;
        loop {
            let position = self.fetch_owned(user_id, position_id).await?;
            if position.status != PositionStatus::Active {
                return Err(LedgerError::StateViolation(format!(
                    "Only active positions can be withdrawn; position #{position_id} is {}",
                    position.status
                )));
            }
            if !valuation::holding_window_met(&position, now, holding_window) {
                return Err(LedgerError::StateViolation(format!(
                    "Position #{position_id} has not met the minimum holding window of {} days",
                    holding_window.num_days()
                )));
            }
            let profit = position.current_value - position.principal;
            let fee_cents = position.current_value.value() * fee_bps / 10_000;
            let fee = (fee_cents > 0).then(|| UsdCents::from(fee_cents));
            let request = NewWithdrawalRequest {
                user_id: user_id.clone(),
                position_id,
                principal: position.principal,
                profit,
                method,
                destination: destination.clone(),
            };
            match self.db.create_withdrawal(position_id, position.version, request, fee, now).await {
                Ok((position, request)) => {
                    info!("🔄️🏧️ Withdrawal #{} created for position #{position_id}", request.id);
                    self.notify_status(&position, "Your withdrawal request has been received.").await;
                    return Ok(WithdrawalOutcome { position, request });
                },
                Err(LedgerError::ConcurrentModification(id)) if attempt + 1 < MAX_CAS_RETRIES => {
                    attempt += 1;
                    debug!("🔄️🏧️ Stale write on position #{id} (attempt {attempt}), retrying");
                },
                Err(e) => return Err(e),
            }
        }
    }

    /// One valuation-scheduler pass over all active positions: advance each position's current
    /// value, settle the ones that matured, and roll auto-reinvesting positions into fresh ones.
    /// A failure on one position is recorded and the batch continues.
    pub async fn revalue_active_positions(
        &self,
        now: DateTime<Utc>,
        jitter: &dyn ValuationJitter,
    ) -> Result<RevaluationSummary, LedgerError> {
        let positions = self.db.fetch_active_positions().await?;
        trace!("🕰️ Revaluing {} active positions", positions.len());
        let mut summary = RevaluationSummary::default();
        for position in positions {
            let id = position.id;
            match self.revalue_one(position, now, jitter).await {
                Ok(None) => {}, // lost the race to a withdrawal; nothing to do
                Ok(Some(tick)) => {
                    summary.advanced.push(id);
                    if let Some(matured) = tick.matured {
                        summary.matured.push(matured.id);
                        if let Some(reinvested) = tick.reinvested {
                            summary.reinvested.push(reinvested.id);
                        }
                    }
                },
                Err(e) => {
                    error!("🕰️ Failed to revalue position #{id}: {e}");
                    summary.failed.push((id, e.to_string()));
                },
            }
        }
        Ok(summary)
    }

    async fn revalue_one(
        &self,
        mut position: Position,
        now: DateTime<Utc>,
        jitter: &dyn ValuationJitter,
    ) -> Result<Option<ValuationTick>, LedgerError> {
        let mut attempt = 0;
        let updated = loop {
            let value = valuation::advance_value(&position, now, jitter);
            match self.db.persist_valuation(position.id, position.version, value, now).await {
                Ok(updated) => break updated,
                Err(LedgerError::ConcurrentModification(id)) if attempt + 1 < MAX_CAS_RETRIES => {
                    attempt += 1;
                    match self.db.fetch_position(id).await? {
                        // The position may have been withdrawn under us; only retry while active.
                        Some(current) if current.status == PositionStatus::Active => position = current,
                        _ => return Ok(None),
                    }
                },
                Err(LedgerError::StateViolation(_)) => return Ok(None),
                Err(e) => return Err(e),
            }
        };
        if !valuation::is_matured(&updated, now) {
            return Ok(Some(ValuationTick { matured: None, reinvested: None }));
        }
        let completed = self.db.complete_position(updated.id, updated.version, now).await?;
        info!("🕰️ Position #{} matured at {}", completed.id, completed.current_value);
        self.notify_status(&completed, "Your position has matured and the payout has been credited.").await;
        let reinvested = if completed.auto_reinvest {
            match self.reinvest(&completed, now).await {
                Ok(p) => Some(p),
                Err(e) if e.is_duplicate() => None, // already rolled over by an earlier run
                Err(e) => return Err(e),
            }
        } else {
            None
        };
        Ok(Some(ValuationTick { matured: Some(completed), reinvested }))
    }

    /// Roll a matured position's full value into a fresh active position on the same plan. The
    /// reinvestment reference is derived from the matured position, so replays dedup naturally.
    async fn reinvest(&self, matured: &Position, now: DateTime<Utc>) -> Result<Position, LedgerError> {
        let reference = format!("reinvest-{}-{}", matured.id, matured.matures_at.timestamp());
        let principal = matured.value_at_maturity();
        let new_position = returns::commit(
            matured.user_id.clone(),
            matured.category,
            matured.tier,
            principal,
            matured.duration_weeks,
            matured.payment_channel,
            Some(reference.clone()),
            matured.auto_reinvest,
            now,
        )?;
        let ledger_event =
            NewLedgerEvent::new(matured.user_id.clone(), LedgerEventKind::Credit, principal, matured.payment_channel)
                .with_state(LedgerEventState::Completed)
                .with_reference(reference)
                .with_note(format!("Auto-reinvest of matured position #{}", matured.id));
        let position = self.db.insert_confirmed_position(new_position, ledger_event).await?;
        info!("🕰️🔁️ Position #{} auto-reinvested into #{}", matured.id, position.id);
        self.notify_status(&position, "Your matured position was automatically reinvested.").await;
        Ok(position)
    }

    /// Reject positions that have sat in `Pending` longer than the payment window. Returns the
    /// positions that were expired this run.
    pub async fn expire_stale_pending(
        &self,
        now: DateTime<Utc>,
        expiry: Duration,
    ) -> Result<Vec<Position>, LedgerError> {
        let cutoff = now - expiry;
        let stale = self.db.fetch_stale_pending_positions(cutoff).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for position in stale {
            let id = position.id;
            match self.reject_position(id, Some("Payment window expired")).await {
                Ok(position) => expired.push(position),
                Err(e) => error!("🕰️ Could not expire pending position #{id}: {e}"),
            }
        }
        Ok(expired)
    }

    async fn fetch_owned(&self, user_id: &UserId, position_id: i64) -> Result<Position, LedgerError> {
        let position =
            self.db.fetch_position(position_id).await?.ok_or(LedgerError::PositionNotFound(position_id))?;
        // Don't leak other users' position ids: a foreign position looks like a missing one.
        if &position.user_id != user_id {
            return Err(LedgerError::PositionNotFound(position_id));
        }
        Ok(position)
    }

    async fn notify_status(&self, position: &Position, message: &str) {
        let event =
            PositionStatusChangedEvent::new(position.id, position.user_id.clone(), position.status, message);
        for producer in &self.producers.status_changed_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

struct ValuationTick {
    matured: Option<Position>,
    reinvested: Option<Position>,
}
