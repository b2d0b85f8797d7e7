//! The return model: maps a plan tier, principal and duration to an expected payout curve.
//!
//! All derivations happen here, at explicit call sites — nothing is computed in storage hooks.
//! [`preview`] and [`commit`] share the same arithmetic, so the fields a client previews are
//! bit-for-bit the fields that end up persisted on the position.
//!
//! The authoritative payout formula uses the *annual* tier rate:
//!
//! ```text
//! expected_payout = principal × annual_rate_pct × duration_weeks / (100 × 52)
//! ```
//!
//! computed in integer minor units with i128 intermediates, rounded half-up. Accrual is linear
//! over daily sub-periods.
use chrono::{DateTime, Duration, Utc};
use yv_common::UsdCents;

use crate::db_types::{
    Category,
    NewPosition,
    PaymentChannel,
    PaymentState,
    PositionStatus,
    Tier,
    UserId,
    ValidationError,
};

pub const MIN_PRINCIPAL: UsdCents = UsdCents::from_dollars(100);
pub const MIN_DURATION_WEEKS: i64 = 1;
pub const PERIODS_PER_YEAR: i64 = 52;
pub const SUB_PERIODS_PER_WEEK: i64 = 7;

/// The fields a client sees before committing, and exactly the fields `commit` persists.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ReturnPreview {
    pub tier: Tier,
    pub annual_rate_pct: i64,
    pub principal: UsdCents,
    pub duration_weeks: i64,
    pub expected_payout: UsdCents,
    pub per_period_accrual: UsdCents,
    pub total_sub_periods: i64,
    pub matures_at: DateTime<Utc>,
}

/// Validate the inputs and compute the payout curve. Rejects out-of-range principal and duration
/// before any arithmetic.
pub fn preview(
    tier: Tier,
    principal: UsdCents,
    duration_weeks: i64,
    now: DateTime<Utc>,
) -> Result<ReturnPreview, ValidationError> {
    if principal < MIN_PRINCIPAL {
        return Err(ValidationError::PrincipalBelowMinimum { min: MIN_PRINCIPAL, got: principal });
    }
    if duration_weeks < MIN_DURATION_WEEKS {
        return Err(ValidationError::DurationBelowMinimum { min: MIN_DURATION_WEEKS, got: duration_weeks });
    }
    let rate_pct = tier.annual_rate_pct();
    let expected_payout = expected_payout(principal, rate_pct, duration_weeks);
    let total_sub_periods = duration_weeks * SUB_PERIODS_PER_WEEK;
    let per_period_accrual = UsdCents::from(expected_payout.value() / total_sub_periods);
    Ok(ReturnPreview {
        tier,
        annual_rate_pct: rate_pct,
        principal,
        duration_weeks,
        expected_payout,
        per_period_accrual,
        total_sub_periods,
        matures_at: now + Duration::weeks(duration_weeks),
    })
}

/// Produce the insertable position record for the given channel. Instant channels come in already
/// confirmed (the signed callback is the trigger); manual channels start out pending.
#[allow(clippy::too_many_arguments)]
pub fn commit(
    user_id: UserId,
    category: Category,
    tier: Tier,
    principal: UsdCents,
    duration_weeks: i64,
    channel: PaymentChannel,
    external_reference: Option<String>,
    auto_reinvest: bool,
    now: DateTime<Utc>,
) -> Result<NewPosition, ValidationError> {
    let p = preview(tier, principal, duration_weeks, now)?;
    let (status, payment_state) = if channel.is_instant() {
        (PositionStatus::Active, PaymentState::Confirmed)
    } else {
        (PositionStatus::Pending, PaymentState::AwaitingPayment)
    };
    Ok(NewPosition {
        user_id,
        category,
        tier: p.tier,
        principal: p.principal,
        duration_weeks: p.duration_weeks,
        annual_rate_pct: p.annual_rate_pct,
        expected_payout: p.expected_payout,
        per_period_accrual: p.per_period_accrual,
        status,
        started_at: now,
        matures_at: p.matures_at,
        payment_channel: channel,
        payment_state,
        external_reference,
        auto_reinvest,
    })
}

/// `principal × rate × weeks / (100 × 52)`, rounded half-up in minor units.
fn expected_payout(principal: UsdCents, rate_pct: i64, duration_weeks: i64) -> UsdCents {
    let numerator = principal.value() as i128 * rate_pct as i128 * duration_weeks as i128;
    let denominator = 100i128 * PERIODS_PER_YEAR as i128;
    let rounded = (2 * numerator + denominator) / (2 * denominator);
    UsdCents::from(rounded as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn gold_scenario_from_the_brochure() {
        // $500 at the Gold midpoint (30% p.a.) over 4 weeks pays out ~$11.54.
        let now = Utc::now();
        let p = preview(Tier::Gold, UsdCents::from_dollars(500), 4, now).unwrap();
        assert_eq!(p.expected_payout, UsdCents::from_cents(1154));
        assert_eq!(p.annual_rate_pct, 30);
        assert_eq!(p.total_sub_periods, 28);
        assert_eq!(p.matures_at, now + Duration::weeks(4));
    }

    #[test]
    fn payout_is_exact_for_all_tiers() {
        let principal = UsdCents::from_dollars(1000);
        for (tier, expected) in [
            (Tier::Starter, 2885), // 100_000 * 15 * 10 / 5200
            (Tier::Silver, 4231),
            (Tier::Gold, 5769),
            (Tier::Platinum, 7692),
        ] {
            let p = preview(tier, principal, 10, Utc::now()).unwrap();
            assert_eq!(p.expected_payout, UsdCents::from_cents(expected), "tier {tier:?}");
        }
    }

    #[test]
    fn preview_and_commit_agree_bit_for_bit() {
        let now = Utc::now();
        let p = preview(Tier::Silver, UsdCents::from_dollars(750), 6, now).unwrap();
        let c = commit(
            UserId::from("u-1"),
            Category::Forex,
            Tier::Silver,
            UsdCents::from_dollars(750),
            6,
            PaymentChannel::Crypto,
            None,
            false,
            now,
        )
        .unwrap();
        assert_eq!(c.expected_payout, p.expected_payout);
        assert_eq!(c.per_period_accrual, p.per_period_accrual);
        assert_eq!(c.annual_rate_pct, p.annual_rate_pct);
        assert_eq!(c.matures_at, p.matures_at);
        assert_eq!(c.status, PositionStatus::Pending);
        assert_eq!(c.payment_state, PaymentState::AwaitingPayment);
    }

    #[test]
    fn floors_are_enforced_before_any_computation() {
        let now = Utc::now();
        let err = preview(Tier::Gold, UsdCents::from_dollars(99), 4, now).unwrap_err();
        assert!(matches!(err, ValidationError::PrincipalBelowMinimum { .. }));
        let err = preview(Tier::Gold, UsdCents::from_dollars(500), 0, now).unwrap_err();
        assert!(matches!(err, ValidationError::DurationBelowMinimum { .. }));
    }

    #[test]
    fn instant_channels_commit_active() {
        let c = commit(
            UserId::from("u-2"),
            Category::Stocks,
            Tier::Gold,
            UsdCents::from_dollars(500),
            4,
            PaymentChannel::Card,
            Some("ch_123".to_string()),
            false,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(c.status, PositionStatus::Active);
        assert_eq!(c.payment_state, PaymentState::Confirmed);
    }
}
