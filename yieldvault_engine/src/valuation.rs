//! The position ledger's valuation arithmetic.
//!
//! `advance_value` recomputes a position's current value from first principles on every tick
//! (accrued = payout × elapsed / total), so rounding never drifts across ticks. The jitter that
//! makes the curve look organic is injected through [`ValuationJitter`] — a seeded, swappable
//! generator keyed on the position id and elapsed sub-periods — never ambient randomness, so any
//! tick is reproducible in tests.
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use yv_common::UsdCents;

use crate::db_types::{Category, Position};

/// Multiplicative noise applied to the accrued (not principal) part of a valuation.
pub trait ValuationJitter: Send + Sync {
    /// A factor close to 1.0. Must be a pure function of its arguments.
    fn factor(&self, position_id: i64, elapsed_sub_periods: i64, category: Category) -> f64;
}

/// The default generator. Seeds a [`StdRng`] from `(position_id, elapsed)` and draws a factor in
/// `1 ± bound(category)`, so re-valuing the same position at the same tick always yields the same
/// number.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeededJitter {
    /// Mixed into every seed; lets tests shift the whole noise field at once.
    pub base_seed: u64,
}

impl ValuationJitter for SeededJitter {
    fn factor(&self, position_id: i64, elapsed_sub_periods: i64, category: Category) -> f64 {
        let seed = self
            .base_seed
            .wrapping_add(position_id as u64)
            .wrapping_add((elapsed_sub_periods as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = category.jitter_bound_bps() as f64 / 10_000.0;
        1.0 + rng.gen_range(-bound..=bound)
    }
}

/// No noise at all. Used in tests and anywhere exact curve values matter.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl ValuationJitter for NoJitter {
    fn factor(&self, _position_id: i64, _elapsed_sub_periods: i64, _category: Category) -> f64 {
        1.0
    }
}

/// Whole elapsed daily sub-periods since the position started, clamped to the position's total.
pub fn elapsed_sub_periods(position: &Position, now: DateTime<Utc>) -> i64 {
    let elapsed = (now - position.started_at).num_days();
    elapsed.clamp(0, position.total_sub_periods())
}

/// Recompute the position's current value at `now`.
///
/// The result is clamped to `principal + expected_payout` and ratcheted against the previously
/// persisted `current_value`, so the series a user observes is monotonically non-decreasing even
/// though the per-tick jitter factor is random.
pub fn advance_value(position: &Position, now: DateTime<Utc>, jitter: &dyn ValuationJitter) -> UsdCents {
    let total = position.total_sub_periods();
    let elapsed = elapsed_sub_periods(position, now);
    if elapsed >= total {
        // Full term served: settle at exactly principal + expected payout, jitter-free.
        return position.value_at_maturity();
    }
    let accrued = (position.expected_payout.value() as i128 * elapsed as i128 / total as i128) as i64;
    let factor = jitter.factor(position.id, elapsed, position.category);
    let noisy = (accrued as f64 * factor).round() as i64;
    let raw = position.principal + UsdCents::from(noisy);
    raw.min(position.value_at_maturity()).max(position.current_value)
}

pub fn is_matured(position: &Position, now: DateTime<Utc>) -> bool {
    now >= position.matures_at
}

/// Withdrawal eligibility is a stricter, separate predicate from maturity: the position must have
/// been held for the minimum holding window, regardless of accrual state.
pub fn holding_window_met(position: &Position, now: DateTime<Utc>, window: Duration) -> bool {
    now - position.started_at >= window
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use yv_common::UsdCents;

    use super::*;
    use crate::db_types::{PaymentChannel, PaymentState, PositionStatus, Tier, UserId};

    fn gold_position(now: DateTime<Utc>) -> Position {
        Position {
            id: 42,
            user_id: UserId::from("u-1"),
            category: Category::Stocks,
            tier: Tier::Gold,
            principal: UsdCents::from_dollars(500),
            duration_weeks: 4,
            annual_rate_pct: 30,
            expected_payout: UsdCents::from_cents(1154),
            current_value: UsdCents::from_dollars(500),
            per_period_accrual: UsdCents::from_cents(41),
            status: PositionStatus::Active,
            started_at: now,
            matures_at: now + Duration::weeks(4),
            last_valued_at: now,
            payment_channel: PaymentChannel::Card,
            payment_state: PaymentState::Confirmed,
            external_reference: Some("ch_42".to_string()),
            instructions: None,
            auto_reinvest: false,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn halfway_value_without_jitter() {
        // Day 14 of 28: $500 + $11.54 × 14/28 = $505.77.
        let start = Utc::now();
        let position = gold_position(start);
        let value = advance_value(&position, start + Duration::days(14), &NoJitter);
        assert_eq!(value, UsdCents::from_cents(50577));
    }

    #[test]
    fn value_is_monotonic_for_a_fixed_seed() {
        let start = Utc::now();
        let mut position = gold_position(start);
        position.category = Category::Crypto; // widest jitter bound
        let jitter = SeededJitter::default();
        let mut last = position.current_value;
        for day in 0..=35 {
            let value = advance_value(&position, start + Duration::days(day), &jitter);
            assert!(value >= last, "value regressed on day {day}: {value} < {last}");
            position.current_value = value;
            last = value;
        }
    }

    #[test]
    fn value_never_exceeds_principal_plus_payout() {
        let start = Utc::now();
        let mut position = gold_position(start);
        position.category = Category::Crypto;
        let jitter = SeededJitter::default();
        let cap = position.value_at_maturity();
        for day in 0..=60 {
            let value = advance_value(&position, start + Duration::days(day), &jitter);
            assert!(value <= cap, "value {value} exceeded cap {cap} on day {day}");
            position.current_value = value;
        }
        assert_eq!(position.current_value, cap);
    }

    #[test]
    fn jitter_is_reproducible() {
        let j = SeededJitter::default();
        assert_eq!(j.factor(7, 3, Category::Forex), j.factor(7, 3, Category::Forex));
        let bound = Category::Forex.jitter_bound_bps() as f64 / 10_000.0;
        let f = j.factor(7, 3, Category::Forex);
        assert!((f - 1.0).abs() <= bound + f64::EPSILON);
    }

    #[test]
    fn maturity_and_holding_window_are_distinct() {
        let start = Utc::now();
        let position = gold_position(start);
        let day_15 = start + Duration::days(15);
        assert!(!is_matured(&position, day_15));
        assert!(holding_window_met(&position, day_15, Duration::days(14)));
        assert!(!holding_window_met(&position, start + Duration::days(13), Duration::days(14)));
        assert!(is_matured(&position, start + Duration::weeks(4)));
    }
}
