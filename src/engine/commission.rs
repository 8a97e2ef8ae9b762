//! Commission Engine: percentage, tiered, partner-override, and split
//! calculations.
//!
//! Amounts and rates arrive as f64 (JSON numbers), are classified (NaN,
//! ±infinity, negative) and converted to [`Decimal`] before any arithmetic,
//! so the documented cent rounding holds exactly. Every result that
//! represents money is rounded half away from zero at 2 decimals; weighted
//! values are the one exception and stay unrounded.

use crate::domain::{
    standard_tier_schedule, CommissionType, Decimal, PartnerId, PartnerRateBook,
    STANDARD_REFERRAL_RATE,
};
use crate::engine::EngineError;
use rust_decimal::Decimal as RustDecimal;

/// Classify and convert a money amount. Rejects NaN, ±infinity, and
/// negative values, in that order.
///
/// Also the boundary check callers run before storing an amount.
pub fn validate_amount(amount: f64) -> Result<Decimal, EngineError> {
    if amount.is_nan() {
        return Err(EngineError::InvalidAmount);
    }
    if amount.is_infinite() {
        return Err(EngineError::InfiniteAmount);
    }
    if amount < 0.0 {
        return Err(EngineError::NegativeAmount);
    }
    Decimal::from_f64(amount).ok_or(EngineError::InvalidAmount)
}

/// Classify and convert a commission rate; must lie in [0, 1].
fn validate_rate(rate: f64) -> Result<Decimal, EngineError> {
    // NaN fails the range test and lands here too.
    if !(0.0..=1.0).contains(&rate) {
        return Err(EngineError::InvalidRate);
    }
    Decimal::from_f64(rate).ok_or(EngineError::InvalidRate)
}

/// Percentage commission for a commission type.
///
/// `rate` overrides the type's standard rate; `Custom` has no standard rate
/// and requires one.
///
/// # Errors
/// `InvalidAmount`/`InfiniteAmount`/`NegativeAmount` for a bad amount,
/// `InvalidRate` for a rate outside [0, 1] or a missing Custom rate.
pub fn commission(
    kind: CommissionType,
    amount: f64,
    rate: Option<f64>,
) -> Result<Decimal, EngineError> {
    let amount = validate_amount(amount)?;
    let rate = validate_rate(
        rate.or_else(|| kind.default_rate())
            .ok_or(EngineError::InvalidRate)?,
    )?;
    Ok((amount * rate).round2())
}

/// Progressive (marginal-bracket) commission over the standard tier
/// schedule.
///
/// Tiers fully below the amount contribute their full width at their rate;
/// the tier containing the amount contributes from its floor up to the
/// amount; higher tiers contribute nothing. 250_000 yields
/// 100_000×0.10 + 150_000×0.15 = 32_500.
pub fn tiered_commission(amount: f64) -> Result<Decimal, EngineError> {
    let amount = validate_amount(amount)?;

    let mut total = Decimal::zero();
    for tier in standard_tier_schedule() {
        if amount <= tier.floor {
            break;
        }
        let top = match tier.ceiling {
            Some(ceiling) if ceiling < amount => ceiling,
            _ => amount,
        };
        total = total + (top - tier.floor) * tier.rate;
    }
    Ok(total.round2())
}

/// Commission for a specific partner: the partner's negotiated override rate
/// if present in the book, else the standard referral rate.
pub fn partner_commission(
    amount: f64,
    partner: &PartnerId,
    rates: &PartnerRateBook,
) -> Result<Decimal, EngineError> {
    let rate = rates
        .rate_for(partner)
        .unwrap_or(STANDARD_REFERRAL_RATE);
    commission(CommissionType::Referral, amount, Some(rate))
}

/// Forecast value of an opportunity: amount × probability / 100.
///
/// Not rounded to cents; callers that surface it as money round themselves.
///
/// # Errors
/// `InvalidProbability` if `probability` is outside [0, 100], plus the usual
/// amount failures.
pub fn weighted_value(amount: f64, probability: i64) -> Result<Decimal, EngineError> {
    if !(0..=100).contains(&probability) {
        return Err(EngineError::InvalidProbability);
    }
    let amount = validate_amount(amount)?;
    let probability = Decimal::new(RustDecimal::from(probability));
    Ok(amount * probability / Decimal::hundred())
}

/// Sum a list of commission values and round to cents. Empty list sums to 0.
///
/// Entries must be finite but may be negative (clawbacks and adjustments).
pub fn aggregate_commissions(values: &[f64]) -> Result<Decimal, EngineError> {
    let mut sum = Decimal::zero();
    for &value in values {
        if value.is_nan() {
            return Err(EngineError::InvalidAmount);
        }
        if value.is_infinite() {
            return Err(EngineError::InfiniteAmount);
        }
        sum = sum + Decimal::from_f64(value).ok_or(EngineError::InvalidAmount)?;
    }
    Ok(sum.round2())
}

/// Split a total into `partner_count` equal shares rounded to cents.
///
/// The rounding remainder lands on the last share, so the shares always sum
/// to exactly `round2(total)`: 10000 / 3 → [3333.33, 3333.33, 3333.34].
///
/// For totals tiny relative to the partner count the last share absorbs the
/// whole rounding overshoot and can be smaller than the others or even
/// negative (0.05 / 9 → eight shares of 0.01 and a last share of -0.03);
/// the sum invariant still holds.
///
/// # Errors
/// `InvalidPartnerCount` for zero partners, plus the usual amount failures.
pub fn split_commission(total: f64, partner_count: usize) -> Result<Vec<Decimal>, EngineError> {
    let total = validate_amount(total)?;
    if partner_count == 0 {
        return Err(EngineError::InvalidPartnerCount);
    }

    let count = Decimal::new(RustDecimal::from(partner_count as u64));
    let share = (total / count).round2();

    let mut shares = vec![share; partner_count - 1];
    let mut allocated = Decimal::zero();
    for s in &shares {
        allocated = allocated + *s;
    }
    shares.push(total.round2() - allocated);
    Ok(shares)
}

/// Split a total by explicit percentages, each in [0, 1], in input order.
///
/// The percentages must sum to exactly 1.0; the check runs in decimal space,
/// so a set like [0.5, 0.3, 0.2] passes even though its binary-float sum
/// drifts.
///
/// # Errors
/// `InvalidSplitPercentages` for an out-of-range entry or a sum other than
/// 1.0, plus the usual amount failures.
pub fn split_commission_custom(
    total: f64,
    percentages: &[f64],
) -> Result<Vec<Decimal>, EngineError> {
    let total = validate_amount(total)?;

    let mut parsed = Vec::with_capacity(percentages.len());
    let mut sum = Decimal::zero();
    for &pct in percentages {
        if !(0.0..=1.0).contains(&pct) {
            return Err(EngineError::InvalidSplitPercentages);
        }
        let pct = Decimal::from_f64(pct).ok_or(EngineError::InvalidSplitPercentages)?;
        sum = sum + pct;
        parsed.push(pct);
    }
    if sum != Decimal::one() {
        return Err(EngineError::InvalidSplitPercentages);
    }

    Ok(parsed.into_iter().map(|pct| (total * pct).round2()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_standard_rates() {
        assert_eq!(
            commission(CommissionType::Referral, 100000.0, None).unwrap(),
            dec("15000")
        );
        assert_eq!(
            commission(CommissionType::Reseller, 100000.0, None).unwrap(),
            dec("30000")
        );
        assert_eq!(
            commission(CommissionType::Msp, 100000.0, None).unwrap(),
            dec("25000")
        );
    }

    #[test]
    fn test_explicit_rate_overrides_standard() {
        assert_eq!(
            commission(CommissionType::Referral, 1000.0, Some(0.2)).unwrap(),
            dec("200")
        );
    }

    #[test]
    fn test_custom_requires_rate() {
        assert_eq!(
            commission(CommissionType::Custom, 1000.0, None),
            Err(EngineError::InvalidRate)
        );
        assert_eq!(
            commission(CommissionType::Custom, 1000.0, Some(0.5)).unwrap(),
            dec("500")
        );
    }

    #[test]
    fn test_cent_rounding_half_away_from_zero() {
        // 100.33 * 0.15 = 15.0495 -> 15.05
        assert_eq!(
            commission(CommissionType::Referral, 100.33, None).unwrap(),
            dec("15.05")
        );
    }

    #[test]
    fn test_amount_classification() {
        assert_eq!(
            commission(CommissionType::Referral, f64::NAN, None),
            Err(EngineError::InvalidAmount)
        );
        assert_eq!(
            commission(CommissionType::Referral, f64::INFINITY, None),
            Err(EngineError::InfiniteAmount)
        );
        assert_eq!(
            commission(CommissionType::Referral, f64::NEG_INFINITY, None),
            Err(EngineError::InfiniteAmount)
        );
        assert_eq!(
            commission(CommissionType::Referral, -1.0, None),
            Err(EngineError::NegativeAmount)
        );
    }

    #[test]
    fn test_rate_out_of_range() {
        assert_eq!(
            commission(CommissionType::Referral, 1000.0, Some(1.5)),
            Err(EngineError::InvalidRate)
        );
        assert_eq!(
            commission(CommissionType::Referral, 1000.0, Some(-0.1)),
            Err(EngineError::InvalidRate)
        );
        assert_eq!(
            commission(CommissionType::Referral, 1000.0, Some(f64::NAN)),
            Err(EngineError::InvalidRate)
        );
    }

    #[test]
    fn test_rate_bounds_inclusive() {
        assert_eq!(
            commission(CommissionType::Referral, 1000.0, Some(0.0)).unwrap(),
            Decimal::zero()
        );
        assert_eq!(
            commission(CommissionType::Referral, 1000.0, Some(1.0)).unwrap(),
            dec("1000")
        );
    }

    #[test]
    fn test_zero_amount() {
        assert_eq!(
            commission(CommissionType::Referral, 0.0, None).unwrap(),
            Decimal::zero()
        );
    }

    #[test]
    fn test_tiered_within_first_bracket() {
        assert_eq!(tiered_commission(50000.0).unwrap(), dec("5000"));
    }

    #[test]
    fn test_tiered_spanning_two_brackets() {
        assert_eq!(tiered_commission(250000.0).unwrap(), dec("32500"));
    }

    #[test]
    fn test_tiered_spanning_all_brackets() {
        // 100000*0.10 + 400000*0.15 + 250000*0.20 = 120000
        assert_eq!(tiered_commission(750000.0).unwrap(), dec("120000"));
    }

    #[test]
    fn test_tiered_exact_boundaries() {
        assert_eq!(tiered_commission(0.0).unwrap(), Decimal::zero());
        // Exactly at a bracket floor the higher bracket contributes nothing.
        assert_eq!(tiered_commission(100000.0).unwrap(), dec("10000"));
        assert_eq!(tiered_commission(500000.0).unwrap(), dec("70000"));
    }

    #[test]
    fn test_tiered_rejects_bad_amounts() {
        assert_eq!(tiered_commission(-1.0), Err(EngineError::NegativeAmount));
        assert_eq!(tiered_commission(f64::NAN), Err(EngineError::InvalidAmount));
    }

    #[test]
    fn test_partner_override_and_fallback() {
        let book = PartnerRateBook::with_defaults();
        assert_eq!(
            partner_commission(100000.0, &PartnerId::new("partner-premium-001"), &book).unwrap(),
            dec("18000")
        );
        assert_eq!(
            partner_commission(100000.0, &PartnerId::new("unknown"), &book).unwrap(),
            dec("15000")
        );
    }

    #[test]
    fn test_weighted_value_exact() {
        assert_eq!(weighted_value(100000.0, 75).unwrap(), dec("75000"));
        assert_eq!(weighted_value(100000.0, 0).unwrap(), Decimal::zero());
        assert_eq!(weighted_value(100000.0, 100).unwrap(), dec("100000"));
    }

    #[test]
    fn test_weighted_value_not_cent_rounded() {
        // 999.99 * 33 / 100 = 329.9967, preserved as-is.
        assert_eq!(weighted_value(999.99, 33).unwrap(), dec("329.9967"));
    }

    #[test]
    fn test_weighted_value_probability_range() {
        assert_eq!(
            weighted_value(100000.0, 150),
            Err(EngineError::InvalidProbability)
        );
        assert_eq!(
            weighted_value(100000.0, -5),
            Err(EngineError::InvalidProbability)
        );
    }

    #[test]
    fn test_aggregate_empty_is_zero() {
        assert_eq!(aggregate_commissions(&[]).unwrap(), Decimal::zero());
    }

    #[test]
    fn test_aggregate_rounds_sum() {
        assert_eq!(
            aggregate_commissions(&[10.555, 20.444, 30.111]).unwrap(),
            dec("61.11")
        );
    }

    #[test]
    fn test_aggregate_rejects_non_finite() {
        assert_eq!(
            aggregate_commissions(&[1.0, f64::NAN]),
            Err(EngineError::InvalidAmount)
        );
        assert_eq!(
            aggregate_commissions(&[1.0, f64::INFINITY]),
            Err(EngineError::InfiniteAmount)
        );
    }

    #[test]
    fn test_split_even_remainder_on_last() {
        let shares = split_commission(10000.0, 3).unwrap();
        assert_eq!(shares, vec![dec("3333.33"), dec("3333.33"), dec("3333.34")]);

        let mut sum = Decimal::zero();
        for s in &shares {
            sum = sum + *s;
        }
        assert_eq!(sum, dec("10000"));
    }

    #[test]
    fn test_split_single_partner() {
        assert_eq!(split_commission(10000.0, 1).unwrap(), vec![dec("10000")]);
    }

    #[test]
    fn test_split_tiny_total_overshoot_lands_on_last_share() {
        // 0.05/9 rounds up to 0.01 per share; the last share goes negative
        // to keep the sum exact.
        let shares = split_commission(0.05, 9).unwrap();
        assert_eq!(shares.len(), 9);
        for s in &shares[..8] {
            assert_eq!(*s, dec("0.01"));
        }
        assert_eq!(shares[8], dec("-0.03"));

        let mut sum = Decimal::zero();
        for s in &shares {
            sum = sum + *s;
        }
        assert_eq!(sum, dec("0.05"));
    }

    #[test]
    fn test_split_zero_partners_rejected() {
        assert_eq!(
            split_commission(10000.0, 0),
            Err(EngineError::InvalidPartnerCount)
        );
    }

    #[test]
    fn test_split_shares_sum_to_rounded_total() {
        for (total, count) in [(100.0, 7), (0.01, 3), (9999.99, 4), (1.0, 6)] {
            let shares = split_commission(total, count).unwrap();
            assert_eq!(shares.len(), count);
            let mut sum = Decimal::zero();
            for s in &shares {
                sum = sum + *s;
            }
            assert_eq!(
                sum,
                validate_amount(total).unwrap().round2(),
                "shares must reassemble the total for {}/{}",
                total,
                count
            );
        }
    }

    #[test]
    fn test_split_custom_exact() {
        assert_eq!(
            split_commission_custom(10000.0, &[0.5, 0.3, 0.2]).unwrap(),
            vec![dec("5000"), dec("3000"), dec("2000")]
        );
    }

    #[test]
    fn test_split_custom_sum_must_be_one() {
        assert_eq!(
            split_commission_custom(10000.0, &[0.5, 0.3]),
            Err(EngineError::InvalidSplitPercentages)
        );
        assert_eq!(
            split_commission_custom(10000.0, &[]),
            Err(EngineError::InvalidSplitPercentages)
        );
        assert_eq!(
            split_commission_custom(10000.0, &[0.6, 0.6]),
            Err(EngineError::InvalidSplitPercentages)
        );
    }

    #[test]
    fn test_split_custom_rejects_out_of_range_entries() {
        assert_eq!(
            split_commission_custom(10000.0, &[1.5, -0.5]),
            Err(EngineError::InvalidSplitPercentages)
        );
    }

    #[test]
    fn test_pure_calculations_are_idempotent() {
        let a = tiered_commission(250000.0).unwrap();
        let b = tiered_commission(250000.0).unwrap();
        assert_eq!(a, b);

        let a = split_commission(10000.0, 3).unwrap();
        let b = split_commission(10000.0, 3).unwrap();
        assert_eq!(a, b);
    }
}
