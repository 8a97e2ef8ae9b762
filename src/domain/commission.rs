//! Commission types, the standard tier schedule, and partner rate overrides.

use crate::domain::{Decimal, PartnerId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Standard referral rate, also the fallback for unknown partners.
pub const STANDARD_REFERRAL_RATE: f64 = 0.15;

/// Kind of commission agreement, each with a standard rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionType {
    Referral,
    Reseller,
    Msp,
    /// No standard rate; the caller must supply one.
    Custom,
}

impl CommissionType {
    /// Standard rate for this commission type. None for Custom.
    pub fn default_rate(&self) -> Option<f64> {
        match self {
            CommissionType::Referral => Some(STANDARD_REFERRAL_RATE),
            CommissionType::Reseller => Some(0.30),
            CommissionType::Msp => Some(0.25),
            CommissionType::Custom => None,
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "referral" => Some(CommissionType::Referral),
            "reseller" => Some(CommissionType::Reseller),
            "msp" => Some(CommissionType::Msp),
            "custom" => Some(CommissionType::Custom),
            _ => None,
        }
    }
}

/// One bracket of the progressive tier schedule: `[floor, ceiling)` at
/// `rate`. `ceiling` of None means unbounded (the final tier).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tier {
    pub floor: Decimal,
    pub ceiling: Option<Decimal>,
    pub rate: Decimal,
}

/// The fixed tiered-commission schedule, contiguous and ascending over
/// `[0, ∞)`:
///
/// - `[0, 100_000)` at 10%
/// - `[100_000, 500_000)` at 15%
/// - `[500_000, ∞)` at 20%
pub fn standard_tier_schedule() -> Vec<Tier> {
    use rust_decimal::Decimal as RustDecimal;
    // RustDecimal::new(mantissa, scale): new(10, 2) == 0.10
    vec![
        Tier {
            floor: Decimal::zero(),
            ceiling: Some(Decimal::new(RustDecimal::from(100_000))),
            rate: Decimal::new(RustDecimal::new(10, 2)),
        },
        Tier {
            floor: Decimal::new(RustDecimal::from(100_000)),
            ceiling: Some(Decimal::new(RustDecimal::from(500_000))),
            rate: Decimal::new(RustDecimal::new(15, 2)),
        },
        Tier {
            floor: Decimal::new(RustDecimal::from(500_000)),
            ceiling: None,
            rate: Decimal::new(RustDecimal::new(20, 2)),
        },
    ]
}

/// Partner-specific rate overrides, consulted before the standard referral
/// rate.
///
/// Backed by a plain map; the repository can hydrate one from the
/// `partner_rates` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartnerRateBook {
    rates: HashMap<PartnerId, f64>,
}

impl PartnerRateBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test fixture mirroring the rows `schema.sql` seeds into
    /// `partner_rates`; production code hydrates the book from that table
    /// via the repository.
    #[cfg(test)]
    pub fn with_defaults() -> Self {
        let mut book = Self::new();
        book.set(PartnerId::new("partner-premium-001"), 0.18);
        book.set(PartnerId::new("partner-standard-002"), 0.12);
        book
    }

    pub fn set(&mut self, partner: PartnerId, rate: f64) {
        self.rates.insert(partner, rate);
    }

    /// Override rate for a partner, or None to fall back to the standard
    /// rate.
    pub fn rate_for(&self, partner: &PartnerId) -> Option<f64> {
        self.rates.get(partner).copied()
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
