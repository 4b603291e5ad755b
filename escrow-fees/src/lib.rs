//! Commission tiers for escrow transactions.
//!
//! Fees are charged per transaction based on its amount. Amounts are handled in
//! minor units (pesewas) while the tier table is expressed in major units (cedis),
//! the way the fee schedule is published.
//!
//! # Example
//! ```
//! use escrow_fees::{quote, Percentage};
//!
//! // GHS 120.00
//! let q = quote(12_000).unwrap();
//! assert_eq!(q.commission_fee, 600);
//! assert_eq!(q.total_paid, 12_600);
//! assert_eq!(q.percentage, Percentage::Rate(5.0));
//! assert_eq!(q.rule_applied, "5% for ₵50 - ₵300");
//! ```

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Minor units (pesewas) in one major unit (cedi).
pub const MINOR_UNITS_PER_MAJOR: i64 = 100;

/// Symbol used when rendering rule descriptions.
pub const CURRENCY_SYMBOL: &str = "₵";

// ─────────────────────────────────────────────────────────────────────────────
// Tier Table
// ─────────────────────────────────────────────────────────────────────────────

/// How a tier computes its fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeRule {
    /// Percentage of the amount, in basis points (350 = 3.5%).
    Percent { basis_points: i64 },
    /// Fixed fee in minor units.
    Flat { minor: i64 },
}

/// A band of the fee schedule. `max_major` is only descriptive; a tier applies
/// from its own minimum up to the next tier's minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionTier {
    pub min_major: i64,
    pub max_major: Option<i64>,
    pub rule: FeeRule,
}

/// The published fee schedule, ordered by `min_major`.
pub const COMMISSION_TIERS: &[CommissionTier] = &[
    CommissionTier {
        min_major: 1,
        max_major: Some(49),
        rule: FeeRule::Percent { basis_points: 0 },
    },
    CommissionTier {
        min_major: 50,
        max_major: Some(300),
        rule: FeeRule::Percent { basis_points: 500 },
    },
    CommissionTier {
        min_major: 301,
        max_major: Some(1000),
        rule: FeeRule::Percent { basis_points: 350 },
    },
    CommissionTier {
        min_major: 1001,
        max_major: Some(5000),
        rule: FeeRule::Percent { basis_points: 200 },
    },
    CommissionTier {
        min_major: 5001,
        max_major: None,
        rule: FeeRule::Flat {
            minor: 100 * MINOR_UNITS_PER_MAJOR,
        },
    },
];

impl CommissionTier {
    /// Fee for `amount` (minor units), rounding half up to the minor unit.
    pub fn fee_for(&self, amount: i64) -> i64 {
        match self.rule {
            FeeRule::Percent { basis_points } => {
                let scaled = amount as i128 * basis_points as i128 + 5_000;
                (scaled / 10_000) as i64
            }
            FeeRule::Flat { minor } => minor,
        }
    }

    pub fn percentage(&self) -> Percentage {
        match self.rule {
            FeeRule::Percent { basis_points } => Percentage::Rate(basis_points as f64 / 100.0),
            FeeRule::Flat { .. } => Percentage::Label("Flat rate".to_string()),
        }
    }

    /// Human-readable description, e.g. `3.5% for ₵301 - ₵1000`.
    pub fn describe(&self) -> String {
        match (self.rule, self.max_major) {
            (FeeRule::Flat { minor }, _) => {
                format!(
                    "Flat fee of {}{}",
                    CURRENCY_SYMBOL,
                    minor / MINOR_UNITS_PER_MAJOR
                )
            }
            (FeeRule::Percent { basis_points }, Some(max)) => format!(
                "{}% for {sym}{} - {sym}{}",
                basis_points as f64 / 100.0,
                self.min_major,
                max,
                sym = CURRENCY_SYMBOL
            ),
            (FeeRule::Percent { basis_points }, None) => format!(
                "{}% from {}{}",
                basis_points as f64 / 100.0,
                CURRENCY_SYMBOL,
                self.min_major
            ),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Quotes
// ─────────────────────────────────────────────────────────────────────────────

/// Rate shown to clients: a number for percentage tiers, a label otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum Percentage {
    Rate(f64),
    Label(String),
}

/// Fee breakdown for a transaction amount. All amounts in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CommissionQuote {
    #[schema(example = 12000)]
    pub amount: i64,
    #[schema(example = 600)]
    pub commission_fee: i64,
    #[schema(example = 12600)]
    pub total_paid: i64,
    pub percentage: Percentage,
    #[schema(example = "5% for ₵50 - ₵300")]
    pub rule_applied: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeeError {
    #[error("Invalid transaction amount.")]
    InvalidAmount,

    #[error("No commission rule found for this amount.")]
    NoRuleFound,
}

/// Finds the tier that applies to `amount` (minor units).
pub fn tier_for(amount: i64) -> Result<&'static CommissionTier, FeeError> {
    if amount <= 0 {
        return Err(FeeError::InvalidAmount);
    }

    COMMISSION_TIERS
        .iter()
        .rev()
        .find(|tier| amount >= tier.min_major * MINOR_UNITS_PER_MAJOR)
        .ok_or(FeeError::NoRuleFound)
}

/// Commission fee alone, for callers that do not need the breakdown.
pub fn commission_fee(amount: i64) -> Result<i64, FeeError> {
    Ok(tier_for(amount)?.fee_for(amount))
}

/// Full fee breakdown for `amount` (minor units).
pub fn quote(amount: i64) -> Result<CommissionQuote, FeeError> {
    let tier = tier_for(amount)?;
    let commission_fee = tier.fee_for(amount);
    let total_paid = amount
        .checked_add(commission_fee)
        .ok_or(FeeError::InvalidAmount)?;

    Ok(CommissionQuote {
        amount,
        commission_fee,
        total_paid,
        percentage: tier.percentage(),
        rule_applied: tier.describe(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
