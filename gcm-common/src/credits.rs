//! AI credit accounting
//!
//! Balances are either a finite count or unlimited. The unlimited balance is
//! stored and transmitted as the integer sentinel `-1`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Sentinel used for unlimited balances in storage and JSON
pub const UNLIMITED_SENTINEL: i64 = -1;

/// Statements generated per credit
pub const STATEMENTS_PER_CREDIT: u32 = 4;

/// Statements clustered per credit
pub const CLUSTERED_STATEMENTS_PER_CREDIT: u32 = 10;

/// Per-account AI credit balance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum CreditBalance {
    Finite(u32),
    Unlimited,
}

impl CreditBalance {
    pub fn from_stored(raw: i64) -> Result<Self> {
        match raw {
            UNLIMITED_SENTINEL => Ok(CreditBalance::Unlimited),
            n if n >= 0 => u32::try_from(n)
                .map(CreditBalance::Finite)
                .map_err(|_| Error::validation("credits", format!("balance {} out of range", n))),
            n => Err(Error::validation("credits", format!("invalid balance {}", n))),
        }
    }

    pub fn to_stored(self) -> i64 {
        match self {
            CreditBalance::Finite(n) => n as i64,
            CreditBalance::Unlimited => UNLIMITED_SENTINEL,
        }
    }

    pub fn is_unlimited(self) -> bool {
        matches!(self, CreditBalance::Unlimited)
    }

    /// Check that `cost` can be paid, without changing the balance
    ///
    /// A zero finite balance is always insufficient, even for a zero cost.
    pub fn ensure_covers(self, cost: u32) -> Result<()> {
        match self {
            CreditBalance::Unlimited => Ok(()),
            CreditBalance::Finite(available) if available == 0 || available < cost => {
                Err(Error::InsufficientCredits {
                    required: cost,
                    available: available as i64,
                })
            }
            CreditBalance::Finite(_) => Ok(()),
        }
    }

    /// Balance after paying `cost`
    pub fn charge(self, cost: u32) -> Result<CreditBalance> {
        self.ensure_covers(cost)?;
        Ok(match self {
            CreditBalance::Unlimited => CreditBalance::Unlimited,
            CreditBalance::Finite(available) => CreditBalance::Finite(available - cost),
        })
    }

    /// Balance after adding purchased credits
    pub fn top_up(self, credits: u32) -> CreditBalance {
        match self {
            CreditBalance::Unlimited => CreditBalance::Unlimited,
            CreditBalance::Finite(available) => CreditBalance::Finite(available.saturating_add(credits)),
        }
    }
}

impl TryFrom<i64> for CreditBalance {
    type Error = Error;

    fn try_from(raw: i64) -> Result<Self> {
        CreditBalance::from_stored(raw)
    }
}

impl From<CreditBalance> for i64 {
    fn from(balance: CreditBalance) -> Self {
        balance.to_stored()
    }
}

impl fmt::Display for CreditBalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreditBalance::Finite(n) => write!(f, "{}", n),
            CreditBalance::Unlimited => f.write_str("unlimited"),
        }
    }
}

/// Credits charged for generating `count` statements: ceil(count / 4)
pub fn statement_generation_cost(count: u32) -> u32 {
    count.div_ceil(STATEMENTS_PER_CREDIT)
}

/// Credits charged for clustering `statement_count` statements: ceil(n / 10)
pub fn clustering_cost(statement_count: u32) -> u32 {
    statement_count.div_ceil(CLUSTERED_STATEMENTS_PER_CREDIT)
}

/// Purchasable credit top-up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditPackage {
    Small,
    Medium,
    Large,
}

impl CreditPackage {
    pub const ALL: [CreditPackage; 3] = [CreditPackage::Small, CreditPackage::Medium, CreditPackage::Large];

    pub fn credits(self) -> u32 {
        match self {
            CreditPackage::Small => 25,
            CreditPackage::Medium => 100,
            CreditPackage::Large => 500,
        }
    }

    /// Price in US cents
    pub fn price_cents(self) -> u32 {
        match self {
            CreditPackage::Small => 999,
            CreditPackage::Medium => 2999,
            CreditPackage::Large => 9999,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_cost_rounds_up() {
        assert_eq!(statement_generation_cost(1), 1);
        assert_eq!(statement_generation_cost(4), 1);
        assert_eq!(statement_generation_cost(5), 2);
        assert_eq!(statement_generation_cost(10), 3);
    }

    #[test]
    fn clustering_cost_rounds_up() {
        assert_eq!(clustering_cost(3), 1);
        assert_eq!(clustering_cost(10), 1);
        assert_eq!(clustering_cost(11), 2);
    }

    #[test]
    fn ten_statements_deduct_three_credits() {
        let after = CreditBalance::Finite(10)
            .charge(statement_generation_cost(10))
            .unwrap();
        assert_eq!(after, CreditBalance::Finite(7));
    }

    #[test]
    fn unlimited_stays_unlimited() {
        let after = CreditBalance::Unlimited.charge(1_000).unwrap();
        assert_eq!(after.to_stored(), UNLIMITED_SENTINEL);
    }

    #[test]
    fn zero_balance_is_insufficient() {
        let err = CreditBalance::Finite(0).charge(1).unwrap_err();
        assert!(matches!(err, Error::InsufficientCredits { required: 1, available: 0 }));
    }

    #[test]
    fn finite_balance_below_cost_is_insufficient() {
        assert!(CreditBalance::Finite(2).charge(3).is_err());
        assert_eq!(CreditBalance::Finite(3).charge(3).unwrap(), CreditBalance::Finite(0));
    }

    #[test]
    fn sentinel_round_trip() {
        assert_eq!(CreditBalance::from_stored(-1).unwrap(), CreditBalance::Unlimited);
        assert_eq!(CreditBalance::from_stored(42).unwrap(), CreditBalance::Finite(42));
        assert!(CreditBalance::from_stored(-5).is_err());
        assert_eq!(serde_json::to_string(&CreditBalance::Unlimited).unwrap(), "-1");
    }

    #[test]
    fn top_up_adds_package_credits() {
        let after = CreditBalance::Finite(3).top_up(CreditPackage::Medium.credits());
        assert_eq!(after, CreditBalance::Finite(103));
        assert_eq!(CreditBalance::Unlimited.top_up(25), CreditBalance::Unlimited);
    }
}
