//! Position type: units of a currency held at an optional cost.
//!
//! A position with a cost is a *lot*; a position without one is plain
//! holdings (cash). Positions with zero amount never exist inside an
//! inventory; they are elided on every mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::cost::Cost;

/// Units of a currency, optionally held at a cost lot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The units held.
    pub amount: Amount,
    /// The cost basis, if this position is a lot.
    pub cost: Option<Cost>,
}

impl Position {
    /// A position held at no cost.
    #[must_use]
    pub const fn simple(amount: Amount) -> Self {
        Self { amount, cost: None }
    }

    /// A lot: units held at a cost basis.
    #[must_use]
    pub const fn with_cost(amount: Amount, cost: Cost) -> Self {
        Self {
            amount,
            cost: Some(cost),
        }
    }

    /// Check whether the position has zero units.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// The currency of the held units.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.amount.currency
    }

    /// Whether this position carries a cost basis.
    #[must_use]
    pub const fn is_lot(&self) -> bool {
        self.cost.is_some()
    }

    /// Negate the units, keeping the cost.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            amount: self.amount.neg(),
            cost: self.cost.clone(),
        }
    }

    /// Whether another position shares this one's lot key: same currency
    /// and structurally equal cost (or both costless).
    #[must_use]
    pub fn same_lot(&self, other: &Self) -> bool {
        self.amount.currency == other.amount.currency && self.cost == other.cost
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.amount)?;
        if let Some(cost) = &self.cost {
            write!(f, " {cost}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::parse_decimal;
    use crate::cost::DateSpec;
    use chrono::NaiveDate;

    fn amt(s: &str, c: &str) -> Amount {
        Amount::new(parse_decimal(s).unwrap(), c)
    }

    fn cost(s: &str, c: &str, y: i32, m: u32, d: u32) -> Cost {
        let ds = DateSpec::resolve(
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            None,
            None,
            None,
        )
        .unwrap();
        Cost::new(vec![amt(s, c)], ds, vec![])
    }

    #[test]
    fn test_simple() {
        let p = Position::simple(amt("100", "USD"));
        assert!(!p.is_lot());
        assert_eq!(p.currency(), "USD");
    }

    #[test]
    fn test_with_cost() {
        let p = Position::with_cost(amt("1", "VT"), cost("150", "CHF", 2025, 4, 1));
        assert!(p.is_lot());
        assert!(!p.is_zero());
    }

    #[test]
    fn test_same_lot() {
        let a = Position::with_cost(amt("1", "VT"), cost("150", "CHF", 2025, 4, 1));
        let b = Position::with_cost(amt("5", "VT"), cost("150", "CHF", 2025, 4, 1));
        let c = Position::with_cost(amt("1", "VT"), cost("160", "CHF", 2025, 4, 1));
        let d = Position::simple(amt("1", "VT"));

        assert!(a.same_lot(&b));
        assert!(!a.same_lot(&c));
        assert!(!a.same_lot(&d));
        assert!(d.same_lot(&Position::simple(amt("9", "VT"))));
    }

    #[test]
    fn test_display() {
        let p = Position::with_cost(amt("10", "VT"), cost("150", "CHF", 2025, 4, 1));
        let s = format!("{p}");
        assert!(s.contains("10 VT"));
        assert!(s.contains("150 CHF"));
        assert!(s.contains("2025-04-01"));
    }
}
