//! Inventory type: per-account holdings grouped by currency and lot.
//!
//! An inventory maps each currency to the lots held in it. Positions fold
//! by lot key (currency + structural cost identity): adding to an existing
//! lot sums the amounts, and an entry whose amount reaches zero is removed.
//! All mutating operations return a new inventory; booked transactions keep
//! before/after snapshots, so the previous value must stay intact.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Rational};
use crate::intern::InternedStr;
use crate::position::Position;

/// Per-account multi-lot holdings.
///
/// Invariant: no stored position has a zero amount, and no currency maps to
/// an empty lot list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    by_currency: BTreeMap<InternedStr, Vec<Position>>,
}

impl Inventory {
    /// Create an empty inventory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether the inventory holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_currency.is_empty()
    }

    /// All positions in stable order: currency ascending, then costless
    /// positions before lots, then lot date ascending; insertion order
    /// breaks remaining ties.
    #[must_use]
    pub fn positions(&self) -> Vec<&Position> {
        let mut out: Vec<&Position> = Vec::new();
        for lots in self.by_currency.values() {
            let mut group: Vec<&Position> = lots.iter().collect();
            group.sort_by_key(|p| p.cost.as_ref().map(|c| c.instant));
            out.extend(group);
        }
        out
    }

    /// Positions of one currency, in insertion order.
    #[must_use]
    pub fn positions_for_currency(&self, currency: &str) -> &[Position] {
        self.by_currency
            .get(currency)
            .map_or(&[], Vec::as_slice)
    }

    /// Sum of all units of a currency across lots.
    #[must_use]
    pub fn units(&self, currency: &str) -> Rational {
        self.positions_for_currency(currency)
            .iter()
            .map(|p| &p.amount.number)
            .sum()
    }

    /// Currencies present, ascending.
    pub fn currencies(&self) -> impl Iterator<Item = &InternedStr> {
        self.by_currency.keys()
    }

    /// Add a bare amount; equivalent to adding a costless position.
    #[must_use]
    pub fn add_amount(&self, amount: Amount) -> Self {
        self.add_position(Position::simple(amount))
    }

    /// Add a position, folding by lot key. Zero amounts are a no-op; a lot
    /// whose sum reaches zero is removed. Returns the new inventory.
    #[must_use]
    pub fn add_position(&self, position: Position) -> Self {
        let mut next = self.clone();
        next.fold_in(position);
        next
    }

    /// Add several positions at once.
    #[must_use]
    pub fn add_positions<I: IntoIterator<Item = Position>>(&self, positions: I) -> Self {
        let mut next = self.clone();
        for p in positions {
            next.fold_in(p);
        }
        next
    }

    /// Split positions by a predicate into `(matching, rest)`.
    #[must_use]
    pub fn partition<F: Fn(&Position) -> bool>(&self, pred: F) -> (Self, Self) {
        let mut matching = Self::new();
        let mut rest = Self::new();
        for lots in self.by_currency.values() {
            for p in lots {
                if pred(p) {
                    matching.fold_in(p.clone());
                } else {
                    rest.fold_in(p.clone());
                }
            }
        }
        (matching, rest)
    }

    /// Merge all positions of another inventory into a copy of this one.
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        self.add_positions(other.positions().into_iter().cloned())
    }

    fn fold_in(&mut self, position: Position) {
        if position.is_zero() {
            return;
        }
        let currency = position.amount.currency.clone();
        let lots = self.by_currency.entry(currency.clone()).or_default();
        if let Some(i) = lots.iter().position(|p| p.same_lot(&position)) {
            lots[i].amount.number += &position.amount.number;
            if lots[i].is_zero() {
                lots.remove(i);
            }
        } else {
            lots.push(position);
        }
        if self.by_currency.get(&currency).is_some_and(Vec::is_empty) {
            self.by_currency.remove(&currency);
        }
    }
}

impl fmt::Display for Inventory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "(empty)");
        }
        for (i, p) in self.positions().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        Ok(())
    }
}

impl FromIterator<Position> for Inventory {
    fn from_iter<I: IntoIterator<Item = Position>>(iter: I) -> Self {
        Self::new().add_positions(iter)
    }
}
