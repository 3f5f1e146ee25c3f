//! Lot-selection strategies for reductions.
//!
//! A booking method decides which cost lots a reduction consumes. FIFO
//! takes the oldest lots first, LIFO the newest. Positions held at no cost
//! are invisible here: they cannot be reduced against, and lots whose sign
//! matches the requested amount are skipped (those would be augmentations,
//! not reductions).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use num_traits::Signed;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::amount::Amount;
use crate::cost::Cost;
use crate::directive::{BookedPosting, Metadata};
use crate::heap;
use crate::intern::InternedStr;
use crate::inventory::Inventory;
use crate::position::Position;

/// Errors raised by lot selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    /// The candidate lots ran out before the requested amount was covered.
    #[error("not enough lots in {account} to reduce; {remainder} left over")]
    NotEnoughToReduce {
        /// Account being reduced.
        account: InternedStr,
        /// The uncovered remainder.
        remainder: Amount,
    },
}

/// A lot-selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookingMethod {
    /// First in, first out: oldest lots reduce first.
    #[default]
    Fifo,
    /// Last in, first out: newest lots reduce first.
    Lifo,
}

impl FromStr for BookingMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fifo" => Ok(Self::Fifo),
            "lifo" => Ok(Self::Lifo),
            _ => Err(format!("unknown booking method: {s}")),
        }
    }
}

impl fmt::Display for BookingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "fifo"),
            Self::Lifo => write!(f, "lifo"),
        }
    }
}

/// A reduction candidate: an at-cost lot plus its insertion index, which
/// breaks lot-date ties deterministically.
struct Candidate {
    index: usize,
    amount: Amount,
    cost: Cost,
}

impl Candidate {
    fn key(&self) -> (DateTime<Utc>, usize) {
        (self.cost.instant, self.index)
    }
}

impl BookingMethod {
    /// Reduce `amount` against the at-cost lots of its currency in
    /// `inventory`.
    ///
    /// Returns the booked reduction postings (one per consumed lot, in
    /// consumption order) and the inventory left over after the
    /// consumption. A zero amount returns no postings and the inventory
    /// unchanged.
    pub fn book(
        self,
        account: &InternedStr,
        flag: Option<char>,
        meta: &Metadata,
        amount: &Amount,
        inventory: &Inventory,
    ) -> Result<(Vec<BookedPosting>, Inventory), BookingError> {
        if amount.is_zero() {
            return Ok((Vec::new(), inventory.clone()));
        }

        let mut candidates: Vec<Candidate> = inventory
            .positions_for_currency(&amount.currency)
            .iter()
            .enumerate()
            .filter_map(|(index, p)| {
                p.cost.as_ref().map(|cost| Candidate {
                    index,
                    amount: p.amount.clone(),
                    cost: cost.clone(),
                })
            })
            .collect();

        let mut before = |a: &Candidate, b: &Candidate| match self {
            Self::Fifo => a.key() < b.key(),
            Self::Lifo => a.key() > b.key(),
        };
        heap::make_heap(&mut candidates, &mut before);

        let mut remaining = amount.clone();
        let mut postings: Vec<BookedPosting> = Vec::new();

        while !remaining.is_zero() {
            let Some(lot) = heap::pop_heap(&mut candidates, &mut before) else {
                return Err(BookingError::NotEnoughToReduce {
                    account: account.clone(),
                    remainder: remaining,
                });
            };
            // A lot on the same side as the request is not reducible
            if lot.amount.signum() == remaining.signum() {
                continue;
            }

            let magnitude = lot.amount.number.abs().min(remaining.number.abs());
            let take = if lot.amount.is_positive() {
                Amount::new(-magnitude, remaining.currency.clone())
            } else {
                Amount::new(magnitude, remaining.currency.clone())
            };

            remaining.number -= &take.number;
            postings.push(BookedPosting {
                account: account.clone(),
                flag,
                amount: take,
                cost: Some(lot.cost),
                meta: meta.clone(),
            });
        }

        // Adding each take back through lot aggregation shrinks the
        // consumed lots and drops the ones that reach zero.
        let leftover = inventory.add_positions(
            postings
                .iter()
                .map(|p| Position {
                    amount: p.amount.clone(),
                    cost: p.cost.clone(),
                }),
        );

        Ok((postings, leftover))
    }
}
