//! Core types for the tally ledger engine.
//!
//! This crate provides the data model the booking engine operates on:
//!
//! - [`Amount`] - an exact rational number with a currency
//! - [`Cost`] / [`CostSpec`] - lot cost bases and their surface specs
//! - [`Position`] - units held at an optional cost
//! - [`Inventory`] - per-account multi-lot holdings
//! - [`BookingMethod`] - FIFO/LIFO lot selection for reductions
//! - [`Directive`] - the typed statements of a ledger
//! - [`OptionMap`] - frozen option snapshots and their resolution chains
//!
//! # Example
//!
//! ```
//! use tally_core::{Amount, BookingMethod, Cost, DateSpec, Inventory, Metadata, Position};
//! use tally_core::amount::parse_decimal;
//! use chrono::NaiveDate;
//!
//! let date = DateSpec::resolve(
//!     NaiveDate::from_ymd_opt(2025, 4, 1).unwrap(),
//!     None,
//!     None,
//!     None,
//! )
//! .unwrap();
//! let cost = Cost::new(
//!     vec![Amount::new(parse_decimal("1.1").unwrap(), "CHF")],
//!     date,
//!     vec![],
//! );
//! let inv = Inventory::new().add_position(Position::with_cost(
//!     Amount::new(parse_decimal("1").unwrap(), "USD"),
//!     cost,
//! ));
//!
//! let (postings, left) = BookingMethod::Fifo
//!     .book(
//!         &"Assets:Test".into(),
//!         None,
//!         &Metadata::new(),
//!         &Amount::new(parse_decimal("-0.5").unwrap(), "USD"),
//!         &inv,
//!     )
//!     .unwrap();
//!
//! assert_eq!(postings.len(), 1);
//! assert_eq!(left.units("USD"), parse_decimal("0.5").unwrap());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod booking;
pub mod cost;
pub mod directive;
pub mod heap;
pub mod intern;
pub mod inventory;
pub mod options;
pub mod position;

pub use amount::{Amount, AmountError, Rational};
pub use booking::{BookingError, BookingMethod};
pub use cost::{Cost, CostKind, CostSpec, DateSpec};
pub use directive::{
    sort_directives, AccountMap, AccountState, BalanceAssertion, BalanceDirective,
    BookedPosting, BookedTransaction, CloseDirective, CurrencyDirective, CurrencyMap,
    Directive, InventoryMap, Ledger, MetaValue, Metadata, OpenDirective, OptionDirective,
    Posting, SourceCtx, TransactionDirective,
};
pub use intern::{InternedStr, StringInterner};
pub use inventory::Inventory;
pub use options::{OptionError, OptionMap, ReferenceChecks};
pub use position::Position;

// Re-export commonly used external types
pub use chrono::{DateTime, NaiveDate, Utc};
