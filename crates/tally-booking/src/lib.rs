//! The tally booking engine.
//!
//! Consumes a time-ordered [`Ledger`](tally_core::Ledger) of directives and
//! produces a [`BookedLedger`]: fully-specified transactions plus the final
//! account, currency and inventory registries. Booking is strictly
//! sequential and commits per transaction; the first error aborts and is
//! returned enriched with the offending directive's source context.
//!
//! # Example
//!
//! ```
//! use tally_booking::book;
//! use tally_core::Ledger;
//!
//! let booked = book(&Ledger::default()).unwrap();
//! assert!(booked.transactions.is_empty());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod ledger;
mod txn;

pub use error::{BookError, LedgerError};
pub use ledger::{book, book_with_state, BookedLedger, BookerState};
pub use txn::{book_transaction, do_book};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tally_core::amount::parse_decimal;
    use tally_core::{
        Amount, Directive, Ledger, Metadata, OpenDirective, OptionMap, Posting, SourceCtx,
        TransactionDirective,
    };

    use super::*;

    fn date(day: u32) -> tally_core::DateTime<tally_core::Utc> {
        tally_core::NaiveDate::from_ymd_opt(2025, 4, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn amt(s: &str, c: &str) -> Amount {
        Amount::new(parse_decimal(s).unwrap(), c)
    }

    fn open(day: u32, account: &str) -> Directive {
        Directive::Open(OpenDirective {
            date: date(day),
            account: account.into(),
            currencies: vec![],
            meta: Metadata::new(),
            source: SourceCtx::default(),
            options: Arc::new(OptionMap::default()),
        })
    }

    fn simple_txn(day: u32, postings: Vec<Posting>) -> Directive {
        Directive::Transaction(TransactionDirective {
            date: date(day),
            flag: '*',
            narration: "test".to_string(),
            postings,
            meta: Metadata::new(),
            source: SourceCtx::default(),
            options: Arc::new(OptionMap::default()),
        })
    }

    #[test]
    fn test_empty_ledger() {
        let booked = book(&Ledger::default()).unwrap();
        assert!(booked.transactions.is_empty());
        assert!(booked.accounts.is_empty());
        assert!(booked.inventories.is_empty());
    }

    #[test]
    fn test_simple_transfer() {
        let ledger = Ledger {
            directives: vec![
                open(1, "Assets:Bank"),
                open(1, "Expenses:Food"),
                simple_txn(
                    2,
                    vec![
                        Posting::new("Expenses:Food", amt("50", "USD")),
                        Posting::new("Assets:Bank", amt("-50", "USD")),
                    ],
                ),
            ],
            currencies: Default::default(),
        };

        let booked = book(&ledger).unwrap();
        assert_eq!(booked.transactions.len(), 1);
        assert_eq!(
            booked.inventories["Assets:Bank"].units("USD"),
            parse_decimal("-50").unwrap()
        );
        assert_eq!(
            booked.inventories["Expenses:Food"].units("USD"),
            parse_decimal("50").unwrap()
        );
    }

    #[test]
    fn test_incremental_booking_resumes_state() {
        let first = Ledger {
            directives: vec![
                open(1, "Assets:Bank"),
                open(1, "Expenses:Food"),
                simple_txn(
                    2,
                    vec![
                        Posting::new("Expenses:Food", amt("50", "USD")),
                        Posting::new("Assets:Bank", amt("-50", "USD")),
                    ],
                ),
            ],
            currencies: Default::default(),
        };
        let booked = book(&first).unwrap();

        let second = Ledger {
            directives: vec![simple_txn(
                3,
                vec![
                    Posting::new("Expenses:Food", amt("10", "USD")),
                    Posting::new("Assets:Bank", amt("-10", "USD")),
                ],
            )],
            currencies: Default::default(),
        };
        let resumed = book_with_state(
            &second,
            BookerState {
                accounts: booked.accounts,
                currencies: booked.currencies,
                inventories: booked.inventories,
            },
        )
        .unwrap();

        assert_eq!(
            resumed.inventories["Assets:Bank"].units("USD"),
            parse_decimal("-60").unwrap()
        );
    }

    #[test]
    fn test_error_carries_directive_context() {
        let ledger = Ledger {
            directives: vec![simple_txn(
                2,
                vec![Posting::new("Assets:A", amt("10", "USD"))],
            )],
            currencies: Default::default(),
        };

        let err = book(&ledger).unwrap_err();
        assert_eq!(err.directive.type_name(), "transaction");
        assert!(matches!(err.kind, BookError::TransactionUnbalanced { .. }));
    }
}
