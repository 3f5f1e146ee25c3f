//! The ledger booker: drives a directive stream through the booking engine.
//!
//! Walks directives in order, maintaining the account registry, currency
//! registry and running inventories. Transactions delegate to the
//! transaction booker and commit atomically; the first error aborts
//! booking, enriched with the offending directive.

use num_traits::{Signed, Zero};
use tracing::debug;

use tally_core::{
    AccountMap, AccountState, Amount, BookedTransaction, CurrencyMap, Directive, InventoryMap,
    Ledger, Rational,
};

use crate::error::{BookError, LedgerError};
use crate::txn::book_transaction;

/// Booking state: the three registries threaded through the driver.
///
/// A non-default starting state enables incremental booking on top of a
/// previously booked ledger.
#[derive(Debug, Clone, Default)]
pub struct BookerState {
    /// Account lifecycle registry.
    pub accounts: AccountMap,
    /// Declared currencies.
    pub currencies: CurrencyMap,
    /// Running inventories.
    pub inventories: InventoryMap,
}

/// The booked result: time-ordered transactions plus final registries.
#[derive(Debug, Clone)]
pub struct BookedLedger {
    /// Booked transactions in input order.
    pub transactions: Vec<BookedTransaction>,
    /// Final account registry.
    pub accounts: AccountMap,
    /// Final currency registry.
    pub currencies: CurrencyMap,
    /// Final inventories.
    pub inventories: InventoryMap,
}

/// Book a ledger from an empty starting state (plus any currencies the
/// ledger value already declares).
pub fn book(ledger: &Ledger) -> Result<BookedLedger, LedgerError> {
    book_with_state(
        ledger,
        BookerState {
            currencies: ledger.currencies.clone(),
            ..BookerState::default()
        },
    )
}

/// Book a ledger starting from a prior state.
pub fn book_with_state(
    ledger: &Ledger,
    state: BookerState,
) -> Result<BookedLedger, LedgerError> {
    let BookerState {
        mut accounts,
        mut currencies,
        mut inventories,
    } = state;
    let mut transactions: Vec<BookedTransaction> = Vec::new();

    debug!(directives = ledger.directives.len(), "booking ledger");

    for directive in &ledger.directives {
        apply(
            directive,
            &mut accounts,
            &mut currencies,
            &mut inventories,
            &mut transactions,
        )
        .map_err(|kind| LedgerError::new(directive.clone(), kind))?;
    }

    debug!(transactions = transactions.len(), "booked ledger");

    Ok(BookedLedger {
        transactions,
        accounts,
        currencies,
        inventories,
    })
}

fn apply(
    directive: &Directive,
    accounts: &mut AccountMap,
    currencies: &mut CurrencyMap,
    inventories: &mut InventoryMap,
    transactions: &mut Vec<BookedTransaction>,
) -> Result<(), BookError> {
    match directive {
        Directive::Open(open) => {
            if accounts.get(&open.account).is_some_and(AccountState::is_open) {
                return Err(BookError::AlreadyOpen {
                    account: open.account.clone(),
                });
            }
            accounts.insert(
                open.account.clone(),
                AccountState::Open {
                    currencies: open.currencies.clone(),
                    meta: open.meta.clone(),
                },
            );
            Ok(())
        }

        Directive::Close(close) => {
            if matches!(
                accounts.get(&close.account),
                Some(AccountState::Closed { .. })
            ) {
                return Err(BookError::AlreadyClosed {
                    account: close.account.clone(),
                });
            }
            accounts.insert(
                close.account.clone(),
                AccountState::Closed {
                    meta: close.meta.clone(),
                },
            );
            Ok(())
        }

        Directive::Currency(currency) => {
            if currencies.contains_key(&currency.currency) {
                return Err(BookError::DuplicateCurrency {
                    currency: currency.currency.clone(),
                });
            }
            currencies.insert(currency.currency.clone(), currency.clone());
            Ok(())
        }

        Directive::Balance(balance) => {
            for assertion in &balance.assertions {
                let actual_units = inventories
                    .get(&assertion.account)
                    .map_or_else(Rational::zero, |inv| {
                        inv.units(&assertion.amount.currency)
                    });
                let actual = Amount::new(actual_units, assertion.amount.currency.clone());
                let delta = actual.sub(&assertion.amount)?;
                let max_delta = assertion
                    .tolerance
                    .clone()
                    .unwrap_or_else(Rational::zero)
                    .abs();

                if delta.number.abs() > max_delta {
                    return Err(BookError::BalanceMismatch {
                        account: assertion.account.clone(),
                        expected: assertion.amount.clone(),
                        actual,
                        delta,
                        max_delta,
                    });
                }
            }
            Ok(())
        }

        Directive::Transaction(txn) => {
            let booked = book_transaction(txn, accounts, inventories)?;
            *inventories = booked.inventories_after.clone();
            transactions.push(booked);
            Ok(())
        }

        // Already folded into option snapshots by the loader.
        Directive::Option(_) => Ok(()),
    }
}
