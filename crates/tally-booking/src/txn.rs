//! The transaction booker.
//!
//! Expands each input posting into fully-specified booked postings,
//! accumulating a running balance that must be empty when the transaction
//! ends. Cost-bearing postings route their cost legs through a trading
//! account so that double entry holds across buys and sells:
//!
//! - an *augmentation* (`2 VT {{300 CHF}}`) books the units at cost, the
//!   negated units at the trading account, and the total cost at the
//!   trading account;
//! - a *reduction* (`-2 VT {}`) consumes lots selected by the booking
//!   method and mirrors each consumed lot's units and cost value at the
//!   trading account, which is where realized gains/losses surface.

use num_traits::Signed;

use tally_core::options::{resolve_booking_method, resolve_trading_account};
use tally_core::{
    AccountMap, AccountState, BookedPosting, BookedTransaction, Cost, DateSpec, InternedStr,
    Inventory, InventoryMap, Metadata, Position, ReferenceChecks, TransactionDirective,
};

use crate::error::BookError;

/// Book a single transaction against the current account registry and
/// inventories.
///
/// On success the returned transaction carries inventory snapshots from
/// before and after; the caller adopts `inventories_after` as the new
/// running state. Nothing is committed on error.
pub fn book_transaction(
    txn: &TransactionDirective,
    accounts: &AccountMap,
    inventories: &InventoryMap,
) -> Result<BookedTransaction, BookError> {
    let before = inventories.clone();
    let mut invs = inventories.clone();
    let mut balance = Inventory::new();
    let mut booked: Vec<BookedPosting> = Vec::new();

    let checks = txn.options.reference_checks()?;

    for posting in &txn.postings {
        check_account(accounts, checks, &posting.account)?;
        let open_meta = accounts
            .get(&posting.account)
            .and_then(AccountState::open_meta);

        match (&posting.cost, &posting.amount) {
            // Augmentation: the cost spec carries amounts, a new lot is born.
            (Some(spec), Some(amount)) if spec.is_augmentation() => {
                if spec.dates.len() > 1 {
                    return Err(BookError::AugmentationMultipleDates);
                }
                if !spec.currencies.is_empty() {
                    return Err(BookError::AugmentationHasCurrencyFilter);
                }

                let units_abs = amount.number.abs();
                let per_unit = spec.per_unit_amounts(&units_abs)?;
                let date_spec = spec
                    .dates
                    .first()
                    .cloned()
                    .unwrap_or_else(|| DateSpec::from_instant(txn.date));
                let cost = Cost::new(per_unit, date_spec, spec.tags.clone());
                let trading = resolve_trading_account(&posting.meta, &txn.meta, open_meta)?;
                let totals = spec.total_amounts(&units_abs);

                let mut group = Vec::with_capacity(2 + totals.len());
                group.push(BookedPosting {
                    account: posting.account.clone(),
                    flag: posting.flag,
                    amount: amount.clone(),
                    cost: Some(cost),
                    meta: posting.meta.clone(),
                });
                group.push(BookedPosting {
                    account: trading.clone(),
                    flag: posting.flag,
                    amount: amount.neg(),
                    cost: None,
                    meta: Metadata::new(),
                });
                for total in totals {
                    group.push(BookedPosting {
                        account: trading.clone(),
                        flag: posting.flag,
                        amount: total,
                        cost: None,
                        meta: Metadata::new(),
                    });
                }

                check_currencies(accounts, &group)?;
                let (group, next_invs, next_balance) = do_book(invs, balance, group);
                invs = next_invs;
                balance = next_balance;
                booked.extend(group);
            }

            // Reduction: no cost amounts, the spec filters existing lots.
            (Some(spec), Some(amount)) => {
                let inventory = invs.get(&posting.account).cloned().unwrap_or_default();
                let (usable, rest) = inventory
                    .partition(|p| p.cost.as_ref().is_some_and(|c| spec.matches_lot(c)));

                let method =
                    resolve_booking_method(&posting.meta, &txn.meta, open_meta, &txn.options)?;
                let (reductions, leftover) = method.book(
                    &posting.account,
                    posting.flag,
                    &posting.meta,
                    amount,
                    &usable,
                )?;
                let trading = resolve_trading_account(&posting.meta, &txn.meta, open_meta)?;

                // The booking method is free to reshape lots, so its
                // leftover replaces the usable part wholesale.
                invs.insert(posting.account.clone(), rest.merge(&leftover));

                for reduction in reductions {
                    check_currencies(accounts, std::slice::from_ref(&reduction))?;
                    balance = balance.add_amount(reduction.amount.clone());

                    let mut group = vec![BookedPosting {
                        account: trading.clone(),
                        flag: posting.flag,
                        amount: reduction.amount.neg(),
                        cost: None,
                        meta: Metadata::new(),
                    }];
                    if let Some(cost) = &reduction.cost {
                        for per_unit in &cost.amounts {
                            group.push(BookedPosting {
                                account: trading.clone(),
                                flag: posting.flag,
                                amount: per_unit.mul(&reduction.amount.number),
                                cost: None,
                                meta: Metadata::new(),
                            });
                        }
                    }

                    check_currencies(accounts, &group)?;
                    booked.push(reduction);
                    let (group, next_invs, next_balance) = do_book(invs, balance, group);
                    invs = next_invs;
                    balance = next_balance;
                    booked.extend(group);
                }
            }

            // A cost spec with no amount has nothing to work from.
            (Some(_), None) => return Err(BookError::InferenceUnsupported),

            // Plain posting.
            (None, Some(amount)) => {
                let group = vec![BookedPosting {
                    account: posting.account.clone(),
                    flag: posting.flag,
                    amount: amount.clone(),
                    cost: None,
                    meta: posting.meta.clone(),
                }];
                check_currencies(accounts, &group)?;
                let (group, next_invs, next_balance) = do_book(invs, balance, group);
                invs = next_invs;
                balance = next_balance;
                booked.extend(group);
            }

            // Elastic posting: absorb whatever is left in the balance.
            (None, None) => {
                let group: Vec<BookedPosting> = balance
                    .positions()
                    .into_iter()
                    .map(|p| BookedPosting {
                        account: posting.account.clone(),
                        flag: posting.flag,
                        amount: p.amount.neg(),
                        cost: None,
                        meta: posting.meta.clone(),
                    })
                    .collect();
                check_currencies(accounts, &group)?;
                let (group, next_invs, next_balance) = do_book(invs, balance, group);
                invs = next_invs;
                balance = next_balance;
                booked.extend(group);
            }
        }
    }

    if !balance.is_empty() {
        return Err(BookError::TransactionUnbalanced { residual: balance });
    }

    Ok(BookedTransaction {
        date: txn.date,
        flag: txn.flag,
        narration: txn.narration.clone(),
        meta: txn.meta.clone(),
        postings: booked,
        inventories_before: before,
        inventories_after: invs,
        source: txn.source.clone(),
    })
}

/// Fold booked postings into the inventories and the running balance.
///
/// Each posting's amount is added to its account's inventory (as a
/// position with the posting's optional cost) and to the balance. The
/// inputs are consumed and fresh values returned; no shared aliases
/// survive the call.
#[must_use]
pub fn do_book(
    mut inventories: InventoryMap,
    mut balance: Inventory,
    postings: Vec<BookedPosting>,
) -> (Vec<BookedPosting>, InventoryMap, Inventory) {
    for posting in &postings {
        let inventory = inventories.entry(posting.account.clone()).or_default();
        *inventory = inventory.add_position(Position {
            amount: posting.amount.clone(),
            cost: posting.cost.clone(),
        });
        balance = balance.add_amount(posting.amount.clone());
    }
    (postings, inventories, balance)
}

/// Apply the account-reference-checks mode to one posting account.
fn check_account(
    accounts: &AccountMap,
    mode: ReferenceChecks,
    account: &InternedStr,
) -> Result<(), BookError> {
    match mode {
        ReferenceChecks::None => Ok(()),
        ReferenceChecks::Lenient => match accounts.get(account) {
            Some(AccountState::Closed { .. }) => Err(BookError::AccountClosed {
                account: account.clone(),
            }),
            _ => Ok(()),
        },
        ReferenceChecks::Strict => match accounts.get(account) {
            None => Err(BookError::AccountNotOpen {
                account: account.clone(),
            }),
            Some(AccountState::Closed { .. }) => Err(BookError::AccountClosed {
                account: account.clone(),
            }),
            Some(AccountState::Open { .. }) => Ok(()),
        },
    }
}

/// Enforce per-account currency restrictions on emitted postings.
fn check_currencies(accounts: &AccountMap, postings: &[BookedPosting]) -> Result<(), BookError> {
    for posting in postings {
        if let Some(AccountState::Open { currencies, .. }) = accounts.get(&posting.account) {
            if !currencies.is_empty() && !currencies.contains(&posting.amount.currency) {
                return Err(BookError::CurrencyNotAllowed {
                    account: posting.account.clone(),
                    currency: posting.amount.currency.clone(),
                });
            }
        }
    }
    Ok(())
}
