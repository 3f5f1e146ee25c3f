//! Booking error taxonomy.
//!
//! Inner layers surface lightweight typed errors; the driver enriches them
//! into a [`LedgerError`] carrying the offending directive, so callers can
//! render `file:row` without the inner code knowing about source files.

use thiserror::Error;

use tally_core::amount::format_rational;
use tally_core::{
    Amount, AmountError, BookingError, Directive, DateTime, Inventory, InternedStr,
    OptionError, Rational, SourceCtx, Utc,
};

/// Errors raised while booking a single directive.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BookError {
    /// Cross-currency arithmetic or scalar division by zero.
    #[error(transparent)]
    Amount(#[from] AmountError),

    /// A booking method could not cover a reduction.
    #[error(transparent)]
    Booking(#[from] BookingError),

    /// A malformed or unknown option / metadata value.
    #[error(transparent)]
    InvalidOption(#[from] OptionError),

    /// Posting to an account that was never opened (strict checks).
    #[error("account {account} is not open")]
    AccountNotOpen {
        /// The unknown account.
        account: InternedStr,
    },

    /// Posting to a closed account.
    #[error("account {account} is closed")]
    AccountClosed {
        /// The closed account.
        account: InternedStr,
    },

    /// Opening an account that is already open.
    #[error("account {account} is already open")]
    AlreadyOpen {
        /// The account.
        account: InternedStr,
    },

    /// Closing an account that is already closed.
    #[error("account {account} is already closed")]
    AlreadyClosed {
        /// The account.
        account: InternedStr,
    },

    /// Declaring a currency twice.
    #[error("currency {currency} is already declared")]
    DuplicateCurrency {
        /// The currency.
        currency: InternedStr,
    },

    /// A booked posting's currency is outside the account's allowed set.
    #[error("currency {currency} is not allowed in account {account}")]
    CurrencyNotAllowed {
        /// The restricted account.
        account: InternedStr,
        /// The offending currency.
        currency: InternedStr,
    },

    /// A balance assertion failed.
    #[error(
        "balance mismatch in {account}: expected {expected}, actual {actual}, \
         delta {delta} exceeds allowed {}",
        format_rational(.max_delta)
    )]
    BalanceMismatch {
        /// The asserted account.
        account: InternedStr,
        /// Asserted amount.
        expected: Amount,
        /// Actual units held.
        actual: Amount,
        /// `actual - expected`.
        delta: Amount,
        /// Maximum allowed absolute delta.
        max_delta: Rational,
    },

    /// The postings of a transaction do not net to zero in every currency.
    #[error("transaction does not balance; residual: {residual}")]
    TransactionUnbalanced {
        /// The non-empty running balance.
        residual: Inventory,
    },

    /// An augmentation cost spec carried currency filters.
    #[error("augmentation cost must not carry currency filters")]
    AugmentationHasCurrencyFilter,

    /// An augmentation cost spec carried more than one date.
    #[error("augmentation cost must not carry more than one date")]
    AugmentationMultipleDates,

    /// A cost spec without an amount has nothing to infer from.
    #[error("cannot infer an amount for a posting with a cost specification")]
    InferenceUnsupported,
}

/// A booking error enriched with the directive it occurred on.
#[derive(Debug, Clone, Error)]
#[error("{}: {} directive: {kind}", .directive.source(), .directive.type_name())]
pub struct LedgerError {
    /// The offending directive.
    pub directive: Box<Directive>,
    /// The underlying error.
    pub kind: BookError,
}

impl LedgerError {
    /// Wrap an inner error with its directive.
    #[must_use]
    pub fn new(directive: Directive, kind: BookError) -> Self {
        Self {
            directive: Box::new(directive),
            kind,
        }
    }

    /// The directive's source location.
    #[must_use]
    pub fn source_ctx(&self) -> &SourceCtx {
        self.directive.source()
    }

    /// The directive's date.
    #[must_use]
    pub fn date(&self) -> DateTime<Utc> {
        self.directive.date()
    }
}
