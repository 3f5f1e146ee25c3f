//! Option maps and the resolution chains the booker consults.
//!
//! Options are set in-band (`option "name" "value"`). The loader threads a
//! running map through the file and freezes an `Arc` snapshot onto every
//! directive; the booker reads only the snapshot of the directive at hand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::BookingMethod;
use crate::directive::{MetaValue, Metadata};
use crate::intern::InternedStr;

/// Option name for the account-reference checking mode.
pub const OPT_REFERENCE_CHECKS: &str = "account-reference-checks";
/// Option / metadata name for the default booking method.
pub const OPT_BOOKING_METHOD: &str = "booking-method";
/// Metadata name for the trading account override.
pub const META_TRADING_ACCOUNT: &str = "trading-account";
/// Option name for the default timezone of bare dates.
pub const OPT_DEFAULT_TIMEZONE: &str = "default-timezone";

/// The trading account used when nothing overrides it.
pub const DEFAULT_TRADING_ACCOUNT: &str = "Trading:Default";

/// A malformed or unknown option value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid option {name}: {reason}")]
pub struct OptionError {
    /// The option or metadata key.
    pub name: String,
    /// Why the value was rejected.
    pub reason: String,
}

impl OptionError {
    fn new(name: &str, reason: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// How strictly postings are checked against the account registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReferenceChecks {
    /// No checks at all.
    None,
    /// Reject postings to closed accounts; unknown accounts are fine.
    #[default]
    Lenient,
    /// Additionally reject postings to accounts that were never opened.
    Strict,
}

/// A frozen set of option values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionMap {
    entries: BTreeMap<String, String>,
}

impl OptionMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Read a raw option value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(String::as_str)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `account-reference-checks` mode; `lenient` when unset.
    pub fn reference_checks(&self) -> Result<ReferenceChecks, OptionError> {
        match self.get(OPT_REFERENCE_CHECKS) {
            None => Ok(ReferenceChecks::default()),
            Some("none") => Ok(ReferenceChecks::None),
            Some("lenient") => Ok(ReferenceChecks::Lenient),
            Some("strict") => Ok(ReferenceChecks::Strict),
            Some(other) => Err(OptionError::new(
                OPT_REFERENCE_CHECKS,
                format!("unknown mode \"{other}\""),
            )),
        }
    }

    /// The `default-timezone` value, if set.
    #[must_use]
    pub fn default_timezone(&self) -> Option<&str> {
        self.get(OPT_DEFAULT_TIMEZONE)
    }
}

/// Resolve the booking method for a posting.
///
/// Precedence: posting metadata, then transaction metadata, then the open
/// directive's metadata, then the transaction's option map; `fifo` when
/// nothing is set. Unknown method names fail.
pub fn resolve_booking_method(
    posting_meta: &Metadata,
    txn_meta: &Metadata,
    open_meta: Option<&Metadata>,
    options: &OptionMap,
) -> Result<BookingMethod, OptionError> {
    let from_meta = meta_string(posting_meta, OPT_BOOKING_METHOD)
        .or_else(|| meta_string(txn_meta, OPT_BOOKING_METHOD))
        .or_else(|| open_meta.and_then(|m| meta_string(m, OPT_BOOKING_METHOD)))
        .or_else(|| options.get(OPT_BOOKING_METHOD));

    match from_meta {
        None => Ok(BookingMethod::default()),
        Some(name) => name
            .parse()
            .map_err(|reason: String| OptionError::new(OPT_BOOKING_METHOD, reason)),
    }
}

/// Resolve the trading account for a posting.
///
/// Precedence: posting metadata, then transaction metadata, then the open
/// directive's metadata, then the literal default. Where the key is
/// present its value must be account-typed.
pub fn resolve_trading_account(
    posting_meta: &Metadata,
    txn_meta: &Metadata,
    open_meta: Option<&Metadata>,
) -> Result<InternedStr, OptionError> {
    for meta in [Some(posting_meta), Some(txn_meta), open_meta]
        .into_iter()
        .flatten()
    {
        match meta.get(META_TRADING_ACCOUNT) {
            Some(MetaValue::Account(account)) => return Ok(account.clone()),
            Some(other) => {
                return Err(OptionError::new(
                    META_TRADING_ACCOUNT,
                    format!("expected an account, got {other}"),
                ))
            }
            None => {}
        }
    }
    Ok(InternedStr::new(DEFAULT_TRADING_ACCOUNT))
}

/// Read a string-typed metadata value.
#[must_use]
pub fn meta_string<'a>(meta: &'a Metadata, key: &str) -> Option<&'a str> {
    match meta.get(key) {
        Some(MetaValue::String(s)) => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_checks_default_and_modes() {
        let mut opts = OptionMap::new();
        assert_eq!(opts.reference_checks().unwrap(), ReferenceChecks::Lenient);

        opts.set(OPT_REFERENCE_CHECKS, "none");
        assert_eq!(opts.reference_checks().unwrap(), ReferenceChecks::None);
        opts.set(OPT_REFERENCE_CHECKS, "strict");
        assert_eq!(opts.reference_checks().unwrap(), ReferenceChecks::Strict);

        opts.set(OPT_REFERENCE_CHECKS, "paranoid");
        assert!(opts.reference_checks().is_err());
    }

    #[test]
    fn test_booking_method_precedence() {
        let mut posting = Metadata::new();
        let mut txn = Metadata::new();
        let opts = OptionMap::new();

        // Default
        assert_eq!(
            resolve_booking_method(&posting, &txn, None, &opts).unwrap(),
            BookingMethod::Fifo
        );

        // Transaction meta beats the default
        txn.insert(
            OPT_BOOKING_METHOD.to_string(),
            MetaValue::String("lifo".to_string()),
        );
        assert_eq!(
            resolve_booking_method(&posting, &txn, None, &opts).unwrap(),
            BookingMethod::Lifo
        );

        // Posting meta beats transaction meta
        posting.insert(
            OPT_BOOKING_METHOD.to_string(),
            MetaValue::String("fifo".to_string()),
        );
        assert_eq!(
            resolve_booking_method(&posting, &txn, None, &opts).unwrap(),
            BookingMethod::Fifo
        );
    }

    #[test]
    fn test_booking_method_unknown_fails() {
        let mut posting = Metadata::new();
        posting.insert(
            OPT_BOOKING_METHOD.to_string(),
            MetaValue::String("hilo".to_string()),
        );
        assert!(
            resolve_booking_method(&posting, &Metadata::new(), None, &OptionMap::new()).is_err()
        );
    }

    #[test]
    fn test_booking_method_from_option_map() {
        let mut opts = OptionMap::new();
        opts.set(OPT_BOOKING_METHOD, "lifo");
        assert_eq!(
            resolve_booking_method(&Metadata::new(), &Metadata::new(), None, &opts).unwrap(),
            BookingMethod::Lifo
        );
    }

    #[test]
    fn test_trading_account_default() {
        let account =
            resolve_trading_account(&Metadata::new(), &Metadata::new(), None).unwrap();
        assert_eq!(account, DEFAULT_TRADING_ACCOUNT);
    }

    #[test]
    fn test_trading_account_precedence() {
        let mut txn = Metadata::new();
        txn.insert(
            META_TRADING_ACCOUNT.to_string(),
            MetaValue::Account("Trading:Main".into()),
        );
        let account = resolve_trading_account(&Metadata::new(), &txn, None).unwrap();
        assert_eq!(account, "Trading:Main");

        let mut posting = Metadata::new();
        posting.insert(
            META_TRADING_ACCOUNT.to_string(),
            MetaValue::Account("Trading:Posting".into()),
        );
        let account = resolve_trading_account(&posting, &txn, None).unwrap();
        assert_eq!(account, "Trading:Posting");
    }

    #[test]
    fn test_trading_account_must_be_account_typed() {
        let mut txn = Metadata::new();
        txn.insert(
            META_TRADING_ACCOUNT.to_string(),
            MetaValue::String("Trading:Main".to_string()),
        );
        assert!(resolve_trading_account(&Metadata::new(), &txn, None).is_err());
    }
}
