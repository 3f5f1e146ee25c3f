//! Command-line tools for tally ledgers.
//!
//! The `tally` binary loads a ledger file, books it, and reports:
//!
//! - `tally check FILE` - validate and book, print errors
//! - `tally balances FILE` - final per-account balances
//! - `tally journal FILE` - the booked journal
//!
//! This crate also exposes the load-and-book pipeline as a library so the
//! commands (and their tests) share one code path.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod report;

use std::path::Path;

use anyhow::{Context, Result};
use tally_booking::{book, BookedLedger, LedgerError};
use tally_loader::Loader;

/// Load a ledger file and book it.
///
/// The outer error is an infrastructure failure (IO, parse, cycle); the
/// inner result distinguishes clean books from booking errors, which the
/// commands render with source context and a non-zero exit code.
pub fn load_and_book(file: &Path) -> Result<std::result::Result<BookedLedger, LedgerError>> {
    let ledger = Loader::new()
        .load(file)
        .with_context(|| format!("failed to load {}", file.display()))?;
    Ok(book(&ledger))
}
