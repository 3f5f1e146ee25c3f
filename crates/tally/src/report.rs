//! Text rendering of booked ledgers.

use std::io::{self, Write};

use tally_booking::{BookedLedger, LedgerError};

/// Write final per-account balances, one account per line.
pub fn write_balances(booked: &BookedLedger, out: &mut impl Write) -> io::Result<()> {
    let width = booked
        .inventories
        .keys()
        .map(|a| a.len())
        .max()
        .unwrap_or(0);

    for (account, inventory) in &booked.inventories {
        if inventory.is_empty() {
            continue;
        }
        writeln!(out, "{:<width$}  {inventory}", account.as_str())?;
    }
    Ok(())
}

/// Write the booked journal: every transaction with its postings.
pub fn write_journal(booked: &BookedLedger, out: &mut impl Write) -> io::Result<()> {
    for (i, txn) in booked.transactions.iter().enumerate() {
        if i > 0 {
            writeln!(out)?;
        }
        writeln!(
            out,
            "{} {} \"{}\"",
            txn.date.format("%Y-%m-%d"),
            txn.flag,
            txn.narration
        )?;
        for posting in &txn.postings {
            writeln!(out, "  {posting}")?;
        }
    }
    Ok(())
}

/// Write a booking error with its source position.
pub fn write_error(error: &LedgerError, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "error: {error}")
}

/// Write the check summary line.
pub fn write_summary(
    transactions: usize,
    accounts: usize,
    out: &mut impl Write,
) -> io::Result<()> {
    writeln!(out, "OK: {transactions} transactions, {accounts} accounts")
}
