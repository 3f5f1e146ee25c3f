//! The `tally` command-line entry point.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

use tally::report;
use tally::load_and_book;

/// Plain-text double-entry accounting.
#[derive(Parser, Debug)]
#[command(name = "tally", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Show verbose output including debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate and book a ledger file, reporting any errors
    Check {
        /// The ledger file to check
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Book a ledger and print final account balances
    Balances {
        /// The ledger file to book
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Book a ledger and print the booked journal
    Journal {
        /// The ledger file to book
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

fn run(cli: &Cli) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    let start = std::time::Instant::now();

    let file = match &cli.command {
        Command::Check { file } | Command::Balances { file } | Command::Journal { file } => file,
    };

    let booked = match load_and_book(file)? {
        Ok(booked) => booked,
        Err(error) => {
            report::write_error(&error, &mut stdout)?;
            return Ok(ExitCode::from(1));
        }
    };

    match &cli.command {
        Command::Check { .. } => {
            if cli.verbose {
                writeln!(
                    stdout,
                    "booked in {:.2}ms",
                    start.elapsed().as_secs_f64() * 1000.0
                )?;
            }
            report::write_summary(
                booked.transactions.len(),
                booked.accounts.len(),
                &mut stdout,
            )?;
        }
        Command::Balances { .. } => report::write_balances(&booked, &mut stdout)?,
        Command::Journal { .. } => report::write_journal(&booked, &mut stdout)?,
    }

    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .init();
    }

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
