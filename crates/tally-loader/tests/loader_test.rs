//! Integration tests for the loader: include resolution, option
//! snapshots, and feeding the booking engine end to end.

use std::path::Path;

use tally_booking::book;
use tally_core::amount::parse_decimal;
use tally_core::Directive;
use tally_loader::{load, LoadError, Loader};

fn fixtures_path(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn test_load_simple_file() {
    let ledger = load(&fixtures_path("simple.tally")).expect("should load simple file");

    let opens = ledger
        .directives
        .iter()
        .filter(|d| matches!(d, Directive::Open(_)))
        .count();
    assert_eq!(opens, 3, "expected 3 open directives");

    let txns = ledger
        .directives
        .iter()
        .filter(|d| matches!(d, Directive::Transaction(_)))
        .count();
    assert_eq!(txns, 2, "expected 2 transactions");

    let currencies = ledger
        .directives
        .iter()
        .filter(|d| matches!(d, Directive::Currency(_)))
        .count();
    assert_eq!(currencies, 1);

    // The title option is frozen onto every directive after it
    let last = ledger.directives.last().unwrap();
    assert_eq!(last.options().get("title"), Some("Test Ledger"));
}

#[test]
fn test_load_with_include() {
    let ledger =
        load(&fixtures_path("main_with_include.tally")).expect("should load with include");

    let opens = ledger
        .directives
        .iter()
        .filter(|d| matches!(d, Directive::Open(_)))
        .count();
    assert_eq!(opens, 3, "expected 3 opens from the included file");

    let txns = ledger
        .directives
        .iter()
        .filter(|d| matches!(d, Directive::Transaction(_)))
        .count();
    assert_eq!(txns, 1);
}

#[test]
fn test_include_cycle_detected() {
    let err = load(&fixtures_path("cycle_a.tally")).unwrap_err();
    match err {
        LoadError::IncludeCycle { cycle } => {
            assert!(cycle.len() >= 2);
            assert!(cycle[0].contains("cycle_a"));
        }
        other => panic!("expected IncludeCycle, got {other:?}"),
    }
}

#[test]
fn test_missing_file() {
    let err = load(&fixtures_path("does_not_exist.tally")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn test_loaded_ledger_books_end_to_end() {
    let ledger = load(&fixtures_path("simple.tally")).unwrap();
    let booked = book(&ledger).expect("fixture should book cleanly");

    assert_eq!(booked.transactions.len(), 2);
    assert_eq!(
        booked.inventories["Assets:Bank:Checking"].units("USD"),
        parse_decimal("2954.50").unwrap()
    );
    assert_eq!(
        booked.inventories["Expenses:Food"].units("USD"),
        parse_decimal("45.50").unwrap()
    );
    assert!(booked.currencies.contains_key("USD"));
}

#[test]
fn test_source_context_points_into_file() {
    let ledger = load(&fixtures_path("simple.tally")).unwrap();
    let txn = ledger
        .directives
        .iter()
        .find_map(|d| match d {
            Directive::Transaction(t) => Some(t),
            _ => None,
        })
        .unwrap();
    assert!(txn.source.file.contains("simple.tally"));
    assert_eq!(txn.source.row, 9);
}

#[test]
fn test_loader_reuse_skips_already_loaded_files() {
    let mut loader = Loader::new();
    let first = loader.load(&fixtures_path("accounts.tally")).unwrap();
    assert_eq!(first.directives.len(), 3);

    // Same file again: already loaded, nothing new
    let second = loader.load(&fixtures_path("accounts.tally")).unwrap();
    assert!(second.directives.is_empty());
}
