//! Directive model: the typed statements a ledger file is made of.
//!
//! Every directive carries its UTC date, a metadata map, the source
//! context it was read from, and the frozen option-map snapshot that was
//! active when it was loaded. The booker consults only that snapshot,
//! never a mutable global, which keeps booking a pure function of its
//! inputs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::{Amount, Rational};
use crate::cost::{format_scalar, Cost, CostSpec};
use crate::intern::InternedStr;
use crate::inventory::Inventory;
use crate::options::OptionMap;

/// Metadata value types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaValue {
    /// Quoted string value.
    String(String),
    /// Account reference.
    Account(InternedStr),
    /// Currency code.
    Currency(InternedStr),
    /// Exact numeric value.
    Number(Rational),
    /// Calendar date.
    Date(NaiveDate),
    /// Boolean.
    Bool(bool),
    /// Amount (number with currency).
    Amount(Amount),
}

impl fmt::Display for MetaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Account(a) => write!(f, "{a}"),
            Self::Currency(c) => write!(f, "{c}"),
            Self::Number(n) => write!(f, "{}", format_scalar(n)),
            Self::Date(d) => write!(f, "{d}"),
            Self::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            Self::Amount(a) => write!(f, "{a}"),
        }
    }
}

/// Metadata attached to directives and postings.
pub type Metadata = HashMap<String, MetaValue>;

/// Where a directive came from: file and 1-based row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCtx {
    /// Source file path.
    pub file: InternedStr,
    /// 1-based row of the directive's first line.
    pub row: usize,
}

impl SourceCtx {
    /// Create a source context.
    #[must_use]
    pub fn new(file: impl Into<InternedStr>, row: usize) -> Self {
        Self {
            file: file.into(),
            row,
        }
    }
}

impl fmt::Display for SourceCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.row)
    }
}

/// Lifecycle state of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountState {
    /// The account is open. An empty currency list allows any currency.
    Open {
        /// Currencies allowed on postings to this account.
        currencies: Vec<InternedStr>,
        /// Metadata from the open directive.
        meta: Metadata,
    },
    /// The account has been closed; it may be reopened later.
    Closed {
        /// Metadata from the close directive.
        meta: Metadata,
    },
}

impl AccountState {
    /// Whether the account is currently open.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Open { .. })
    }

    /// The open directive's metadata, if open.
    #[must_use]
    pub const fn open_meta(&self) -> Option<&Metadata> {
        match self {
            Self::Open { meta, .. } => Some(meta),
            Self::Closed { .. } => None,
        }
    }
}

/// Account registry: account name to lifecycle state.
pub type AccountMap = BTreeMap<InternedStr, AccountState>;

/// Currency registry: declared currencies and their metadata (e.g.
/// decimal-format hints for the reporting layer).
pub type CurrencyMap = BTreeMap<InternedStr, CurrencyDirective>;

/// Inventory registry: account name to holdings.
pub type InventoryMap = BTreeMap<InternedStr, Inventory>;

/// One leg of a transaction, as written.
///
/// At most one posting per transaction may omit both amount and cost; that
/// *elastic* posting absorbs whatever residual balances the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Target account.
    pub account: InternedStr,
    /// Optional flag character.
    pub flag: Option<char>,
    /// The posted amount, if written.
    pub amount: Option<Amount>,
    /// Cost specification, if written.
    pub cost: Option<CostSpec>,
    /// Posting metadata.
    pub meta: Metadata,
}

impl Posting {
    /// A posting with an explicit amount.
    #[must_use]
    pub fn new(account: impl Into<InternedStr>, amount: Amount) -> Self {
        Self {
            account: account.into(),
            flag: None,
            amount: Some(amount),
            cost: None,
            meta: Metadata::new(),
        }
    }

    /// An elastic posting: no amount, no cost.
    #[must_use]
    pub fn elastic(account: impl Into<InternedStr>) -> Self {
        Self {
            account: account.into(),
            flag: None,
            amount: None,
            cost: None,
            meta: Metadata::new(),
        }
    }

    /// Attach a cost specification.
    #[must_use]
    pub fn with_cost(mut self, cost: CostSpec) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: MetaValue) -> Self {
        self.meta.insert(key.into(), value);
        self
    }
}

/// A fully-specified posting produced by booking: the amount is always
/// present and any cost is a concrete lot, never a spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedPosting {
    /// Target account.
    pub account: InternedStr,
    /// Flag carried over from the input posting.
    pub flag: Option<char>,
    /// The booked amount.
    pub amount: Amount,
    /// The lot this posting creates or consumes, if any.
    pub cost: Option<Cost>,
    /// Posting metadata.
    pub meta: Metadata,
}

impl fmt::Display for BookedPosting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  {}", self.account, self.amount)?;
        if let Some(cost) = &self.cost {
            write!(f, " {cost}")?;
        }
        Ok(())
    }
}

/// An `open` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenDirective {
    /// Effective instant.
    pub date: DateTime<Utc>,
    /// Account to open.
    pub account: InternedStr,
    /// Allowed currencies; empty means any.
    pub currencies: Vec<InternedStr>,
    /// Metadata.
    pub meta: Metadata,
    /// Source location.
    pub source: SourceCtx,
    /// Option-map snapshot active at parse time.
    pub options: Arc<OptionMap>,
}

/// A `close` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseDirective {
    /// Effective instant.
    pub date: DateTime<Utc>,
    /// Account to close.
    pub account: InternedStr,
    /// Metadata.
    pub meta: Metadata,
    /// Source location.
    pub source: SourceCtx,
    /// Option-map snapshot active at parse time.
    pub options: Arc<OptionMap>,
}

/// A `currency` (or `commodity`) declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencyDirective {
    /// Effective instant.
    pub date: DateTime<Utc>,
    /// The declared currency code.
    pub currency: InternedStr,
    /// Metadata (e.g. decimal-format hints).
    pub meta: Metadata,
    /// Source location.
    pub source: SourceCtx,
    /// Option-map snapshot active at parse time.
    pub options: Arc<OptionMap>,
}

/// One assertion inside a `balance` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAssertion {
    /// Account whose balance is asserted.
    pub account: InternedStr,
    /// Expected units of the amount's currency.
    pub amount: Amount,
    /// Maximum allowed absolute delta; zero when omitted.
    pub tolerance: Option<Rational>,
}

/// A `balance` directive: one or more assertions checked against the
/// running inventories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceDirective {
    /// Effective instant.
    pub date: DateTime<Utc>,
    /// The assertions to check.
    pub assertions: Vec<BalanceAssertion>,
    /// Metadata.
    pub meta: Metadata,
    /// Source location.
    pub source: SourceCtx,
    /// Option-map snapshot active at parse time.
    pub options: Arc<OptionMap>,
}

/// A transaction directive, before booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDirective {
    /// Effective instant.
    pub date: DateTime<Utc>,
    /// `*` completed, `!` pending.
    pub flag: char,
    /// Description.
    pub narration: String,
    /// Postings in file order.
    pub postings: Vec<Posting>,
    /// Metadata.
    pub meta: Metadata,
    /// Source location.
    pub source: SourceCtx,
    /// Option-map snapshot active at parse time.
    pub options: Arc<OptionMap>,
}

/// An `option` statement, retained in the stream after the loader has
/// folded it into the running option map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDirective {
    /// Effective instant (options are undated; epoch).
    pub date: DateTime<Utc>,
    /// Option name.
    pub name: String,
    /// Option value.
    pub value: String,
    /// Source location.
    pub source: SourceCtx,
    /// Option-map snapshot including this option.
    pub options: Arc<OptionMap>,
}

/// A booked transaction: every posting fully specified, with inventory
/// snapshots from before and after the transaction committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedTransaction {
    /// Effective instant.
    pub date: DateTime<Utc>,
    /// `*` completed, `!` pending.
    pub flag: char,
    /// Description.
    pub narration: String,
    /// Metadata.
    pub meta: Metadata,
    /// Booked postings, in emission order.
    pub postings: Vec<BookedPosting>,
    /// Inventory snapshot before the transaction.
    pub inventories_before: InventoryMap,
    /// Inventory snapshot after the transaction.
    pub inventories_after: InventoryMap,
    /// Source location.
    pub source: SourceCtx,
}

/// All directive types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Directive {
    /// Open an account.
    Open(OpenDirective),
    /// Close an account.
    Close(CloseDirective),
    /// Declare a currency.
    Currency(CurrencyDirective),
    /// Assert account balances.
    Balance(BalanceDirective),
    /// Record a transaction.
    Transaction(TransactionDirective),
    /// An option statement (already consumed by the loader).
    Option(OptionDirective),
}

impl Directive {
    /// The directive's effective instant.
    #[must_use]
    pub const fn date(&self) -> DateTime<Utc> {
        match self {
            Self::Open(d) => d.date,
            Self::Close(d) => d.date,
            Self::Currency(d) => d.date,
            Self::Balance(d) => d.date,
            Self::Transaction(d) => d.date,
            Self::Option(d) => d.date,
        }
    }

    /// Source location.
    #[must_use]
    pub const fn source(&self) -> &SourceCtx {
        match self {
            Self::Open(d) => &d.source,
            Self::Close(d) => &d.source,
            Self::Currency(d) => &d.source,
            Self::Balance(d) => &d.source,
            Self::Transaction(d) => &d.source,
            Self::Option(d) => &d.source,
        }
    }

    /// The frozen option-map snapshot.
    #[must_use]
    pub fn options(&self) -> &Arc<OptionMap> {
        match self {
            Self::Open(d) => &d.options,
            Self::Close(d) => &d.options,
            Self::Currency(d) => &d.options,
            Self::Balance(d) => &d.options,
            Self::Transaction(d) => &d.options,
            Self::Option(d) => &d.options,
        }
    }

    /// Directive type name for diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Open(_) => "open",
            Self::Close(_) => "close",
            Self::Currency(_) => "currency",
            Self::Balance(_) => "balance",
            Self::Transaction(_) => "transaction",
            Self::Option(_) => "option",
        }
    }
}

/// Stable sort by date; file order is preserved within equal dates.
pub fn sort_directives(directives: &mut [Directive]) {
    directives.sort_by_key(Directive::date);
}

/// The input to the booking engine: a time-ordered directive stream plus
/// any currencies already known (e.g. from a previous incremental run).
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    /// Directives in booking order.
    pub directives: Vec<Directive>,
    /// Pre-declared currencies.
    pub currencies: CurrencyMap,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::parse_decimal;

    fn amt(s: &str, c: &str) -> Amount {
        Amount::new(parse_decimal(s).unwrap(), c)
    }

    fn txn(day: u32, narration: &str) -> Directive {
        Directive::Transaction(TransactionDirective {
            date: chrono::NaiveDate::from_ymd_opt(2025, 4, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc(),
            flag: '*',
            narration: narration.to_string(),
            postings: vec![],
            meta: Metadata::new(),
            source: SourceCtx::default(),
            options: Arc::new(OptionMap::default()),
        })
    }

    #[test]
    fn test_sort_is_stable() {
        let mut directives = vec![txn(2, "b"), txn(1, "a"), txn(2, "c")];
        sort_directives(&mut directives);

        let names: Vec<_> = directives
            .iter()
            .map(|d| match d {
                Directive::Transaction(t) => t.narration.clone(),
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_account_state() {
        let open = AccountState::Open {
            currencies: vec!["USD".into()],
            meta: Metadata::new(),
        };
        let closed = AccountState::Closed {
            meta: Metadata::new(),
        };
        assert!(open.is_open());
        assert!(!closed.is_open());
        assert!(open.open_meta().is_some());
        assert!(closed.open_meta().is_none());
    }

    #[test]
    fn test_posting_builders() {
        let p = Posting::new("Assets:Bank", amt("10", "USD"));
        assert!(p.amount.is_some());
        assert!(p.cost.is_none());

        let e = Posting::elastic("Assets:Bank");
        assert!(e.amount.is_none() && e.cost.is_none());
    }
}
