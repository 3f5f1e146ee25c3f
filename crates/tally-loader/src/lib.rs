//! File loader: turns ledger files into a booking-ready [`Ledger`].
//!
//! The loader owns everything that needs cross-file state:
//!
//! - recursive include resolution (relative paths, cycle detection),
//! - the running option map, frozen as an `Arc` snapshot onto every
//!   directive at its parse point,
//! - date normalization to UTC instants using the `default-timezone`
//!   option in effect where the date was written,
//! - string interning for accounts and currencies,
//! - the final stable sort by date.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::FixedOffset;
use thiserror::Error;
use tracing::debug;

use tally_core::cost::parse_offset;
use tally_core::{
    sort_directives, Amount, BalanceAssertion, BalanceDirective, CloseDirective, CostSpec,
    CurrencyDirective, CurrencyMap, DateSpec, DateTime, Directive, InternedStr, Ledger,
    MetaValue, Metadata, OpenDirective, OptionDirective, OptionMap, Posting, SourceCtx,
    StringInterner, TransactionDirective, Utc,
};
use tally_parser::{
    parse, ParseError, RawAmount, RawCostSpec, RawDate, RawDirective, RawEntry, RawItem,
    RawMeta, RawMetaValue, RawPosting,
};

/// Errors that can occur during loading.
#[derive(Debug, Error)]
pub enum LoadError {
    /// IO error reading a file.
    #[error("failed to read {path}: {source}")]
    Io {
        /// The path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Include cycle detected.
    #[error("include cycle detected: {}", .cycle.join(" -> "))]
    IncludeCycle {
        /// The chain of files forming the cycle.
        cycle: Vec<String>,
    },

    /// A file failed to parse.
    #[error("{path}: {error}")]
    Parse {
        /// The file with the parse error.
        path: PathBuf,
        /// The parse error.
        error: ParseError,
    },

    /// A date or `default-timezone` value did not resolve to an instant.
    #[error("{file}:{row}: invalid date or timezone")]
    InvalidDate {
        /// Source file.
        file: PathBuf,
        /// 1-based row.
        row: usize,
    },
}

/// Ledger file loader.
///
/// A loader is good for one load; option state and the include stack are
/// not reset between calls.
#[derive(Debug, Default)]
pub struct Loader {
    include_stack: Vec<PathBuf>,
    loaded: HashSet<PathBuf>,
    interner: StringInterner,
    options: Arc<OptionMap>,
}

impl Loader {
    /// Create a new loader.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger file and all of its includes.
    pub fn load(&mut self, path: &Path) -> Result<Ledger, LoadError> {
        let canonical = path.canonicalize().map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut directives = Vec::new();
        self.load_recursive(&canonical, &mut directives)?;
        sort_directives(&mut directives);

        debug!(directives = directives.len(), "loaded ledger");
        Ok(Ledger {
            directives,
            currencies: CurrencyMap::new(),
        })
    }

    /// Load ledger source from a string; includes resolve relative to
    /// `dir`.
    pub fn load_str(&mut self, source: &str, name: &str, dir: &Path) -> Result<Ledger, LoadError> {
        let mut directives = Vec::new();
        self.process_source(source, Path::new(name), dir, &mut directives)?;
        sort_directives(&mut directives);
        Ok(Ledger {
            directives,
            currencies: CurrencyMap::new(),
        })
    }

    fn load_recursive(
        &mut self,
        path: &Path,
        directives: &mut Vec<Directive>,
    ) -> Result<(), LoadError> {
        let path_buf = path.to_path_buf();
        if self.include_stack.contains(&path_buf) {
            let mut cycle: Vec<String> = self
                .include_stack
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            cycle.push(path.display().to_string());
            return Err(LoadError::IncludeCycle { cycle });
        }
        if self.loaded.contains(path) {
            return Ok(());
        }

        let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path_buf.clone(),
            source,
        })?;

        debug!(path = %path.display(), "loading file");
        self.include_stack.push(path_buf.clone());
        self.loaded.insert(path_buf);

        let dir = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
        let result = self.process_source(&source, path, &dir, directives);

        self.include_stack.pop();
        result
    }

    fn process_source(
        &mut self,
        source: &str,
        path: &Path,
        dir: &Path,
        directives: &mut Vec<Directive>,
    ) -> Result<(), LoadError> {
        let entries = parse(source).map_err(|error| LoadError::Parse {
            path: path.to_path_buf(),
            error,
        })?;

        let file: InternedStr = self.interner.intern(&path.display().to_string());

        for RawEntry { row, item } in entries {
            match item {
                RawItem::Option { name, value } => {
                    // Clone-on-write: prior snapshots stay frozen
                    let mut next = (*self.options).clone();
                    next.set(name.clone(), value.clone());
                    self.options = Arc::new(next);

                    directives.push(Directive::Option(OptionDirective {
                        date: DateTime::<Utc>::default(),
                        name,
                        value,
                        source: SourceCtx {
                            file: file.clone(),
                            row,
                        },
                        options: self.options.clone(),
                    }));
                }
                RawItem::Include { path: include } => {
                    let target = dir.join(&include);
                    let canonical =
                        target.canonicalize().map_err(|source| LoadError::Io {
                            path: target.clone(),
                            source,
                        })?;
                    self.load_recursive(&canonical, directives)?;
                }
                RawItem::Directive(raw) => {
                    let source_ctx = SourceCtx {
                        file: file.clone(),
                        row,
                    };
                    let directive = self.convert(raw, source_ctx, path)?;
                    directives.push(directive);
                }
            }
        }

        Ok(())
    }

    // ===== Raw -> core conversion =====

    fn default_offset(&self) -> Option<FixedOffset> {
        self.options.default_timezone().and_then(parse_offset)
    }

    fn resolve_date(
        &self,
        raw: &RawDate,
        path: &Path,
        row: usize,
    ) -> Result<DateSpec, LoadError> {
        DateSpec::resolve(
            raw.date,
            raw.time,
            raw.timezone.clone(),
            self.default_offset(),
        )
        .ok_or_else(|| LoadError::InvalidDate {
            file: path.to_path_buf(),
            row,
        })
    }

    fn convert(
        &mut self,
        raw: RawDirective,
        source: SourceCtx,
        path: &Path,
    ) -> Result<Directive, LoadError> {
        let row = source.row;
        let options = self.options.clone();
        Ok(match raw {
            RawDirective::Open {
                date,
                account,
                currencies,
                meta,
            } => {
                let date = self.resolve_date(&date, path, row)?.instant;
                Directive::Open(OpenDirective {
                    date,
                    account: self.interner.intern(&account),
                    currencies: currencies
                        .iter()
                        .map(|c| self.interner.intern(c))
                        .collect(),
                    meta: self.convert_meta(meta),
                    source,
                    options,
                })
            }
            RawDirective::Close {
                date,
                account,
                meta,
            } => {
                let date = self.resolve_date(&date, path, row)?.instant;
                Directive::Close(CloseDirective {
                    date,
                    account: self.interner.intern(&account),
                    meta: self.convert_meta(meta),
                    source,
                    options,
                })
            }
            RawDirective::Currency {
                date,
                currency,
                meta,
            } => {
                let date = self.resolve_date(&date, path, row)?.instant;
                Directive::Currency(CurrencyDirective {
                    date,
                    currency: self.interner.intern(&currency),
                    meta: self.convert_meta(meta),
                    source,
                    options,
                })
            }
            RawDirective::Balance {
                date,
                account,
                amount,
                tolerance,
                meta,
            } => {
                let date = self.resolve_date(&date, path, row)?.instant;
                Directive::Balance(BalanceDirective {
                    date,
                    assertions: vec![BalanceAssertion {
                        account: self.interner.intern(&account),
                        amount: self.convert_amount(amount),
                        tolerance,
                    }],
                    meta: self.convert_meta(meta),
                    source,
                    options,
                })
            }
            RawDirective::Transaction {
                date,
                flag,
                narration,
                postings,
                meta,
            } => {
                let date = self.resolve_date(&date, path, row)?.instant;
                let postings = postings
                    .into_iter()
                    .map(|p| self.convert_posting(p, path, row))
                    .collect::<Result<Vec<_>, _>>()?;
                Directive::Transaction(TransactionDirective {
                    date,
                    flag,
                    narration,
                    postings,
                    meta: self.convert_meta(meta),
                    source,
                    options,
                })
            }
        })
    }

    fn convert_posting(
        &mut self,
        raw: RawPosting,
        path: &Path,
        row: usize,
    ) -> Result<Posting, LoadError> {
        let cost = match raw.cost {
            Some(spec) => Some(self.convert_cost_spec(spec, path, row)?),
            None => None,
        };
        Ok(Posting {
            account: self.interner.intern(&raw.account),
            flag: raw.flag,
            amount: raw.amount.map(|a| self.convert_amount(a)),
            cost,
            meta: self.convert_meta(raw.meta),
        })
    }

    fn convert_cost_spec(
        &mut self,
        raw: RawCostSpec,
        path: &Path,
        row: usize,
    ) -> Result<CostSpec, LoadError> {
        let dates = raw
            .dates
            .iter()
            .map(|d| self.resolve_date(d, path, row))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CostSpec {
            kind: raw.kind,
            amounts: raw
                .amounts
                .into_iter()
                .map(|a| self.convert_amount(a))
                .collect(),
            currencies: raw
                .currencies
                .iter()
                .map(|c| self.interner.intern(c))
                .collect(),
            dates,
            tags: raw.tags,
        })
    }

    fn convert_amount(&mut self, raw: RawAmount) -> Amount {
        Amount::new(raw.number, self.interner.intern(&raw.currency))
    }

    fn convert_meta(&mut self, raw: RawMeta) -> Metadata {
        let mut meta = Metadata::new();
        for (key, value) in raw {
            let value = match value {
                RawMetaValue::Str(s) => MetaValue::String(s),
                RawMetaValue::Account(a) => MetaValue::Account(self.interner.intern(&a)),
                RawMetaValue::Currency(c) => MetaValue::Currency(self.interner.intern(&c)),
                RawMetaValue::Number(n) => MetaValue::Number(n),
                RawMetaValue::Date(d) => MetaValue::Date(d.date),
                RawMetaValue::Bool(b) => MetaValue::Bool(b),
                RawMetaValue::Amount(a) => MetaValue::Amount(self.convert_amount(a)),
            };
            meta.insert(key, value);
        }
        meta
    }
}

/// Convenience: load a ledger file with a fresh loader.
pub fn load(path: &Path) -> Result<Ledger, LoadError> {
    Loader::new().load(path)
}
