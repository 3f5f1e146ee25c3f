//! Recursive-descent parser over the token stream.
//!
//! One function per grammar production. The output is a *raw* directive
//! model: dates keep their written form (the loader resolves instants once
//! it knows the `default-timezone` in effect) and strings are plain,
//! uninterned. Amount expressions (`+ - * /`, unary sign, parentheses)
//! evaluate to exact rationals during parsing.

use chrono::{NaiveDate, NaiveTime};
use num_traits::Zero;

use tally_core::amount::{parse_decimal, Rational};
use tally_core::CostKind;

use crate::error::{ParseError, ParseErrorKind};
use crate::lexer::{tokenize, Span, Token};

/// A date as written: calendar date, optional time, optional zone suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDate {
    /// Calendar date.
    pub date: NaiveDate,
    /// Time of day, if written.
    pub time: Option<NaiveTime>,
    /// Zone suffix (`Z` or `±HH:MM`), if written.
    pub timezone: Option<String>,
}

/// A number with a currency, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAmount {
    /// Evaluated expression value.
    pub number: Rational,
    /// Currency code.
    pub currency: String,
}

/// A metadata value, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawMetaValue {
    /// Quoted string.
    Str(String),
    /// Account path.
    Account(String),
    /// Currency code.
    Currency(String),
    /// Bare number.
    Number(Rational),
    /// Date.
    Date(RawDate),
    /// `TRUE` / `FALSE`.
    Bool(bool),
    /// Number with currency.
    Amount(RawAmount),
}

/// Ordered metadata entries.
pub type RawMeta = Vec<(String, RawMetaValue)>;

/// A cost specification, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCostSpec {
    /// `{…}` per-unit or `{{…}}` total.
    pub kind: CostKind,
    /// Cost amounts (augmentations).
    pub amounts: Vec<RawAmount>,
    /// Currency filters (reductions).
    pub currencies: Vec<String>,
    /// Date filters (reductions).
    pub dates: Vec<RawDate>,
    /// Lot tags.
    pub tags: Vec<String>,
}

/// One transaction leg, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPosting {
    /// Optional flag character.
    pub flag: Option<char>,
    /// Account path.
    pub account: String,
    /// Amount, if written.
    pub amount: Option<RawAmount>,
    /// Cost spec, if written.
    pub cost: Option<RawCostSpec>,
    /// Posting metadata.
    pub meta: RawMeta,
}

/// A dated directive, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawDirective {
    /// `DATE open ACCOUNT [CCY,...]`
    Open {
        /// Directive date.
        date: RawDate,
        /// Account to open.
        account: String,
        /// Allowed currencies.
        currencies: Vec<String>,
        /// Metadata.
        meta: RawMeta,
    },
    /// `DATE close ACCOUNT`
    Close {
        /// Directive date.
        date: RawDate,
        /// Account to close.
        account: String,
        /// Metadata.
        meta: RawMeta,
    },
    /// `DATE currency CCY` (or `commodity`)
    Currency {
        /// Directive date.
        date: RawDate,
        /// Declared currency.
        currency: String,
        /// Metadata.
        meta: RawMeta,
    },
    /// `DATE balance ACCOUNT AMOUNT [~ TOL]`
    Balance {
        /// Directive date.
        date: RawDate,
        /// Asserted account.
        account: String,
        /// Expected amount.
        amount: RawAmount,
        /// Explicit tolerance.
        tolerance: Option<Rational>,
        /// Metadata.
        meta: RawMeta,
    },
    /// `DATE (*|!|txn) ["narration"]` plus indented postings.
    Transaction {
        /// Directive date.
        date: RawDate,
        /// `*` or `!`.
        flag: char,
        /// Description.
        narration: String,
        /// Postings in file order.
        postings: Vec<RawPosting>,
        /// Metadata.
        meta: RawMeta,
    },
}

/// A top-level entry: a directive or a loader statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawItem {
    /// A dated directive.
    Directive(RawDirective),
    /// `option "name" "value"`
    Option {
        /// Option name.
        name: String,
        /// Option value.
        value: String,
    },
    /// `include "path"`
    Include {
        /// Included path, relative to the including file.
        path: String,
    },
}

/// An entry with its source row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    /// 1-based source row of the entry's first token.
    pub row: usize,
    /// The parsed item.
    pub item: RawItem,
}

/// Parse a source file into raw entries.
pub fn parse(source: &str) -> Result<Vec<RawEntry>, ParseError> {
    let tokens: Vec<(Token<'_>, Span)> = tokenize(source)
        .into_iter()
        .filter(|(t, _)| !matches!(t, Token::Comment(_)))
        .collect();

    let mut line_starts = vec![0usize];
    for (i, b) in source.bytes().enumerate() {
        if b == b'\n' {
            line_starts.push(i + 1);
        }
    }

    Parser {
        tokens,
        pos: 0,
        line_starts,
        source_len: source.len(),
    }
    .parse_file()
}

struct Parser<'src> {
    tokens: Vec<(Token<'src>, Span)>,
    pos: usize,
    line_starts: Vec<usize>,
    source_len: usize,
}

impl<'src> Parser<'src> {
    // ===== Primitives =====

    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek2(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos + 1).map(|(t, _)| t)
    }

    fn bump(&mut self) -> Option<(Token<'src>, Span)> {
        let item = self.tokens.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    fn row_of(&self, offset: usize) -> usize {
        self.line_starts.partition_point(|&s| s <= offset)
    }

    fn current_span(&self) -> Span {
        self.tokens.get(self.pos).map_or_else(
            || Span::new(self.source_len, self.source_len),
            |(_, s)| *s,
        )
    }

    fn current_row(&self) -> usize {
        self.row_of(self.current_span().start)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let span = self.current_span();
        let kind = match self.tokens.get(self.pos) {
            Some((t, _)) => ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: t.to_string(),
            },
            None => ParseErrorKind::UnexpectedEof,
        };
        ParseError::new(kind, span, self.row_of(span.start))
    }

    fn error_at(&self, kind: ParseErrorKind, span: Span) -> ParseError {
        ParseError::new(kind, span, self.row_of(span.start))
    }

    fn expect_newline_or_eof(&mut self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(Token::Newline) => {
                self.bump();
                Ok(())
            }
            Some(_) => Err(self.unexpected("end of line")),
        }
    }

    fn expect_account(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Account(s)) => {
                let s = (*s).to_string();
                self.bump();
                Ok(s)
            }
            _ => Err(self.unexpected("an account")),
        }
    }

    fn expect_currency(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::Currency(s)) => {
                let s = (*s).to_string();
                self.bump();
                Ok(s)
            }
            _ => Err(self.unexpected("a currency")),
        }
    }

    fn expect_string(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(Token::String(s)) => {
                let s = unescape(s);
                self.bump();
                Ok(s)
            }
            _ => Err(self.unexpected("a quoted string")),
        }
    }

    fn expect_date(&mut self) -> Result<RawDate, ParseError> {
        match self.peek() {
            Some(Token::Date(s)) => {
                let s = *s;
                let span = self.current_span();
                self.bump();
                self.parse_raw_date(s, span)
            }
            _ => Err(self.unexpected("a date")),
        }
    }

    fn at_expr_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Number(_) | Token::Minus | Token::Plus | Token::LParen)
        )
    }

    /// Nothing left on the current line (comments are filtered out before
    /// parsing, so an indented comment line looks like this).
    fn at_line_end(&self) -> bool {
        matches!(self.peek(), Some(Token::Newline) | None)
    }

    // ===== File structure =====

    fn parse_file(mut self) -> Result<Vec<RawEntry>, ParseError> {
        let mut entries = Vec::new();
        loop {
            while matches!(self.peek(), Some(Token::Newline)) {
                self.bump();
            }
            if self.peek().is_none() {
                break;
            }
            let row = self.current_row();
            let item = match self.peek() {
                Some(Token::OptionKw) => self.parse_option()?,
                Some(Token::Include) => self.parse_include()?,
                Some(Token::Date(_)) => self.parse_dated()?,
                _ => return Err(self.unexpected("a directive")),
            };
            entries.push(RawEntry { row, item });
        }
        Ok(entries)
    }

    fn parse_option(&mut self) -> Result<RawItem, ParseError> {
        self.bump();
        let name = self.expect_string()?;
        let value = self.expect_string()?;
        self.expect_newline_or_eof()?;
        Ok(RawItem::Option { name, value })
    }

    fn parse_include(&mut self) -> Result<RawItem, ParseError> {
        self.bump();
        let path = self.expect_string()?;
        self.expect_newline_or_eof()?;
        Ok(RawItem::Include { path })
    }

    // ===== Dated directives =====

    fn parse_dated(&mut self) -> Result<RawItem, ParseError> {
        let date = self.expect_date()?;
        let directive = match self.peek() {
            Some(Token::Open) => self.parse_open(date)?,
            Some(Token::Close) => self.parse_close(date)?,
            Some(Token::CurrencyKw | Token::Commodity) => self.parse_currency(date)?,
            Some(Token::Balance) => self.parse_balance(date)?,
            Some(Token::Star | Token::Pending | Token::Txn) => self.parse_transaction(date)?,
            _ => return Err(self.unexpected("a directive keyword")),
        };
        Ok(RawItem::Directive(directive))
    }

    fn parse_open(&mut self, date: RawDate) -> Result<RawDirective, ParseError> {
        self.bump();
        let account = self.expect_account()?;
        let mut currencies = Vec::new();
        while matches!(self.peek(), Some(Token::Currency(_))) {
            currencies.push(self.expect_currency()?);
            if matches!(self.peek(), Some(Token::Comma)) {
                self.bump();
            } else {
                break;
            }
        }
        self.expect_newline_or_eof()?;
        let meta = self.parse_meta_lines()?;
        Ok(RawDirective::Open {
            date,
            account,
            currencies,
            meta,
        })
    }

    fn parse_close(&mut self, date: RawDate) -> Result<RawDirective, ParseError> {
        self.bump();
        let account = self.expect_account()?;
        self.expect_newline_or_eof()?;
        let meta = self.parse_meta_lines()?;
        Ok(RawDirective::Close {
            date,
            account,
            meta,
        })
    }

    fn parse_currency(&mut self, date: RawDate) -> Result<RawDirective, ParseError> {
        self.bump();
        let currency = self.expect_currency()?;
        self.expect_newline_or_eof()?;
        let meta = self.parse_meta_lines()?;
        Ok(RawDirective::Currency {
            date,
            currency,
            meta,
        })
    }

    fn parse_balance(&mut self, date: RawDate) -> Result<RawDirective, ParseError> {
        self.bump();
        let account = self.expect_account()?;
        let number = self.expr()?;
        let currency = self.expect_currency()?;
        let tolerance = if matches!(self.peek(), Some(Token::Tilde)) {
            self.bump();
            Some(self.expr()?)
        } else {
            None
        };
        self.expect_newline_or_eof()?;
        let meta = self.parse_meta_lines()?;
        Ok(RawDirective::Balance {
            date,
            account,
            amount: RawAmount { number, currency },
            tolerance,
            meta,
        })
    }

    fn parse_transaction(&mut self, date: RawDate) -> Result<RawDirective, ParseError> {
        let flag = match self.bump() {
            Some((Token::Pending, _)) => '!',
            // `txn` and `*` both mean completed
            _ => '*',
        };
        let narration = if matches!(self.peek(), Some(Token::String(_))) {
            self.expect_string()?
        } else {
            String::new()
        };
        self.expect_newline_or_eof()?;

        let mut postings: Vec<RawPosting> = Vec::new();
        let mut meta = RawMeta::new();
        while matches!(self.peek(), Some(Token::Indent)) {
            self.bump();
            if self.at_line_end() {
                // comment-only continuation line
                self.expect_newline_or_eof()?;
                continue;
            }
            if matches!(self.peek(), Some(Token::MetaKey(_))) {
                let entry = self.parse_meta_line()?;
                match postings.last_mut() {
                    Some(last) => last.meta.push(entry),
                    None => meta.push(entry),
                }
            } else {
                postings.push(self.parse_posting()?);
            }
            self.expect_newline_or_eof()?;
        }

        Ok(RawDirective::Transaction {
            date,
            flag,
            narration,
            postings,
            meta,
        })
    }

    // ===== Postings, metadata, cost specs =====

    /// Indented `key: value` lines following a non-transaction directive.
    fn parse_meta_lines(&mut self) -> Result<RawMeta, ParseError> {
        let mut meta = RawMeta::new();
        while matches!(self.peek(), Some(Token::Indent)) {
            self.bump();
            if self.at_line_end() {
                self.expect_newline_or_eof()?;
                continue;
            }
            meta.push(self.parse_meta_line()?);
            self.expect_newline_or_eof()?;
        }
        Ok(meta)
    }

    fn parse_posting(&mut self) -> Result<RawPosting, ParseError> {
        let flag = match (self.peek(), self.peek2()) {
            (Some(Token::Star), Some(Token::Account(_))) => {
                self.bump();
                Some('*')
            }
            (Some(Token::Pending), Some(Token::Account(_))) => {
                self.bump();
                Some('!')
            }
            _ => None,
        };
        let account = self.expect_account()?;

        let amount = if self.at_expr_start() {
            let number = self.expr()?;
            let currency = self.expect_currency()?;
            Some(RawAmount { number, currency })
        } else {
            None
        };

        let cost = if matches!(self.peek(), Some(Token::LBrace | Token::LDoubleBrace)) {
            Some(self.parse_cost_spec()?)
        } else {
            None
        };

        Ok(RawPosting {
            flag,
            account,
            amount,
            cost,
            meta: RawMeta::new(),
        })
    }

    fn parse_meta_line(&mut self) -> Result<(String, RawMetaValue), ParseError> {
        let key = match self.peek() {
            Some(Token::MetaKey(s)) => {
                let key = s.trim_end_matches(':').to_string();
                self.bump();
                key
            }
            _ => return Err(self.unexpected("a metadata key")),
        };

        let value = match self.peek() {
            Some(Token::String(_)) => RawMetaValue::Str(self.expect_string()?),
            Some(Token::Account(_)) => RawMetaValue::Account(self.expect_account()?),
            Some(Token::Date(_)) => RawMetaValue::Date(self.expect_date()?),
            Some(Token::True) => {
                self.bump();
                RawMetaValue::Bool(true)
            }
            Some(Token::False) => {
                self.bump();
                RawMetaValue::Bool(false)
            }
            Some(Token::Currency(_)) => RawMetaValue::Currency(self.expect_currency()?),
            _ if self.at_expr_start() => {
                let number = self.expr()?;
                if matches!(self.peek(), Some(Token::Currency(_))) {
                    RawMetaValue::Amount(RawAmount {
                        number,
                        currency: self.expect_currency()?,
                    })
                } else {
                    RawMetaValue::Number(number)
                }
            }
            _ => return Err(self.unexpected("a metadata value")),
        };

        Ok((key, value))
    }

    fn parse_cost_spec(&mut self) -> Result<RawCostSpec, ParseError> {
        let (kind, closer) = match self.bump() {
            Some((Token::LBrace, _)) => (CostKind::PerUnit, Token::RBrace),
            Some((Token::LDoubleBrace, _)) => (CostKind::Total, Token::RDoubleBrace),
            _ => return Err(self.unexpected("a cost spec")),
        };

        let mut spec = RawCostSpec {
            kind,
            amounts: Vec::new(),
            currencies: Vec::new(),
            dates: Vec::new(),
            tags: Vec::new(),
        };

        if self.peek() != Some(&closer) {
            loop {
                match self.peek() {
                    Some(Token::String(_)) => spec.tags.push(self.expect_string()?),
                    Some(Token::Date(_)) => spec.dates.push(self.expect_date()?),
                    Some(Token::Currency(_)) => {
                        spec.currencies.push(self.expect_currency()?);
                    }
                    _ if self.at_expr_start() => {
                        let number = self.expr()?;
                        let currency = self.expect_currency()?;
                        spec.amounts.push(RawAmount { number, currency });
                    }
                    _ => return Err(self.unexpected("a cost component")),
                }
                if matches!(self.peek(), Some(Token::Comma)) {
                    self.bump();
                } else {
                    break;
                }
            }
        }

        if self.peek() == Some(&closer) {
            self.bump();
            Ok(spec)
        } else {
            Err(self.unexpected("a closing brace"))
        }
    }

    // ===== Expressions =====

    fn expr(&mut self) -> Result<Rational, ParseError> {
        let mut acc = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.bump();
                    acc += self.term()?;
                }
                Some(Token::Minus) => {
                    self.bump();
                    acc -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn term(&mut self) -> Result<Rational, ParseError> {
        let mut acc = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.bump();
                    acc *= self.factor()?;
                }
                Some(Token::Slash) => {
                    let span = self.current_span();
                    self.bump();
                    let divisor = self.factor()?;
                    if divisor.is_zero() {
                        return Err(self.error_at(ParseErrorKind::DivisionByZero, span));
                    }
                    acc /= divisor;
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    fn factor(&mut self) -> Result<Rational, ParseError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.bump();
                Ok(-self.factor()?)
            }
            Some(Token::Plus) => {
                self.bump();
                self.factor()
            }
            Some(Token::Number(s)) => {
                let s = *s;
                let span = self.current_span();
                self.bump();
                parse_decimal(s).ok_or_else(|| {
                    self.error_at(ParseErrorKind::InvalidNumber(s.to_string()), span)
                })
            }
            Some(Token::LParen) => {
                self.bump();
                let value = self.expr()?;
                if matches!(self.peek(), Some(Token::RParen)) {
                    self.bump();
                    Ok(value)
                } else {
                    Err(self.unexpected("a closing parenthesis"))
                }
            }
            _ => Err(self.unexpected("a number")),
        }
    }

    // ===== Literals =====

    fn parse_raw_date(&self, s: &str, span: Span) -> Result<RawDate, ParseError> {
        let invalid = || self.error_at(ParseErrorKind::InvalidDate(s.to_string()), span);

        let (date_str, rest) = s.split_at(10);
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| invalid())?;
        if rest.is_empty() {
            return Ok(RawDate {
                date,
                time: None,
                timezone: None,
            });
        }

        // rest is "T" followed by HH:MM[:SS][TZ]
        let rest = &rest[1..];
        let time_len = if rest.len() >= 8 && rest.as_bytes()[5] == b':' {
            8
        } else {
            5
        };
        let (time_str, tz_str) = rest.split_at(time_len);
        let format = if time_len == 8 { "%H:%M:%S" } else { "%H:%M" };
        let time = NaiveTime::parse_from_str(time_str, format).map_err(|_| invalid())?;

        Ok(RawDate {
            date,
            time: Some(time),
            timezone: (!tz_str.is_empty()).then(|| tz_str.to_string()),
        })
    }
}

/// Strip quotes and process backslash escapes.
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}
