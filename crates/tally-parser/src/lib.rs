//! Lexer and parser for the tally ledger surface syntax.
//!
//! The [`lexer`] tokenizes with a Logos-generated DFA; the [`parser`] is a
//! hand-written recursive descent over the token stream. Output is a *raw*
//! directive model: dates keep their written form and nothing is interned
//! or resolved yet. That is the loader's job, because option state (such
//! as `default-timezone`) accumulates across files.
//!
//! # Example
//!
//! ```
//! use tally_parser::{parse, RawDirective, RawItem};
//!
//! let entries = parse("2025-04-01 open Assets:Bank USD\n").unwrap();
//! assert!(matches!(
//!     &entries[0].item,
//!     RawItem::Directive(RawDirective::Open { .. })
//! ));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod lexer;
pub mod parser;

pub use error::{ParseError, ParseErrorKind};
pub use lexer::{tokenize, Span, Token};
pub use parser::{
    parse, RawAmount, RawCostSpec, RawDate, RawDirective, RawEntry, RawItem, RawMeta,
    RawMetaValue, RawPosting,
};
