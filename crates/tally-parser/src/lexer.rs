//! DFA-based lexer for the ledger surface syntax, built on Logos.
//!
//! The grammar is line-oriented: every directive starts at column zero
//! and a line indented by two or more spaces continues the directive
//! above it (postings, metadata). [`tokenize`] therefore lexes one line
//! at a time, prefixing continuation lines with a synthetic
//! [`Token::Indent`] and terminating each line with [`Token::Newline`].

use logos::Logos;
use std::fmt;

/// Byte range of a token in its source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// First byte of the token.
    pub start: usize,
    /// One past the last byte.
    pub end: usize,
}

impl Span {
    /// A span covering `start..end`.
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Token types produced by the lexer.
#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[ \t]+")]
pub enum Token<'src> {
    // ===== Literals =====
    /// A date with optional time and zone: `YYYY-MM-DD[THH:MM[:SS]][TZ]`.
    #[regex(r"\d{4}-\d{2}-\d{2}(T\d{2}:\d{2}(:\d{2})?(Z|[+-]\d{2}:\d{2})?)?")]
    Date(&'src str),

    /// An unsigned number, thousands separators allowed. Signs are
    /// separate tokens so expressions can handle them uniformly.
    #[regex(r"(\d{1,3}(,\d{3})*|\d+)(\.\d+)?")]
    Number(&'src str),

    /// A double-quoted string; the slice includes the quotes.
    #[regex(r#""([^"\\]|\\.)*""#)]
    String(&'src str),

    /// An account path like `Assets:Bank:Checking`.
    #[regex(r"(Assets|Liabilities|Equity|Income|Expenses|Trading)(:[A-Z][A-Za-z0-9-]*)+")]
    Account(&'src str),

    /// A currency code: uppercase, at least two characters.
    #[regex(r"[A-Z][A-Z0-9'._-]+")]
    Currency(&'src str),

    // ===== Keywords =====
    /// The `txn` transaction marker.
    #[token("txn")]
    Txn,
    /// The `open` directive keyword.
    #[token("open")]
    Open,
    /// The `close` directive keyword.
    #[token("close")]
    Close,
    /// The `currency` directive keyword.
    #[token("currency")]
    CurrencyKw,
    /// The `commodity` synonym for `currency`.
    #[token("commodity")]
    Commodity,
    /// The `balance` directive keyword.
    #[token("balance")]
    Balance,
    /// The `option` statement keyword.
    #[token("option")]
    OptionKw,
    /// The `include` statement keyword.
    #[token("include")]
    Include,
    /// The `TRUE` boolean literal.
    #[token("TRUE")]
    True,
    /// The `FALSE` boolean literal.
    #[token("FALSE")]
    False,

    // ===== Punctuation (longer tokens first) =====
    /// `{{` opens a total cost spec.
    #[token("{{")]
    LDoubleBrace,
    /// `}}` closes a total cost spec.
    #[token("}}")]
    RDoubleBrace,
    /// `{` opens a per-unit cost spec.
    #[token("{")]
    LBrace,
    /// `}` closes a per-unit cost spec.
    #[token("}")]
    RBrace,
    /// `(` in expressions.
    #[token("(")]
    LParen,
    /// `)` in expressions.
    #[token(")")]
    RParen,
    /// `,` separator.
    #[token(",")]
    Comma,
    /// `~` introduces a balance tolerance.
    #[token("~")]
    Tilde,
    /// `+` operator.
    #[token("+")]
    Plus,
    /// `-` operator.
    #[token("-")]
    Minus,
    /// `*` completed-transaction flag and multiplication.
    #[token("*")]
    Star,
    /// `/` operator.
    #[token("/")]
    Slash,
    /// `!` pending-transaction flag.
    #[token("!")]
    Pending,

    // ===== Structural =====
    /// A comment from `;` to end of line.
    #[regex(r";[^\n\r]*")]
    Comment(&'src str),

    /// A metadata key: lowercase identifier with trailing colon.
    #[regex(r"[a-z][a-z0-9_-]*:")]
    MetaKey(&'src str),

    /// Line break; synthesized by [`tokenize`], which lexes per line.
    Newline,

    /// Two or more leading spaces on a continuation line; synthesized by
    /// [`tokenize`].
    Indent,

    /// Unrecognized input.
    Error,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(s)
            | Self::Number(s)
            | Self::String(s)
            | Self::Account(s)
            | Self::Currency(s)
            | Self::Comment(s)
            | Self::MetaKey(s) => write!(f, "{s}"),
            Self::Txn => write!(f, "txn"),
            Self::Open => write!(f, "open"),
            Self::Close => write!(f, "close"),
            Self::CurrencyKw => write!(f, "currency"),
            Self::Commodity => write!(f, "commodity"),
            Self::Balance => write!(f, "balance"),
            Self::OptionKw => write!(f, "option"),
            Self::Include => write!(f, "include"),
            Self::True => write!(f, "TRUE"),
            Self::False => write!(f, "FALSE"),
            Self::LDoubleBrace => write!(f, "{{{{"),
            Self::RDoubleBrace => write!(f, "}}}}"),
            Self::LBrace => write!(f, "{{"),
            Self::RBrace => write!(f, "}}"),
            Self::LParen => write!(f, "("),
            Self::RParen => write!(f, ")"),
            Self::Comma => write!(f, ","),
            Self::Tilde => write!(f, "~"),
            Self::Plus => write!(f, "+"),
            Self::Minus => write!(f, "-"),
            Self::Star => write!(f, "*"),
            Self::Slash => write!(f, "/"),
            Self::Pending => write!(f, "!"),
            Self::Newline => write!(f, "\\n"),
            Self::Indent => write!(f, "<indent>"),
            Self::Error => write!(f, "<error>"),
        }
    }
}

/// Tokenize source into (token, span) pairs, one line at a time.
///
/// A line whose body starts with two or more spaces gets a
/// [`Token::Indent`] prefix; every line break becomes a
/// [`Token::Newline`]. Spans are byte offsets into the whole source.
/// Lexer errors become [`Token::Error`] tokens for the parser to report.
#[must_use]
pub fn tokenize(source: &str) -> Vec<(Token<'_>, Span)> {
    let mut tokens = Vec::new();
    let mut offset = 0usize;

    for line in source.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let indent = body.len() - body.trim_start_matches(' ').len();
        if indent >= 2 && indent < body.len() {
            tokens.push((Token::Indent, Span::new(offset, offset + indent)));
        }

        let mut lexer = Token::lexer(&body[indent..]);
        while let Some(result) = lexer.next() {
            let span = lexer.span();
            tokens.push((
                result.unwrap_or(Token::Error),
                Span::new(offset + indent + span.start, offset + indent + span.end),
            ));
        }

        if line.len() > body.len() {
            tokens.push((
                Token::Newline,
                Span::new(offset + body.len(), offset + line.len()),
            ));
        }
        offset += line.len();
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date() {
        let tokens = tokenize("2025-04-01");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0].0, Token::Date("2025-04-01")));
    }

    #[test]
    fn test_date_with_time_and_zone() {
        let tokens = tokenize("2025-04-01T10:30:00+02:00");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0].0, Token::Date("2025-04-01T10:30:00+02:00")));

        let tokens = tokenize("2025-04-01T10:30Z");
        assert!(matches!(tokens[0].0, Token::Date("2025-04-01T10:30Z")));
    }

    #[test]
    fn test_number() {
        let tokens = tokenize("1,234.56");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0].0, Token::Number("1,234.56")));
    }

    #[test]
    fn test_negative_number_is_two_tokens() {
        let tokens = tokenize("-0.5");
        assert_eq!(tokens.len(), 2);
        assert!(matches!(tokens[0].0, Token::Minus));
        assert!(matches!(tokens[1].0, Token::Number("0.5")));
    }

    #[test]
    fn test_account_and_currency() {
        let tokens = tokenize("Assets:Bank:Checking USD");
        assert_eq!(tokens.len(), 2);
        assert!(matches!(tokens[0].0, Token::Account("Assets:Bank:Checking")));
        assert!(matches!(tokens[1].0, Token::Currency("USD")));
    }

    #[test]
    fn test_trading_account() {
        let tokens = tokenize("Trading:Default");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0].0, Token::Account("Trading:Default")));
    }

    #[test]
    fn test_keywords() {
        let tokens = tokenize("open close balance currency commodity option include txn");
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::Open,
                Token::Close,
                Token::Balance,
                Token::CurrencyKw,
                Token::Commodity,
                Token::OptionKw,
                Token::Include,
                Token::Txn
            ]
        );
    }

    #[test]
    fn test_booleans_beat_currency() {
        let tokens = tokenize("TRUE FALSE");
        assert!(matches!(tokens[0].0, Token::True));
        assert!(matches!(tokens[1].0, Token::False));
    }

    #[test]
    fn test_cost_braces() {
        let tokens = tokenize("{ } {{ }}");
        let kinds: Vec<_> = tokens.iter().map(|(t, _)| t.clone()).collect();
        assert_eq!(
            kinds,
            vec![
                Token::LBrace,
                Token::RBrace,
                Token::LDoubleBrace,
                Token::RDoubleBrace
            ]
        );
    }

    #[test]
    fn test_indent_detection() {
        let tokens = tokenize("txn\n  Assets:Bank 100 USD");
        assert!(tokens.iter().any(|(t, _)| matches!(t, Token::Indent)));
    }

    #[test]
    fn test_no_indent_for_single_space() {
        let tokens = tokenize("txn\n open");
        assert!(!tokens.iter().any(|(t, _)| matches!(t, Token::Indent)));
    }

    #[test]
    fn test_meta_key() {
        let tokens = tokenize("trading-account:");
        assert_eq!(tokens.len(), 1);
        assert!(matches!(tokens[0].0, Token::MetaKey("trading-account:")));
    }

    #[test]
    fn test_comment() {
        let tokens = tokenize("; a comment\nopen");
        assert!(matches!(tokens[0].0, Token::Comment("; a comment")));
        assert!(matches!(tokens[1].0, Token::Newline));
        assert!(matches!(tokens[2].0, Token::Open));
    }

    #[test]
    fn test_transaction_line() {
        let source = "2025-04-01 * \"Open Long\"\n  Assets:Broker 2 VT {{300 CHF}}";
        let tokens = tokenize(source);
        assert!(tokens.iter().any(|(t, _)| matches!(t, Token::Date(_))));
        assert!(tokens.iter().any(|(t, _)| matches!(t, Token::Star)));
        assert!(tokens.iter().any(|(t, _)| matches!(t, Token::String(_))));
        assert!(tokens.iter().any(|(t, _)| matches!(t, Token::Indent)));
        assert!(tokens.iter().any(|(t, _)| matches!(t, Token::LDoubleBrace)));
    }

    #[test]
    fn test_spans_are_absolute_offsets() {
        let tokens = tokenize("open\n  close");
        assert_eq!(tokens[0], (Token::Open, Span::new(0, 4)));
        assert_eq!(tokens[1], (Token::Newline, Span::new(4, 5)));
        assert_eq!(tokens[2], (Token::Indent, Span::new(5, 7)));
        assert_eq!(tokens[3], (Token::Close, Span::new(7, 12)));
    }

    #[test]
    fn test_blank_and_space_only_lines() {
        let kinds: Vec<_> = tokenize("open\n   \n\nclose\n")
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            kinds,
            vec![
                Token::Open,
                Token::Newline,
                Token::Newline,
                Token::Newline,
                Token::Close,
                Token::Newline
            ]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let kinds: Vec<_> = tokenize("open\r\nclose\r\n")
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            kinds,
            vec![Token::Open, Token::Newline, Token::Close, Token::Newline]
        );
    }

    #[test]
    fn test_indented_comment_line() {
        let kinds: Vec<_> = tokenize("txn\n  ; note\n")
            .into_iter()
            .map(|(t, _)| t)
            .collect();
        assert_eq!(
            kinds,
            vec![
                Token::Txn,
                Token::Newline,
                Token::Indent,
                Token::Comment("; note"),
                Token::Newline
            ]
        );
    }
}
