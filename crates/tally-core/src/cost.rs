//! Cost lots and cost specifications.
//!
//! A [`Cost`] is the acquisition basis of a lot: one or more per-unit
//! amounts (multi-currency lots are allowed, e.g. an LP token priced in two
//! assets), the acquisition instant, the raw [`DateSpec`] it was written
//! with, and an ordered list of tags.
//!
//! A [`CostSpec`] is the surface form written on a posting: either an
//! augmentation (it carries amounts that become a new lot) or a reduction
//! filter (currencies, dates, tags used to select existing lots).

use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::{format_rational, Amount, AmountError, Rational};
use crate::intern::InternedStr;

/// A parsed date with optional time and timezone, plus its resolved instant.
///
/// The raw fields are retained because reduction filters match lots
/// structurally: a filter date without a time matches any time, a filter
/// with a time must match it exactly, and likewise for the timezone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateSpec {
    /// Calendar date as written.
    pub date: NaiveDate,
    /// Time of day, if one was written.
    pub time: Option<NaiveTime>,
    /// Timezone as written (`Z` or `±HH:MM`), if any.
    pub timezone: Option<String>,
    /// The resolved UTC instant.
    pub instant: DateTime<Utc>,
}

impl DateSpec {
    /// Resolve a raw date into a spec, using `default_offset` when the
    /// source carries no timezone of its own. A bare date is midnight.
    ///
    /// Returns `None` when the timezone string is malformed.
    #[must_use]
    pub fn resolve(
        date: NaiveDate,
        time: Option<NaiveTime>,
        timezone: Option<String>,
        default_offset: Option<FixedOffset>,
    ) -> Option<Self> {
        let offset = match &timezone {
            Some(tz) => parse_offset(tz)?,
            None => default_offset.unwrap_or_else(|| Utc.fix()),
        };
        let naive = date.and_time(time.unwrap_or(NaiveTime::MIN));
        let instant = offset.from_local_datetime(&naive).single()?.with_timezone(&Utc);
        Some(Self {
            date,
            time,
            timezone,
            instant,
        })
    }

    /// Wrap an already-resolved instant, e.g. a transaction date used as the
    /// default lot date of an augmentation.
    #[must_use]
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self {
            date: instant.date_naive(),
            time: None,
            timezone: None,
            instant,
        }
    }

    /// Structural match of a filter spec against a lot's spec.
    ///
    /// The dates must agree; time and timezone must agree only where the
    /// filter specifies them.
    #[must_use]
    pub fn matches(&self, lot: &Self) -> bool {
        self.date == lot.date
            && (self.time.is_none() || self.time == lot.time)
            && (self.timezone.is_none() || self.timezone == lot.timezone)
    }
}

/// Parse a `Z` or `±HH:MM` timezone suffix into a fixed offset.
#[must_use]
pub fn parse_offset(tz: &str) -> Option<FixedOffset> {
    if tz == "Z" {
        return Some(Utc.fix());
    }
    let (sign, rest) = if let Some(rest) = tz.strip_prefix('+') {
        (1i32, rest)
    } else if let Some(rest) = tz.strip_prefix('-') {
        (-1i32, rest)
    } else {
        return None;
    };
    let (h, m) = rest.split_once(':')?;
    let hours: i32 = h.parse().ok()?;
    let minutes: i32 = m.parse().ok()?;
    if h.len() != 2 || m.len() != 2 || hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// The acquisition basis of a lot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cost {
    /// Per-unit amounts; non-empty, possibly multiple currencies.
    pub amounts: Vec<Amount>,
    /// Acquisition instant; part of the lot identity.
    pub instant: DateTime<Utc>,
    /// The date as written in the source, kept for filter matching.
    pub date_spec: DateSpec,
    /// Ordered lot tags.
    pub tags: Vec<String>,
}

impl Cost {
    /// Create a cost from per-unit amounts and a date spec.
    #[must_use]
    pub fn new(amounts: Vec<Amount>, date_spec: DateSpec, tags: Vec<String>) -> Self {
        Self {
            amounts,
            instant: date_spec.instant,
            date_spec,
            tags,
        }
    }

    /// Scale every per-unit amount by a factor (e.g. units reduced).
    #[must_use]
    pub fn scaled(&self, factor: &Rational) -> Vec<Amount> {
        self.amounts.iter().map(|a| a.mul(factor)).collect()
    }

    /// Canonical view of the amounts as a sorted multiset of
    /// (currency, value); lot identity is defined over this.
    fn key_amounts(&self) -> Vec<(&InternedStr, &Rational)> {
        let mut v: Vec<_> = self
            .amounts
            .iter()
            .map(|a| (&a.currency, &a.number))
            .collect();
        v.sort();
        v
    }
}

/// Lot identity is structural: the multiset of per-unit amounts and the
/// instant. Tags and the raw date spec do not participate, so two parser
/// runs produce the same key.
impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant && self.key_amounts() == other.key_amounts()
    }
}

impl Eq for Cost {}

impl Hash for Cost {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.instant.hash(state);
        for (currency, number) in self.key_amounts() {
            currency.hash(state);
            number.hash(state);
        }
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, a) in self.amounts.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, ", {}", self.date_spec.date)?;
        for tag in &self.tags {
            write!(f, ", \"{tag}\"")?;
        }
        write!(f, "}}")
    }
}

/// Whether a cost spec's amounts are per-unit (`{…}`) or total (`{{…}}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CostKind {
    /// Amounts are per unit.
    #[default]
    PerUnit,
    /// Amounts are for the whole position.
    Total,
}

/// A cost specification as written on a posting.
///
/// With amounts it is an *augmentation* (a new lot is created); without
/// amounts it is a *reduction* and the remaining fields filter which
/// existing lots may be consumed. An empty filter field is a wildcard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostSpec {
    /// Per-unit or total interpretation of `amounts`.
    pub kind: CostKind,
    /// Cost amounts; empty for reductions.
    pub amounts: Vec<Amount>,
    /// Reduction filter: currencies the lot's cost must include.
    pub currencies: Vec<InternedStr>,
    /// Reduction filter: dates the lot must match.
    pub dates: Vec<DateSpec>,
    /// Reduction filter: tags the lot must carry one of.
    pub tags: Vec<String>,
}

impl CostSpec {
    /// Create an empty per-unit cost spec (`{}`).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// A spec with amounts creates a new lot; one without selects lots.
    #[must_use]
    pub fn is_augmentation(&self) -> bool {
        !self.amounts.is_empty()
    }

    /// Check whether a lot's cost passes every non-empty filter field.
    #[must_use]
    pub fn matches_lot(&self, cost: &Cost) -> bool {
        let currency_ok = self.currencies.is_empty()
            || cost
                .amounts
                .iter()
                .any(|a| self.currencies.contains(&a.currency));
        let tag_ok =
            self.tags.is_empty() || cost.tags.iter().any(|t| self.tags.contains(t));
        let date_ok = self.dates.is_empty()
            || self
                .dates
                .iter()
                .any(|d| d.instant == cost.instant || d.matches(&cost.date_spec));
        currency_ok && tag_ok && date_ok
    }

    /// Per-unit amounts for `units_abs` units: per-unit specs are kept
    /// as-is, total specs are divided by the unit count.
    pub fn per_unit_amounts(&self, units_abs: &Rational) -> Result<Vec<Amount>, AmountError> {
        match self.kind {
            CostKind::PerUnit => Ok(self.amounts.clone()),
            CostKind::Total => self.amounts.iter().map(|a| a.div(units_abs)).collect(),
        }
    }

    /// Total amounts for `units_abs` units: per-unit specs are multiplied
    /// by the unit count, total specs are kept as-is.
    #[must_use]
    pub fn total_amounts(&self, units_abs: &Rational) -> Vec<Amount> {
        match self.kind {
            CostKind::PerUnit => self.amounts.iter().map(|a| a.mul(units_abs)).collect(),
            CostKind::Total => self.amounts.clone(),
        }
    }
}

impl fmt::Display for CostSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (open, close) = match self.kind {
            CostKind::PerUnit => ("{", "}"),
            CostKind::Total => ("{{", "}}"),
        };
        let mut parts: Vec<String> = Vec::new();
        parts.extend(self.amounts.iter().map(ToString::to_string));
        parts.extend(self.currencies.iter().map(ToString::to_string));
        parts.extend(self.dates.iter().map(|d| d.date.to_string()));
        parts.extend(self.tags.iter().map(|t| format!("\"{t}\"")));
        write!(f, "{open}{}{close}", parts.join(", "))
    }
}

/// Render a rational without a currency, e.g. for tolerances.
#[must_use]
pub fn format_scalar(r: &Rational) -> String {
    format_rational(r)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::parse_decimal;

    fn rat(s: &str) -> Rational {
        parse_decimal(s).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn spec(y: i32, m: u32, d: u32) -> DateSpec {
        DateSpec::resolve(date(y, m, d), None, None, None).unwrap()
    }

    #[test]
    fn test_resolve_bare_date_is_midnight_utc() {
        let ds = spec(2025, 4, 1);
        assert_eq!(ds.instant.to_rfc3339(), "2025-04-01T00:00:00+00:00");
    }

    #[test]
    fn test_resolve_with_offset() {
        let ds = DateSpec::resolve(
            date(2025, 4, 1),
            Some(NaiveTime::from_hms_opt(10, 30, 0).unwrap()),
            Some("+02:00".to_string()),
            None,
        )
        .unwrap();
        assert_eq!(ds.instant.to_rfc3339(), "2025-04-01T08:30:00+00:00");
    }

    #[test]
    fn test_resolve_default_offset() {
        let default = parse_offset("+01:00").unwrap();
        let ds = DateSpec::resolve(date(2025, 4, 1), None, None, Some(default)).unwrap();
        assert_eq!(ds.instant.to_rfc3339(), "2025-03-31T23:00:00+00:00");
    }

    #[test]
    fn test_parse_offset() {
        assert!(parse_offset("Z").is_some());
        assert!(parse_offset("+02:00").is_some());
        assert!(parse_offset("-05:30").is_some());
        assert!(parse_offset("02:00").is_none());
        assert!(parse_offset("+2:00").is_none());
        assert!(parse_offset("+25:00").is_none());
    }

    #[test]
    fn test_date_spec_structural_match() {
        let bare = spec(2025, 4, 1);
        let timed = DateSpec::resolve(
            date(2025, 4, 1),
            Some(NaiveTime::from_hms_opt(10, 0, 0).unwrap()),
            None,
            None,
        )
        .unwrap();

        // A filter without a time matches any time
        assert!(bare.matches(&timed));
        // A filter with a time requires it
        assert!(!timed.matches(&bare));
        // Dates must always agree
        assert!(!spec(2025, 4, 2).matches(&timed));
    }

    #[test]
    fn test_lot_identity_ignores_tags_and_order() {
        let ds = spec(2025, 4, 1);
        let a = Cost::new(
            vec![
                Amount::new(rat("1.1"), "CHF"),
                Amount::new(rat("2"), "USD"),
            ],
            ds.clone(),
            vec!["first".to_string()],
        );
        let b = Cost::new(
            vec![
                Amount::new(rat("2"), "USD"),
                Amount::new(rat("1.1"), "CHF"),
            ],
            ds,
            vec![],
        );
        assert_eq!(a, b);
    }

    #[test]
    fn test_lot_identity_distinguishes_instant() {
        let a = Cost::new(vec![Amount::new(rat("1.1"), "CHF")], spec(2025, 4, 1), vec![]);
        let b = Cost::new(vec![Amount::new(rat("1.1"), "CHF")], spec(2025, 4, 2), vec![]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_cost_spec_filters() {
        let lot = Cost::new(
            vec![Amount::new(rat("1.1"), "CHF")],
            spec(2025, 4, 1),
            vec!["opening".to_string()],
        );

        // Empty spec is a wildcard
        assert!(CostSpec::empty().matches_lot(&lot));

        // Currency filter
        let mut s = CostSpec::empty();
        s.currencies = vec!["CHF".into()];
        assert!(s.matches_lot(&lot));
        s.currencies = vec!["USD".into()];
        assert!(!s.matches_lot(&lot));

        // Date filter
        let mut s = CostSpec::empty();
        s.dates = vec![spec(2025, 4, 1)];
        assert!(s.matches_lot(&lot));
        s.dates = vec![spec(2025, 4, 2)];
        assert!(!s.matches_lot(&lot));

        // Tag filter
        let mut s = CostSpec::empty();
        s.tags = vec!["opening".to_string()];
        assert!(s.matches_lot(&lot));
        s.tags = vec!["closing".to_string()];
        assert!(!s.matches_lot(&lot));
    }

    #[test]
    fn test_per_unit_and_total_amounts() {
        let mut s = CostSpec::empty();
        s.kind = CostKind::Total;
        s.amounts = vec![Amount::new(rat("300"), "CHF")];

        let per_unit = s.per_unit_amounts(&rat("2")).unwrap();
        assert_eq!(per_unit[0].number, rat("150"));

        let totals = s.total_amounts(&rat("2"));
        assert_eq!(totals[0].number, rat("300"));

        s.kind = CostKind::PerUnit;
        s.amounts = vec![Amount::new(rat("150"), "CHF")];
        assert_eq!(s.per_unit_amounts(&rat("2")).unwrap()[0].number, rat("150"));
        assert_eq!(s.total_amounts(&rat("2"))[0].number, rat("300"));
    }
}
