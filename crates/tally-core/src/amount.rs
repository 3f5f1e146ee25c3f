//! Amount type: an exact rational number paired with a currency.
//!
//! All arithmetic in the engine is performed on [`BigRational`] values so
//! that booking never accumulates rounding drift. Binary operations require
//! identical currencies and fail with [`AmountError::CrossCurrencyArithmetic`]
//! otherwise; scalar multiplication and division take a bare rational.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use num_bigint::{BigInt, Sign};
use num_rational::BigRational;
use num_traits::{One, Signed, Zero};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::intern::InternedStr;

/// The exact rational scalar used throughout the engine.
///
/// `Ratio` normalizes to lowest terms on construction and after every
/// operation, so structural equality on results is sound.
pub type Rational = BigRational;

/// Errors raised by amount arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Two amounts with different currencies were combined.
    #[error("cross-currency arithmetic: cannot combine {left} with {right}")]
    CrossCurrencyArithmetic {
        /// Currency of the left operand.
        left: InternedStr,
        /// Currency of the right operand.
        right: InternedStr,
    },
    /// Scalar division by zero.
    #[error("division by zero")]
    DivisionByZero,
}

/// An exact quantity of a single currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Amount {
    /// The exact rational quantity.
    pub number: Rational,
    /// The currency code (e.g. "USD", "CHF", "VT").
    pub currency: InternedStr,
}

impl Amount {
    /// Create a new amount.
    #[must_use]
    pub fn new(number: Rational, currency: impl Into<InternedStr>) -> Self {
        Self {
            number,
            currency: currency.into(),
        }
    }

    /// The distinguished zero of a currency.
    #[must_use]
    pub fn zero(currency: impl Into<InternedStr>) -> Self {
        Self {
            number: Rational::zero(),
            currency: currency.into(),
        }
    }

    /// Create an amount from an integer quantity.
    #[must_use]
    pub fn from_integer(n: i64, currency: impl Into<InternedStr>) -> Self {
        Self {
            number: Rational::from_integer(BigInt::from(n)),
            currency: currency.into(),
        }
    }

    /// Parse a decimal literal (e.g. `"-0.5"`, `"1,234.56"`) into an amount.
    ///
    /// Returns `None` for malformed input. Thousands separators are accepted
    /// and stripped.
    #[must_use]
    pub fn from_decimal_str(s: &str, currency: impl Into<InternedStr>) -> Option<Self> {
        parse_decimal(s).map(|number| Self {
            number,
            currency: currency.into(),
        })
    }

    /// Check if the amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.number.is_zero()
    }

    /// Check if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.number.is_positive()
    }

    /// Check if the amount is strictly negative.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.number.is_negative()
    }

    /// The sign of the amount: -1, 0 or +1.
    #[must_use]
    pub fn signum(&self) -> i8 {
        if self.number.is_positive() {
            1
        } else if self.number.is_negative() {
            -1
        } else {
            0
        }
    }

    /// Negate this amount.
    #[must_use]
    pub fn neg(&self) -> Self {
        Self {
            number: -&self.number,
            currency: self.currency.clone(),
        }
    }

    /// Absolute value of this amount.
    #[must_use]
    pub fn abs(&self) -> Self {
        Self {
            number: self.number.abs(),
            currency: self.currency.clone(),
        }
    }

    /// Add another amount of the same currency.
    pub fn add(&self, other: &Self) -> Result<Self, AmountError> {
        self.check_currency(other)?;
        Ok(Self {
            number: &self.number + &other.number,
            currency: self.currency.clone(),
        })
    }

    /// Subtract another amount of the same currency.
    pub fn sub(&self, other: &Self) -> Result<Self, AmountError> {
        self.check_currency(other)?;
        Ok(Self {
            number: &self.number - &other.number,
            currency: self.currency.clone(),
        })
    }

    /// Multiply by a bare rational scalar.
    #[must_use]
    pub fn mul(&self, k: &Rational) -> Self {
        Self {
            number: &self.number * k,
            currency: self.currency.clone(),
        }
    }

    /// Divide by a bare rational scalar.
    pub fn div(&self, k: &Rational) -> Result<Self, AmountError> {
        if k.is_zero() {
            return Err(AmountError::DivisionByZero);
        }
        Ok(Self {
            number: &self.number / k,
            currency: self.currency.clone(),
        })
    }

    /// Total ordering over same-currency amounts.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, AmountError> {
        self.check_currency(other)?;
        Ok(self.number.cmp(&other.number))
    }

    fn check_currency(&self, other: &Self) -> Result<(), AmountError> {
        if self.currency == other.currency {
            Ok(())
        } else {
            Err(AmountError::CrossCurrencyArithmetic {
                left: self.currency.clone(),
                right: other.currency.clone(),
            })
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", format_rational(&self.number), self.currency)
    }
}

/// Parse a decimal literal into an exact rational.
///
/// Accepts an optional sign, thousands separators in the integer part and an
/// optional fraction part. Returns `None` for anything else.
#[must_use]
pub fn parse_decimal(s: &str) -> Option<Rational> {
    let s = s.trim();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };

    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, f),
        None => (rest, ""),
    };

    let int_digits: String = int_part.chars().filter(|c| *c != ',').collect();
    if int_digits.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_digits.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let mut numer = if int_digits.is_empty() {
        BigInt::zero()
    } else {
        BigInt::from_str(&int_digits).ok()?
    };
    let mut denom = BigInt::one();
    if !frac_part.is_empty() {
        let scale = BigInt::from(10u32).pow(frac_part.len() as u32);
        numer = numer * &scale + BigInt::from_str(frac_part).ok()?;
        denom = scale;
    }

    Some(Rational::new(numer * sign, denom))
}

/// Render a rational as a finite decimal when possible, `p/q` otherwise.
///
/// A rational has a finite decimal expansion iff its reduced denominator has
/// no prime factors other than 2 and 5.
#[must_use]
pub fn format_rational(r: &Rational) -> String {
    let two = BigInt::from(2u32);
    let five = BigInt::from(5u32);

    let mut rest = r.denom().clone();
    let mut twos = 0u32;
    let mut fives = 0u32;
    while (&rest % &two).is_zero() {
        rest /= &two;
        twos += 1;
    }
    while (&rest % &five).is_zero() {
        rest /= &five;
        fives += 1;
    }
    if !rest.is_one() {
        return format!("{}/{}", r.numer(), r.denom());
    }

    let scale = twos.max(fives);
    let scaled = (r.numer() * BigInt::from(10u32).pow(scale)) / r.denom();
    if scale == 0 {
        return scaled.to_string();
    }

    let negative = scaled.sign() == Sign::Minus;
    let mut digits = scaled.magnitude().to_string();
    let point = scale as usize;
    if digits.len() <= point {
        let pad = point - digits.len() + 1;
        digits = "0".repeat(pad) + &digits;
    }
    digits.insert(digits.len() - point, '.');
    if negative {
        format!("-{digits}")
    } else {
        digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(s: &str) -> Rational {
        parse_decimal(s).unwrap()
    }

    #[test]
    fn test_new_and_zero() {
        let a = Amount::new(rat("100.00"), "USD");
        assert_eq!(a.currency, "USD");
        assert!(!a.is_zero());

        let z = Amount::zero("EUR");
        assert!(z.is_zero());
        assert!(!z.is_positive());
        assert!(!z.is_negative());
    }

    #[test]
    fn test_add_same_currency() {
        let a = Amount::new(rat("100.00"), "USD");
        let b = Amount::new(rat("50.00"), "USD");
        let sum = a.add(&b).unwrap();
        assert_eq!(sum.number, rat("150.00"));
    }

    #[test]
    fn test_add_cross_currency_fails() {
        let a = Amount::new(rat("100.00"), "USD");
        let b = Amount::new(rat("50.00"), "EUR");
        assert!(matches!(
            a.add(&b),
            Err(AmountError::CrossCurrencyArithmetic { .. })
        ));
        assert!(matches!(
            a.sub(&b),
            Err(AmountError::CrossCurrencyArithmetic { .. })
        ));
        assert!(a.try_cmp(&b).is_err());
    }

    #[test]
    fn test_scalar_mul_div() {
        let a = Amount::new(rat("10"), "USD");
        assert_eq!(a.mul(&rat("1.5")).number, rat("15"));
        assert_eq!(a.div(&rat("4")).unwrap().number, rat("2.5"));
        assert!(matches!(
            a.div(&Rational::zero()),
            Err(AmountError::DivisionByZero)
        ));
    }

    #[test]
    fn test_exact_no_drift() {
        // 0.1 + 0.2 == 0.3 exactly; the classic float counterexample
        let a = Amount::new(rat("0.1"), "USD");
        let b = Amount::new(rat("0.2"), "USD");
        let c = a.add(&b).unwrap();
        assert_eq!(c.number, rat("0.3"));
    }

    #[test]
    fn test_normalized_equality() {
        // 1/2 and 2/4 normalize to the same value
        let half = Rational::new(BigInt::from(1), BigInt::from(2));
        let other = Rational::new(BigInt::from(2), BigInt::from(4));
        assert_eq!(half, other);
        assert_eq!(
            Amount::new(half, "USD"),
            Amount::new(other, "USD")
        );
    }

    #[test]
    fn test_neg_abs_signum() {
        let a = Amount::new(rat("-2.5"), "VT");
        assert_eq!(a.signum(), -1);
        assert_eq!(a.neg().number, rat("2.5"));
        assert_eq!(a.abs().number, rat("2.5"));
        assert_eq!(Amount::zero("VT").signum(), 0);
    }

    #[test]
    fn test_try_cmp() {
        let a = Amount::new(rat("1"), "USD");
        let b = Amount::new(rat("2"), "USD");
        assert_eq!(a.try_cmp(&b).unwrap(), Ordering::Less);
        assert_eq!(b.try_cmp(&a).unwrap(), Ordering::Greater);
        assert_eq!(a.try_cmp(&a).unwrap(), Ordering::Equal);
    }

    #[test]
    fn test_parse_decimal() {
        assert_eq!(parse_decimal("1,234.56").unwrap(), rat("1234.56"));
        assert_eq!(parse_decimal("-0.5").unwrap(), rat("-0.5"));
        assert_eq!(parse_decimal("+3").unwrap(), rat("3"));
        assert!(parse_decimal("abc").is_none());
        assert!(parse_decimal("").is_none());
        assert!(parse_decimal("1.2.3").is_none());
    }

    #[test]
    fn test_from_decimal_str() {
        let a = Amount::from_decimal_str("1,234.56", "USD").unwrap();
        assert_eq!(a.number, rat("1234.56"));
        assert!(Amount::from_decimal_str("nope", "USD").is_none());
    }

    #[test]
    fn test_format_rational() {
        assert_eq!(format_rational(&rat("1.25")), "1.25");
        assert_eq!(format_rational(&rat("-0.5")), "-0.5");
        assert_eq!(format_rational(&rat("42")), "42");
        assert_eq!(format_rational(&rat("0.005")), "0.005");
        // 1/3 has no finite decimal expansion
        let third = Rational::new(BigInt::from(1), BigInt::from(3));
        assert_eq!(format_rational(&third), "1/3");
    }

    #[test]
    fn test_display() {
        let a = Amount::new(rat("1234.56"), "USD");
        assert_eq!(format!("{a}"), "1234.56 USD");
    }
}
