//! CPU quantities in the Kubernetes quantity grammar
//!
//! Values are held as whole millicores. Parsing rounds fractional millicores
//! up, the same way the API server reports `MilliValue`.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing a quantity string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityParseError {
    #[error("quantity is empty")]
    Empty,

    #[error("invalid quantity {0:?}")]
    Invalid(String),

    #[error("unknown quantity suffix {0:?}")]
    UnknownSuffix(String),

    #[error("negative CPU quantity {0:?}")]
    Negative(String),

    #[error("quantity {0:?} is out of range")]
    OutOfRange(String),
}

/// A CPU amount expressed in millicores
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CpuQuantity {
    millis: i64,
}

impl CpuQuantity {
    pub const ZERO: CpuQuantity = CpuQuantity { millis: 0 };

    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    pub fn from_cores(cores: i64) -> Self {
        Self {
            millis: cores.saturating_mul(1000),
        }
    }

    pub fn millis(&self) -> i64 {
        self.millis
    }

    pub fn is_zero(&self) -> bool {
        self.millis == 0
    }

    /// Increase by the given percentage, rounding down to whole millicores
    pub fn increased_by_percent(&self, percent: i64) -> Self {
        let scaled = i128::from(self.millis) * (100 + i128::from(percent)) / 100;
        Self {
            millis: scaled.clamp(0, i128::from(i64::MAX)) as i64,
        }
    }

    /// Parse a Kubernetes quantity such as `500m`, `1.5`, `2`, `1e3m` or `1Ki`
    pub fn parse(input: &str) -> Result<Self, QuantityParseError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(QuantityParseError::Empty);
        }

        let (negative, unsigned) = match s.as_bytes()[0] {
            b'-' => (true, &s[1..]),
            b'+' => (false, &s[1..]),
            _ => (false, s),
        };

        let number_end = unsigned
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(unsigned.len());
        let (number, suffix) = unsigned.split_at(number_end);

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if (int_part.is_empty() && frac_part.is_empty()) || frac_part.contains('.') {
            return Err(QuantityParseError::Invalid(input.to_string()));
        }

        let digits = format!("{int_part}{frac_part}");
        let mantissa: i128 = digits
            .parse()
            .map_err(|_| QuantityParseError::OutOfRange(input.to_string()))?;
        if negative && mantissa != 0 {
            return Err(QuantityParseError::Negative(input.to_string()));
        }

        // Scale is expressed as value = mantissa * num / den, in millicores.
        let mut num: i128 = 1000;
        let mut den: i128 = pow10(frac_part.len() as u32, input)?;

        match suffix {
            "" => {}
            "m" => den = checked(den.checked_mul(1000), input)?,
            "k" => num = checked(num.checked_mul(1_000), input)?,
            "M" => num = checked(num.checked_mul(1_000_000), input)?,
            "G" => num = checked(num.checked_mul(1_000_000_000), input)?,
            "T" => num = checked(num.checked_mul(1_000_000_000_000), input)?,
            "P" => num = checked(num.checked_mul(1_000_000_000_000_000), input)?,
            "E" => num = checked(num.checked_mul(1_000_000_000_000_000_000), input)?,
            "Ki" => num = checked(num.checked_mul(1 << 10), input)?,
            "Mi" => num = checked(num.checked_mul(1 << 20), input)?,
            "Gi" => num = checked(num.checked_mul(1 << 30), input)?,
            "Ti" => num = checked(num.checked_mul(1 << 40), input)?,
            "Pi" => num = checked(num.checked_mul(1 << 50), input)?,
            "Ei" => num = checked(num.checked_mul(1 << 60), input)?,
            other => {
                let exponent = other
                    .strip_prefix('e')
                    .or_else(|| other.strip_prefix('E'))
                    .ok_or_else(|| QuantityParseError::UnknownSuffix(other.to_string()))?;
                let exp: i32 = exponent
                    .parse()
                    .map_err(|_| QuantityParseError::UnknownSuffix(other.to_string()))?;
                if exp >= 0 {
                    num = checked(num.checked_mul(pow10(exp as u32, input)?), input)?;
                } else {
                    den = checked(den.checked_mul(pow10(exp.unsigned_abs(), input)?), input)?;
                }
            }
        }

        let scaled = checked(mantissa.checked_mul(num), input)?;
        let mut millis = scaled / den;
        if scaled % den != 0 {
            millis += 1;
        }
        let millis =
            i64::try_from(millis).map_err(|_| QuantityParseError::OutOfRange(input.to_string()))?;

        Ok(Self { millis })
    }

    pub fn to_quantity(&self) -> Quantity {
        Quantity(self.to_string())
    }
}

fn pow10(exp: u32, input: &str) -> Result<i128, QuantityParseError> {
    10i128
        .checked_pow(exp)
        .ok_or_else(|| QuantityParseError::OutOfRange(input.to_string()))
}

fn checked(value: Option<i128>, input: &str) -> Result<i128, QuantityParseError> {
    value.ok_or_else(|| QuantityParseError::OutOfRange(input.to_string()))
}

impl fmt::Display for CpuQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.millis % 1000 == 0 {
            write!(f, "{}", self.millis / 1000)
        } else {
            write!(f, "{}m", self.millis)
        }
    }
}

impl FromStr for CpuQuantity {
    type Err = QuantityParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<&Quantity> for CpuQuantity {
    type Error = QuantityParseError;

    fn try_from(value: &Quantity) -> Result<Self, Self::Error> {
        Self::parse(&value.0)
    }
}

impl Serialize for CpuQuantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CpuQuantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_milli() {
        assert_eq!(CpuQuantity::parse("1").unwrap().millis(), 1000);
        assert_eq!(CpuQuantity::parse("500m").unwrap().millis(), 500);
        assert_eq!(CpuQuantity::parse("1.5").unwrap().millis(), 1500);
        assert_eq!(CpuQuantity::parse(".25").unwrap().millis(), 250);
        assert_eq!(CpuQuantity::parse("0").unwrap(), CpuQuantity::ZERO);
    }

    #[test]
    fn test_parse_suffixes_and_exponents() {
        assert_eq!(CpuQuantity::parse("2k").unwrap().millis(), 2_000_000);
        assert_eq!(CpuQuantity::parse("1Ki").unwrap().millis(), 1_024_000);
        assert_eq!(CpuQuantity::parse("1e3").unwrap().millis(), 1_000_000);
        assert_eq!(CpuQuantity::parse("5e-1").unwrap().millis(), 500);
    }

    #[test]
    fn test_fractional_millis_round_up() {
        assert_eq!(CpuQuantity::parse("0.0001").unwrap().millis(), 1);
        assert_eq!(CpuQuantity::parse("1.2345").unwrap().millis(), 1235);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(CpuQuantity::parse(""), Err(QuantityParseError::Empty));
        assert!(matches!(
            CpuQuantity::parse("abc"),
            Err(QuantityParseError::Invalid(_))
        ));
        assert!(matches!(
            CpuQuantity::parse("1x"),
            Err(QuantityParseError::UnknownSuffix(_))
        ));
        assert!(matches!(
            CpuQuantity::parse("-1"),
            Err(QuantityParseError::Negative(_))
        ));
        assert!(matches!(
            CpuQuantity::parse("1e40"),
            Err(QuantityParseError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(CpuQuantity::from_millis(2000).to_string(), "2");
        assert_eq!(CpuQuantity::from_millis(1200).to_string(), "1200m");
        assert_eq!(CpuQuantity::parse("1.5").unwrap().to_quantity().0, "1500m");
    }

    #[test]
    fn test_increase_by_percent() {
        let q = CpuQuantity::parse("1").unwrap();
        assert_eq!(q.increased_by_percent(120).millis(), 2200);
        assert_eq!(q.increased_by_percent(0), q);
        assert_eq!(CpuQuantity::from_millis(333).increased_by_percent(50).millis(), 499);
        assert_eq!(
            CpuQuantity::from_cores(1).increased_by_percent(i64::MAX - 10).millis(),
            i64::MAX
        );
    }

    #[test]
    fn test_ordering_compares_millis() {
        assert!(CpuQuantity::parse("1").unwrap() > CpuQuantity::parse("999m").unwrap());
        assert_eq!(
            CpuQuantity::parse("1000m").unwrap(),
            CpuQuantity::parse("1").unwrap()
        );
    }
}
