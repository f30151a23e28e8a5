use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Rates expressed as decimals (0.05 = 5%). Never as percentages.
pub type Rate = Decimal;

/// Multiples (e.g. 1.8x MOIC)
pub type Multiple = Decimal;

/// One value per monthly period; always of length `T` once produced by a stage.
pub type Series = Vec<Money>;

/// Absolute tolerance used by every cross-statement and cap check.
pub const TIE_OUT_TOLERANCE: Decimal = dec!(0.01);

/// A coverage ratio that degrades to +∞ when the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    Finite(Decimal),
    Unbounded,
}

impl Coverage {
    /// `numerator / denominator`, or `Unbounded` for a zero (or negative) denominator.
    pub fn ratio(numerator: Decimal, denominator: Decimal) -> Self {
        if denominator <= Decimal::ZERO {
            Coverage::Unbounded
        } else {
            Coverage::Finite(numerator / denominator)
        }
    }

    pub fn is_below(&self, threshold: Decimal) -> bool {
        match self {
            Coverage::Finite(v) => *v < threshold,
            Coverage::Unbounded => false,
        }
    }

    pub fn finite(&self) -> Option<Decimal> {
        match self {
            Coverage::Finite(v) => Some(*v),
            Coverage::Unbounded => None,
        }
    }
}

impl fmt::Display for Coverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Coverage::Finite(v) => write!(f, "{v}"),
            Coverage::Unbounded => f.write_str("Infinity"),
        }
    }
}

impl Serialize for Coverage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Coverage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "Infinity" {
            return Ok(Coverage::Unbounded);
        }
        Decimal::from_str(&raw)
            .map(Coverage::Finite)
            .map_err(de::Error::custom)
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation. Carries no wall-clock values so that
/// identical inputs serialize to identical output trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub precision: String,
    pub periods: usize,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    periods: usize,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            precision: "rust_decimal_128bit".to_string(),
            periods,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tolerance_is_one_cent() {
        assert_eq!(TIE_OUT_TOLERANCE, dec!(0.01));
    }

    #[test]
    fn test_coverage_zero_denominator_is_unbounded() {
        assert_eq!(Coverage::ratio(dec!(100), Decimal::ZERO), Coverage::Unbounded);
        assert!(!Coverage::Unbounded.is_below(dec!(1.2)));
    }

    #[test]
    fn test_coverage_serializes_as_string() {
        let json = serde_json::to_string(&vec![
            Coverage::Finite(dec!(1.25)),
            Coverage::Unbounded,
        ])
        .unwrap();
        assert_eq!(json, r#"["1.25","Infinity"]"#);
        let back: Vec<Coverage> = serde_json::from_str(&json).unwrap();
        assert_eq!(back[1], Coverage::Unbounded);
    }
}
