use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{Rate, Series};

const MONTHS_PER_YEAR: Decimal = dec!(12);

/// Named escalation buckets referenced by unit types and cost items.
pub type IndexRates = BTreeMap<String, Rate>;

/// Multiplier series for every configured index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EscalationIndices {
    pub series: BTreeMap<String, Series>,
    pub periods: usize,
}

impl EscalationIndices {
    /// Multiplier series for `name`; a missing or absent reference is flat 1.0.
    pub fn resolve(&self, name: Option<&str>, periods: usize) -> Series {
        match name.and_then(|n| self.series.get(n)) {
            Some(series) if series.len() == periods => series.clone(),
            _ => vec![Decimal::ONE; periods],
        }
    }
}

/// Monthly compounding multiplier series starting at 1.0.
///
/// Period `t` carries `(1 + annual_rate / 12)^t`. A factor that would
/// overflow `Decimal` holds at its last representable value.
pub fn escalation_series(annual_rate: Rate, periods: usize) -> Series {
    let step = Decimal::ONE + annual_rate / MONTHS_PER_YEAR;
    let mut factor = Decimal::ONE;
    let mut saturated = false;
    (0..periods)
        .map(|t| {
            if t > 0 && !saturated {
                match factor.checked_mul(step) {
                    Some(next) => factor = next,
                    None => {
                        log::warn!("escalation at {annual_rate} overflows at month {t}; held flat");
                        saturated = true;
                    }
                }
            }
            factor
        })
        .collect()
}

pub fn build_indices(rates: &IndexRates, periods: usize) -> EscalationIndices {
    let series = rates
        .iter()
        .map(|(name, rate)| (name.clone(), escalation_series(*rate, periods)))
        .collect();
    EscalationIndices { series, periods }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_series_starts_at_one() {
        let s = escalation_series(dec!(0.12), 3);
        assert_eq!(s, vec![dec!(1), dec!(1.01), dec!(1.0201)]);
    }

    #[test]
    fn test_zero_rate_is_flat() {
        let s = escalation_series(Decimal::ZERO, 4);
        assert!(s.iter().all(|v| *v == Decimal::ONE));
    }

    #[test]
    fn test_overflowing_rate_holds_flat() {
        let s = escalation_series(dec!(1200), 200);
        assert_eq!(s.len(), 200);
        assert!(s.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(s[198], s[199]);
    }

    #[test]
    fn test_unknown_index_resolves_flat() {
        let mut rates = IndexRates::new();
        rates.insert("construction".into(), dec!(0.06));
        let idx = build_indices(&rates, 2);
        assert_eq!(idx.resolve(Some("construction"), 2)[1], dec!(1.005));
        assert_eq!(idx.resolve(Some("missing"), 2), vec![dec!(1), dec!(1)]);
        assert_eq!(idx.resolve(None, 2), vec![dec!(1), dec!(1)]);
    }
}
