use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Series, TIE_OUT_TOLERANCE};

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// The fixed monthly horizon of a run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeline {
    /// Number of monthly periods `T`
    pub periods: usize,
    /// Calendar date of period 0
    #[serde(default = "default_start_date")]
    pub start_date: NaiveDate,
}

fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default()
}

impl Timeline {
    pub fn new(periods: usize, start_date: NaiveDate) -> Self {
        Self {
            periods,
            start_date,
        }
    }

    /// Timeline of `periods` months starting on the default start date.
    pub fn months(periods: usize) -> Self {
        Self::new(periods, default_start_date())
    }

    pub fn zeros(&self) -> Series {
        vec![Decimal::ZERO; self.periods]
    }

    /// First calendar day of the month each period falls in.
    pub fn period_dates(&self) -> Vec<NaiveDate> {
        let first = self.start_date.with_day(1).unwrap_or(self.start_date);
        (0..self.periods)
            .map(|t| {
                first
                    .checked_add_months(Months::new(t as u32))
                    .unwrap_or(first)
            })
            .collect()
    }

    /// Periods that close a calendar quarter (Mar, Jun, Sep, Dec).
    pub fn quarter_end_flags(&self) -> Vec<bool> {
        self.period_dates()
            .iter()
            .map(|d| d.month() % 3 == 0)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Curves
// ---------------------------------------------------------------------------

/// A shape over time: `values` are linearly resampled to `span_months`
/// and placed at `start_month`. Anything past the horizon is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CurveRepr")]
pub struct Curve {
    pub values: Vec<Decimal>,
    pub start_month: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span_months: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CurveRepr {
    Values(Vec<Decimal>),
    Shaped {
        values: Vec<Decimal>,
        #[serde(default)]
        start_month: usize,
        #[serde(default)]
        span_months: Option<usize>,
    },
}

impl From<CurveRepr> for Curve {
    fn from(repr: CurveRepr) -> Self {
        match repr {
            CurveRepr::Values(values) => Curve {
                values,
                start_month: 0,
                span_months: None,
            },
            CurveRepr::Shaped {
                values,
                start_month,
                span_months,
            } => Curve {
                values,
                start_month,
                span_months,
            },
        }
    }
}

impl Curve {
    /// A curve whose values already line up with months `start_month..`.
    pub fn at(start_month: usize, values: Vec<Decimal>) -> Self {
        let span = values.len();
        Self {
            values,
            start_month,
            span_months: Some(span),
        }
    }

    /// A shape stretched across the whole horizon.
    pub fn stretched(values: Vec<Decimal>) -> Self {
        Self {
            values,
            start_month: 0,
            span_months: None,
        }
    }

    /// Resample and place the raw values on a horizon of `periods`.
    pub fn to_series(&self, periods: usize) -> Series {
        let mut out = vec![Decimal::ZERO; periods];
        if self.start_month >= periods || self.values.is_empty() {
            return out;
        }
        let span = self
            .span_months
            .unwrap_or(periods - self.start_month)
            .max(1);
        let shaped = resample_linear(&self.values, span);
        for (i, v) in shaped.into_iter().enumerate() {
            let t = self.start_month + i;
            if t >= periods {
                break;
            }
            out[t] = v;
        }
        out
    }

    /// Placed series normalized to sum 1 (all-zero if the curve sums to zero).
    pub fn phasing(&self, periods: usize) -> Series {
        normalize(&self.to_series(periods))
    }

    /// Placed series clamped to [0, 1].
    pub fn occupancy(&self, periods: usize) -> Series {
        self.to_series(periods)
            .into_iter()
            .map(clamp_unit)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Series helpers
// ---------------------------------------------------------------------------

/// Linear interpolation of `values` onto `len` evenly spaced points.
pub fn resample_linear(values: &[Decimal], len: usize) -> Series {
    let n = values.len();
    if n == 0 || len == 0 {
        return vec![Decimal::ZERO; len];
    }
    if n == len {
        return values.to_vec();
    }
    if n == 1 {
        return vec![values[0]; len];
    }
    if len == 1 {
        return vec![values[0]];
    }
    let den = len - 1;
    (0..len)
        .map(|i| {
            let num = i * (n - 1);
            let lo = num / den;
            let rem = num % den;
            if rem == 0 || lo + 1 >= n {
                values[lo.min(n - 1)]
            } else {
                let frac = Decimal::from(rem as u64) / Decimal::from(den as u64);
                values[lo] * (Decimal::ONE - frac) + values[lo + 1] * frac
            }
        })
        .collect()
}

/// Scale to sum 1. A zero-sum input maps to all zeros.
pub fn normalize(values: &[Decimal]) -> Series {
    let total: Decimal = values.iter().sum();
    if total.is_zero() {
        return vec![Decimal::ZERO; values.len()];
    }
    values.iter().map(|v| v / total).collect()
}

pub fn clamp_unit(v: Decimal) -> Decimal {
    v.max(Decimal::ZERO).min(Decimal::ONE)
}

pub fn cumulative(values: &[Money]) -> Series {
    let mut running = Decimal::ZERO;
    values
        .iter()
        .map(|v| {
            running += v;
            running
        })
        .collect()
}

/// Inverse of [`cumulative`].
pub fn increments(cumulative: &[Money]) -> Series {
    let mut prev = Decimal::ZERO;
    cumulative
        .iter()
        .map(|c| {
            let step = c - prev;
            prev = *c;
            step
        })
        .collect()
}

pub fn add(a: &[Money], b: &[Money]) -> Series {
    a.iter().zip(b).map(|(x, y)| x + y).collect()
}

pub fn sub(a: &[Money], b: &[Money]) -> Series {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

pub fn scale(a: &[Money], factor: Decimal) -> Series {
    a.iter().map(|x| x * factor).collect()
}

/// Delay a series by `lag` periods; whatever falls past the horizon is lost.
pub fn shift(values: &[Money], lag: usize) -> Series {
    let mut out = vec![Decimal::ZERO; values.len()];
    for (t, v) in values.iter().enumerate() {
        if t + lag < values.len() {
            out[t + lag] = *v;
        }
    }
    out
}

/// Truncate a flow series so its running total never exceeds `allowed_cumulative`.
///
/// Returns the capped flow series and whether any period was truncated.
pub fn cap_cumulative(raw: &[Money], allowed_cumulative: &[Money]) -> (Series, bool) {
    let raw_cum = cumulative(raw);
    let mut truncated = false;
    let capped_cum: Series = raw_cum
        .iter()
        .zip(allowed_cumulative)
        .map(|(r, a)| {
            if *r > *a {
                if *r - *a >= TIE_OUT_TOLERANCE {
                    truncated = true;
                }
                *a
            } else {
                *r
            }
        })
        .collect();
    (increments(&capped_cum), truncated)
}
