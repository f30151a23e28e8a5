use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::financing::debt::FinancingSchedule;
use crate::financing::tranche::TrancheSchedule;
use crate::timeline::sub;
use crate::types::{Coverage, Money, Series};

// ---------------------------------------------------------------------------
// Input / Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CovenantInputs<'a> {
    pub cash_revenue: &'a [Money],
    pub opex: &'a [Money],
    pub corporate_tax: &'a [Money],
    pub zakat: &'a [Money],
    pub ebit: &'a [Money],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoverageTest {
    pub dscr: Vec<Coverage>,
    pub icr: Vec<Coverage>,
    pub min_dscr_threshold: Option<Decimal>,
    pub min_icr_threshold: Option<Decimal>,
    pub dscr_breach: Vec<bool>,
    pub icr_breach: Vec<bool>,
    pub breach_periods: usize,
    pub first_breach: Option<usize>,
    pub min_dscr: Coverage,
    pub min_icr: Coverage,
    /// Lowest DSCR less its threshold; negative when breached
    pub dscr_headroom: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheCovenants {
    pub id: String,
    #[serde(flatten)]
    pub test: CoverageTest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CovenantReport {
    /// Cash flow available for debt service
    pub cfads: Series,
    pub portfolio: CoverageTest,
    pub tranches: Vec<TrancheCovenants>,
    /// Periods with a breach at portfolio or any tranche level
    pub total_breach_periods: usize,
    pub first_breach: Option<usize>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Operating cash after tax: collections, rent and CAM less opex, tax and zakat.
pub fn cfads(inputs: &CovenantInputs<'_>) -> Series {
    let operating = sub(inputs.cash_revenue, inputs.opex);
    sub(&sub(&operating, inputs.corporate_tax), inputs.zakat)
}

/// Lowest finite ratio, `Unbounded` if there is none.
pub fn min_coverage(values: &[Coverage]) -> Coverage {
    values
        .iter()
        .filter_map(Coverage::finite)
        .min()
        .map(Coverage::Finite)
        .unwrap_or(Coverage::Unbounded)
}

fn breaches(values: &[Coverage], threshold: Option<Decimal>) -> Vec<bool> {
    values
        .iter()
        .map(|v| threshold.is_some_and(|th| v.is_below(th)))
        .collect()
}

fn coverage_test(
    cfads: &[Money],
    ebit: &[Money],
    debt_service: &[Money],
    interest: &[Money],
    min_dscr_threshold: Option<Decimal>,
    min_icr_threshold: Option<Decimal>,
) -> CoverageTest {
    let dscr: Vec<Coverage> = cfads
        .iter()
        .zip(debt_service)
        .map(|(c, ds)| Coverage::ratio(*c, *ds))
        .collect();
    let icr: Vec<Coverage> = ebit
        .iter()
        .zip(interest)
        .map(|(e, i)| Coverage::ratio(*e, *i))
        .collect();
    let dscr_breach = breaches(&dscr, min_dscr_threshold);
    let icr_breach = breaches(&icr, min_icr_threshold);
    let breached: Vec<bool> = dscr_breach
        .iter()
        .zip(&icr_breach)
        .map(|(d, i)| *d || *i)
        .collect();

    let min_dscr = min_coverage(&dscr);
    let dscr_headroom = match (min_dscr.finite(), min_dscr_threshold) {
        (Some(v), Some(th)) => Some(v - th),
        _ => None,
    };

    CoverageTest {
        breach_periods: breached.iter().filter(|b| **b).count(),
        first_breach: breached.iter().position(|b| *b),
        min_icr: min_coverage(&icr),
        min_dscr,
        dscr_headroom,
        dscr,
        icr,
        min_dscr_threshold,
        min_icr_threshold,
        dscr_breach,
        icr_breach,
    }
}

/// DSCR and ICR per tranche and across the debt stack.
///
/// The portfolio is held to the tightest (lowest) tranche threshold.
pub fn test_covenants(inputs: &CovenantInputs<'_>, financing: &FinancingSchedule) -> CovenantReport {
    let cfads = cfads(inputs);
    let periods = cfads.len();

    let min_of = |pick: fn(&TrancheSchedule) -> Option<Decimal>| {
        financing
            .tranches
            .iter()
            .filter_map(|t| pick(&t.schedule))
            .min()
    };
    let portfolio = coverage_test(
        &cfads,
        inputs.ebit,
        &financing.debt_service,
        &financing.interest,
        min_of(|t| t.min_dscr),
        min_of(|t| t.min_icr),
    );

    let tranches: Vec<TrancheCovenants> = financing
        .tranches
        .iter()
        .map(|t| TrancheCovenants {
            id: t.schedule.id.clone(),
            test: coverage_test(
                &cfads,
                inputs.ebit,
                &t.schedule.debt_service,
                &t.schedule.interest,
                t.schedule.min_dscr,
                t.schedule.min_icr,
            ),
        })
        .collect();

    let any_breach: Vec<bool> = (0..periods)
        .map(|p| {
            portfolio.dscr_breach[p]
                || portfolio.icr_breach[p]
                || tranches
                    .iter()
                    .any(|t| t.test.dscr_breach[p] || t.test.icr_breach[p])
        })
        .collect();

    CovenantReport {
        cfads,
        total_breach_periods: any_breach.iter().filter(|b| **b).count(),
        first_breach: any_breach.iter().position(|b| *b),
        portfolio,
        tranches,
    }
}
