use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounting::depreciation::DepreciationPolicy;
use crate::schedule::escalation::EscalationIndices;
use crate::timeline::Curve;
use crate::types::{Money, Series};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// A development or operating cost line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Operating cost (expensed) rather than capital cost (capitalized into NBV)
    #[serde(default)]
    pub is_opex: bool,
    /// Un-escalated total amount spread over the phasing curve
    pub base_amount: Money,
    /// Spend profile; normalized to sum 1 after placement on the horizon
    pub phasing: Curve,
    /// Escalation bucket name; flat if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_index: Option<String>,
    /// Whether input VAT paid on this item is recoverable
    #[serde(default)]
    pub vat_eligible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depreciation: Option<DepreciationPolicy>,
    /// Plot the cost belongs to (CAM allocation)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_id: Option<String>,
    /// Recoverable from occupiers through CAM charges
    #[serde(default)]
    pub recoverable: bool,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostItemSchedule {
    pub id: String,
    pub is_opex: bool,
    pub series: Series,
    pub total: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostSchedule {
    pub capex: Series,
    pub opex: Series,
    pub total_capex: Money,
    pub total_opex: Money,
    /// Per-item escalated series, in input order
    pub items: Vec<CostItemSchedule>,
}

impl CostSchedule {
    pub fn item(&self, id: &str) -> Option<&CostItemSchedule> {
        self.items.iter().find(|i| i.id == id)
    }

    /// Cumulative capex as a share of total capex; 0 when there is no capex.
    pub fn cost_progress(&self) -> Series {
        if self.total_capex.is_zero() {
            return vec![Decimal::ZERO; self.capex.len()];
        }
        let mut running = Decimal::ZERO;
        self.capex
            .iter()
            .map(|c| {
                running += c;
                (running / self.total_capex).min(Decimal::ONE)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Escalated monthly spend for one item.
pub fn item_series(item: &CostItem, indices: &EscalationIndices, periods: usize) -> Series {
    let escalation = indices.resolve(item.escalation_index.as_deref(), periods);
    item.phasing
        .phasing(periods)
        .iter()
        .zip(&escalation)
        .map(|(w, e)| item.base_amount * w * e)
        .collect()
}

/// Phase, escalate and split every cost item into capex and opex series.
pub fn build_cost_schedule(
    items: &[CostItem],
    indices: &EscalationIndices,
    periods: usize,
) -> CostSchedule {
    let mut capex = vec![Decimal::ZERO; periods];
    let mut opex = vec![Decimal::ZERO; periods];
    let mut schedules = Vec::with_capacity(items.len());

    for item in items {
        let series = item_series(item, indices, periods);
        let target = if item.is_opex { &mut opex } else { &mut capex };
        for (acc, v) in target.iter_mut().zip(&series) {
            *acc += v;
        }
        schedules.push(CostItemSchedule {
            id: item.id.clone(),
            is_opex: item.is_opex,
            total: series.iter().sum(),
            series,
        });
    }

    CostSchedule {
        total_capex: capex.iter().sum(),
        total_opex: opex.iter().sum(),
        capex,
        opex,
        items: schedules,
    }
}
