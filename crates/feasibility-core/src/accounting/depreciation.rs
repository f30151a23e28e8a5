use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::schedule::costs::{CostItem, CostSchedule};
use crate::timeline::{add, cumulative, sub};
use crate::types::{Money, Series};

/// Straight-line depreciation terms for a capex item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepreciationPolicy {
    pub useful_life_months: u32,
    /// First month charged; capex spent up to and including it forms the basis
    #[serde(default)]
    pub start_month: usize,
    #[serde(default)]
    pub salvage_value: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDepreciation {
    pub id: String,
    pub basis: Money,
    pub charge: Series,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepreciationSchedule {
    pub charge: Series,
    pub accumulated: Series,
    /// Cumulative capex less accumulated depreciation, floored at zero
    pub nbv: Series,
    pub items: Vec<ItemDepreciation>,
}

/// Monthly straight-line charge for one item's capex series.
pub fn straight_line(policy: &DepreciationPolicy, capex: &[Money]) -> (Money, Series) {
    let periods = capex.len();
    let mut charge = vec![Decimal::ZERO; periods];
    let spent_to_start: Money = capex.iter().take(policy.start_month + 1).sum();
    let basis = (spent_to_start - policy.salvage_value).max(Decimal::ZERO);
    if policy.useful_life_months == 0 || basis.is_zero() {
        return (basis, charge);
    }
    let monthly = basis / Decimal::from(policy.useful_life_months);
    let end = policy
        .start_month
        .saturating_add(policy.useful_life_months as usize)
        .min(periods);
    for slot in charge.iter_mut().take(end).skip(policy.start_month) {
        *slot = monthly;
    }
    (basis, charge)
}

/// Depreciate every capex item carrying a policy and roll NBV forward.
pub fn build_depreciation(items: &[CostItem], costs: &CostSchedule) -> DepreciationSchedule {
    let periods = costs.capex.len();
    let mut charge = vec![Decimal::ZERO; periods];
    let mut per_item = Vec::new();

    for item in items.iter().filter(|i| !i.is_opex) {
        let (Some(policy), Some(sched)) = (&item.depreciation, costs.item(&item.id)) else {
            continue;
        };
        let (basis, item_charge) = straight_line(policy, &sched.series);
        charge = add(&charge, &item_charge);
        per_item.push(ItemDepreciation {
            id: item.id.clone(),
            basis,
            charge: item_charge,
        });
    }

    let accumulated = cumulative(&charge);
    let nbv = sub(&cumulative(&costs.capex), &accumulated)
        .into_iter()
        .map(|v| v.max(Decimal::ZERO))
        .collect();

    DepreciationSchedule {
        charge,
        accumulated,
        nbv,
        items: per_item,
    }
}
