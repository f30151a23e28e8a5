use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::revenue::sales::{UnitCategory, UnitType, VatClass};
use crate::schedule::costs::{CostItem, CostSchedule};
use crate::timeline::{add, sub};
use crate::types::{Money, Rate, Series};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plot {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Occupancy floor used when grossing up recoverable costs
    #[serde(default = "default_gross_up_threshold")]
    pub gross_up_threshold: Rate,
    #[serde(default)]
    pub admin_fee_pct: Rate,
    #[serde(default = "default_billable_categories")]
    pub billable_categories: Vec<UnitCategory>,
    /// Bill each plot on its own costs and occupancy
    #[serde(default)]
    pub split_by_plot: bool,
    #[serde(default)]
    pub vat_class: VatClass,
}

fn default_gross_up_threshold() -> Rate {
    dec!(0.95)
}

fn default_billable_categories() -> Vec<UnitCategory> {
    vec![UnitCategory::Retail, UnitCategory::Office]
}

impl Default for CamConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gross_up_threshold: default_gross_up_threshold(),
            admin_fee_pct: Decimal::ZERO,
            billable_categories: default_billable_categories(),
            split_by_plot: false,
            vat_class: VatClass::Standard,
        }
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotCam {
    pub plot_id: String,
    pub recoverable_opex: Series,
    pub occupied_area: Series,
    pub cam_revenue: Series,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamSchedule {
    pub enabled: bool,
    pub recoverable_opex: Series,
    pub occupied_area: Series,
    pub billable_area: Decimal,
    pub occupancy_pct: Series,
    pub cam_revenue: Series,
    pub taxable_cam: Series,
    /// Report-only: opex less CAM recovery. Statements use gross opex and
    /// `cam_revenue` separately.
    pub opex_net_of_cam: Series,
    pub plots: Vec<PlotCam>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Recovery billed to occupiers: `recoverable / max(occupancy, threshold) × (1 + admin_fee)`.
///
/// Occupancy is occupied over billable area. Nothing is billed in a period
/// with no occupied area.
fn bill(recoverable: &[Money], occupied: &[Decimal], billable_area: Decimal, cfg: &CamConfig) -> Series {
    recoverable
        .iter()
        .zip(occupied)
        .map(|(cost, occ_area)| {
            if billable_area.is_zero() || occ_area.is_zero() {
                return Decimal::ZERO;
            }
            let effective = (*occ_area / billable_area).max(cfg.gross_up_threshold);
            if effective.is_zero() {
                return Decimal::ZERO;
            }
            *cost / effective * (Decimal::ONE + cfg.admin_fee_pct)
        })
        .collect()
}

fn recoverable_for<'a>(
    items: &'a [CostItem],
    schedule: &CostSchedule,
    periods: usize,
    filter: impl Fn(&'a CostItem) -> bool,
) -> Series {
    let mut out = vec![Decimal::ZERO; periods];
    for item in items.iter().filter(|i| i.is_opex && i.recoverable).filter(|i| filter(i)) {
        if let Some(sched) = schedule.item(&item.id) {
            out = add(&out, &sched.series);
        }
    }
    out
}

fn occupied_for<'a>(
    units: &'a [UnitType],
    cfg: &CamConfig,
    periods: usize,
    filter: impl Fn(&'a UnitType) -> bool,
) -> (Series, Decimal) {
    let mut occupied = vec![Decimal::ZERO; periods];
    let mut area = Decimal::ZERO;
    for unit in units
        .iter()
        .filter(|u| cfg.billable_categories.contains(&u.category))
        .filter(|u| filter(u))
    {
        occupied = add(&occupied, &unit.occupied_area(periods));
        area += unit.gross_area();
    }
    (occupied, area)
}

/// Common-area-maintenance recovery and opex net of it.
pub fn allocate_cam(
    cfg: &CamConfig,
    units: &[UnitType],
    items: &[CostItem],
    costs: &CostSchedule,
    plots: &[Plot],
) -> CamSchedule {
    let periods = costs.opex.len();
    let zeros = vec![Decimal::ZERO; periods];

    if !cfg.enabled {
        return CamSchedule {
            enabled: false,
            recoverable_opex: zeros.clone(),
            occupied_area: zeros.clone(),
            billable_area: Decimal::ZERO,
            occupancy_pct: zeros.clone(),
            cam_revenue: zeros.clone(),
            taxable_cam: zeros,
            opex_net_of_cam: costs.opex.clone(),
            plots: Vec::new(),
        };
    }

    let recoverable_opex = recoverable_for(items, costs, periods, |_| true);
    let (occupied_area, billable_area) = occupied_for(units, cfg, periods, |_| true);

    let mut plot_results: Vec<PlotCam> = Vec::with_capacity(plots.len());
    let cam_revenue = if cfg.split_by_plot {
        // Plot-tagged costs bill to their own plot; untagged costs are pooled.
        let pooled_cost = recoverable_for(items, costs, periods, |i| i.plot_id.is_none());
        let pooled_bill = bill(&pooled_cost, &occupied_area, billable_area, cfg);
        let mut total = zeros.clone();
        for plot in plots {
            let own_cost = recoverable_for(items, costs, periods, |i| {
                i.plot_id.as_deref() == Some(plot.id.as_str())
            });
            let (own_occupied, own_area) = occupied_for(units, cfg, periods, |u| {
                u.plot_id.as_deref() == Some(plot.id.as_str())
            });
            let own_bill = bill(&own_cost, &own_occupied, own_area, cfg);
            let pooled_share = allocate_pro_rata(&pooled_bill, &own_occupied, &occupied_area);
            let plot_bill = add(&own_bill, &pooled_share);
            total = add(&total, &plot_bill);
            plot_results.push(PlotCam {
                plot_id: plot.id.clone(),
                recoverable_opex: own_cost,
                occupied_area: own_occupied,
                cam_revenue: plot_bill,
            });
        }
        // Pooled recovery attributable to units without a plot.
        let plotted_occupied = plot_results
            .iter()
            .fold(zeros.clone(), |acc, p| add(&acc, &p.occupied_area));
        let unplotted = sub(&occupied_area, &plotted_occupied);
        add(&total, &allocate_pro_rata(&pooled_bill, &unplotted, &occupied_area))
    } else {
        let pooled = bill(&recoverable_opex, &occupied_area, billable_area, cfg);
        for plot in plots {
            let (own_occupied, _) = occupied_for(units, cfg, periods, |u| {
                u.plot_id.as_deref() == Some(plot.id.as_str())
            });
            plot_results.push(PlotCam {
                plot_id: plot.id.clone(),
                recoverable_opex: recoverable_for(items, costs, periods, |i| {
                    i.plot_id.as_deref() == Some(plot.id.as_str())
                }),
                cam_revenue: allocate_pro_rata(&pooled, &own_occupied, &occupied_area),
                occupied_area: own_occupied,
            });
        }
        pooled
    };

    let occupancy_pct = occupied_area
        .iter()
        .map(|o| {
            if billable_area.is_zero() {
                Decimal::ZERO
            } else {
                *o / billable_area
            }
        })
        .collect();
    let taxable_cam = if cfg.vat_class.is_taxable() {
        cam_revenue.clone()
    } else {
        zeros
    };

    CamSchedule {
        enabled: true,
        opex_net_of_cam: sub(&costs.opex, &cam_revenue),
        recoverable_opex,
        occupied_area,
        billable_area,
        occupancy_pct,
        cam_revenue,
        taxable_cam,
        plots: plot_results,
    }
}

fn allocate_pro_rata(amount: &[Money], part: &[Decimal], whole: &[Decimal]) -> Series {
    amount
        .iter()
        .zip(part.iter().zip(whole))
        .map(|(a, (p, w))| if w.is_zero() { Decimal::ZERO } else { *a * *p / *w })
        .collect()
}
