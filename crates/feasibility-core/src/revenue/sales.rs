use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::revenue::escrow::EscrowRelease;
use crate::schedule::escalation::EscalationIndices;
use crate::timeline::{add, cumulative, shift, sub, Curve};
use crate::types::{Money, Series};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitCategory {
    #[default]
    Residential,
    Retail,
    Office,
    Hospitality,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatClass {
    #[default]
    Standard,
    Zero,
    Exempt,
    OutOfScope,
}

impl VatClass {
    pub fn is_taxable(&self) -> bool {
        matches!(self, VatClass::Standard)
    }
}

/// When billed sale value turns into recognized revenue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RecognitionPolicy {
    /// Everything billed to date is recognized at delivery; billings
    /// recognize as billed when no delivery month is set
    Handover {
        #[serde(default)]
        delivery_month: Option<usize>,
    },
    /// Contract value × increase in overall cost progress
    PocCost,
    /// Contract value × the unit's own sell-through curve
    PocPhysical,
    /// Recognized as billed, then capped by escrow release
    BillingsCapped,
}

/// Sale or lease terms of a unit type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Offering {
    Sale {
        price_per_sqm: Money,
        recognition: RecognitionPolicy,
        #[serde(default)]
        collection_lag_months: usize,
    },
    Lease {
        /// Monthly rent per square metre at full occupancy
        rent_per_sqm_month: Money,
    },
}

/// A sellable or leasable product line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitType {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: UnitCategory,
    pub area_sqm: Decimal,
    pub count: Decimal,
    #[serde(flatten)]
    pub offering: Offering,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub escalation_index: Option<String>,
    /// Sell-through (sale, normalized) or occupancy (lease, clamped)
    pub curve: Curve,
    #[serde(default)]
    pub vat_class: VatClass,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plot_id: Option<String>,
}

impl UnitType {
    pub fn gross_area(&self) -> Decimal {
        self.area_sqm * self.count
    }

    pub fn is_sale(&self) -> bool {
        matches!(self.offering, Offering::Sale { .. })
    }

    /// Occupied area per period: sold share to date for sale units,
    /// occupancy for lease units.
    pub fn occupied_area(&self, periods: usize) -> Series {
        let share: Series = match self.offering {
            Offering::Sale { .. } => cumulative(&self.curve.phasing(periods))
                .into_iter()
                .map(|v| v.min(Decimal::ONE))
                .collect(),
            Offering::Lease { .. } => self.curve.occupancy(periods),
        };
        share.iter().map(|s| self.gross_area() * s).collect()
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRevenue {
    pub id: String,
    pub contract_value: Money,
    pub billings: Series,
    pub collections_raw: Series,
    pub recognized_raw: Series,
    pub rent: Series,
}

/// Billings and recognition before the escrow cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRevenue {
    pub units: Vec<UnitRevenue>,
    pub billings: Series,
    pub collections: Series,
    pub recognized: Series,
    pub rent: Series,
    pub taxable_rent: Series,
    pub contract_value_total: Money,
    /// Collections and recognition of standard-rated units only
    pub taxable_collections: Series,
    pub taxable_recognized: Series,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevenueSchedule {
    pub billings: Series,
    pub collections: Series,
    pub recognized_sales: Series,
    pub rent: Series,
    pub taxable_rent: Series,
    pub accounts_receivable: Series,
    pub contract_value_total: Money,
    /// Standard-rated part of `collections`
    pub taxable_collections: Series,
    /// Standard-rated part of `recognized_sales`
    pub taxable_recognized: Series,
    /// Whether the escrow cap deferred any collections
    pub collections_capped: bool,
    /// Whether the escrow cap deferred any recognition
    pub recognition_capped: bool,
    pub units: Vec<UnitRevenue>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

fn recognize(
    policy: &RecognitionPolicy,
    billings: &[Money],
    contract_value: Money,
    progress: &[Decimal],
    sell_through: &[Decimal],
) -> Series {
    let periods = billings.len();
    match policy {
        RecognitionPolicy::Handover { delivery_month } => match delivery_month {
            None => billings.to_vec(),
            Some(d) if *d >= periods => vec![Decimal::ZERO; periods],
            Some(d) => {
                let mut out = vec![Decimal::ZERO; periods];
                out[*d] = billings[..=*d].iter().sum();
                out[*d + 1..].copy_from_slice(&billings[*d + 1..]);
                out
            }
        },
        RecognitionPolicy::PocCost => {
            let mut prev = Decimal::ZERO;
            progress
                .iter()
                .map(|p| {
                    let step = (*p - prev).max(Decimal::ZERO);
                    prev = prev.max(*p);
                    contract_value * step
                })
                .collect()
        }
        RecognitionPolicy::PocPhysical => {
            sell_through.iter().map(|w| contract_value * w).collect()
        }
        RecognitionPolicy::BillingsCapped => billings.to_vec(),
    }
}

/// Bill every unit type and apply its recognition policy.
///
/// `progress` is cumulative cost progress (cum capex / total capex).
pub fn project_billings(
    units: &[UnitType],
    indices: &EscalationIndices,
    progress: &[Decimal],
    periods: usize,
) -> RawRevenue {
    let zeros = vec![Decimal::ZERO; periods];
    let mut billings = zeros.clone();
    let mut collections = zeros.clone();
    let mut recognized = zeros.clone();
    let mut rent = zeros.clone();
    let mut taxable_rent = zeros.clone();
    let mut taxable_collections = zeros.clone();
    let mut taxable_recognized = zeros.clone();
    let mut unit_results = Vec::with_capacity(units.len());

    for unit in units {
        let escalation = indices.resolve(unit.escalation_index.as_deref(), periods);
        let result = match &unit.offering {
            Offering::Sale {
                price_per_sqm,
                recognition,
                collection_lag_months,
            } => {
                let sell_through = unit.curve.phasing(periods);
                let unit_billings: Series = sell_through
                    .iter()
                    .zip(&escalation)
                    .map(|(w, e)| unit.gross_area() * *price_per_sqm * e * w)
                    .collect();
                let contract_value: Money = unit_billings.iter().sum();
                let unit_recognized = recognize(
                    recognition,
                    &unit_billings,
                    contract_value,
                    progress,
                    &sell_through,
                );
                let unit_collections = shift(&unit_billings, *collection_lag_months);
                if unit.vat_class.is_taxable() {
                    taxable_collections = add(&taxable_collections, &unit_collections);
                    taxable_recognized = add(&taxable_recognized, &unit_recognized);
                }
                UnitRevenue {
                    id: unit.id.clone(),
                    contract_value,
                    collections_raw: unit_collections,
                    billings: unit_billings,
                    recognized_raw: unit_recognized,
                    rent: zeros.clone(),
                }
            }
            Offering::Lease { rent_per_sqm_month } => {
                let unit_rent: Series = unit
                    .curve
                    .occupancy(periods)
                    .iter()
                    .zip(&escalation)
                    .map(|(o, e)| unit.gross_area() * *rent_per_sqm_month * e * o)
                    .collect();
                if unit.vat_class.is_taxable() {
                    taxable_rent = add(&taxable_rent, &unit_rent);
                }
                UnitRevenue {
                    id: unit.id.clone(),
                    contract_value: Decimal::ZERO,
                    billings: zeros.clone(),
                    collections_raw: zeros.clone(),
                    recognized_raw: zeros.clone(),
                    rent: unit_rent,
                }
            }
        };

        billings = add(&billings, &result.billings);
        collections = add(&collections, &result.collections_raw);
        recognized = add(&recognized, &result.recognized_raw);
        rent = add(&rent, &result.rent);
        unit_results.push(result);
    }

    let contract_value_total: Money = billings.iter().sum();

    RawRevenue {
        units: unit_results,
        billings,
        collections,
        recognized,
        rent,
        taxable_rent,
        contract_value_total,
        taxable_collections,
        taxable_recognized,
    }
}

/// Standard-rated part of an escrow-capped series.
///
/// Deferred amounts wait in one pool; each release takes the pool's
/// current taxable mix, and a release that empties the pool takes all of it.
fn taxable_part(capped: &[Money], raw: &[Money], raw_taxable: &[Money]) -> Series {
    let mut pending = Decimal::ZERO;
    let mut pending_taxable = Decimal::ZERO;
    capped
        .iter()
        .zip(raw.iter().zip(raw_taxable))
        .map(|(released, (r, rt))| {
            pending += *r;
            pending_taxable += *rt;
            let taxable = if *released >= pending {
                pending_taxable
            } else if pending > Decimal::ZERO {
                *released * pending_taxable / pending
            } else {
                Decimal::ZERO
            };
            pending -= *released;
            pending_taxable -= taxable;
            taxable
        })
        .collect()
}

/// Cap collections and recognition independently by the escrow release
/// and derive accounts receivable.
pub fn build_revenue(raw: RawRevenue, escrow: &EscrowRelease) -> RevenueSchedule {
    let (collections, collections_capped) = escrow.cap(&raw.collections);
    let (recognized_sales, recognition_capped) = escrow.cap(&raw.recognized);
    let accounts_receivable = sub(&cumulative(&raw.billings), &cumulative(&collections));
    let taxable_collections = taxable_part(&collections, &raw.collections, &raw.taxable_collections);
    let taxable_recognized = taxable_part(&recognized_sales, &raw.recognized, &raw.taxable_recognized);

    RevenueSchedule {
        billings: raw.billings,
        collections,
        recognized_sales,
        rent: raw.rent,
        taxable_rent: raw.taxable_rent,
        accounts_receivable,
        contract_value_total: raw.contract_value_total,
        taxable_collections,
        taxable_recognized,
        collections_capped,
        recognition_capped,
        units: raw.units,
    }
}
