use serde::{Deserialize, Serialize};

use crate::equity::waterfall::EquityConfig;
use crate::financing::debt::FundingBasis;
use crate::financing::tranche::TrancheInput;
use crate::revenue::cam::{CamConfig, Plot};
use crate::revenue::escrow::EscrowConfig;
use crate::revenue::sales::UnitType;
use crate::schedule::costs::CostItem;
use crate::schedule::escalation::IndexRates;
use crate::tax::TaxConfig;
use crate::timeline::Timeline;

/// Static description of a development project: everything a run reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInput {
    #[serde(default)]
    pub name: String,
    pub timeline: Timeline,
    /// Named escalation buckets: index name to nominal annual rate
    #[serde(default)]
    pub indices: IndexRates,
    #[serde(default)]
    pub unit_types: Vec<UnitType>,
    #[serde(default)]
    pub cost_items: Vec<CostItem>,
    #[serde(default)]
    pub tranches: Vec<TrancheInput>,
    #[serde(default)]
    pub funding_basis: FundingBasis,
    #[serde(default)]
    pub escrow: EscrowConfig,
    #[serde(default)]
    pub cam: CamConfig,
    #[serde(default)]
    pub tax: TaxConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity: Option<EquityConfig>,
    #[serde(default)]
    pub plots: Vec<Plot>,
}

impl ProjectInput {
    pub fn periods(&self) -> usize {
        self.timeline.periods
    }

    pub fn from_json(raw: &str) -> crate::FeasibilityResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_minimal_project_takes_defaults() {
        let project = ProjectInput::from_json(r#"{ "timeline": { "periods": 24 } }"#).unwrap();
        assert_eq!(project.periods(), 24);
        assert!(project.unit_types.is_empty());
        assert!(project.equity.is_none());
        assert!(!project.escrow.enabled);
        assert!(!project.tax.vat.enabled);
        assert_eq!(project.funding_basis, FundingBasis::Capex);
    }

    #[test]
    fn test_tagged_policies_parse() {
        let raw = r#"{
            "timeline": { "periods": 12, "start_date": "2026-03-01" },
            "indices": { "cpi": "0.03" },
            "unit_types": [{
                "id": "apt",
                "area_sqm": "100",
                "count": "10",
                "mode": "sale",
                "price_per_sqm": "10000",
                "recognition": { "policy": "poc_cost" },
                "curve": ["0", "1", "1"]
            }, {
                "id": "shop",
                "category": "retail",
                "area_sqm": "50",
                "count": "4",
                "mode": "lease",
                "rent_per_sqm_month": "20",
                "curve": { "values": ["0.5", "1"], "start_month": 6 }
            }],
            "tranches": [{
                "id": "senior",
                "rate": "0.08",
                "ltc": "0.6",
                "tenor_months": 24,
                "amortization": "annuity",
                "dsra": { "type": "forward", "months": 6 }
            }],
            "escrow": { "enabled": true, "release": { "type": "power_law", "alpha": "1", "beta": "1" } }
        }"#;
        let project = ProjectInput::from_json(raw).unwrap();
        assert_eq!(project.unit_types.len(), 2);
        assert!(project.unit_types[0].is_sale());
        assert!(!project.unit_types[1].is_sale());
        assert_eq!(project.unit_types[1].curve.start_month, 6);
        assert_eq!(project.tranches[0].tenor_months, 24);
        assert!(project.escrow.enabled);
    }
}
