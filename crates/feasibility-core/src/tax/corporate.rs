use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate, Series};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorporateTaxConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_corporate_rate")]
    pub rate: Rate,
    /// Finance costs deductible up to this share of positive EBIT; uncapped if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interest_cap_pct: Option<Rate>,
    /// Carry tax losses forward against future profit
    #[serde(default = "default_true")]
    pub nol_enabled: bool,
}

fn default_corporate_rate() -> Rate {
    dec!(0.09)
}

fn default_true() -> bool {
    true
}

impl Default for CorporateTaxConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: default_corporate_rate(),
            interest_cap_pct: None,
            nol_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorporateTaxSchedule {
    pub enabled: bool,
    pub ebit: Series,
    pub finance_costs: Series,
    pub allowed_finance_costs: Series,
    pub disallowed_finance_costs: Series,
    /// EBIT less allowed finance costs, before loss relief
    pub taxable_income: Series,
    pub nol_used: Series,
    pub nol_balance: Series,
    pub tax: Series,
}

/// Corporate income tax with an interest-deductibility cap and loss carryforward.
pub fn compute_corporate_tax(
    cfg: &CorporateTaxConfig,
    ebit: &[Money],
    finance_costs: &[Money],
) -> CorporateTaxSchedule {
    let periods = ebit.len();
    let zeros = vec![Decimal::ZERO; periods];
    if !cfg.enabled {
        return CorporateTaxSchedule {
            enabled: false,
            ebit: ebit.to_vec(),
            finance_costs: finance_costs.to_vec(),
            allowed_finance_costs: finance_costs.to_vec(),
            disallowed_finance_costs: zeros.clone(),
            taxable_income: zeros.clone(),
            nol_used: zeros.clone(),
            nol_balance: zeros.clone(),
            tax: zeros,
        };
    }

    let mut allowed = Vec::with_capacity(periods);
    let mut disallowed = Vec::with_capacity(periods);
    let mut taxable_income = Vec::with_capacity(periods);
    let mut nol_used = Vec::with_capacity(periods);
    let mut nol_balance = Vec::with_capacity(periods);
    let mut tax = Vec::with_capacity(periods);
    let mut nol = Decimal::ZERO;

    for (e, fc) in ebit.iter().zip(finance_costs) {
        let cap = match cfg.interest_cap_pct {
            Some(pct) => (pct * *e).max(Decimal::ZERO),
            None => *fc,
        };
        let ok = (*fc).min(cap).max(Decimal::ZERO);
        let taxable = *e - ok;

        let (used, chargeable) = if taxable < Decimal::ZERO {
            if cfg.nol_enabled {
                nol -= taxable;
            }
            (Decimal::ZERO, Decimal::ZERO)
        } else {
            let used = nol.min(taxable);
            nol -= used;
            (used, taxable - used)
        };

        allowed.push(ok);
        disallowed.push(*fc - ok);
        taxable_income.push(taxable);
        nol_used.push(used);
        nol_balance.push(nol);
        tax.push((chargeable * cfg.rate).max(Decimal::ZERO));
    }

    CorporateTaxSchedule {
        enabled: true,
        ebit: ebit.to_vec(),
        finance_costs: finance_costs.to_vec(),
        allowed_finance_costs: allowed,
        disallowed_finance_costs: disallowed,
        taxable_income,
        nol_used,
        nol_balance,
        tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn enabled(cap: Option<Rate>) -> CorporateTaxConfig {
        CorporateTaxConfig {
            enabled: true,
            rate: dec!(0.1),
            interest_cap_pct: cap,
            nol_enabled: true,
        }
    }

    #[test]
    fn test_losses_carried_forward_then_consumed() {
        let ebit = vec![dec!(-300), dec!(100), dec!(400)];
        let fc = vec![Decimal::ZERO; 3];
        let ct = compute_corporate_tax(&enabled(None), &ebit, &fc);
        assert_eq!(ct.nol_balance, vec![dec!(300), dec!(200), dec!(0)]);
        assert_eq!(ct.nol_used, vec![dec!(0), dec!(100), dec!(200)]);
        assert_eq!(ct.tax, vec![dec!(0), dec!(0), dec!(20)]);
    }

    #[test]
    fn test_interest_cap_adds_back_excess() {
        let ebit = vec![dec!(1000)];
        let fc = vec![dec!(500)];
        let ct = compute_corporate_tax(&enabled(Some(dec!(0.3))), &ebit, &fc);
        assert_eq!(ct.allowed_finance_costs, vec![dec!(300)]);
        assert_eq!(ct.disallowed_finance_costs, vec![dec!(200)]);
        assert_eq!(ct.taxable_income, vec![dec!(700)]);
        assert_eq!(ct.tax, vec![dec!(70)]);
    }

    #[test]
    fn test_negative_ebit_allows_no_interest_under_cap() {
        let ct = compute_corporate_tax(&enabled(Some(dec!(0.3))), &[dec!(-100)], &[dec!(50)]);
        assert_eq!(ct.allowed_finance_costs, vec![dec!(0)]);
        assert_eq!(ct.nol_balance, vec![dec!(100)]);
    }

    #[test]
    fn test_nol_disabled_forfeits_losses() {
        let cfg = CorporateTaxConfig {
            nol_enabled: false,
            ..enabled(None)
        };
        let ct = compute_corporate_tax(&cfg, &[dec!(-100), dec!(100)], &[dec!(0), dec!(0)]);
        assert_eq!(ct.tax, vec![dec!(0), dec!(10)]);
    }
}
