use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::schedule::costs::CostItem;
use crate::timeline::{add, cumulative, scale, shift, sub};
use crate::types::{Money, Rate, Series};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Which revenue series output VAT is charged on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VatBasis {
    /// Recognized sales
    Accrual,
    /// Collected sales
    #[default]
    Cash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_vat_rate")]
    pub rate: Rate,
    #[serde(default)]
    pub basis: VatBasis,
    /// Months between a VAT liability arising and its payment
    #[serde(default)]
    pub settlement_lag_months: usize,
}

fn default_vat_rate() -> Rate {
    dec!(0.05)
}

impl Default for VatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: default_vat_rate(),
            basis: VatBasis::default(),
            settlement_lag_months: 0,
        }
    }
}

/// Taxable supplies and purchases for the month. Sales and rent series
/// carry standard-rated units only.
#[derive(Debug, Clone)]
pub struct VatBase<'a> {
    pub taxable_recognized: &'a [Money],
    pub taxable_collections: &'a [Money],
    pub taxable_rent: &'a [Money],
    pub taxable_cam: &'a [Money],
    pub capex: &'a [Money],
    pub opex: &'a [Money],
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VatSchedule {
    pub enabled: bool,
    pub output_base: Series,
    pub output_vat: Series,
    pub input_vat: Series,
    /// Output less input VAT
    pub net_vat: Series,
    /// Net VAT owed after consuming the carryforward
    pub payable: Series,
    /// Payable settled with the authority after the settlement lag
    pub paid: Series,
    /// Recoverable VAT credit carried forward (an asset)
    pub carryforward: Series,
    /// Payable not yet settled (a liability)
    pub liability: Series,
    pub eligibility_share: Rate,
}

impl VatSchedule {
    pub fn empty(periods: usize) -> Self {
        let zeros = vec![Decimal::ZERO; periods];
        Self {
            enabled: false,
            output_base: zeros.clone(),
            output_vat: zeros.clone(),
            input_vat: zeros.clone(),
            net_vat: zeros.clone(),
            payable: zeros.clone(),
            paid: zeros.clone(),
            carryforward: zeros.clone(),
            liability: zeros,
            eligibility_share: Decimal::ZERO,
        }
    }

    /// VAT cash through the project: collected from buyers, paid on costs,
    /// settled with the authority.
    pub fn cash_flow(&self) -> Series {
        sub(&sub(&self.output_vat, &self.input_vat), &self.paid)
    }
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Share of cost items flagged as carrying recoverable input VAT.
pub fn eligibility_share(items: &[CostItem]) -> Rate {
    if items.is_empty() {
        return Decimal::ZERO;
    }
    let eligible = items.iter().filter(|i| i.vat_eligible).count();
    Decimal::from(eligible as u64) / Decimal::from(items.len() as u64)
}

/// Offset monthly net VAT against a running credit.
///
/// A negative month adds to the credit; a positive month consumes the
/// credit before anything becomes payable.
pub fn apply_carryforward(net: &[Money]) -> (Series, Series) {
    let mut credit = Decimal::ZERO;
    let mut payable = Vec::with_capacity(net.len());
    let mut balance = Vec::with_capacity(net.len());
    for n in net {
        if *n < Decimal::ZERO {
            credit -= *n;
            payable.push(Decimal::ZERO);
        } else {
            let used = credit.min(*n);
            credit -= used;
            payable.push(*n - used);
        }
        balance.push(credit);
    }
    (payable, balance)
}

pub fn compute_vat(cfg: &VatConfig, items: &[CostItem], base: &VatBase<'_>) -> VatSchedule {
    let periods = base.capex.len();
    if !cfg.enabled {
        return VatSchedule::empty(periods);
    }

    let sales = match cfg.basis {
        VatBasis::Accrual => base.taxable_recognized,
        VatBasis::Cash => base.taxable_collections,
    };
    let output_base = add(&add(sales, base.taxable_rent), base.taxable_cam);
    let output_vat = scale(&output_base, cfg.rate);

    let share = eligibility_share(items);
    let input_vat = scale(&add(base.capex, base.opex), cfg.rate * share);

    let net_vat = sub(&output_vat, &input_vat);
    let (payable, carryforward) = apply_carryforward(&net_vat);
    let paid = shift(&payable, cfg.settlement_lag_months);
    let liability = sub(&cumulative(&payable), &cumulative(&paid));

    VatSchedule {
        enabled: true,
        output_base,
        output_vat,
        input_vat,
        net_vat,
        payable,
        paid,
        carryforward,
        liability,
        eligibility_share: share,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Curve;
    use pretty_assertions::assert_eq;

    fn item(eligible: bool) -> CostItem {
        CostItem {
            id: "c".into(),
            name: String::new(),
            is_opex: false,
            base_amount: dec!(100),
            phasing: Curve::stretched(vec![dec!(1)]),
            escalation_index: None,
            vat_eligible: eligible,
            depreciation: None,
            plot_id: None,
            recoverable: false,
        }
    }

    #[test]
    fn test_carryforward_consumed_before_payable() {
        let (payable, credit) = apply_carryforward(&[dec!(-50), dec!(-20), dec!(30), dec!(60)]);
        assert_eq!(payable, vec![dec!(0), dec!(0), dec!(0), dec!(20)]);
        assert_eq!(credit, vec![dec!(50), dec!(70), dec!(40), dec!(0)]);
    }

    #[test]
    fn test_cash_basis_output_on_collections() {
        let zeros = vec![Decimal::ZERO; 3];
        let collections = vec![dec!(0), dec!(1000), dec!(2000)];
        let cfg = VatConfig {
            enabled: true,
            ..VatConfig::default()
        };
        let vat = compute_vat(
            &cfg,
            &[item(false)],
            &VatBase {
                taxable_recognized: &zeros,
                taxable_collections: &collections,
                taxable_rent: &zeros,
                taxable_cam: &zeros,
                capex: &zeros,
                opex: &zeros,
            },
        );
        assert_eq!(vat.output_vat, vec![dec!(0), dec!(50), dec!(100)]);
        assert_eq!(vat.payable, vat.output_vat);
        assert_eq!(vat.liability, zeros);
    }

    #[test]
    fn test_input_vat_scaled_by_eligible_share_and_settlement_lag() {
        let zeros = vec![Decimal::ZERO; 3];
        let sales = vec![dec!(0), dec!(0), dec!(4000)];
        let capex = vec![dec!(1000), dec!(0), dec!(0)];
        let cfg = VatConfig {
            enabled: true,
            rate: dec!(0.1),
            basis: VatBasis::Accrual,
            settlement_lag_months: 1,
        };
        let vat = compute_vat(
            &cfg,
            &[item(true), item(false)],
            &VatBase {
                taxable_recognized: &sales,
                taxable_collections: &zeros,
                taxable_rent: &zeros,
                taxable_cam: &zeros,
                capex: &capex,
                opex: &zeros,
            },
        );
        assert_eq!(vat.eligibility_share, dec!(0.5));
        assert_eq!(vat.input_vat, vec![dec!(50), dec!(0), dec!(0)]);
        assert_eq!(vat.carryforward, vec![dec!(50), dec!(50), dec!(0)]);
        assert_eq!(vat.payable, vec![dec!(0), dec!(0), dec!(350)]);
        // Paid a month later, so still owed at the horizon
        assert_eq!(vat.paid, zeros);
        assert_eq!(vat.liability[2], dec!(350));
    }

    #[test]
    fn test_disabled_is_all_zero() {
        let zeros = vec![Decimal::ZERO; 2];
        let vat = compute_vat(
            &VatConfig::default(),
            &[item(true)],
            &VatBase {
                taxable_recognized: &zeros,
                taxable_collections: &zeros,
                taxable_rent: &zeros,
                taxable_cam: &zeros,
                capex: &zeros,
                opex: &zeros,
            },
        );
        assert!(!vat.enabled);
        assert_eq!(vat.cash_flow(), zeros);
    }
}
