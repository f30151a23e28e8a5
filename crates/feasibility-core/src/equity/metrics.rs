use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::time_value::annual_irr;
use crate::types::{Money, Multiple, Rate};

/// Fund-style return metrics over the whole horizon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundMetrics {
    pub lp_irr: Option<Rate>,
    pub gp_irr: Option<Rate>,
    pub total_irr: Option<Rate>,
    pub paid_in: Money,
    pub distributed: Money,
    /// Cash held back from distribution at the horizon
    pub residual_value: Money,
    /// LP distributions / LP paid-in
    pub moic: Option<Multiple>,
    pub dpi: Option<Multiple>,
    pub rvpi: Option<Multiple>,
    pub tvpi: Option<Multiple>,
}

fn ratio(numerator: Money, denominator: Money) -> Option<Multiple> {
    if denominator <= Decimal::ZERO {
        None
    } else {
        Some(numerator / denominator)
    }
}

fn has_sign_change(flows: &[Money]) -> bool {
    flows.iter().any(|f| *f > Decimal::ZERO) && flows.iter().any(|f| *f < Decimal::ZERO)
}

/// Annualized IRR; records a warning when a solvable series fails to converge.
pub fn irr_or_warn(flows: &[Money], label: &str, warnings: &mut Vec<String>) -> Option<Rate> {
    let irr = annual_irr(flows);
    if irr.is_none() && has_sign_change(flows) {
        log::warn!("{label} IRR did not converge");
        warnings.push(format!("{label} IRR did not converge"));
    }
    irr
}

/// Net flows (distributions positive, calls negative) and totals per side.
pub struct MetricFlows<'a> {
    pub lp: &'a [Money],
    pub gp: &'a [Money],
    pub total: &'a [Money],
    pub lp_paid_in: Money,
    pub lp_distributed: Money,
    pub paid_in: Money,
    pub distributed: Money,
    pub residual_value: Money,
}

pub fn fund_metrics(flows: &MetricFlows<'_>, warnings: &mut Vec<String>) -> FundMetrics {
    let dpi = ratio(flows.distributed, flows.paid_in);
    let rvpi = ratio(flows.residual_value, flows.paid_in);
    let tvpi = ratio(flows.distributed + flows.residual_value, flows.paid_in);
    FundMetrics {
        lp_irr: irr_or_warn(flows.lp, "LP", warnings),
        gp_irr: irr_or_warn(flows.gp, "GP", warnings),
        total_irr: irr_or_warn(flows.total, "Equity", warnings),
        paid_in: flows.paid_in,
        distributed: flows.distributed,
        residual_value: flows.residual_value,
        moic: ratio(flows.lp_distributed, flows.lp_paid_in),
        dpi,
        rvpi,
        tvpi,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_multiples() {
        let lp = vec![dec!(-100), dec!(150)];
        let none = vec![Decimal::ZERO; 2];
        let mut warnings = Vec::new();
        let m = fund_metrics(
            &MetricFlows {
                lp: &lp,
                gp: &none,
                total: &lp,
                lp_paid_in: dec!(100),
                lp_distributed: dec!(150),
                paid_in: dec!(100),
                distributed: dec!(150),
                residual_value: dec!(50),
            },
            &mut warnings,
        );
        assert_eq!(m.moic, Some(dec!(1.5)));
        assert_eq!(m.dpi, Some(dec!(1.5)));
        assert_eq!(m.rvpi, Some(dec!(0.5)));
        assert_eq!(m.tvpi, Some(dec!(2)));
        assert!(m.lp_irr.is_some());
        assert_eq!(m.gp_irr, None);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_no_paid_in_gives_no_multiples() {
        let z = vec![Decimal::ZERO];
        let m = fund_metrics(
            &MetricFlows {
                lp: &z,
                gp: &z,
                total: &z,
                lp_paid_in: Decimal::ZERO,
                lp_distributed: Decimal::ZERO,
                paid_in: Decimal::ZERO,
                distributed: Decimal::ZERO,
                residual_value: Decimal::ZERO,
            },
            &mut Vec::new(),
        );
        assert_eq!(m.dpi, None);
        assert_eq!(m.tvpi, None);
    }
}
