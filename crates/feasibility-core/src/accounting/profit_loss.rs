use serde::{Deserialize, Serialize};

use crate::timeline::{add, cumulative, sub};
use crate::types::{Money, Series};

#[derive(Debug, Clone)]
pub struct ProfitLossInputs<'a> {
    pub recognized_sales: &'a [Money],
    pub rent: &'a [Money],
    pub cam_revenue: &'a [Money],
    pub opex: &'a [Money],
    pub depreciation: &'a [Money],
    pub interest: &'a [Money],
    pub fees: &'a [Money],
    pub corporate_tax: &'a [Money],
    pub zakat: &'a [Money],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfitLoss {
    pub recognized_sales: Series,
    pub rent: Series,
    pub cam_revenue: Series,
    pub revenue: Series,
    pub opex: Series,
    pub ebitda: Series,
    pub depreciation: Series,
    pub ebit: Series,
    pub interest: Series,
    pub fees: Series,
    pub profit_before_tax: Series,
    pub corporate_tax: Series,
    pub zakat: Series,
    pub patmi: Series,
    pub retained_earnings: Series,
    pub total_patmi: Money,
}

pub fn total_revenue(recognized_sales: &[Money], rent: &[Money], cam_revenue: &[Money]) -> Series {
    add(&add(recognized_sales, rent), cam_revenue)
}

/// Revenue less opex and depreciation.
pub fn ebit(revenue: &[Money], opex: &[Money], depreciation: &[Money]) -> Series {
    sub(&sub(revenue, opex), depreciation)
}

pub fn build_profit_loss(inputs: &ProfitLossInputs<'_>) -> ProfitLoss {
    let revenue = total_revenue(inputs.recognized_sales, inputs.rent, inputs.cam_revenue);
    let ebitda = sub(&revenue, inputs.opex);
    let ebit = sub(&ebitda, inputs.depreciation);
    let profit_before_tax = sub(&sub(&ebit, inputs.interest), inputs.fees);
    let patmi = sub(&sub(&profit_before_tax, inputs.corporate_tax), inputs.zakat);
    let retained_earnings = cumulative(&patmi);

    ProfitLoss {
        recognized_sales: inputs.recognized_sales.to_vec(),
        rent: inputs.rent.to_vec(),
        cam_revenue: inputs.cam_revenue.to_vec(),
        revenue,
        opex: inputs.opex.to_vec(),
        ebitda,
        depreciation: inputs.depreciation.to_vec(),
        ebit,
        interest: inputs.interest.to_vec(),
        fees: inputs.fees.to_vec(),
        profit_before_tax,
        corporate_tax: inputs.corporate_tax.to_vec(),
        zakat: inputs.zakat.to_vec(),
        total_patmi: patmi.iter().sum(),
        patmi,
        retained_earnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn test_patmi_walk() {
        let sales = vec![dec!(1000), dec!(0)];
        let rent = vec![dec!(100), dec!(100)];
        let opex = vec![dec!(50), dec!(50)];
        let dep = vec![dec!(20), dec!(20)];
        let interest = vec![dec!(30), dec!(30)];
        let tax = vec![dec!(90), dec!(0)];
        let z = vec![Decimal::ZERO; 2];
        let pl = build_profit_loss(&ProfitLossInputs {
            recognized_sales: &sales,
            rent: &rent,
            cam_revenue: &z,
            opex: &opex,
            depreciation: &dep,
            interest: &interest,
            fees: &z,
            corporate_tax: &tax,
            zakat: &z,
        });
        assert_eq!(pl.ebit, vec![dec!(1030), dec!(30)]);
        assert_eq!(pl.patmi, vec![dec!(910), dec!(0)]);
        assert_eq!(pl.retained_earnings, vec![dec!(910), dec!(910)]);
        assert_eq!(pl.total_patmi, dec!(910));
    }
}
