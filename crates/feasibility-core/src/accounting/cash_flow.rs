use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FeasibilityError;
use crate::timeline::{add, cumulative, sub};
use crate::types::{Money, Series};
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Finalized series from the revenue, cost, financing and tax stages.
#[derive(Debug, Clone)]
pub struct CashInputs<'a> {
    pub collections: &'a [Money],
    pub rent: &'a [Money],
    pub cam_revenue: &'a [Money],
    pub capex: &'a [Money],
    pub opex: &'a [Money],
    pub draws: &'a [Money],
    pub interest: &'a [Money],
    pub principal: &'a [Money],
    pub fees: &'a [Money],
    pub dsra_funding: &'a [Money],
    pub dsra_release: &'a [Money],
    /// Output VAT collected less input VAT paid less settlements
    pub vat_flow: &'a [Money],
    pub corporate_tax: &'a [Money],
    pub zakat: &'a [Money],
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CashFlowStatement {
    /// Collections + rent + CAM
    pub cash_revenue: Series,
    /// Unlevered, pre-tax project cash flow
    pub project_before_fin: Series,
    pub financing_flow: Series,
    pub vat_flow: Series,
    pub tax_paid: Series,
    pub zakat_paid: Series,
    /// Levered, after-tax project cash flow
    pub project: Series,
    /// Project cash excluding debt draws
    pub equity_cf: Series,
    /// Shareholder funding of negative project cash
    pub equity_injections: Series,
    /// Positive project cash available to the equity waterfall
    pub distributable: Series,
    pub cash_balance: Series,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

fn check_len(field: &str, series: &[Money], periods: usize) -> FeasibilityResult<()> {
    if series.len() != periods {
        return Err(FeasibilityError::InvalidInput {
            field: field.into(),
            reason: format!("expected {periods} periods, got {}", series.len()),
        });
    }
    Ok(())
}

impl CashInputs<'_> {
    fn validate(&self) -> FeasibilityResult<usize> {
        let periods = self.collections.len();
        for (field, series) in [
            ("rent", self.rent),
            ("cam_revenue", self.cam_revenue),
            ("capex", self.capex),
            ("opex", self.opex),
            ("draws", self.draws),
            ("interest", self.interest),
            ("principal", self.principal),
            ("fees", self.fees),
            ("dsra_funding", self.dsra_funding),
            ("dsra_release", self.dsra_release),
            ("vat_flow", self.vat_flow),
            ("corporate_tax", self.corporate_tax),
            ("zakat", self.zakat),
        ] {
            check_len(field, series, periods)?;
        }
        Ok(periods)
    }

    pub fn cash_revenue(&self) -> Series {
        add(&add(self.collections, self.rent), self.cam_revenue)
    }

    pub fn project_before_fin(&self) -> Series {
        sub(&self.cash_revenue(), &add(self.capex, self.opex))
    }

    /// Levered cash before zakat, the base for equity-basis zakat.
    pub fn project_before_zakat(&self) -> Series {
        let financing = self.financing_flow();
        let after_fin = add(&self.project_before_fin(), &financing);
        sub(&add(&after_fin, self.vat_flow), self.corporate_tax)
    }

    fn financing_flow(&self) -> Series {
        let service = add(&add(self.interest, self.principal), self.fees);
        let reserve = sub(self.dsra_funding, self.dsra_release);
        sub(&sub(self.draws, &service), &reserve)
    }
}

/// Combine operating, financing and tax cash into project and equity cash.
pub fn assemble_cash(inputs: &CashInputs<'_>) -> FeasibilityResult<CashFlowStatement> {
    inputs.validate()?;

    let project_before_fin = inputs.project_before_fin();
    let project = sub(&inputs.project_before_zakat(), inputs.zakat);
    let equity_cf = sub(&project, inputs.draws);
    let equity_injections: Series = project.iter().map(|p| (-*p).max(Decimal::ZERO)).collect();
    let distributable: Series = project.iter().map(|p| (*p).max(Decimal::ZERO)).collect();
    let cash_balance = cumulative(&add(&project, &equity_injections));

    Ok(CashFlowStatement {
        cash_revenue: inputs.cash_revenue(),
        project_before_fin,
        financing_flow: inputs.financing_flow(),
        vat_flow: inputs.vat_flow.to_vec(),
        tax_paid: inputs.corporate_tax.to_vec(),
        zakat_paid: inputs.zakat.to_vec(),
        project,
        equity_cf,
        equity_injections,
        distributable,
        cash_balance,
    })
}
