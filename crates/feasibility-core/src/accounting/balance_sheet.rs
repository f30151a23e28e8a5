use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::timeline::{add, cumulative, sub};
use crate::types::{Money, Series, TIE_OUT_TOLERANCE};

#[derive(Debug, Clone)]
pub struct BalanceSheetInputs<'a> {
    pub cash_balance: &'a [Money],
    pub accounts_receivable: &'a [Money],
    pub billings: &'a [Money],
    pub recognized_sales: &'a [Money],
    pub dsra_balance: &'a [Money],
    pub nbv: &'a [Money],
    pub vat_carryforward: &'a [Money],
    pub debt_balance: &'a [Money],
    pub vat_liability: &'a [Money],
    pub equity_injections: &'a [Money],
    pub retained_earnings: &'a [Money],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub cash: Series,
    pub accounts_receivable: Series,
    /// Revenue recognized ahead of billing
    pub contract_asset: Series,
    pub dsra: Series,
    pub nbv: Series,
    pub vat_asset: Series,
    pub assets_total: Series,
    pub debt: Series,
    /// Billings ahead of revenue recognized
    pub contract_liability: Series,
    pub vat_liability: Series,
    pub paid_in_equity: Series,
    pub retained_earnings: Series,
    pub liab_equity_total: Series,
    /// `assets_total − liab_equity_total`; reported, never corrected
    pub imbalance: Series,
    pub max_abs_imbalance: Money,
    pub first_imbalance_period: Option<usize>,
    pub tie_out_ok: bool,
}

/// Assemble both sides of the balance sheet and check they agree.
pub fn reconcile(inputs: &BalanceSheetInputs<'_>) -> BalanceSheet {
    let contract_position = sub(
        &cumulative(inputs.recognized_sales),
        &cumulative(inputs.billings),
    );
    let contract_asset: Series = contract_position
        .iter()
        .map(|p| (*p).max(Decimal::ZERO))
        .collect();
    let contract_liability: Series = contract_position
        .iter()
        .map(|p| (-*p).max(Decimal::ZERO))
        .collect();

    let other_assets: [&[Money]; 5] = [
        inputs.accounts_receivable,
        &contract_asset,
        inputs.dsra_balance,
        inputs.nbv,
        inputs.vat_carryforward,
    ];
    let assets_total = other_assets
        .into_iter()
        .fold(inputs.cash_balance.to_vec(), |acc, s| add(&acc, s));

    let paid_in_equity = cumulative(inputs.equity_injections);
    let other_claims: [&[Money]; 4] = [
        &contract_liability,
        inputs.vat_liability,
        &paid_in_equity,
        inputs.retained_earnings,
    ];
    let liab_equity_total = other_claims
        .into_iter()
        .fold(inputs.debt_balance.to_vec(), |acc, s| add(&acc, s));

    let imbalance = sub(&assets_total, &liab_equity_total);
    let max_abs_imbalance = imbalance
        .iter()
        .map(|d| d.abs())
        .max()
        .unwrap_or(Decimal::ZERO);
    let first_imbalance_period = imbalance.iter().position(|d| d.abs() >= TIE_OUT_TOLERANCE);

    BalanceSheet {
        cash: inputs.cash_balance.to_vec(),
        accounts_receivable: inputs.accounts_receivable.to_vec(),
        contract_asset,
        dsra: inputs.dsra_balance.to_vec(),
        nbv: inputs.nbv.to_vec(),
        vat_asset: inputs.vat_carryforward.to_vec(),
        assets_total,
        debt: inputs.debt_balance.to_vec(),
        contract_liability,
        vat_liability: inputs.vat_liability.to_vec(),
        paid_in_equity,
        retained_earnings: inputs.retained_earnings.to_vec(),
        liab_equity_total,
        imbalance,
        max_abs_imbalance,
        tie_out_ok: first_imbalance_period.is_none(),
        first_imbalance_period,
    }
}
