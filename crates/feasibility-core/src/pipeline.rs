use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::accounting::balance_sheet::{reconcile, BalanceSheet, BalanceSheetInputs};
use crate::accounting::cash_flow::{assemble_cash, CashFlowStatement, CashInputs};
use crate::accounting::depreciation::{build_depreciation, DepreciationSchedule};
use crate::accounting::profit_loss::{build_profit_loss, ebit, total_revenue, ProfitLoss, ProfitLossInputs};
use crate::credit::covenants::{test_covenants, CovenantInputs, CovenantReport};
use crate::equity::metrics::irr_or_warn;
use crate::equity::waterfall::{run_waterfall, EquityWaterfall};
use crate::financing::debt::{build_financing, FinancingSchedule, FundingInputs};
use crate::project::ProjectInput;
use crate::revenue::cam::{allocate_cam, CamSchedule};
use crate::revenue::escrow::{build_release_curve, EscrowRelease};
use crate::revenue::sales::{build_revenue, project_billings, RevenueSchedule};
use crate::schedule::costs::{build_cost_schedule, CostSchedule};
use crate::schedule::escalation::{build_indices, EscalationIndices};
use crate::tax::corporate::compute_corporate_tax;
use crate::tax::vat::{compute_vat, VatBase};
use crate::tax::zakat::{zakat_on_equity, zakat_on_nbv, ZakatBasis};
use crate::tax::TaxSchedule;
use crate::timeline::{add, cumulative};
use crate::types::{with_metadata, ComputationOutput, Coverage, Money, Rate};
use crate::validation::validate_project;
use crate::FeasibilityResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// Headline figures for the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityKpis {
    /// Unlevered, pre-tax
    pub project_irr: Option<Rate>,
    /// Levered, after-tax project cash with injections as outflows
    pub equity_irr: Option<Rate>,
    /// Largest cumulative shareholder funding requirement
    pub peak_equity: Money,
    pub total_capex: Money,
    pub total_opex: Money,
    pub gross_development_value: Money,
    pub total_profit: Money,
    /// Total profit over total development and operating cost
    pub profit_on_cost: Option<Rate>,
    pub min_dscr: Coverage,
    pub covenant_breach_periods: usize,
    pub tie_out_ok: bool,
}

/// Every stage's record for one run, assembled by composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeasibilityOutput {
    pub period_dates: Vec<NaiveDate>,
    pub escalation: EscalationIndices,
    pub costs: CostSchedule,
    pub escrow: EscrowRelease,
    pub revenue: RevenueSchedule,
    pub cam: CamSchedule,
    pub depreciation: DepreciationSchedule,
    pub financing: FinancingSchedule,
    pub tax: TaxSchedule,
    pub cash: CashFlowStatement,
    pub profit_loss: ProfitLoss,
    pub balance_sheet: BalanceSheet,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equity: Option<EquityWaterfall>,
    pub covenants: CovenantReport,
    pub kpis: FeasibilityKpis,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Validate a project and run every stage in dependency order.
///
/// Validation failures abort before any stage runs. Past that point the
/// run always completes; a failed balance-sheet tie-out is reported in
/// `balance_sheet.tie_out_ok` and the warnings, never raised.
pub fn run_feasibility(
    project: &ProjectInput,
) -> FeasibilityResult<ComputationOutput<FeasibilityOutput>> {
    validate_project(project)?;

    let mut warnings: Vec<String> = Vec::new();
    let periods = project.periods();
    let zeros = project.timeline.zeros();

    log::debug!("escalation: {} indices over {periods} periods", project.indices.len());
    let indices = build_indices(&project.indices, periods);

    log::debug!("costs: {} items", project.cost_items.len());
    let costs = build_cost_schedule(&project.cost_items, &indices, periods);
    let progress = costs.cost_progress();

    log::debug!("escrow: enabled={}", project.escrow.enabled);
    let raw = project_billings(&project.unit_types, &indices, &progress, periods);
    let escrow = build_release_curve(&project.escrow, &progress, raw.contract_value_total);

    log::debug!("revenue: {} unit types", project.unit_types.len());
    let revenue = build_revenue(raw, &escrow);
    if revenue.collections_capped {
        log::warn!("collections truncated by escrow release");
        warnings.push("Collections truncated by escrow release cap".into());
    }
    if revenue.recognition_capped {
        log::warn!("recognized revenue truncated by escrow release");
        warnings.push("Recognized revenue truncated by escrow release cap".into());
    }

    log::debug!("cam: enabled={}", project.cam.enabled);
    let cam = allocate_cam(
        &project.cam,
        &project.unit_types,
        &project.cost_items,
        &costs,
        &project.plots,
    );

    log::debug!("depreciation");
    let depreciation = build_depreciation(&project.cost_items, &costs);

    log::debug!("financing: {} tranches", project.tranches.len());
    let gross_development_value = revenue.contract_value_total + revenue.rent.iter().sum::<Money>();
    let operating_inflows = add(&add(&revenue.collections, &revenue.rent), &cam.cam_revenue);
    let financing = build_financing(
        &project.tranches,
        project.funding_basis,
        &FundingInputs {
            capex: &costs.capex,
            opex: &costs.opex,
            operating_inflows: &operating_inflows,
            total_capex: costs.total_capex,
            gross_development_value,
        },
    );
    if financing.unmet_need.iter().any(|n| *n > Decimal::ZERO) {
        log::debug!("debt capacity exhausted; remaining need falls to equity");
    }

    log::debug!("tax");
    let pl_revenue = total_revenue(&revenue.recognized_sales, &revenue.rent, &cam.cam_revenue);
    let operating_ebit = ebit(&pl_revenue, &costs.opex, &depreciation.charge);
    let vat = compute_vat(
        &project.tax.vat,
        &project.cost_items,
        &VatBase {
            taxable_recognized: &revenue.taxable_recognized,
            taxable_collections: &revenue.taxable_collections,
            taxable_rent: &revenue.taxable_rent,
            taxable_cam: &cam.taxable_cam,
            capex: &costs.capex,
            opex: &costs.opex,
        },
    );
    let finance_costs = add(&financing.interest, &financing.fees);
    let corporate = compute_corporate_tax(&project.tax.corporate, &operating_ebit, &finance_costs);
    let vat_flow = vat.cash_flow();

    let pre_zakat = CashInputs {
        collections: &revenue.collections,
        rent: &revenue.rent,
        cam_revenue: &cam.cam_revenue,
        capex: &costs.capex,
        opex: &costs.opex,
        draws: &financing.draws,
        interest: &financing.interest,
        principal: &financing.principal,
        fees: &financing.fees,
        dsra_funding: &financing.dsra_funding,
        dsra_release: &financing.dsra_release,
        vat_flow: &vat_flow,
        corporate_tax: &corporate.tax,
        zakat: &zeros,
    };

    let zakat = match project.tax.zakat.basis {
        ZakatBasis::Nbv => zakat_on_nbv(&project.tax.zakat, &depreciation.nbv),
        ZakatBasis::EquityInjections => {
            zakat_on_equity(&project.tax.zakat, &pre_zakat.project_before_zakat())
        }
    };

    log::debug!("cash assembly");
    let cash = assemble_cash(&CashInputs {
        zakat: &zakat.zakat,
        ..pre_zakat
    })?;

    log::debug!("profit and loss");
    let profit_loss = build_profit_loss(&ProfitLossInputs {
        recognized_sales: &revenue.recognized_sales,
        rent: &revenue.rent,
        cam_revenue: &cam.cam_revenue,
        opex: &costs.opex,
        depreciation: &depreciation.charge,
        interest: &financing.interest,
        fees: &financing.fees,
        corporate_tax: &corporate.tax,
        zakat: &zakat.zakat,
    });

    log::debug!("balance sheet");
    let balance_sheet = reconcile(&BalanceSheetInputs {
        cash_balance: &cash.cash_balance,
        accounts_receivable: &revenue.accounts_receivable,
        billings: &revenue.billings,
        recognized_sales: &revenue.recognized_sales,
        dsra_balance: &financing.dsra_balance,
        nbv: &depreciation.nbv,
        vat_carryforward: &vat.carryforward,
        debt_balance: &financing.debt_balance,
        vat_liability: &vat.liability,
        equity_injections: &cash.equity_injections,
        retained_earnings: &profit_loss.retained_earnings,
    });
    if !balance_sheet.tie_out_ok {
        let period = balance_sheet.first_imbalance_period.unwrap_or_default();
        log::warn!(
            "balance sheet does not tie out: max imbalance {} first at period {period}",
            balance_sheet.max_abs_imbalance
        );
        warnings.push(format!(
            "Balance sheet does not tie out (max imbalance {}, first at period {period}); do not rely on KPIs",
            balance_sheet.max_abs_imbalance
        ));
    }

    log::debug!("equity waterfall");
    let equity = project.equity.as_ref().map(|cfg| {
        run_waterfall(
            cfg,
            &cash.equity_injections,
            &cash.distributable,
            &project.timeline.quarter_end_flags(),
            &mut warnings,
        )
    });

    log::debug!("covenants");
    let covenants = test_covenants(
        &CovenantInputs {
            cash_revenue: &cash.cash_revenue,
            opex: &costs.opex,
            corporate_tax: &corporate.tax,
            zakat: &zakat.zakat,
            ebit: &operating_ebit,
        },
        &financing,
    );
    if covenants.total_breach_periods > 0 {
        warnings.push(format!(
            "Covenants breached in {} period(s), first at period {}",
            covenants.total_breach_periods,
            covenants.first_breach.unwrap_or_default()
        ));
    }

    let kpis = build_kpis(
        &cash,
        &costs,
        &profit_loss,
        &covenants,
        gross_development_value,
        balance_sheet.tie_out_ok,
        &mut warnings,
    );

    let output = FeasibilityOutput {
        period_dates: project.timeline.period_dates(),
        escalation: indices,
        costs,
        escrow,
        revenue,
        cam,
        depreciation,
        financing,
        tax: TaxSchedule {
            vat,
            corporate,
            zakat,
        },
        cash,
        profit_loss,
        balance_sheet,
        equity,
        covenants,
        kpis,
    };

    Ok(with_metadata(
        "Monthly real-estate development feasibility with escrow-capped revenue, debt waterfall, tax stack, balance-sheet tie-out and equity waterfall",
        project,
        warnings,
        periods,
        output,
    ))
}

fn build_kpis(
    cash: &CashFlowStatement,
    costs: &CostSchedule,
    profit_loss: &ProfitLoss,
    covenants: &CovenantReport,
    gross_development_value: Money,
    tie_out_ok: bool,
    warnings: &mut Vec<String>,
) -> FeasibilityKpis {
    let peak_equity = cumulative(&cash.project)
        .iter()
        .map(|c| -*c)
        .max()
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO);
    let total_cost = costs.total_capex + costs.total_opex;
    let profit_on_cost = if total_cost > Decimal::ZERO {
        Some(profit_loss.total_patmi / total_cost)
    } else {
        None
    };

    FeasibilityKpis {
        project_irr: irr_or_warn(&cash.project_before_fin, "Project", warnings),
        equity_irr: irr_or_warn(&cash.project, "Levered project", warnings),
        peak_equity,
        total_capex: costs.total_capex,
        total_opex: costs.total_opex,
        gross_development_value,
        total_profit: profit_loss.total_patmi,
        profit_on_cost,
        min_dscr: covenants.portfolio.min_dscr,
        covenant_breach_periods: covenants.total_breach_periods,
        tie_out_ok,
    }
}

/// Parse a JSON project and run it.
pub fn run_feasibility_json(raw: &str) -> FeasibilityResult<ComputationOutput<FeasibilityOutput>> {
    let project = ProjectInput::from_json(raw)?;
    run_feasibility(&project)
}
