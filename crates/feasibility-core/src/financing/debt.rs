use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::financing::dsra::{build_dsra, DsraSchedule};
use crate::financing::tranche::{schedule_tranche, TrancheInput, TrancheSchedule};
use crate::timeline::{add, sub};
use crate::types::{Money, Series};

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// What the debt stack is asked to fund each month.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingBasis {
    /// Development capex as spent
    #[default]
    Capex,
    /// Capex plus opex less operating cash inflows, floored at zero
    CashDeficit,
}

/// Everything the financing waterfall reads from earlier stages.
#[derive(Debug, Clone)]
pub struct FundingInputs<'a> {
    pub capex: &'a [Money],
    pub opex: &'a [Money],
    /// Collections + rent + CAM
    pub operating_inflows: &'a [Money],
    pub total_capex: Money,
    pub gross_development_value: Money,
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheResult {
    #[serde(flatten)]
    pub schedule: TrancheSchedule,
    pub dsra: DsraSchedule,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancingSchedule {
    pub funding_basis: FundingBasis,
    pub funding_need: Series,
    /// Need left after every tranche has drawn (funded by equity)
    pub unmet_need: Series,
    pub draws: Series,
    pub interest: Series,
    pub principal: Series,
    pub fees: Series,
    pub debt_service: Series,
    pub debt_balance: Series,
    pub dsra_funding: Series,
    pub dsra_release: Series,
    pub dsra_balance: Series,
    /// In draw-priority order
    pub tranches: Vec<TrancheResult>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

pub fn funding_need(basis: FundingBasis, inputs: &FundingInputs<'_>) -> Series {
    match basis {
        FundingBasis::Capex => inputs.capex.iter().map(|c| (*c).max(Decimal::ZERO)).collect(),
        FundingBasis::CashDeficit => inputs
            .capex
            .iter()
            .zip(inputs.opex)
            .zip(inputs.operating_inflows)
            .map(|((c, o), i)| (c + o - i).max(Decimal::ZERO))
            .collect(),
    }
}

/// Fill each month's need from the tranches in priority order.
///
/// A tranche draws only inside its availability window and never past its
/// facility limit; need it cannot meet passes to the next tranche.
pub fn allocate_draws(
    tranches: &[&TrancheInput],
    need: &[Money],
    limits: &[Option<Money>],
) -> (Vec<Series>, Series) {
    let periods = need.len();
    let mut remaining = need.to_vec();
    let mut allocations = Vec::with_capacity(tranches.len());

    for (tranche, limit) in tranches.iter().zip(limits) {
        let mut draws = vec![Decimal::ZERO; periods];
        let mut headroom = *limit;
        for t in 0..periods {
            if !tranche.is_available(t, periods) || remaining[t] <= Decimal::ZERO {
                continue;
            }
            let draw = match headroom {
                Some(h) => remaining[t].min(h),
                None => remaining[t],
            };
            if draw <= Decimal::ZERO {
                continue;
            }
            draws[t] = draw;
            remaining[t] -= draw;
            if let Some(h) = headroom.as_mut() {
                *h -= draw;
            }
        }
        allocations.push(draws);
    }
    (allocations, remaining)
}

/// Run the debt waterfall: allocate draws by priority, schedule every
/// tranche with its reserve, and aggregate.
pub fn build_financing(
    tranches: &[TrancheInput],
    basis: FundingBasis,
    inputs: &FundingInputs<'_>,
) -> FinancingSchedule {
    let periods = inputs.capex.len();
    let need = funding_need(basis, inputs);

    let mut ordered: Vec<&TrancheInput> = tranches.iter().collect();
    ordered.sort_by_key(|t| t.draw_priority);
    let limits: Vec<Option<Money>> = ordered
        .iter()
        .map(|t| t.facility_limit(inputs.total_capex, inputs.gross_development_value))
        .collect();
    let (allocations, unmet_need) = allocate_draws(&ordered, &need, &limits);

    let zeros = vec![Decimal::ZERO; periods];
    let mut out = FinancingSchedule {
        funding_basis: basis,
        funding_need: need,
        unmet_need,
        draws: zeros.clone(),
        interest: zeros.clone(),
        principal: zeros.clone(),
        fees: zeros.clone(),
        debt_service: zeros.clone(),
        debt_balance: zeros.clone(),
        dsra_funding: zeros.clone(),
        dsra_release: zeros.clone(),
        dsra_balance: zeros,
        tranches: Vec::with_capacity(ordered.len()),
    };

    for ((input, limit), draws) in ordered.iter().zip(limits).zip(allocations) {
        let schedule = schedule_tranche(input, limit, draws);
        let dsra = build_dsra(input.dsra, &schedule.debt_service, &schedule.closing_balance);
        log::debug!(
            "tranche {}: drawn {} of limit {:?}",
            schedule.id,
            schedule.total_drawn,
            limit
        );

        out.draws = add(&out.draws, &schedule.draws);
        out.interest = add(&out.interest, &schedule.interest);
        out.principal = add(&out.principal, &schedule.principal);
        out.fees = add(&out.fees, &schedule.fees);
        out.debt_service = add(&out.debt_service, &schedule.debt_service);
        out.debt_balance = add(&out.debt_balance, &schedule.closing_balance);
        out.dsra_funding = add(&out.dsra_funding, &dsra.funding);
        out.dsra_release = add(&out.dsra_release, &dsra.release);
        out.dsra_balance = add(&out.dsra_balance, &dsra.balance);
        out.tranches.push(TrancheResult { schedule, dsra });
    }

    out
}

impl FinancingSchedule {
    /// Net cash from the debt stack before tax: draws less service, fees and
    /// reserve movements.
    pub fn net_financing_flow(&self) -> Series {
        let service = add(&add(&self.interest, &self.principal), &self.fees);
        let reserve = sub(&self.dsra_funding, &self.dsra_release);
        sub(&sub(&self.draws, &service), &reserve)
    }
}
