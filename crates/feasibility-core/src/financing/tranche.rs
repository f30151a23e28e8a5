use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::financing::dsra::DsraPolicy;
use crate::time_value::level_payment;
use crate::types::{Money, Rate, Series};

const MONTHS: Decimal = dec!(12);

// ---------------------------------------------------------------------------
// Input types
// ---------------------------------------------------------------------------

/// Principal repayment profile over the repayment window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Amortization {
    /// Whole balance at the last month of the window
    #[default]
    Bullet,
    /// Remaining balance split evenly over the remaining months
    StraightLine,
    /// Level payment: `PMT = balance × r / (1 − (1+r)^-n)`
    Annuity,
}

/// A construction or term loan facility.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheInput {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Nominal annual interest rate
    pub rate: Rate,
    /// Absolute facility commitment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commitment: Option<Money>,
    /// Loan-to-cost: share of total capex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ltc: Option<Rate>,
    /// Loan-to-value: share of gross development value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ltv: Option<Rate>,
    #[serde(default)]
    pub availability_start: usize,
    /// Last month draws are allowed; the final period if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_end: Option<usize>,
    /// First repayment month; the end of availability if absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repayment_start_month: Option<usize>,
    pub tenor_months: u32,
    #[serde(default)]
    pub amortization: Amortization,
    /// One-off fee on the facility size, charged with the first draw
    #[serde(default)]
    pub upfront_fee_pct: Rate,
    /// Annual fee on the outstanding balance
    #[serde(default)]
    pub ongoing_fee_pct: Rate,
    /// Annual fee on undrawn commitment during availability
    #[serde(default)]
    pub commitment_fee_pct: Rate,
    #[serde(default)]
    pub dsra: DsraPolicy,
    /// Lower values draw first
    #[serde(default)]
    pub draw_priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_dscr: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_icr: Option<Decimal>,
}

impl TrancheInput {
    pub fn availability_end(&self, periods: usize) -> usize {
        self.availability_end
            .unwrap_or(periods.saturating_sub(1))
            .min(periods.saturating_sub(1))
    }

    pub fn repayment_start(&self, periods: usize) -> usize {
        self.repayment_start_month
            .unwrap_or_else(|| self.availability_end(periods))
    }

    /// Last month of the repayment window (may lie past the horizon).
    ///
    /// The window is `start ..= start + tenor − 1`: a tenor counts the
    /// repayment month itself, so a bullet drawn through availability end
    /// `e` with repayment starting there repays at `e + tenor − 1`.
    pub fn repayment_end(&self, periods: usize) -> usize {
        self.repayment_start(periods) + (self.tenor_months.max(1) as usize) - 1
    }

    pub fn is_available(&self, t: usize, periods: usize) -> bool {
        t >= self.availability_start && t <= self.availability_end(periods)
    }

    /// Facility size: the smallest of the configured limits, `None` if none is set.
    pub fn facility_limit(&self, total_capex: Money, gross_development_value: Money) -> Option<Money> {
        [
            self.commitment,
            self.ltc.map(|ltc| ltc * total_capex),
            self.ltv.map(|ltv| ltv * gross_development_value),
        ]
        .into_iter()
        .flatten()
        .map(|l| l.max(Decimal::ZERO))
        .min()
    }
}

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrancheSchedule {
    pub id: String,
    pub draw_priority: u32,
    pub limit: Option<Money>,
    pub draws: Series,
    pub opening_balance: Series,
    pub interest: Series,
    pub principal: Series,
    pub upfront_fee: Series,
    pub ongoing_fee: Series,
    pub commitment_fee: Series,
    pub fees: Series,
    pub debt_service: Series,
    pub closing_balance: Series,
    pub total_drawn: Money,
    pub total_interest: Money,
    pub min_dscr: Option<Decimal>,
    pub min_icr: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Calculation
// ---------------------------------------------------------------------------

/// Roll a tranche forward given its allocated draws.
///
/// Draws land at the start of the month, so interest accrues on the
/// opening balance plus the month's draw. Principal never exceeds the
/// balance and anything outstanding at the end of the repayment window
/// is repaid in full.
pub fn schedule_tranche(input: &TrancheInput, limit: Option<Money>, draws: Series) -> TrancheSchedule {
    let periods = draws.len();
    let monthly_rate = input.rate / MONTHS;
    let rep_start = input.repayment_start(periods);
    let rep_end = input.repayment_end(periods);
    let total_drawn: Money = draws.iter().sum();
    let upfront_basis = limit.unwrap_or(total_drawn);

    let zeros = vec![Decimal::ZERO; periods];
    let mut opening_balance = zeros.clone();
    let mut interest = zeros.clone();
    let mut principal = zeros.clone();
    let mut upfront_fee = zeros.clone();
    let mut ongoing_fee = zeros.clone();
    let mut commitment_fee = zeros.clone();
    let mut closing_balance = zeros;

    let mut balance = Decimal::ZERO;
    let mut drawn_to_date = Decimal::ZERO;
    let mut fee_charged = false;

    for t in 0..periods {
        opening_balance[t] = balance;
        let draw = draws[t];
        drawn_to_date += draw;
        let bearing = balance + draw;

        if !fee_charged && draw > Decimal::ZERO {
            upfront_fee[t] = input.upfront_fee_pct * upfront_basis;
            fee_charged = true;
        }

        interest[t] = bearing * monthly_rate;

        let repay = if t < rep_start || bearing <= Decimal::ZERO {
            Decimal::ZERO
        } else if t >= rep_end {
            bearing
        } else {
            let remaining = (rep_end - t + 1) as u32;
            match input.amortization {
                Amortization::Bullet => Decimal::ZERO,
                Amortization::StraightLine => bearing / Decimal::from(remaining),
                Amortization::Annuity => {
                    (level_payment(bearing, monthly_rate, remaining) - interest[t]).max(Decimal::ZERO)
                }
            }
        };
        principal[t] = repay.min(bearing);
        balance = bearing - principal[t];
        closing_balance[t] = balance;

        ongoing_fee[t] = bearing * input.ongoing_fee_pct / MONTHS;
        if input.is_available(t, periods) {
            if let Some(limit) = limit {
                let undrawn = (limit - drawn_to_date).max(Decimal::ZERO);
                commitment_fee[t] = undrawn * input.commitment_fee_pct / MONTHS;
            }
        }
    }

    let fees: Series = (0..periods)
        .map(|t| upfront_fee[t] + ongoing_fee[t] + commitment_fee[t])
        .collect();
    let debt_service: Series = interest.iter().zip(&principal).map(|(i, p)| i + p).collect();

    TrancheSchedule {
        id: input.id.clone(),
        draw_priority: input.draw_priority,
        limit,
        total_drawn,
        total_interest: interest.iter().sum(),
        draws,
        opening_balance,
        interest,
        principal,
        upfront_fee,
        ongoing_fee,
        commitment_fee,
        fees,
        debt_service,
        closing_balance,
        min_dscr: input.min_dscr,
        min_icr: input.min_icr,
    }
}
