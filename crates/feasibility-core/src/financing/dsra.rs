use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Series};

/// How the debt service reserve target is sized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DsraPolicy {
    #[default]
    None,
    /// Debt service due over the next `months` months
    Forward { months: usize },
    /// Debt service paid over the last `months` months, including the current one
    Trailing { months: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsraSchedule {
    pub target: Series,
    pub funding: Series,
    pub release: Series,
    pub balance: Series,
}

impl DsraSchedule {
    pub fn empty(periods: usize) -> Self {
        let zeros = vec![Decimal::ZERO; periods];
        Self {
            target: zeros.clone(),
            funding: zeros.clone(),
            release: zeros.clone(),
            balance: zeros,
        }
    }
}

fn window_sum(values: &[Money], from: usize, to_inclusive: usize) -> Money {
    if from >= values.len() {
        return Decimal::ZERO;
    }
    values[from..=to_inclusive.min(values.len() - 1)].iter().sum()
}

/// Size the reserve each month, funding shortfalls and releasing excess.
///
/// The target drops to zero once the loan is retired, which releases the
/// whole reserve at maturity.
pub fn build_dsra(policy: DsraPolicy, debt_service: &[Money], closing_balance: &[Money]) -> DsraSchedule {
    let periods = debt_service.len();
    if matches!(policy, DsraPolicy::None) {
        return DsraSchedule::empty(periods);
    }

    let target: Series = (0..periods)
        .map(|t| {
            if closing_balance[t] <= Decimal::ZERO {
                return Decimal::ZERO;
            }
            match policy {
                DsraPolicy::None => Decimal::ZERO,
                DsraPolicy::Forward { months } if months > 0 => {
                    window_sum(debt_service, t + 1, t + months)
                }
                DsraPolicy::Trailing { months } if months > 0 => {
                    window_sum(debt_service, (t + 1).saturating_sub(months), t)
                }
                _ => Decimal::ZERO,
            }
        })
        .collect();

    let mut funding = vec![Decimal::ZERO; periods];
    let mut release = vec![Decimal::ZERO; periods];
    let mut prev = Decimal::ZERO;
    for t in 0..periods {
        let gap = target[t] - prev;
        if gap > Decimal::ZERO {
            funding[t] = gap;
        } else {
            release[t] = -gap;
        }
        prev = target[t];
    }

    DsraSchedule {
        balance: target.clone(),
        target,
        funding,
        release,
    }
}
