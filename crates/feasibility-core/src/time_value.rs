use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{Money, Rate};

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MONTHS_PER_YEAR: u32 = 12;

/// Net present value of monthly cash flows at a monthly rate.
///
/// `None` if the rate is at or below -100% or the discounting overflows.
pub fn npv(monthly_rate: Rate, cash_flows: &[Money]) -> Option<Money> {
    npv_and_derivative(monthly_rate, cash_flows).map(|(v, _)| v)
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
fn npv_and_derivative(rate: Rate, cash_flows: &[Money]) -> Option<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return None;
    }
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE; // (1+r)^-t

    for (t, cf) in cash_flows.iter().enumerate() {
        npv = npv.checked_add(cf.checked_mul(discount)?)?;
        if t > 0 {
            let term = Decimal::from(t as u64)
                .checked_mul(*cf)?
                .checked_mul(discount)?
                .checked_div(one_plus_r)?;
            dnpv = dnpv.checked_sub(term)?;
        }
        discount = discount.checked_div(one_plus_r)?;
    }
    Some((npv, dnpv))
}

/// Monthly internal rate of return by Newton-Raphson.
///
/// Returns `None` when the series has no sign change, the derivative
/// vanishes, or the iteration fails to converge within 100 steps.
pub fn monthly_irr(cash_flows: &[Money]) -> Option<Rate> {
    let has_positive = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_negative = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if cash_flows.len() < 2 || !has_positive || !has_negative {
        return None;
    }

    let mut rate = dec!(0.01);
    for _ in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) = npv_and_derivative(rate, cash_flows)?;

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Some(rate);
        }
        if dnpv.is_zero() {
            return None;
        }

        rate -= npv_val.checked_div(dnpv)?;

        // Guard against divergence
        if rate < dec!(-0.95) {
            rate = dec!(-0.95);
        } else if rate > dec!(10) {
            rate = dec!(10);
        }
    }
    None
}

/// Compound a monthly rate to an effective annual rate.
pub fn annualize_monthly(monthly_rate: Rate) -> Rate {
    let one_plus_r = Decimal::ONE + monthly_rate;
    let mut factor = Decimal::ONE;
    for _ in 0..MONTHS_PER_YEAR {
        factor *= one_plus_r;
    }
    factor - Decimal::ONE
}

/// Annualized IRR of a monthly cash-flow series (calls negative,
/// distributions positive). `None` if the solver fails.
pub fn annual_irr(cash_flows: &[Money]) -> Option<Rate> {
    monthly_irr(cash_flows).map(annualize_monthly)
}

/// Level payment that retires `balance` over `nper` periods at `rate`.
///
/// `PMT = balance × r / (1 − (1+r)^-n)`; a zero rate degenerates to equal
/// installments. Zero periods returns the full balance. When `(1+r)^n`
/// overflows, `(1+r)^-n` is taken as zero and the payment is interest only.
pub fn level_payment(balance: Money, rate: Rate, nper: u32) -> Money {
    if nper == 0 {
        return balance;
    }
    if rate.is_zero() {
        return balance / Decimal::from(nper);
    }
    let one_plus_r = Decimal::ONE + rate;
    let discount = (0..nper)
        .try_fold(Decimal::ONE, |acc, _| acc.checked_mul(one_plus_r))
        .and_then(|compound| Decimal::ONE.checked_div(compound))
        .unwrap_or(Decimal::ZERO);
    let denominator = Decimal::ONE - discount;
    if denominator.is_zero() {
        return balance / Decimal::from(nper);
    }
    balance * rate / denominator
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        assert_eq!(npv(Decimal::ZERO, &cfs).unwrap(), dec!(50));
    }

    #[test]
    fn test_irr_round_trip_one_call_one_distribution() {
        // Call X at t=0, receive X(1+r)^(T/12) at t=T. Recover r.
        let r = dec!(0.12);
        let periods = 24u32;
        let mut factor = Decimal::ONE;
        for _ in 0..(periods / 12) {
            factor *= Decimal::ONE + r;
        }
        let mut flows = vec![Decimal::ZERO; periods as usize + 1];
        flows[0] = dec!(-1_000_000);
        flows[periods as usize] = dec!(1_000_000) * factor;

        let irr = annual_irr(&flows).unwrap();
        assert!((irr - r).abs() < dec!(0.0001), "Expected ~12%, got {irr}");
    }

    #[test]
    fn test_irr_no_sign_change_is_none() {
        assert!(annual_irr(&[dec!(100), dec!(100)]).is_none());
        assert!(annual_irr(&[dec!(-100), dec!(0)]).is_none());
        assert!(annual_irr(&[]).is_none());
    }

    #[test]
    fn test_annualize_monthly() {
        let annual = annualize_monthly(dec!(0.01));
        assert!((annual - dec!(0.126825)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_level_payment_known_value() {
        // 1,000,000 at 8%/12 over 24 months ≈ 45,227.29
        let pmt = level_payment(dec!(1_000_000), dec!(0.08) / dec!(12), 24);
        assert!((pmt - dec!(45227.29)).abs() < dec!(0.01), "got {pmt}");
    }

    #[test]
    fn test_level_payment_zero_rate() {
        assert_eq!(level_payment(dec!(1200), Decimal::ZERO, 12), dec!(100));
    }

    #[test]
    fn test_level_payment_overflowing_compound_is_interest_only() {
        // 2^1200 overflows Decimal
        assert_eq!(level_payment(dec!(1000), dec!(1), 1200), dec!(1000));
    }
}
