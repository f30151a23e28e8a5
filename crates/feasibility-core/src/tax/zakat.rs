use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::{Money, Rate, Series};

const MONTHS: Decimal = dec!(12);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZakatBasis {
    /// Net book value of capitalized cost
    #[default]
    Nbv,
    /// Equity injected by shareholders up to the previous month
    EquityInjections,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZakatConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Annual rate, charged monthly at `rate / 12`
    #[serde(default = "default_zakat_rate")]
    pub rate: Rate,
    #[serde(default)]
    pub basis: ZakatBasis,
}

fn default_zakat_rate() -> Rate {
    dec!(0.025)
}

impl Default for ZakatConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: default_zakat_rate(),
            basis: ZakatBasis::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZakatSchedule {
    pub enabled: bool,
    pub basis: ZakatBasis,
    pub base: Series,
    pub zakat: Series,
}

fn disabled(basis: ZakatBasis, periods: usize) -> ZakatSchedule {
    ZakatSchedule {
        enabled: false,
        basis,
        base: vec![Decimal::ZERO; periods],
        zakat: vec![Decimal::ZERO; periods],
    }
}

/// Zakat on net book value.
pub fn zakat_on_nbv(cfg: &ZakatConfig, nbv: &[Money]) -> ZakatSchedule {
    if !cfg.enabled {
        return disabled(cfg.basis, nbv.len());
    }
    let monthly = cfg.rate / MONTHS;
    let base: Series = nbv.iter().map(|v| (*v).max(Decimal::ZERO)).collect();
    ZakatSchedule {
        enabled: true,
        basis: ZakatBasis::Nbv,
        zakat: base.iter().map(|b| *b * monthly).collect(),
        base,
    }
}

/// Zakat on equity injected through the previous month.
///
/// Injections cover negative project cash after zakat, so the charge and
/// the injection base are rolled forward together from the pre-zakat
/// project cash flow.
pub fn zakat_on_equity(cfg: &ZakatConfig, project_before_zakat: &[Money]) -> ZakatSchedule {
    if !cfg.enabled {
        return disabled(cfg.basis, project_before_zakat.len());
    }
    let monthly = cfg.rate / MONTHS;
    let mut injected = Decimal::ZERO;
    let mut base = Vec::with_capacity(project_before_zakat.len());
    let mut zakat = Vec::with_capacity(project_before_zakat.len());
    for cash in project_before_zakat {
        let charge = injected * monthly;
        base.push(injected);
        zakat.push(charge);
        let after = *cash - charge;
        if after < Decimal::ZERO {
            injected -= after;
        }
    }
    ZakatSchedule {
        enabled: true,
        basis: ZakatBasis::EquityInjections,
        base,
        zakat,
    }
}
