pub mod corporate;
pub mod vat;
pub mod zakat;

use serde::{Deserialize, Serialize};

use crate::tax::corporate::{CorporateTaxConfig, CorporateTaxSchedule};
use crate::tax::vat::{VatConfig, VatSchedule};
use crate::tax::zakat::{ZakatConfig, ZakatSchedule};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaxConfig {
    #[serde(default)]
    pub vat: VatConfig,
    #[serde(default)]
    pub corporate: CorporateTaxConfig,
    #[serde(default)]
    pub zakat: ZakatConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxSchedule {
    pub vat: VatSchedule,
    pub corporate: CorporateTaxSchedule,
    pub zakat: ZakatSchedule,
}
