use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use feasibility_core::time_value::{annualize_monthly, monthly_irr};

/// Arguments for the standalone IRR solver
#[derive(Args)]
pub struct IrrArgs {
    /// Monthly cash flows (comma-separated, e.g. "-1000,0,0,1100")
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub flows: Vec<Decimal>,
}

pub fn run_irr(args: IrrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let monthly = monthly_irr(&args.flows)
        .ok_or("IRR did not converge; flows need at least one sign change")?;
    Ok(json!({
        "irr": annualize_monthly(monthly),
        "monthly_irr": monthly,
        "periods": args.flows.len(),
    }))
}
