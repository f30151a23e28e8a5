use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Serialize;

use feasibility_core::time_value::{annualize_monthly, monthly_irr};
use feasibility_core::validation::collect_issues;
use feasibility_core::{ProjectInput, ValidationIssue};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

// ---------------------------------------------------------------------------
// Feasibility
// ---------------------------------------------------------------------------

/// Full pipeline run; returns the output envelope as JSON.
#[napi]
pub fn run_feasibility(input_json: String) -> NapiResult<String> {
    let output = feasibility_core::run_feasibility_json(&input_json).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Serialize)]
struct ValidationReport {
    valid: bool,
    issues: Vec<ValidationIssue>,
}

/// Schema check without running the model. Malformed JSON is an error;
/// rule violations are reported in the returned document.
#[napi]
pub fn validate_project(input_json: String) -> NapiResult<String> {
    let project = ProjectInput::from_json(&input_json).map_err(to_napi_error)?;
    let issues = collect_issues(&project);
    let report = ValidationReport {
        valid: issues.is_empty(),
        issues,
    };
    serde_json::to_string(&report).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Time value
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct IrrReport {
    monthly_irr: Option<Decimal>,
    irr: Option<Decimal>,
}

/// IRR of a JSON array of monthly flows. Both rates are null when the
/// solver does not converge.
#[napi]
pub fn solve_irr(flows_json: String) -> NapiResult<String> {
    let flows: Vec<Decimal> = serde_json::from_str(&flows_json).map_err(to_napi_error)?;
    let monthly = monthly_irr(&flows);
    let report = IrrReport {
        monthly_irr: monthly,
        irr: monthly.map(annualize_monthly),
    };
    serde_json::to_string(&report).map_err(to_napi_error)
}
