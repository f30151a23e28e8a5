use clap::Args;
use serde_json::{json, Map, Value};

use feasibility_core::validation::collect_issues;
use feasibility_core::{run_feasibility, ProjectInput};

use crate::input;
use crate::OutputFormat;

const STATEMENTS: [&str; 14] = [
    "escalation",
    "costs",
    "escrow",
    "revenue",
    "cam",
    "depreciation",
    "financing",
    "tax",
    "cash",
    "profit_loss",
    "balance_sheet",
    "equity",
    "covenants",
    "kpis",
];

/// Arguments for a full feasibility run
#[derive(Args)]
pub struct RunArgs {
    /// Path to JSON or YAML project file
    #[arg(long)]
    pub input: Option<String>,

    /// Emit one statement only; nested blocks use dots (e.g. "tax.vat")
    #[arg(long)]
    pub statement: Option<String>,
}

/// Arguments for input validation
#[derive(Args)]
pub struct ValidateArgs {
    /// Path to JSON or YAML project file
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_project(
    args: RunArgs,
    format: &OutputFormat,
) -> Result<Value, Box<dyn std::error::Error>> {
    let document = input::read_document(args.input.as_deref())?;
    let project: ProjectInput = serde_json::from_value(document)?;
    let output = run_feasibility(&project)?;
    let mut envelope = serde_json::to_value(output)?;

    if let Some(ref name) = args.statement {
        return select_statement(&envelope, name, format);
    }

    // Period series do not fit a field/value table
    if *format != OutputFormat::Json {
        if let Some(kpis) = envelope.pointer("/result/kpis").cloned() {
            envelope["result"] = kpis;
        }
    }
    Ok(envelope)
}

pub fn run_validate(args: ValidateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let document = input::read_document(args.input.as_deref())?;
    let project: ProjectInput = serde_json::from_value(document)?;
    let issues = collect_issues(&project);
    Ok(json!({
        "valid": issues.is_empty(),
        "periods": project.periods(),
        "issue_count": issues.len(),
        "issues": issues,
    }))
}

fn select_statement(
    envelope: &Value,
    name: &str,
    format: &OutputFormat,
) -> Result<Value, Box<dyn std::error::Error>> {
    let pointer = format!("/result/{}", name.replace('.', "/"));
    let statement = envelope.pointer(&pointer).ok_or_else(|| {
        format!(
            "Unknown statement '{}'; expected one of: {}",
            name,
            STATEMENTS.join(", ")
        )
    })?;

    match format {
        OutputFormat::Json | OutputFormat::Minimal => Ok(statement.clone()),
        OutputFormat::Table | OutputFormat::Csv => {
            let dates = envelope
                .pointer("/result/period_dates")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            Ok(statement_rows(statement, &dates))
        }
    }
}

/// Pivot a statement of per-period series into one row per month.
/// Scalars and nested blocks are left out; non-object statements pass through.
fn statement_rows(statement: &Value, dates: &[Value]) -> Value {
    let Value::Object(map) = statement else {
        return statement.clone();
    };
    let periods = dates.len();

    let columns: Vec<(&String, &Vec<Value>)> = map
        .iter()
        .filter_map(|(key, value)| match value {
            Value::Array(items)
                if items.len() == periods
                    && items.iter().all(|i| !i.is_object() && !i.is_array()) =>
            {
                Some((key, items))
            }
            _ => None,
        })
        .collect();

    let rows = dates
        .iter()
        .enumerate()
        .map(|(t, date)| {
            let mut row = Map::new();
            row.insert("period".to_string(), Value::from(t));
            row.insert("date".to_string(), date.clone());
            for (key, items) in &columns {
                row.insert((*key).clone(), items[t].clone());
            }
            Value::Object(row)
        })
        .collect();
    Value::Array(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_statement_rows_pivot_series() {
        let statement = json!({
            "interest": ["10", "20"],
            "total": "30",
            "tranches": [{ "id": "a" }, { "id": "b" }],
        });
        let dates = vec![json!("2026-01-31"), json!("2026-02-28")];
        let rows = statement_rows(&statement, &dates);

        assert_eq!(
            rows,
            json!([
                { "period": 0, "date": "2026-01-31", "interest": "10" },
                { "period": 1, "date": "2026-02-28", "interest": "20" },
            ])
        );
    }

    #[test]
    fn test_unknown_statement_is_an_error() {
        let envelope = json!({ "result": { "cash": {}, "period_dates": [] } });
        assert!(select_statement(&envelope, "cash", &OutputFormat::Json).is_ok());
        let err = select_statement(&envelope, "ledger", &OutputFormat::Json).unwrap_err();
        assert!(err.to_string().contains("Unknown statement 'ledger'"));
    }

    #[test]
    fn test_nested_statement_by_dotted_name() {
        let envelope = json!({ "result": { "tax": { "vat": { "liability": ["1"] } } } });
        let vat = select_statement(&envelope, "tax.vat", &OutputFormat::Minimal).unwrap();
        assert_eq!(vat, json!({ "liability": ["1"] }));
    }
}
