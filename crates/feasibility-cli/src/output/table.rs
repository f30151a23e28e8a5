use colored::Colorize;
use serde_json::{Map, Value};
use tabled::{builder::Builder, settings::Style, Table};

/// Render a command result as terminal tables.
pub fn print_table(value: &Value) {
    match value {
        Value::Object(map) if map.contains_key("result") => print_envelope(map),
        Value::Object(map) if map.contains_key("issues") => print_validation(map),
        Value::Object(map) => println!("{}", field_table(map)),
        Value::Array(rows) => print_rows(rows),
        _ => println!("{}", value),
    }
}

fn print_envelope(envelope: &Map<String, Value>) {
    match envelope.get("result") {
        Some(Value::Object(result)) => println!("{}", field_table(result)),
        Some(Value::Array(rows)) => print_rows(rows),
        Some(other) => println!("{}", format_value(other)),
        None => {}
    }

    if let Some(Value::Array(warnings)) = envelope.get("warnings") {
        if !warnings.is_empty() {
            println!("\n{}", "Warnings:".yellow().bold());
            for w in warnings.iter().filter_map(Value::as_str) {
                println!("  - {}", w);
            }
        }
    }

    if let Some(Value::String(meth)) = envelope.get("methodology") {
        println!("\nMethodology: {}", meth);
    }
}

fn print_validation(report: &Map<String, Value>) {
    let valid = report.get("valid").and_then(Value::as_bool).unwrap_or(false);
    if valid {
        println!("{}", "Project input is valid".green().bold());
        return;
    }

    let count = report.get("issue_count").and_then(Value::as_u64).unwrap_or(0);
    println!("{}", format!("{} validation issue(s)", count).red().bold());
    if let Some(Value::Array(issues)) = report.get("issues") {
        print_rows(issues);
    }
}

fn field_table(map: &Map<String, Value>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(["Field", "Value"]);
    for (key, val) in map {
        builder.push_record([key.as_str(), &format_value(val)]);
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    table
}

/// One column per key of the first row; used for per-period statements.
fn print_rows(rows: &[Value]) {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            println!("{}", format_value(item));
        }
        return;
    };

    let headers: Vec<String> = first.keys().cloned().collect();
    let mut builder = Builder::default();
    builder.push_record(headers.iter().map(String::as_str));
    for item in rows {
        if let Value::Object(map) = item {
            builder.push_record(
                headers
                    .iter()
                    .map(|h| map.get(h).map(format_value).unwrap_or_default()),
            );
        }
    }
    let mut table = builder.build();
    table.with(Style::rounded());
    println!("{}", table);
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "-".to_string(),
        Value::Array(arr) => arr.iter().map(format_value).collect::<Vec<_>>().join(", "),
        Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
