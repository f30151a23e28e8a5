use serde_json::{Map, Value};
use std::io;

type Writer<'a> = csv::Writer<io::StdoutLock<'a>>;

/// Write a command result as CSV to stdout.
///
/// Per-period statements become one row per month; everything else is a
/// two-column `field,value` listing.
pub fn print_csv(value: &Value) {
    let mut wtr = csv::Writer::from_writer(io::stdout().lock());

    let written = match value {
        Value::Array(rows) => write_rows(&mut wtr, rows),
        Value::Object(map) => match map.get("result") {
            Some(Value::Object(result)) => write_fields(&mut wtr, result),
            Some(Value::Array(rows)) => write_rows(&mut wtr, rows),
            _ => match map.get("issues") {
                Some(Value::Array(issues)) if !issues.is_empty() => write_rows(&mut wtr, issues),
                _ => write_fields(&mut wtr, map),
            },
        },
        _ => wtr.write_record([cell(value)]),
    };

    if let Err(e) = written.and_then(|_| wtr.flush().map_err(csv::Error::from)) {
        eprintln!("CSV output error: {}", e);
    }
}

fn write_fields(wtr: &mut Writer<'_>, map: &Map<String, Value>) -> csv::Result<()> {
    wtr.write_record(["field", "value"])?;
    for (key, val) in map {
        wtr.write_record([key.clone(), cell(val)])?;
    }
    Ok(())
}

fn write_rows(wtr: &mut Writer<'_>, rows: &[Value]) -> csv::Result<()> {
    let Some(Value::Object(first)) = rows.first() else {
        for item in rows {
            wtr.write_record([cell(item)])?;
        }
        return Ok(());
    };

    let headers: Vec<&String> = first.keys().collect();
    wtr.write_record(&headers)?;
    for item in rows {
        if let Value::Object(map) = item {
            let row: Vec<String> = headers
                .iter()
                .map(|h| map.get(*h).map(cell).unwrap_or_default())
                .collect();
            wtr.write_record(&row)?;
        }
    }
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
