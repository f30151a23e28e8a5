pub mod csv_out;
pub mod minimal;
pub mod table;

use std::io::{self, Write};

use crate::OutputFormat;
use serde_json::Value;

/// Render a command result to stdout in the requested format.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

fn print_json(value: &Value) {
    let mut out = io::stdout().lock();
    let written = serde_json::to_writer_pretty(&mut out, value)
        .map_err(io::Error::from)
        .and_then(|_| writeln!(out));
    if let Err(e) = written {
        eprintln!("JSON output error: {}", e);
    }
}
