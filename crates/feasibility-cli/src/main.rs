mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::irr::IrrArgs;
use commands::run::{RunArgs, ValidateArgs};

/// Monthly real-estate development feasibility
#[derive(Parser)]
#[command(
    name = "feas",
    version,
    about = "Monthly real-estate development feasibility engine",
    long_about = "Runs a deterministic month-by-month feasibility model for a property \
                  development: escalated costs, escrow-capped sales, leases, CAM, debt \
                  with DSRA, VAT, corporate tax, zakat, statements, equity waterfall \
                  and covenant tests. Set RUST_LOG=debug to trace each stage."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full feasibility pipeline
    Run(RunArgs),
    /// Check a project input without running it
    Validate(ValidateArgs),
    /// Annualized IRR of a monthly cash-flow series
    Irr(IrrArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Run(args) => commands::run::run_project(args, &cli.output),
        Commands::Validate(args) => commands::run::run_validate(args),
        Commands::Irr(args) => commands::irr::run_irr(args),
        Commands::Version => {
            println!("feas {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            let invalid = value.get("valid").and_then(|v| v.as_bool()) == Some(false);
            process::exit(if invalid { 2 } else { 0 });
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
