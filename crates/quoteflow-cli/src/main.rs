//! Quoteflow CLI: replay an order file into the H3C iConfig configurator
//!
//! ## Usage
//!
//! ```bash
//! quoteflow parse --config Config.txt          # Show what would be entered
//! quoteflow run --config Config.txt --headless # Enter the order
//! quoteflow settings > quoteflow.yaml          # Dump the default settings
//! ```

use clap::Parser;
use quoteflow_cli::{execute, Cli};
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
