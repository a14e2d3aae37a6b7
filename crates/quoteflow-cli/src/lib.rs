//! Quoteflow CLI Library
//!
//! Command-line interface for replaying order files into the configurator.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::format_push_string)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;
pub mod logging;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, LogFormatArg, ParseArgs, ParseFormat, RunArgs, SettingsArgs,
};
pub use config::{CliConfig, ColorChoice, LogFormat, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{AccessoryView, OrderView, ProductView, Reporter, SettingView};

/// Build configuration from parsed arguments
#[must_use]
pub fn build_config(cli: &Cli) -> CliConfig {
    CliConfig::new()
        .with_verbosity(Verbosity::from_flags(cli.quiet, cli.verbose))
        .with_color(cli.color.into())
        .with_log_format(cli.log_format.into())
}

/// Dispatch a parsed command line
///
/// # Errors
///
/// Returns the first error of the selected command.
pub fn execute(cli: &Cli) -> CliResult<()> {
    let config = build_config(cli);
    match cli.command {
        Commands::Run(ref args) => {
            logging::init(&config, Some(&args.log_file))?;
            handlers::run_command(&config, args)
        }
        Commands::Parse(ref args) => {
            logging::init(&config, None)?;
            print!("{}", handlers::parse_command(args)?);
            Ok(())
        }
        Commands::Settings(ref args) => {
            logging::init(&config, None)?;
            print!("{}", handlers::settings_command(args)?);
            Ok(())
        }
    }
}
