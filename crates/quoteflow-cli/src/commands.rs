//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Quoteflow: replay an order file into the H3C iConfig configurator
#[derive(Parser, Debug)]
#[command(name = "quoteflow")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// Log line format
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormatArg,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay the order into the configurator with a real browser
    Run(RunArgs),

    /// Parse the order file and print what would be entered
    Parse(ParseArgs),

    /// Print the effective settings as YAML
    Settings(SettingsArgs),
}

/// Arguments for the run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Order file
    #[arg(short, long, default_value = "Config.txt")]
    pub config: PathBuf,

    /// Credential file (`username：…` and `password：…` lines)
    #[arg(short, long, default_value = "Account.txt")]
    pub account: PathBuf,

    /// Settings file (YAML); defaults apply when omitted
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long)]
    pub headless: bool,

    /// Chromium executable
    #[arg(long)]
    pub chromium_path: Option<PathBuf>,

    /// Directory for diagnostic snapshots
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Write the run report as JSON
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log file, truncated at start
    #[arg(long, default_value = "log.txt")]
    pub log_file: PathBuf,
}

/// Arguments for the parse command
#[derive(Parser, Debug)]
pub struct ParseArgs {
    /// Order file
    #[arg(short, long, default_value = "Config.txt")]
    pub config: PathBuf,

    /// Name of the line that starts the product section
    #[arg(long)]
    pub section: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: ParseFormat,
}

/// Arguments for the settings command
#[derive(Parser, Debug)]
pub struct SettingsArgs {
    /// Settings file (YAML)
    #[arg(short, long)]
    pub settings: Option<PathBuf>,
}

/// Output format of the parse command
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParseFormat {
    /// Indented tree
    #[default]
    Text,
    /// JSON document
    Json,
    /// YAML document
    Yaml,
}

/// Color argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorArg {
    /// Auto-detect terminal
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

/// Log format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormatArg {
    /// Human-readable lines
    #[default]
    Text,
    /// JSON lines
    Json,
}

impl From<LogFormatArg> for crate::config::LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}
