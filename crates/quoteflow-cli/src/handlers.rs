//! Command handlers

use crate::commands::{ParseArgs, ParseFormat, RunArgs, SettingsArgs};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};
use crate::output::OrderView;
use quoteflow::{ConfigParser, Configuration, Credentials, Settings};
use std::path::Path;

/// Settings from an optional file, defaults otherwise
///
/// # Errors
///
/// Fails when the file cannot be read or holds invalid values.
pub fn load_settings(path: Option<&Path>) -> CliResult<Settings> {
    let settings = match path {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.validate()?;
    Ok(settings)
}

/// Read and parse an order file
///
/// # Errors
///
/// Fails when the file cannot be read.
pub fn load_order(path: &Path, section: &str) -> CliResult<Configuration> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::config(format!("cannot read order file {}: {e}", path.display())))?;
    Ok(ConfigParser::new().with_section(section).parse(&text))
}

/// `quoteflow parse`
///
/// # Errors
///
/// Fails when the order file cannot be read or rendered.
pub fn parse_command(args: &ParseArgs) -> CliResult<String> {
    let section = args
        .section
        .clone()
        .unwrap_or_else(|| quoteflow::DEFAULT_SECTION.to_string());
    let config = load_order(&args.config, &section)?;
    tracing::debug!(
        products = config.products().len(),
        settings = config.settings().len(),
        "order parsed"
    );
    let view = OrderView::new(&config, &section);
    match args.format {
        ParseFormat::Text => Ok(view.to_text()),
        ParseFormat::Json => serde_json::to_string_pretty(&view)
            .map(|mut s| {
                s.push('\n');
                s
            })
            .map_err(|e| CliError::report_generation(e.to_string())),
        ParseFormat::Yaml => {
            serde_yaml_ng::to_string(&view).map_err(|e| CliError::report_generation(e.to_string()))
        }
    }
}

/// `quoteflow settings`
///
/// # Errors
///
/// Fails when the settings file is unusable.
pub fn settings_command(args: &SettingsArgs) -> CliResult<String> {
    let settings = load_settings(args.settings.as_deref())?;
    Ok(settings.to_yaml()?)
}

/// Settings for `run`: file, then command-line overrides
///
/// # Errors
///
/// Fails when the settings file is unusable.
pub fn run_settings(args: &RunArgs) -> CliResult<Settings> {
    let mut settings = load_settings(args.settings.as_deref())?;
    if args.headless {
        settings.headless = true;
    }
    if let Some(ref path) = args.chromium_path {
        settings.chromium_path = Some(path.clone());
    }
    if let Some(ref dir) = args.output_dir {
        settings.output_dir = dir.clone();
    }
    Ok(settings)
}

/// `quoteflow run`
///
/// Inputs are loaded and checked before the browser starts.
///
/// # Errors
///
/// Fails when an input is unusable, the browser cannot start, or the run aborts.
pub fn run_command(config: &CliConfig, args: &RunArgs) -> CliResult<()> {
    let settings = run_settings(args)?;
    let order = load_order(&args.config, &settings.section)?;
    let credentials = Credentials::load(&args.account)?;
    tracing::info!(
        products = order.products().len(),
        config = %args.config.display(),
        "order loaded"
    );
    replay(config, args, &settings, &order, &credentials)
}

#[cfg(feature = "browser")]
fn replay(
    config: &CliConfig,
    args: &RunArgs,
    settings: &Settings,
    order: &Configuration,
    credentials: &Credentials,
) -> CliResult<()> {
    use crate::output::Reporter;
    use quoteflow::{run_session, CdpDriver, RunContext};

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(async {
        let driver = CdpDriver::launch(settings).await?;
        let ctx = RunContext::default();
        Ok::<_, CliError>(run_session(&driver, settings, &ctx, order, credentials).await)
    })?;

    let reporter = Reporter::new(config.color.should_color(), config.verbosity.is_quiet());
    reporter.report(&report);

    if let Some(ref path) = args.report {
        let json = report
            .to_json()
            .map_err(|e| CliError::report_generation(e.to_string()))?;
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "report written");
    }

    if report.aborted() {
        return Err(CliError::aborted(
            report
                .fatal
                .unwrap_or_else(|| "workflow did not complete".to_string()),
        ));
    }
    Ok(())
}

#[cfg(not(feature = "browser"))]
fn replay(
    _config: &CliConfig,
    _args: &RunArgs,
    _settings: &Settings,
    _order: &Configuration,
    _credentials: &Credentials,
) -> CliResult<()> {
    Err(CliError::config(
        "browser support not enabled. Rebuild with --features browser",
    ))
}
