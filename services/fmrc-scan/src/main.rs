//! FMRC inventory scanner.
//!
//! Walks a directory of per-run inventory summaries, builds a forecast
//! model run collection (optionally against an expected-inventory
//! definition) and prints completeness reports.

mod config;
mod output;
mod scan;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fmrc_common::{format_run_time, FmrcError, ValidTime};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use config::ScanConfig;
use output::Format;

#[derive(Parser, Debug)]
#[command(name = "fmrc-scan")]
#[command(about = "Inventory and completeness reports for forecast model run collections")]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "FMRC_SCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of run summaries (overrides the config file)
    #[arg(short, long, env = "FMRC_DATA_DIR")]
    dir: Option<PathBuf>,

    /// Collection name
    #[arg(short, long)]
    name: Option<String>,

    /// Expected-inventory definition (XML)
    #[arg(long, env = "FMRC_DEFINITION")]
    definition: Option<PathBuf>,

    /// Report on a single variable
    #[arg(long)]
    variable: Option<String>,

    /// With --variable, list levels at this offset hour
    #[arg(long, requires = "variable")]
    offset_hour: Option<f64>,

    /// With --variable, list one run's inventory (ISO 8601 run time)
    #[arg(long, requires = "variable", conflicts_with = "offset_hour")]
    run_time: Option<String>,

    /// Output format: json, yaml or text
    #[arg(short, long)]
    format: Option<String>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write a definition derived from the scanned runs
    #[arg(long)]
    derive_definition: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "FMRC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: json or pretty
    #[arg(long)]
    log_format: Option<String>,
}

impl Args {
    /// Configuration file settings with command-line overrides applied.
    fn resolve_config(&self) -> Result<ScanConfig> {
        let mut config = match &self.config {
            Some(path) => ScanConfig::load(path)?,
            None => {
                let dir = self
                    .dir
                    .clone()
                    .context("Either --config or --dir is required")?;
                let name = dir
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "fmrc".to_string());
                let mut config = ScanConfig::for_dir(name, dir);
                config.inventory = fmrc_inventory::InventoryConfig::from_env();
                config
            }
        };

        if let Some(dir) = &self.dir {
            config.data_dir = dir.clone();
        }
        if let Some(name) = &self.name {
            config.name = name.clone();
        }
        if let Some(definition) = &self.definition {
            config.definition = Some(definition.clone());
        }
        if let Some(format) = &self.format {
            config.output.format = format.to_lowercase();
        }
        if let Some(path) = &self.output {
            config.output.path = Some(path.clone());
        }
        if let Some(path) = &self.derive_definition {
            config.output.derived_definition = Some(path.clone());
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.to_lowercase();
        }
        if let Some(format) = &self.log_format {
            config.logging.format = format.to_lowercase();
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(config: &config::LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Reports go to stdout, logs to stderr
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    if config.format == "pretty" {
        builder.pretty().init();
    } else {
        builder.json().init();
    }
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let config = args.resolve_config()?;
    init_tracing(&config.logging);

    info!(
        name = %config.name,
        dir = %config.data_dir.display(),
        unknown_variables = %config.inventory.unknown_variables,
        "Starting fmrc scan"
    );

    let definition = scan::load_definition(&config)?;
    let result = scan::scan(&config, definition)?;
    let collection = &result.collection;
    let format = Format::parse(&config.output.format)?;

    let rendered = match (&args.variable, args.offset_hour, &args.run_time) {
        (Some(variable), Some(offset_hour), _) => {
            if collection.axes().offset_index(offset_hour).is_none() {
                return Err(FmrcError::UnknownOffset(offset_hour).into());
            }
            let report = collection
                .offset_hour_report(variable, offset_hour)
                .ok_or_else(|| FmrcError::UnknownVariable(variable.clone()))?;
            output::render_offset_hour(&report, format)?
        }
        (Some(variable), None, Some(run_time)) => {
            let run_time = ValidTime::from_iso8601(run_time).map_err(FmrcError::from)?;
            let entry = collection
                .grid(variable)
                .ok_or_else(|| FmrcError::UnknownVariable(variable.clone()))?
                .find_run(run_time)
                .with_context(|| {
                    format!("{} has no run at {}", variable, format_run_time(run_time))
                })?;
            output::render_run_inventory(&output::RunInventory::new(variable, entry), format)?
        }
        (Some(variable), None, None) => {
            let report = collection
                .variable_report(variable)
                .ok_or_else(|| FmrcError::UnknownVariable(variable.clone()))?;
            output::render_variable(&report, format)?
        }
        (None, _, _) => output::render_collection(&collection.report(), &result.stats, format)?,
    };
    output::write_output(&rendered, config.output.path.as_deref())?;

    if let Some(path) = &config.output.derived_definition {
        collection
            .derive_definition()
            .write_xml(path)
            .with_context(|| format!("Failed to write derived definition {:?}", path))?;
        info!(path = %path.display(), "Wrote derived definition");
    }

    Ok(())
}
