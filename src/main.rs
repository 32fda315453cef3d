use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use camels_attrs::config::{CONFIG_ENV_VAR, Config};
use camels_attrs::export::{self, ExportFormat, ExportOptions};
use camels_attrs::extractor::{CamelsExtractor, StageStatus};
use camels_attrs::logging::{self, DataSource, LogLevel};
use camels_attrs::stations;

/// Extract CAMELS catchment attributes for USGS stream gauges.
#[derive(Debug, Parser)]
#[command(name = "camels-extract", version, about)]
struct Cli {
    /// USGS site numbers (8-15 digits)
    #[arg(required_unless_present = "samples")]
    gauges: Vec<String>,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,

    /// Output format; inferred from the output extension when omitted
    #[arg(short, long)]
    format: Option<ExportFormat>,

    /// TOML configuration file
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    #[arg(long, value_name = "YYYY-MM-DD")]
    climate_start: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    climate_end: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    hydro_start: Option<String>,
    #[arg(long, value_name = "YYYY-MM-DD")]
    hydro_end: Option<String>,

    /// Lattice points sampled inside each basin
    #[arg(long)]
    sample_points: Option<usize>,

    /// Also run the built-in regional sample gauges
    #[arg(long)]
    samples: bool,

    /// Omit the imputed_attributes column
    #[arg(long)]
    no_provenance: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Append log output to this file
    #[arg(long)]
    log_file: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = Config::load(path).with_context(|| format!("loading {}", path.display()))?;
            config.apply_env_overrides()?;
            config
        }
        None => Config::from_env()?,
    };

    let extraction = &mut config.extraction;
    let overrides = [
        (&cli.climate_start, &mut extraction.climate_start),
        (&cli.climate_end, &mut extraction.climate_end),
        (&cli.hydro_start, &mut extraction.hydro_start),
        (&cli.hydro_end, &mut extraction.hydro_end),
    ];
    for (value, field) in overrides {
        if let Some(value) = value {
            *field = value.clone();
        }
    }
    if let Some(n) = cli.sample_points {
        anyhow::ensure!(n > 0, "--sample-points must be positive");
        extraction.sample_points = n;
    }

    config.climate_range().context("climate period")?;
    config.hydro_range().context("streamflow period")?;
    Ok(config)
}

/// Site number, plus the label and region for sample gauges.
fn describe(gauge_id: &str) -> String {
    match stations::find_sample(gauge_id) {
        Some(sample) => format!("{} ({}, {})", gauge_id, sample.label, sample.region),
        None => gauge_id.to_string(),
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let level = if cli.verbose {
        LogLevel::Debug
    } else {
        config.logging.level.parse().map_err(anyhow::Error::msg)?
    };
    let log_file = cli.log_file.as_deref().or(config.logging.file.as_deref());
    logging::init_logger(level, log_file, config.logging.timestamps).context("initializing logger")?;

    let mut gauges = cli.gauges.clone();
    if cli.samples {
        for code in stations::sample_site_codes() {
            if !gauges.iter().any(|g| g == code) {
                gauges.push(code.to_string());
            }
        }
    }

    let extractor = CamelsExtractor::from_config(&config)?;
    let records = if let [gauge_id] = gauges.as_slice() {
        let extraction = extractor.extract(gauge_id)?;
        println!("{}", describe(gauge_id));
        for stage in &extraction.stages {
            match &stage.status {
                StageStatus::Completed { attributes, imputed } => {
                    println!("  {:<11} {:>3} attributes ({} imputed)", stage.stage, attributes, imputed)
                }
                StageStatus::Failed(e) => println!("  {:<11} failed: {}", stage.stage, e),
            }
        }
        vec![extraction.record]
    } else {
        let batch = extractor.extract_multiple(gauges.as_slice())?;
        for failure in &batch.failures {
            println!("  {} skipped: {}", describe(&failure.gauge_id), failure.reason);
        }
        batch.records
    };

    let imputed: usize = records.iter().map(|r| r.imputed_names().len()).sum();
    if imputed > 0 {
        println!(
            "  note: {} attribute value(s) are imputed defaults; add [layers] entries to measure soil, land cover and geology",
            imputed
        );
    }

    let format = cli
        .format
        .or_else(|| ExportFormat::from_path(&cli.output))
        .unwrap_or_default();
    let options = ExportOptions { include_provenance: !cli.no_provenance };
    export::save(&cli.output, &records, format, options)
        .with_context(|| format!("writing {}", cli.output.display()))?;

    logging::info(
        DataSource::System,
        None,
        &format!("Wrote {} row(s) to {} ({})", records.len(), cli.output.display(), format),
    );
    println!("Saved {} gauge(s) to {}", records.len(), cli.output.display());
    Ok(())
}
