//! Flow Sentinel - Main Entry Point

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use flow_sentinel::api::EngineStatus;
use flow_sentinel::constants::{APP_NAME, APP_VERSION};
use flow_sentinel::logic::analysis_loop::{self, AnalysisLoop};
use flow_sentinel::logic::config::{CliOverrides, DetectorConfig, EnvOverrides};
use flow_sentinel::logic::model::ModelRepository;
use flow_sentinel::logic::sink::JsonLinesSink;
use flow_sentinel::logic::source::{CaptureSettings, JsonLinesSource, MeterProcess};

#[derive(Parser)]
#[command(name = "flow-sentinel", version)]
#[command(about = "Two-stage ML detection over the flows of one capture interface")]
struct Cli {
    #[arg(
        short,
        long,
        required_unless_present = "check_models",
        value_parser = parse_interface,
        help = "Capture interface to monitor"
    )]
    iface: Option<String>,

    #[arg(short, long, help = "Configuration file path (TOML)")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Model artifact directory")]
    models: Option<PathBuf>,

    #[arg(long, value_name = "CMD", help = "Flow meter command")]
    meter: Option<String>,

    #[arg(
        long,
        value_name = "PATH|-",
        help = "Replay JSON-lines flow records from a file or stdin instead of running the meter"
    )]
    input: Option<String>,

    #[arg(long, help = "Print model availability as JSON and exit")]
    check_models: bool,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,
}

fn parse_interface(raw: &str) -> Result<String, String> {
    let name = raw.trim();
    if name.is_empty() {
        Err("interface name is empty".to_string())
    } else {
        Ok(name.to_string())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    analysis_loop::install_panic_hook();

    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let file_config = match &cli.config {
        Some(path) => DetectorConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DetectorConfig::default(),
    };

    let overrides = CliOverrides {
        models: cli.models.clone(),
        meter: cli.meter.clone(),
    };
    let settings = file_config.resolve(&overrides, &EnvOverrides::from_env());

    let repository = ModelRepository::load(&settings.model_dir);

    if cli.check_models {
        println!("{}", EngineStatus::snapshot(&repository).to_json_pretty()?);
        return Ok(());
    }

    let iface = cli.iface.context("--iface is required")?;
    let mut sink = JsonLinesSink::stdout();

    let analysis = AnalysisLoop::new(iface.as_str(), &repository)
        .with_aliases(settings.aliases)
        .with_stats_interval(settings.stats_interval);

    let stats = match cli.input.as_deref() {
        Some(input) => {
            log::info!("Replaying flows from {}", if input == "-" { "stdin" } else { input });
            let mut source = JsonLinesSource::open(input)?;
            analysis.run(&mut source, &mut sink)
        }
        None => {
            let mut source = MeterProcess::spawn(
                &settings.meter,
                &settings.meter_args,
                &iface,
                &CaptureSettings::FIXED,
            )?;
            analysis.run(&mut source, &mut sink)
        }
    }
    .with_context(|| format!("flow source on {} failed", iface))?;

    log::debug!("Final stats: {}", serde_json::to_string(&stats)?);
    Ok(())
}
