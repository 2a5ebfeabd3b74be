use fuzzdata_core::config::FuzzdataConfig;
use fuzzdata_core::replay::{ReplayInput, load_inputs, replay, synthetic_input};

use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "fuzzdata.toml";

/// Replays fuzz inputs through provider operations and prints what each
/// operation produced.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(short, long, value_parser)]
    config_file: Option<PathBuf>,
    /// Seed for the synthetic input used when no INPUT is given.
    #[clap(long, default_value_t = 0)]
    seed: u64,
    /// Length of the synthetic input.
    #[clap(long, default_value_t = 64)]
    len: usize,
    #[clap(long)]
    pretty: bool,
    #[clap(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    /// Input files or corpus directories.
    inputs: Vec<PathBuf>,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(config_file: Option<PathBuf>) -> Result<FuzzdataConfig, anyhow::Error> {
    match config_file {
        Some(config_path) => {
            info!("Loading configuration from specified path: {config_path:?}");
            FuzzdataConfig::load_from_file(&config_path)
        }
        None => {
            let default_config_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_config_path.exists() {
                info!("No config file specified, loading default: {default_config_path:?}");
                FuzzdataConfig::load_from_file(&default_config_path)
            } else {
                debug!("No config file found, using built-in recipe");
                Ok(FuzzdataConfig::default())
            }
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(cli.config_file)?;
    let settings = config.replay;
    let pretty = cli.pretty || settings.pretty;

    let inputs: Vec<ReplayInput> = if cli.inputs.is_empty() {
        vec![synthetic_input(cli.seed, cli.len)]
    } else {
        load_inputs(&cli.inputs)?
    };
    if inputs.is_empty() {
        anyhow::bail!("No input files found in {:?}", cli.inputs);
    }

    info!(
        "Replaying {} input(s) through {} step(s)",
        inputs.len(),
        settings.steps.len()
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for input in &inputs {
        let report = replay(input, &settings.steps, settings.stop_on_exhaustion)?;
        let rendered = if pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };
        writeln!(out, "{rendered}")?;
    }
    out.flush()?;

    Ok(())
}
