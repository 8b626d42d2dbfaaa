//! Background playback controller (bpc-focus) - scenario runner
//!
//! Drives the focus controller against the simulated engine, audio manager,
//! routes and transport surface from a scripted scenario, then prints the
//! final status and decision log as JSON.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use bpc_focus::config::{Config, ConfigOverrides};
use bpc_focus::preferences::{PreferenceHub, PreferenceStore, TomlPreferenceStore};
use bpc_focus::scenario::{run_scenario, Scenario};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for bpc-focus
#[derive(Parser, Debug)]
#[command(name = "bpc-focus")]
#[command(about = "Playback focus & recovery controller scenario runner")]
#[command(version)]
struct Args {
    /// Configuration file (overrides BPC_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Scenario file to run
    #[arg(short, long, env = "BPC_SCENARIO")]
    scenario: PathBuf,

    /// Preference file (overrides the configured location)
    #[arg(long)]
    preferences: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(ConfigOverrides {
        config_path: args.config.clone(),
        preferences_path: args.preferences.clone(),
        log_level: args.log_level.clone(),
    })
    .context("Failed to load configuration")?;

    init_tracing(&config).context("Failed to initialize logging")?;

    info!("Starting bpc-focus v{}", env!("CARGO_PKG_VERSION"));
    if let Some(source) = &config.source {
        info!("Configuration: {}", source.display());
    }

    let scenario = Scenario::load(&args.scenario)
        .with_context(|| format!("Failed to load scenario {}", args.scenario.display()))?;

    let store = Arc::new(TomlPreferenceStore::new(&config.preferences_path));
    if let Some(seed) = &scenario.preferences {
        store
            .save(seed)
            .context("Failed to seed scenario preferences")?;
    }
    let preferences = Arc::new(PreferenceHub::load(store).context("Failed to load preferences")?);

    let report = run_scenario(&scenario, &config.focus, preferences)
        .await
        .context("Scenario failed")?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    println!("{}", json);

    info!("Scenario '{}' complete", report.name);
    Ok(())
}

/// Install the global subscriber: `RUST_LOG` wins over the configured level
fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("bpc_focus={0},bpc_common={0}", config.logging.level)));

    match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}
