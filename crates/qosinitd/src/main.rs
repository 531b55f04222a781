//! qosinitd entry point.
//!
//! Loads the QoS configuration, waits for the platform to register its
//! ports and provisions maps, scheduler profiles and scheduler trees.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use sonic_qosinitd::{
    MemoryStore, Provisioner, ProvisionerConfig, QosInitConfig, RunReport, SimTopology, DEFAULT_CONFIG_PATH,
};

/// SONiC QoS initialization
#[derive(Parser, Debug)]
#[command(name = "qosinitd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// QoS configuration file
    #[arg(short = 'c', long, env = "QOS_CFG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Switch the objects are created on
    #[arg(long, default_value = "0")]
    switch_id: u32,

    /// Interval between polls of the port source and the store
    #[arg(long, default_value = "1000")]
    poll_interval_ms: u64,

    /// Only re-apply the scheduler tree to these interfaces
    #[arg(short = 'i', long, value_delimiter = ',')]
    interfaces: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Run against an in-process store seeded from this topology file
    #[arg(long)]
    simulate: Option<PathBuf>,
}

/// Initialize tracing/logging.
fn init_logging(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

async fn run(args: &Args, topology: &Path) -> anyhow::Result<RunReport> {
    let config = QosInitConfig::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let topology = SimTopology::load(topology)?;
    let store = MemoryStore::from_topology(args.switch_id, &topology)?;

    let provisioner_config = ProvisionerConfig::default()
        .with_switch_id(args.switch_id)
        .with_poll_interval(Duration::from_millis(args.poll_interval_ms));
    let provisioner = Provisioner::new(&store, &store, provisioner_config);

    if !args.interfaces.is_empty() {
        info!("Restricting scheduler setup to {:?}", args.interfaces);
        return Ok(provisioner.init_interfaces(&config, &args.interfaces).await?);
    }

    provisioner.wait_for_register().await;
    Ok(provisioner.run(&config).await)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(&args.log_level);

    info!("--- Starting qosinitd (Rust) ---");
    info!("Configuration: {}", args.config.display());

    let Some(topology) = args.simulate.clone() else {
        error!("No object store backend available; run with --simulate <topology.json>");
        return ExitCode::FAILURE;
    };
    warn!("Running against simulated store from {}", topology.display());

    match run(&args, &topology).await {
        Ok(report) if report.succeeded() => {
            info!("qosinitd finished: {}", report);
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!("qosinitd finished with errors: {}", report);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("qosinitd error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
