//! xchain-deployer CLI
//!
//! Runs provisioning operations against the chains described in a state file:
//!
//! ```text
//! xchain-deployer --config config.json -m target-deploy-eccd,target-deploy-eccm
//! xchain-deployer --list
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use deployer::chain::EvmConnector;
use deployer::{registry, runner, ClientFactory, Provisioner, RuntimeConfig, StateStore, Vault};

#[derive(Parser, Debug)]
#[command(name = "xchain-deployer")]
#[command(about = "Deploy and wire cross-chain bridge contracts", long_about = None)]
struct Cli {
    /// Provisioning state file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Operations to run, comma separated; all registered operations when omitted
    #[arg(short = 'm', long = "methods", value_delimiter = ',')]
    methods: Vec<String>,

    /// 0 trace, 1 debug, 2 info, 3 warn, 4 error (RUST_LOG takes precedence)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(0..=4))]
    loglevel: u8,

    /// Print the registered operations and exit
    #[arg(long)]
    list: bool,
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_logging(cli.loglevel);

    let all_succeeded = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli))?;

    if !all_succeeded {
        std::process::exit(1);
    }
    Ok(())
}

async fn async_main(cli: Cli) -> eyre::Result<bool> {
    let registry = registry()?;

    if cli.list {
        for op in registry.operations() {
            println!("{:<32} {}", op.name, op.kind);
        }
        return Ok(true);
    }

    let runtime = RuntimeConfig::load()?;
    let store = StateStore::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        poll_interval_ms = runtime.confirmation.poll_interval.as_millis() as u64,
        timeout_secs = runtime.confirmation.timeout.map(|t| t.as_secs()),
        cache_policy = ?runtime.cache_policy,
        "Starting xchain-deployer"
    );

    let cancel = CancellationToken::new();
    tokio::spawn(watch_interrupts(cancel.clone()));

    let vault = Vault::interactive(runtime.cache_policy, &store.session_cache_path());
    let connector = Arc::new(EvmConnector::new(runtime.confirmation, cancel.clone()));
    let mut provisioner = Provisioner::new(store, ClientFactory::new(vault, connector));

    let methods = selected_methods(cli.methods);
    let report = runner::run(&registry, &mut provisioner, &methods, &cancel).await;
    report.log_summary();

    Ok(report.all_succeeded())
}

fn selected_methods(raw: Vec<String>) -> Vec<String> {
    raw.into_iter()
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect()
}

/// First Ctrl+C cancels pending confirmation waits; a second one exits.
async fn watch_interrupts(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("Failed to install Ctrl+C handler");
        return;
    }
    warn!("Interrupt received, stopping after the current step (Ctrl+C again to exit now)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        error!("Second interrupt, exiting");
        std::process::exit(130);
    }
}

fn log_filter(level: u8) -> &'static str {
    match level {
        0 => "trace",
        1 => "debug",
        2 => "info",
        3 => "warn",
        _ => "error",
    }
}

/// Initialize tracing/logging with structured output
fn init_logging(level: u8) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(level)));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
