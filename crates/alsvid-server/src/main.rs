//! Alsvid server binary.
//!
//! Loads the configuration, builds the transmitter bench, binds the
//! control channel and serves until the operator stops the engine.
//! Configuration faults are fatal here and only here: the library
//! crates report them, this binary turns them into a non-zero exit.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use alsvid_adapter_sim::register_sim_devices;
use alsvid_config::Config;
use alsvid_hal::DeviceRegistry;
use alsvid_proto::TcpControlChannel;
use alsvid_server::{Engine, admin, build_bench};

/// Alsvid - transmitter-side control server for a CV-QKD link
#[derive(Parser)]
#[command(name = "alsvid-server")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    file: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    info!(version = env!("CARGO_PKG_VERSION"), "alsvid transmitter server");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.file)?;

    let mut registry = DeviceRegistry::new();
    register_sim_devices(&mut registry);
    let bench = build_bench(&registry, &config)?;

    let endpoint = format!("{}:{}", config.network.bind_address, config.network.bind_port);
    let channel = TcpControlChannel::bind(&endpoint).await?;
    info!(%endpoint, "control channel bound");

    let mut engine = Engine::start(config, Box::new(channel), bench).await?;
    engine.set_reload_path(cli.file);
    engine.attach_admin(admin::spawn_interrupt_watcher());

    let served = engine.serve().await;
    engine.shutdown().await;
    served?;
    Ok(())
}
