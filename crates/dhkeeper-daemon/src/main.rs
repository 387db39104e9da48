//! Dhkeeper daemon - main entry point
//!
//! Runs the parameter maintenance loop, and doubles as the generation
//! worker through the hidden `generate` subcommand the supervisor spawns.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dhkeeper_core::{DhGroup, MasterIdentity};
use dhkeeper_daemon::supervisor::WorkerCommand;
use dhkeeper_daemon::{worker, CryptoContext, DaemonConfig, Scheduler, SoftwareBackend, Supervisor};

#[derive(Parser)]
#[command(name = "dhkeeperd")]
#[command(about = "Keeps cached Diffie-Hellman parameter files fresh", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the parameter maintenance daemon
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Worker entry point, spawned by the daemon itself
    #[command(hide = true)]
    Generate {
        /// DH group to encode
        #[arg(long)]
        group: String,

        /// Temporary file the supervisor opened as our stdout
        #[arg(long)]
        temp: PathBuf,

        /// Cache file to publish
        #[arg(long)]
        target: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr: in worker mode stdout is the parameters file.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dhkeeper_daemon=info,dhkeeper_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { config } => run_daemon(config).await,
        Commands::Generate {
            group,
            temp,
            target,
        } => {
            let group = DhGroup::from_name(&group)?;
            worker::run_generation(group, &temp, &target)?;
            Ok(())
        }
    }
}

async fn run_daemon(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    info!("Starting dhkeeper daemon v{}", env!("CARGO_PKG_VERSION"));

    let config_path = config_path
        .or_else(|| std::env::var_os("DHKEEPER_CONFIG").map(PathBuf::from))
        .unwrap_or_else(default_config_path);

    let config = if config_path.exists() {
        DaemonConfig::load(&config_path)?
    } else {
        let config = DaemonConfig::default();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.save(&config_path)?;
        info!("Created default config at {:?}", config_path);
        config
    };
    config.ensure_directories()?;

    let group = config.group()?;
    let identity = MasterIdentity {
        uid: nix::unistd::Uid::effective().as_raw(),
        gid: nix::unistd::Gid::effective().as_raw(),
    };

    let crypto = CryptoContext::new(Box::new(SoftwareBackend::new()));
    let guard = crypto.acquire();
    if let Some(engine) = &config.crypto_engine {
        // Engine selection failure is not fatal; the software paths
        // keep working without acceleration.
        if let Err(err) = crypto.select_engine(engine) {
            error!("{}", err);
        }
    }

    let (exit_tx, exit_rx) = tokio::sync::mpsc::unbounded_channel();
    let supervisor = Supervisor::new(WorkerCommand::from_current_exe(group)?, exit_tx);
    let scheduler = Scheduler::new(
        config.instances.clone(),
        identity,
        Duration::from_secs(config.check_interval_secs),
        supervisor,
        exit_rx,
    );

    tokio::select! {
        result = scheduler.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    if guard.release() {
        warn!("crypto environment still referenced at shutdown");
    }
    info!("Daemon shutting down");
    Ok(())
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join("dhkeeper")
        .join("daemon.json")
}

/// Helper module for dirs functionality
mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))
    }
}
