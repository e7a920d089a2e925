//! vigild - The vigil background service
//!
//! This is the main entry point for the vigil service.
//! It wires together all the components:
//! - Configuration loading
//! - Store initialization
//! - Announce/restrict actions
//! - Budget engine
//! - Signal handling and the single-instance guard

use anyhow::{bail, Context, Result};
use clap::Parser;
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigil_config::{load_config_or_default, StoreKind};
use vigil_core::BudgetEngine;
use vigil_host::{
    Announcer, CommandAnnouncer, CommandRestrictor, LogAnnouncer, LogRestrictor, Restrictor,
};
use vigil_store::{FileStore, MemoryStore, RecordStore, SqliteStore, SQLITE_FILE_NAME};
use vigil_util::{default_config_path, default_pid_path, format_delta, SystemClock};

/// vigild - Daily usage-time budget enforcement
#[derive(Parser, Debug)]
#[command(name = "vigild")]
#[command(about = "Daily usage-time budget enforcement", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/vigil/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set VIGIL_DATA_DIR env var)
    #[arg(short, long, env = "VIGIL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single tick, print the resulting record as JSON and exit
    #[arg(long)]
    once: bool,

    /// Keep the record in memory and only log readouts and restrictions
    #[arg(long)]
    dry_run: bool,
}

/// Removes the pid file when dropped
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    /// Claim `path` for this process, refusing if it names a live process
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create runtime directory {:?}", parent))?;
        }

        let own_pid = std::process::id();
        if let Some(pid) = read_pid(path) {
            if pid != own_pid && process_alive(pid) {
                bail!("vigild is already running (pid {}, pid file {:?})", pid, path);
            }
            warn!(pid, path = %path.display(), "Removing stale pid file");
        }

        std::fs::write(path, format!("{}\n", own_pid))
            .with_context(|| format!("Failed to write pid file {:?}", path))?;

        Ok(Self {
            path: path.to_path_buf(),
        })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    // EPERM means the process exists but belongs to someone else.
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

/// Main service state
struct Service {
    engine: BudgetEngine,
    dry_run: bool,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let config = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| config.service.data_dir.clone());

        let store_kind = if args.dry_run {
            StoreKind::Memory
        } else {
            config.service.store
        };

        let store: Arc<dyn RecordStore> = match store_kind {
            StoreKind::File => Arc::new(FileStore::new(&data_dir)),
            StoreKind::Sqlite => {
                std::fs::create_dir_all(&data_dir)
                    .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
                let db_path = data_dir.join(SQLITE_FILE_NAME);
                Arc::new(
                    SqliteStore::open(&db_path)
                        .with_context(|| format!("Failed to open database {:?}", db_path))?,
                )
            }
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };

        if !store.is_healthy() {
            warn!(data_dir = %data_dir.display(), "Store reports unhealthy");
        }

        info!(
            config_path = %args.config.display(),
            store = %store_kind,
            data_dir = %data_dir.display(),
            state_file = %config.service.state_file,
            allotment = %format_delta(vigil_util::delta_from_std(config.budget.default_allotment)),
            dry_run = args.dry_run,
            "Configuration loaded"
        );

        let announcer: Arc<dyn Announcer> = match (&config.actions.announce, args.dry_run) {
            (Some(argv), false) => Arc::new(CommandAnnouncer::new(argv.clone())),
            _ => Arc::new(LogAnnouncer),
        };
        let restrictor: Arc<dyn Restrictor> = if args.dry_run {
            Arc::new(LogRestrictor)
        } else {
            Arc::new(CommandRestrictor::new(config.actions.restrict.clone()))
        };

        let engine = BudgetEngine::new(
            store,
            config.service.state_file.clone(),
            announcer,
            restrictor,
            config.budget,
        );

        Ok(Self {
            engine,
            dry_run: args.dry_run,
        })
    }

    fn guard(&self) -> Result<Option<PidFile>> {
        if self.dry_run {
            return Ok(None);
        }
        PidFile::acquire(&default_pid_path()).map(Some)
    }

    /// Run one tick and print the record
    async fn run_once(self) -> Result<()> {
        let _pid = self.guard()?;

        let outcome = self.engine.tick_once(&SystemClock).await?;
        info!(?outcome, "Tick complete");

        let state = self.engine.state_file().load().await?;
        println!("{}", serde_json::to_string_pretty(&state)?);
        Ok(())
    }

    async fn run(self) -> Result<()> {
        let _pid = self.guard()?;

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;
        let mut sigusr1 =
            signal(SignalKind::user_defined1()).context("Failed to create SIGUSR1 handler")?;

        self.engine.start(&SystemClock)?;
        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                // SIGUSR1 - "how much time do I have left?"
                _ = sigusr1.recv() => {
                    if !self.engine.announce_current().await {
                        info!("No budget loaded yet, nothing to announce");
                    }
                }
            }
        }

        self.engine.stop().await?;
        info!("Service stopped");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "vigild starting");

    let service = Service::new(&args)?;
    if args.once {
        service.run_once().await
    } else {
        service.run().await
    }
}
