//! Rotator daemon: EasyComm2/rotctld server in front of the tracker.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, warn};

use altaz_rotator::config::{self, BackendKind, TrackerConfig};
use altaz_rotator::{backend, logging, server, Tracker};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Auto,
    Waveform,
    Gpio,
    Simulation,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Auto => BackendKind::Auto,
            BackendArg::Waveform => BackendKind::Waveform,
            BackendArg::Gpio => BackendKind::Gpio,
            BackendArg::Simulation => BackendKind::Simulation,
        }
    }
}

/// Rotator control server (EasyComm2/rotctld)
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Tracker configuration file (TOML). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long)]
    host: Option<String>,

    /// TCP port
    #[arg(short, long)]
    port: Option<u16>,

    /// Pulse backend
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    write_default_config: Option<PathBuf>,

    /// Home both axes before serving
    #[arg(long)]
    home: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    if let Some(path) = &args.write_default_config {
        config::save_default_config(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "Default configuration written");
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => config::load_config(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => {
            info!("No configuration file given, using defaults");
            TrackerConfig::default()
        }
    };
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(kind) = args.backend {
        config.backend.kind = kind.into();
    }

    let pulses = backend::select(&config.backend);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let tracker = Arc::new(Tracker::new(config, pulses).context("Invalid configuration")?);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    tracker.enable_motors();
    let interrupted = args.home && home_until_signal(&tracker, shutdown.as_mut()).await?;
    log_status(&tracker);

    let result = if interrupted {
        Ok(())
    } else {
        tokio::select! {
            result = server::run(addr, tracker.clone()) => {
                result.context("Rotator server failed")
            }
            () = shutdown.as_mut() => {
                info!("Shutting down");
                Ok(())
            }
        }
    };

    let closing = tracker.clone();
    tokio::task::spawn_blocking(move || closing.shutdown()).await?;
    log_status(&tracker);
    result
}

/// Home both axes unless `signal` fires first. Returns true if it did.
///
/// On a signal the search is stopped and awaited, so the caller can shut
/// the tracker down with no pulse in flight.
async fn home_until_signal<S>(tracker: &Arc<Tracker>, signal: S) -> Result<bool>
where
    S: Future<Output = ()>,
{
    let homing = tracker.clone();
    let mut task = tokio::task::spawn_blocking(move || homing.home());

    tokio::select! {
        result = &mut task => {
            if let Err(e) = result? {
                warn!(error = %e, "Homing failed, serving unhomed");
            }
            Ok(false)
        }
        () = signal => {
            info!("Shutdown requested during homing");
            let stopping = tracker.clone();
            tokio::task::spawn_blocking(move || stopping.stop()).await?;
            if let Err(e) = task.await? {
                info!(error = %e, "Homing abandoned");
            }
            Ok(true)
        }
    }
}

fn log_status(tracker: &Tracker) {
    match tracker.status().to_json() {
        Ok(status) => info!(%status, "Tracker status"),
        Err(e) => warn!(error = %e, "Cannot encode status"),
    }
}

/// Install the SIGINT and SIGTERM handlers now; resolves on either.
#[cfg(unix)]
fn shutdown_signal() -> impl Future<Output = ()> {
    use tokio::signal::unix::{signal, SignalKind};

    let interrupt = signal(SignalKind::interrupt());
    let terminate = signal(SignalKind::terminate());
    async move {
        match (interrupt, terminate) {
            (Ok(mut interrupt), Ok(mut terminate)) => {
                tokio::select! {
                    _ = interrupt.recv() => {}
                    _ = terminate.recv() => {}
                }
            }
            (interrupt, terminate) => {
                if let Err(e) = interrupt.and(terminate) {
                    warn!(error = %e, "Cannot listen for SIGINT/SIGTERM");
                }
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
}

#[cfg(not(unix))]
fn shutdown_signal() -> impl Future<Output = ()> {
    async {
        let _ = tokio::signal::ctrl_c().await;
    }
}
