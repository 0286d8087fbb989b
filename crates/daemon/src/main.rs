//! quitwait daemon entry point.
//!
//! Initializes logging, announces readiness, then parks the main thread until
//! the process is asked to quit. Optionally gives up after a fixed deadline.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quitwait_core::{wait_for_quit, QuitListener};

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

/// Park until SIGINT or SIGTERM, then exit cleanly.
#[derive(Parser, Debug)]
#[command(
    name = "quitwait",
    version,
    about = "Park until SIGINT or SIGTERM, then exit cleanly"
)]
struct Args {
    /// Log filter (trace, debug, info, warn, error). Defaults to RUST_LOG, then info.
    #[arg(long)]
    log_level: Option<String>,

    /// Stop waiting after this many seconds even if no signal arrives.
    #[arg(long, value_name = "SECS")]
    exit_after: Option<u64>,
}

/// What ended the wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WakeReason {
    QuitSignal,
    Deadline,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(args.log_level.as_deref());

    info!("========================================");
    info!("  quitwait v{}", env!("CARGO_PKG_VERSION"));
    info!("========================================");
    info!("PID        : {}", std::process::id());
    match args.exit_after {
        Some(secs) => info!("Exit after : {}s", secs),
        None => info!("Exit after : never"),
    }
    info!("========================================");

    let reason = match args.exit_after {
        Some(secs) => wait_with_deadline(Duration::from_secs(secs))?,
        None => {
            info!("ready, waiting for SIGINT or SIGTERM");
            wait_for_quit();
            WakeReason::QuitSignal
        }
    };

    match reason {
        WakeReason::QuitSignal => info!("quit signal received, shutting down"),
        WakeReason::Deadline => info!("deadline reached, shutting down"),
    }

    info!("quitwait stopped.");
    Ok(())
}

fn init_tracing(log_level: Option<&str>) {
    let filter = log_level
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Wait for a quit signal or `deadline`, whichever comes first.
fn wait_with_deadline(deadline: Duration) -> Result<WakeReason> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    runtime.block_on(async {
        let mut listener =
            QuitListener::register().context("failed to register quit signal handlers")?;
        info!(
            deadline_secs = deadline.as_secs(),
            "ready, waiting for SIGINT, SIGTERM or deadline"
        );
        Ok::<_, anyhow::Error>(race_deadline(listener.recv(), deadline).await)
    })
}

async fn race_deadline<F>(quit: F, deadline: Duration) -> WakeReason
where
    F: std::future::Future<Output = ()>,
{
    tokio::select! {
        _ = quit => WakeReason::QuitSignal,
        _ = tokio::time::sleep(deadline) => WakeReason::Deadline,
    }
}
