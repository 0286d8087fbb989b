//! Blocking until the process is asked to quit.
//!
//! Listens for SIGINT and SIGTERM on Unix, and for Ctrl-C and system
//! shutdown on Windows. Registration always completes before the wait
//! starts, so a signal sent right after registration is never lost.
//!
//! Three entry points, from simplest to most explicit:
//!
//! - [`wait_for_quit`] blocks the calling thread. Call it once from `main`
//!   after startup; begin shutdown when it returns.
//! - [`QuitWaiter`] splits the same blocking wait into `register` and `wait`.
//! - [`QuitListener`] / [`quit_signal`] are the async forms, for use inside a
//!   Tokio runtime or in a `tokio::select!` against a deadline.

use std::future::{pending, Future};
use std::time::Duration;

use tokio::runtime::{Builder, Handle, Runtime};
use tracing::{debug, error, info};

use crate::errors::SignalError;

#[cfg(unix)]
const INTERRUPT: &str = "SIGINT";
#[cfg(unix)]
const TERMINATE: &str = "SIGTERM";

#[cfg(windows)]
const INTERRUPT: &str = "Ctrl-C";
#[cfg(windows)]
const TERMINATE: &str = "Ctrl-Shutdown";

#[cfg(unix)]
type Interrupt = tokio::signal::unix::Signal;
#[cfg(unix)]
type Terminate = tokio::signal::unix::Signal;

/// Driver turn used to flush deliveries left over from an earlier wait.
const STALE_FLUSH: Duration = Duration::from_millis(1);

#[cfg(windows)]
type Interrupt = tokio::signal::windows::CtrlC;
#[cfg(windows)]
type Terminate = tokio::signal::windows::CtrlShutdown;

#[cfg(unix)]
fn register_interrupt() -> std::io::Result<Interrupt> {
    use tokio::signal::unix::{signal, SignalKind};
    signal(SignalKind::interrupt())
}

#[cfg(unix)]
fn register_terminate() -> std::io::Result<Terminate> {
    use tokio::signal::unix::{signal, SignalKind};
    signal(SignalKind::terminate())
}

#[cfg(windows)]
fn register_interrupt() -> std::io::Result<Interrupt> {
    tokio::signal::windows::ctrl_c()
}

#[cfg(windows)]
fn register_terminate() -> std::io::Result<Terminate> {
    tokio::signal::windows::ctrl_shutdown()
}

// ---------------------------------------------------------------------------
// One-shot helpers
// ---------------------------------------------------------------------------

/// Block the calling thread until SIGINT or SIGTERM is delivered.
///
/// Intended for a daemon's `main` after initialization. Registration
/// failures are logged, not returned: a signal that could not be registered
/// keeps its default disposition, which normally terminates the process.
/// If nothing could be registered this parks forever.
///
/// Must not be called from inside a Tokio runtime; use [`quit_signal`] there.
pub fn wait_for_quit() {
    match QuitWaiter::register() {
        Ok(waiter) => waiter.wait(),
        Err(err) => {
            error!(%err, "quit signals unavailable, falling back to default signal handling");
            park_forever()
        }
    }
}

/// Async counterpart of [`wait_for_quit`].
///
/// Resolves once SIGINT or SIGTERM is delivered. Stays pending forever if
/// neither could be registered.
pub async fn quit_signal() {
    match QuitListener::register() {
        Ok(mut listener) => listener.recv().await,
        Err(err) => {
            error!(%err, "quit signals unavailable, falling back to default signal handling");
            pending::<()>().await
        }
    }
}

fn park_forever() -> ! {
    loop {
        std::thread::park();
    }
}

// ---------------------------------------------------------------------------
// QuitListener
// ---------------------------------------------------------------------------

/// Registered interest in the two quit signals, awaited asynchronously.
///
/// Each listener owns its own notification streams and drops them with
/// itself. The OS-level handlers installed by registration stay in place
/// for the life of the process.
#[derive(Debug)]
pub struct QuitListener {
    interrupt: Option<Interrupt>,
    terminate: Option<Terminate>,
}

impl QuitListener {
    /// Register for SIGINT and SIGTERM.
    ///
    /// Each kind is registered independently. A kind that fails is logged
    /// and left to its default disposition; an error is returned only when
    /// neither could be registered.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime with the IO driver enabled.
    pub fn register() -> Result<Self, SignalError> {
        let interrupt = register_kind(INTERRUPT, register_interrupt);
        let terminate = register_kind(TERMINATE, register_terminate);

        match (interrupt, terminate) {
            (Err(err), Err(_)) => Err(err),
            (interrupt, terminate) => {
                debug!(
                    interrupt = interrupt.is_ok(),
                    terminate = terminate.is_ok(),
                    "quit signal handlers registered"
                );
                Ok(Self {
                    interrupt: interrupt.ok(),
                    terminate: terminate.ok(),
                })
            }
        }
    }

    /// Wait for the next quit signal delivered after registration.
    ///
    /// Consumes one notification. Cancel-safe: dropping the future before it
    /// completes loses nothing.
    pub async fn recv(&mut self) {
        let Self {
            interrupt,
            terminate,
        } = self;

        tokio::select! {
            _ = delivered(interrupt.as_mut().map(|s| s.recv())) => {
                info!(signal = INTERRUPT, "received quit signal");
            }
            _ = delivered(terminate.as_mut().map(|s| s.recv())) => {
                info!(signal = TERMINATE, "received quit signal");
            }
        }
    }
}

fn register_kind<T>(
    signal: &'static str,
    register: fn() -> std::io::Result<T>,
) -> Result<T, SignalError> {
    register().map_err(|source| {
        error!(signal, %source, "failed to register handler, default disposition remains");
        SignalError::Register { signal, source }
    })
}

/// Resolve when `recv` yields a delivery. A missing stream, or one whose
/// driver has gone away, never resolves.
async fn delivered<F>(recv: Option<F>)
where
    F: Future<Output = Option<()>>,
{
    if let Some(recv) = recv {
        if recv.await.is_some() {
            return;
        }
    }
    pending::<()>().await
}

// ---------------------------------------------------------------------------
// QuitWaiter
// ---------------------------------------------------------------------------

/// Blocking wait with registration split out.
///
/// `register` installs the handlers; `wait` parks the calling thread until a
/// quit signal arrives. The waiter drives a private current-thread runtime
/// on whichever thread calls `wait`, so no threads are spawned. It is `Send`
/// and may be registered on one thread and waited on from another.
#[derive(Debug)]
pub struct QuitWaiter {
    listener: QuitListener,
    runtime: Runtime,
}

impl QuitWaiter {
    /// Register for SIGINT and SIGTERM.
    ///
    /// Fails with [`SignalError::InsideRuntime`] when the calling thread is
    /// already inside a Tokio runtime, since blocking there would stall it.
    pub fn register() -> Result<Self, SignalError> {
        if Handle::try_current().is_ok() {
            return Err(SignalError::InsideRuntime);
        }

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SignalError::Runtime)?;

        discard_stale_deliveries(&runtime);

        let listener = {
            let _guard = runtime.enter();
            QuitListener::register()?
        };

        Ok(Self { listener, runtime })
    }

    /// Block until SIGINT or SIGTERM is delivered.
    pub fn wait(self) {
        let Self {
            mut listener,
            runtime,
        } = self;
        runtime.block_on(listener.recv());
    }
}

/// Deliveries that reached the process while no driver was running stay
/// queued in Tokio's process-wide registry. Turn the fresh driver once with
/// throwaway streams attached so that backlog is consumed before the real
/// streams subscribe.
fn discard_stale_deliveries(runtime: &Runtime) {
    runtime.block_on(async {
        let _stale = (register_interrupt().ok(), register_terminate().ok());
        tokio::task::yield_now().await;
        tokio::time::sleep(STALE_FLUSH).await;
    });
}

#[cfg(test)]
mod tests {
    use std::future::ready;

    use super::*;

    #[tokio::test]
    async fn test_waiter_rejects_runtime_thread() {
        let err = QuitWaiter::register().unwrap_err();
        assert!(matches!(err, SignalError::InsideRuntime));
    }

    #[tokio::test]
    async fn test_listener_pending_without_signal() {
        let mut listener = QuitListener::register().expect("handlers register");
        assert!(listener.interrupt.is_some());
        assert!(listener.terminate.is_some());

        let waited = tokio::time::timeout(Duration::from_millis(50), listener.recv()).await;
        assert!(waited.is_err(), "listener returned without a signal");
    }

    #[tokio::test]
    async fn test_quit_signal_pending_without_signal() {
        let waited = tokio::time::timeout(Duration::from_millis(50), quit_signal()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_delivered_resolves_on_delivery() {
        let waited =
            tokio::time::timeout(Duration::from_millis(50), delivered(Some(ready(Some(()))))).await;
        assert!(waited.is_ok());
    }

    #[tokio::test]
    async fn test_delivered_ignores_closed_stream() {
        let waited =
            tokio::time::timeout(Duration::from_millis(50), delivered(Some(ready(None)))).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_delivered_ignores_missing_stream() {
        let waited = tokio::time::timeout(
            Duration::from_millis(50),
            delivered(None::<std::future::Ready<Option<()>>>),
        )
        .await;
        assert!(waited.is_err());
    }

    #[test]
    fn test_waiter_registers_off_runtime() {
        let waiter = QuitWaiter::register().expect("handlers register");
        assert!(waiter.listener.interrupt.is_some());
        assert!(waiter.listener.terminate.is_some());
    }

    #[test]
    fn test_waiter_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<QuitWaiter>();
        assert_send::<QuitListener>();
    }
}
