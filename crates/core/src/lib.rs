//! quitwait core library.
//!
//! Lets a daemon park its main thread after startup and wake up once the
//! operator or supervisor asks the process to stop (SIGINT or SIGTERM, or
//! Ctrl-C / shutdown on Windows).

pub mod errors;
pub mod signals;

// Re-exports for convenience.
pub use errors::SignalError;
pub use signals::{quit_signal, wait_for_quit, QuitListener, QuitWaiter};
