//! Error types for quit-signal registration.
//!
//! Only the explicit two-phase APIs ([`QuitWaiter::register`] and
//! [`QuitListener::register`]) return these. The one-shot helpers log them
//! and fall back to the platform's default signal handling instead.
//!
//! [`QuitWaiter::register`]: crate::signals::QuitWaiter::register
//! [`QuitListener::register`]: crate::signals::QuitListener::register

use thiserror::Error;

// ---------------------------------------------------------------------------
// Signal errors
// ---------------------------------------------------------------------------

/// Failures while preparing to wait for a quit signal.
#[derive(Debug, Error)]
pub enum SignalError {
    /// The private current-thread runtime could not be built.
    #[error("failed to build signal runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// A blocking wait was requested from a thread already driving a Tokio
    /// runtime.
    #[error("cannot block on quit signals from inside a Tokio runtime; use QuitListener instead")]
    InsideRuntime,

    /// The OS refused to route the signal to this process.
    #[error("failed to register {signal} handler: {source}")]
    Register {
        signal: &'static str,
        #[source]
        source: std::io::Error,
    },
}
