//! # SIGNAL HANDLING
//!
//! Installs signal-to-shutdown-event adapters at the process boundary
//! (§9 of the design notes): the core never reacts to a signal directly,
//! only to the `shutdown` flag this module flips. SIGPIPE is ignored
//! process-wide at startup so a peer closing its read side mid-write
//! surfaces as a normal `EPIPE` write error instead of terminating the
//! process.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use log::info;

use crate::error::Result;

/// Registers SIGINT/SIGTERM to set `shutdown` and ignores SIGPIPE.
/// Returns the flag the caller should poll.
pub fn install() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, shutdown.clone())?;
    }
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_IGN);
    }
    Ok(shutdown)
}

/// Deletes the pidfile and logs the reason a graceful shutdown was
/// observed. Called once the acceptor loop has returned.
pub fn shutdown_cleanup(pidfile_path: &std::path::Path) {
    info!("shutdown signal received, removing pidfile");
    if let Err(err) = crate::pidfile::delete(pidfile_path) {
        log::warn!("failed to remove pidfile on shutdown: {err}");
    }
}
