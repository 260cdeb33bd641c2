//! Crate-wide error type.
//!
//! The core (framer, session state machine) never returns an error for
//! malformed peer input — framing and protocol violations are handled by
//! state transitions, not by `Result`. `PceError` exists for the boundary
//! around it: address resolution, socket setup, and the pidfile guard.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum PceError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("could not resolve {host}:{port}: {source}")]
    AddrResolution {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("no address returned for {host}:{port} resolved to a working endpoint")]
    NoUsableAddress { host: String, port: u16 },

    #[error("pidfile {path} is held by live process {pid}")]
    PidfileHeld { path: String, pid: i32 },

    #[error("pidfile {path}: {source}")]
    PidfileIo {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PceError>;
