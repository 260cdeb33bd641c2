//! # PCE
//!
//! A Path Computation Element Communication Protocol (PCEP, RFC 5440)
//! server and client endpoint pair.
//!
//! The crate is organized leaves-first:
//! - [header] — the 4-byte common message header codec.
//! - [framer] — the streaming byte-to-message reassembler.
//! - [wire] — canned wire bytes for the header-only messages the state
//!   machine emits on its own initiative.
//! - [session] — the per-connection protocol state machine, its timer
//!   configuration, statistics, and read-only introspection.
//! - [event_loop] — multiplexes a connection and a one-second tick onto
//!   one session.
//! - [net] — the server's accept loop and the client's connect loop.
//!
//! Around that core sit the pieces needed to run `pce` as a real daemon:
//! [cli], [logging], [pidfile], [signals], and [error].

pub mod cli;
pub mod error;
pub mod event_loop;
pub mod framer;
pub mod header;
pub mod logging;
pub mod net;
pub mod pidfile;
pub mod session;
pub mod signals;
pub mod wire;
