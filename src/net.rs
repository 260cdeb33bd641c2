//! # ACCEPTOR / CONNECTOR
//!
//! Server-side: resolve, listen, accept, and spawn one isolated worker
//! thread per accepted connection. Client-side: resolve, try each
//! candidate address in turn, and run the session loop on the first
//! successful connect.

use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};
use socket2::{Domain, Socket, Type};

use crate::error::{PceError, Result};
use crate::event_loop;
use crate::session::SessionConfig;

/// Backlog passed to `listen(2)`. The reference server passes 0; RFC 5440
/// doesn't pin a value, and a PCE that can only ever have one pending
/// connection in its accept queue is a needless foot-gun, so a small
/// positive backlog is used instead (§9 of the design notes).
const LISTEN_BACKLOG: i32 = 8;

fn resolve_one(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    (host, port)
        .to_socket_addrs()
        .map(|iter| iter.collect::<Vec<_>>())
        .map_err(|source| PceError::AddrResolution {
            host: host.to_string(),
            port,
            source,
        })
}

/// Builds a listening socket bound to `host:port` with `SO_REUSEADDR` and
/// the crate's chosen backlog, then hands it off as a plain
/// [TcpListener]. `std::net::TcpListener::bind` has no way to request a
/// non-default backlog, which is the only reason this crate reaches for
/// `socket2` instead of using `TcpListener::bind` directly.
fn bind_listener(host: &str, port: u16) -> Result<TcpListener> {
    let candidates = resolve_one(host, port)?;
    for addr in &candidates {
        let domain = if addr.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = match Socket::new(domain, Type::STREAM, None) {
            Ok(socket) => socket,
            Err(_) => continue,
        };
        if socket.set_reuse_address(true).is_err() {
            continue;
        }
        if socket.bind(&(*addr).into()).is_err() {
            continue;
        }
        if socket.listen(LISTEN_BACKLOG).is_err() {
            continue;
        }
        return Ok(socket.into());
    }
    Err(PceError::NoUsableAddress {
        host: host.to_string(),
        port,
    })
}

/// Owns the listening socket and the set of worker threads spawned for
/// accepted connections. A process-lifetime singleton on the server,
/// replaced only by restart.
pub struct Acceptor {
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    workers: Vec<JoinHandle<()>>,
}

impl Acceptor {
    pub fn bind(host: &str, port: u16, shutdown: Arc<AtomicBool>) -> Result<Self> {
        let listener = bind_listener(host, port)?;
        info!("listening on {}", listener.local_addr()?);
        Ok(Acceptor {
            listener,
            shutdown,
            workers: Vec::new(),
        })
    }

    /// Runs the accept loop until the shutdown flag is observed. Accepts
    /// block with a short read timeout so the shutdown flag is rechecked
    /// regularly instead of only between connections; each accepted
    /// connection is handed to its own worker thread, isolated from the
    /// acceptor and from every other worker (no shared mutable state).
    pub fn run(&mut self, config: SessionConfig) -> Result<()> {
        self.listener.set_nonblocking(true)?;
        while !self.shutdown.load(Ordering::Relaxed) {
            self.reap_finished_workers();
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!("accepted connection from {peer}");
                    self.spawn_worker(stream, peer, config);
                }
                Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(std::time::Duration::from_millis(200));
                }
                Err(err) => {
                    warn!("accept failed: {err}");
                }
            }
        }
        info!("acceptor shutting down, waiting for {} worker(s)", self.workers.len());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        Ok(())
    }

    fn spawn_worker(&mut self, stream: TcpStream, peer: SocketAddr, config: SessionConfig) {
        let shutdown = self.shutdown.clone();
        let local_id = self
            .listener
            .local_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "pce".to_string());
        let handle = thread::spawn(move || {
            // SIGPIPE is ignored process-wide at startup (see
            // crate::signals); a thread cannot carry its own signal
            // disposition the way a forked child can, so there is nothing
            // further to install here.
            match event_loop::run_session(stream, config, local_id, peer.to_string(), shutdown) {
                Ok(info) => info!("session with {peer} ended in state {:?}", info.state),
                Err(err) => error!("session with {peer} ended with error: {err}"),
            }
        });
        self.workers.push(handle);
    }

    fn reap_finished_workers(&mut self) {
        self.workers.retain(|w| !w.is_finished());
    }
}

/// Resolves `host:port`, attempts each candidate address in order, and
/// returns the first successful connection. Mirrors the reference
/// client's "try every address `getaddrinfo` returned" loop.
pub fn connect(host: &str, port: u16) -> Result<TcpStream> {
    let candidates = resolve_one(host, port)?;
    let mut last_error = None;
    for addr in &candidates {
        match TcpStream::connect(addr) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_error = Some(err),
        }
    }
    match last_error {
        Some(source) => Err(PceError::AddrResolution {
            host: host.to_string(),
            port,
            source,
        }),
        None => Err(PceError::NoUsableAddress {
            host: host.to_string(),
            port,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_listener_picks_an_ephemeral_port() {
        let listener = bind_listener("127.0.0.1", 0).unwrap();
        assert!(listener.local_addr().unwrap().port() > 0);
    }

    #[test]
    fn connect_fails_cleanly_when_nothing_is_listening() {
        // Port 0 never has a listener to connect to.
        let listener = bind_listener("127.0.0.1", 0).unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(connect("127.0.0.1", port).is_err());
    }
}
