//! # SESSION EVENT LOOP
//!
//! Drives one [Session] to completion by multiplexing two event sources: a
//! TCP connection and a one-second tick. The reference implementation
//! multiplexes a socket descriptor and a `timerfd` through a single
//! `poll()`; nothing in this crate's dependency stack reaches for `mio` or
//! an async runtime, so the same multiplexing is realized with two plain
//! reader/ticker threads feeding a single channel, matching the
//! thread-per-concern style already used for connection management
//! elsewhere in this crate.
//!
//! The reader and ticker threads hold no session state and make no
//! decisions; only the thread that owns the [mpsc::Receiver] ever calls
//! [Session::handle_event], which preserves the guarantee that ticks and
//! messages interleave only at the loop boundary.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::framer::Framer;
use crate::session::{Action, Session, SessionConfig, SessionEvent, SessionInfo};

/// Bytes read per socket read call. Deliberately small (matching the
/// reference's choice) so that most messages larger than a Keepalive
/// exercise the partial-frame path through [Framer::write].
pub const CHUNK: usize = 9;

enum LoopEvent {
    Bytes(Vec<u8>),
    PeerClosed,
    SocketError,
    Tick,
    Shutdown,
}

/// Runs one session's event loop to completion on the calling thread,
/// spawning a reader thread and a ticker thread for its two event sources.
/// Returns the session's final [SessionInfo] once the loop exits (peer
/// close, fatal I/O, protocol-driven close, or shutdown).
pub fn run_session(
    stream: TcpStream,
    config: SessionConfig,
    local_id: String,
    peer_id: String,
    shutdown: Arc<AtomicBool>,
) -> std::io::Result<SessionInfo> {
    let (tx, rx): (Sender<LoopEvent>, Receiver<LoopEvent>) = mpsc::channel();

    let reader_stream = stream.try_clone()?;
    let reader_tx = tx.clone();
    let reader = thread::spawn(move || reader_loop(reader_stream, reader_tx));

    let ticker_tx = tx;
    let ticker_shutdown = shutdown;
    let ticker = thread::spawn(move || ticker_loop(ticker_tx, ticker_shutdown));

    let mut framer = Framer::new();
    let mut writer = stream.try_clone()?;
    let (session, initial_actions) = Session::new(config, local_id, peer_id);

    if apply_actions(&mut writer, initial_actions).is_err() {
        // Nothing to send the Open to; fall through and let the loop
        // observe the closed connection through the reader thread.
    }

    for event in rx {
        let session_events: Vec<SessionEvent> = match event {
            LoopEvent::Bytes(bytes) => {
                framer.write(&bytes);
                let mut events = vec![];
                while let Some(message) = framer.read() {
                    events.push(SessionEvent::MessageReceived(message.header));
                }
                events
            }
            LoopEvent::PeerClosed => vec![SessionEvent::PeerClosed],
            LoopEvent::SocketError => vec![SessionEvent::SocketError],
            LoopEvent::Tick => vec![SessionEvent::Tick(1)],
            LoopEvent::Shutdown => vec![SessionEvent::Shutdown],
        };

        let mut should_exit = false;
        for session_event in session_events {
            let actions = session.handle_event(session_event);
            for action in &actions {
                if matches!(action, Action::Close) {
                    should_exit = true;
                }
            }
            let _ = apply_actions(&mut writer, actions);
        }
        if should_exit {
            break;
        }
    }

    // Release resources in reverse acquisition order: ticker, then framer
    // (implicit, it simply drops), matching the reference's teardown
    // ordering. The caller closes the socket.
    let _ = stream.shutdown(Shutdown::Both);
    drop(framer);
    let _ = reader.join();
    let _ = ticker.join();

    Ok(session.info())
}

fn apply_actions(writer: &mut TcpStream, actions: Vec<Action>) -> std::io::Result<()> {
    for action in actions {
        if let Action::Send(bytes) = action {
            writer.write_all(&bytes)?;
        }
    }
    Ok(())
}

fn reader_loop(mut stream: TcpStream, tx: Sender<LoopEvent>) {
    let mut buffer = [0u8; CHUNK];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => {
                let _ = tx.send(LoopEvent::PeerClosed);
                return;
            }
            Ok(n) => {
                if tx.send(LoopEvent::Bytes(buffer[..n].to_vec())).is_err() {
                    return;
                }
            }
            Err(ref err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                debug!("session read error: {err}");
                let _ = tx.send(LoopEvent::SocketError);
                return;
            }
        }
    }
}

fn ticker_loop(tx: Sender<LoopEvent>, shutdown: Arc<AtomicBool>) {
    loop {
        thread::sleep(Duration::from_secs(1));
        let event = if shutdown.load(Ordering::Relaxed) {
            LoopEvent::Shutdown
        } else {
            LoopEvent::Tick
        };
        let is_shutdown = matches!(event, LoopEvent::Shutdown);
        if tx.send(event).is_err() {
            return;
        }
        if is_shutdown {
            return;
        }
    }
}

/// Runs the client's scripted "dummy mode" session: Open, then Keepalive
/// after 1s, then Close after 2s more, matching the reference client's
/// fixed demonstration sequence rather than driving the full state
/// machine. Useful for exercising a PCE server without a real PCC.
pub fn run_dummy_client_session(mut stream: TcpStream) -> std::io::Result<()> {
    use crate::wire;

    stream.write_all(&wire::OPEN_MESSAGE)?;
    thread::sleep(Duration::from_secs(1));
    stream.write_all(&wire::KEEPALIVE_MESSAGE)?;
    thread::sleep(Duration::from_secs(2));
    stream.write_all(&wire::CLOSE_MESSAGE)?;
    thread::sleep(Duration::from_secs(3));
    warn!("dummy client session complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn full_handshake_over_a_real_socket_reaches_session_up_and_close() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let shutdown = Arc::new(AtomicBool::new(false));
            run_session(
                stream,
                SessionConfig::default(),
                "server".into(),
                "client".into(),
                shutdown,
            )
            .unwrap()
        });

        let mut client = TcpStream::connect(addr).unwrap();
        // Drain the server's Open.
        let mut buf = [0u8; 12];
        client.read_exact(&mut buf).unwrap();
        // Reply with our own Open.
        client.write_all(&crate::wire::OPEN_MESSAGE).unwrap();
        // Drain the server's Keepalive.
        let mut ka = [0u8; 4];
        client.read_exact(&mut ka).unwrap();
        // Reply with our own Keepalive to complete the handshake.
        client.write_all(&crate::wire::KEEPALIVE_MESSAGE).unwrap();
        // Now close our end; the server should exit its loop.
        client.shutdown(Shutdown::Both).unwrap();

        let info = server.join().unwrap();
        assert_eq!(info.state, crate::session::SessionState::Closed);
    }
}
