//! # SESSION STATE MACHINE
//!
//! The per-connection protocol automaton: `IDLE -> TCP_PENDING -> OPEN_WAIT
//! -> KEEP_WAIT -> SESSION_UP`, with any error collapsing to `CLOSED`.
//! `CLOSED` is a sink — nothing transitions out of it.
//!
//! This module only reasons about the message *header*. Body/object/TLV
//! parsing (path computation requests, explicit route objects, and so on)
//! is deliberately not modeled; a [Session] only needs a message's
//! [Header](crate::header::Header) to decide what to do next.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use atomic::Atomic;
use bytemuck::NoUninit;

use crate::header::{Header, MessageType};
use crate::wire;

/// The five live states plus the terminal `CLOSED` sink.
///
/// Numbered to match the PCEP-MIB-derived encoding in the original
/// implementation's session info structures (`IDLE=0` through
/// `SESSION_UP=4`); `CLOSED` has no MIB analogue and is appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, NoUninit)]
#[repr(u8)]
pub enum SessionState {
    /// Never actually entered: a [Session] is only ever constructed from an
    /// already-open [TcpStream](std::net::TcpStream), so there is no live
    /// transition into or out of this variant. Kept so `SessionState`'s
    /// discriminants line up with the original implementation's
    /// PCEP-MIB-derived session-state numbering.
    Idle = 0,
    /// Never actually entered, for the same reason as `Idle` above.
    TcpPending = 1,
    OpenWait = 2,
    KeepWait = 3,
    SessionUp = 4,
    Closed = 5,
}

/// Events the event loop (C4) delivers to a [Session].
#[derive(Clone, Debug)]
pub enum SessionEvent {
    MessageReceived(Header),
    Tick(u32),
    PeerClosed,
    SocketError,
    Shutdown,
}

/// What the session wants the event loop to do in response to an event.
#[derive(Clone, Debug)]
pub enum Action {
    /// Write these bytes to the peer.
    Send(Vec<u8>),
    /// Stop the event loop; the session has reached `CLOSED`.
    Close,
}

/// Timer and limit configuration accepted at session construction.
/// Values are accepted as given and never revalidated; RFC 5440 defaults
/// apply when not overridden.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    pub open_wait_timer: Duration,
    pub keep_wait_timer: Duration,
    pub keep_alive_timer: Duration,
    pub dead_timer: Duration,
    pub sync_timer: Duration,
    pub request_timer: Duration,
    pub init_backoff_timer: Duration,
    pub max_backoff_timer: Duration,
    pub max_req_per_session: u32,
    pub max_unknown_reqs: u32,
    pub max_unknown_msgs: u32,
}

impl Default for SessionConfig {
    /// RFC 5440 defaults: 60s open-wait, 30s keepalive, 4x keepalive
    /// (120s) dead-timer. `keep_wait_timer` follows `open_wait_timer`,
    /// mirroring the reference's treatment of the two as the same
    /// handshake budget split across two phases.
    fn default() -> Self {
        SessionConfig {
            open_wait_timer: Duration::from_secs(60),
            keep_wait_timer: Duration::from_secs(60),
            keep_alive_timer: Duration::from_secs(30),
            dead_timer: Duration::from_secs(120),
            sync_timer: Duration::from_secs(30),
            request_timer: Duration::from_secs(30),
            init_backoff_timer: Duration::from_secs(2),
            max_backoff_timer: Duration::from_secs(120),
            max_req_per_session: 0,
            max_unknown_reqs: 5,
            max_unknown_msgs: 5,
        }
    }
}

/// Monotonically non-decreasing per-message-type counters.
#[derive(Default)]
pub struct SessionStats {
    pub num_pc_req_sent: AtomicU64,
    pub num_pc_req_rcvd: AtomicU64,
    pub num_pc_rep_sent: AtomicU64,
    pub num_pc_rep_rcvd: AtomicU64,
    pub num_pc_err_sent: AtomicU64,
    pub num_pc_err_rcvd: AtomicU64,
    pub num_pc_ntf_sent: AtomicU64,
    pub num_pc_ntf_rcvd: AtomicU64,
    pub num_keep_alive_sent: AtomicU64,
    pub num_keep_alive_rcvd: AtomicU64,
    pub num_unknown_rcvd: AtomicU64,
}

impl SessionStats {
    fn record_sent(&self, message_type: u8) {
        let counter = match MessageType::try_from(message_type) {
            Ok(MessageType::PcRequest) => &self.num_pc_req_sent,
            Ok(MessageType::PcReply) => &self.num_pc_rep_sent,
            Ok(MessageType::Error) => &self.num_pc_err_sent,
            Ok(MessageType::Notification) => &self.num_pc_ntf_sent,
            Ok(MessageType::Keepalive) => &self.num_keep_alive_sent,
            _ => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn record_received(&self, message_type: u8) {
        let counter = match MessageType::try_from(message_type) {
            Ok(MessageType::PcRequest) => &self.num_pc_req_rcvd,
            Ok(MessageType::PcReply) => &self.num_pc_rep_rcvd,
            Ok(MessageType::Error) => &self.num_pc_err_rcvd,
            Ok(MessageType::Notification) => &self.num_pc_ntf_rcvd,
            Ok(MessageType::Keepalive) => &self.num_keep_alive_rcvd,
            Err(()) => {
                self.num_unknown_rcvd.fetch_add(1, Ordering::Relaxed);
                return;
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of every counter, for [SessionInfo].
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            num_pc_req_sent: self.num_pc_req_sent.load(Ordering::Relaxed),
            num_pc_req_rcvd: self.num_pc_req_rcvd.load(Ordering::Relaxed),
            num_pc_rep_sent: self.num_pc_rep_sent.load(Ordering::Relaxed),
            num_pc_rep_rcvd: self.num_pc_rep_rcvd.load(Ordering::Relaxed),
            num_pc_err_sent: self.num_pc_err_sent.load(Ordering::Relaxed),
            num_pc_err_rcvd: self.num_pc_err_rcvd.load(Ordering::Relaxed),
            num_pc_ntf_sent: self.num_pc_ntf_sent.load(Ordering::Relaxed),
            num_pc_ntf_rcvd: self.num_pc_ntf_rcvd.load(Ordering::Relaxed),
            num_keep_alive_sent: self.num_keep_alive_sent.load(Ordering::Relaxed),
            num_keep_alive_rcvd: self.num_keep_alive_rcvd.load(Ordering::Relaxed),
            num_unknown_rcvd: self.num_unknown_rcvd.load(Ordering::Relaxed),
        }
    }
}

/// An owned, `Clone`-able copy of [SessionStats] at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    pub num_pc_req_sent: u64,
    pub num_pc_req_rcvd: u64,
    pub num_pc_rep_sent: u64,
    pub num_pc_rep_rcvd: u64,
    pub num_pc_err_sent: u64,
    pub num_pc_err_rcvd: u64,
    pub num_pc_ntf_sent: u64,
    pub num_pc_ntf_rcvd: u64,
    pub num_keep_alive_sent: u64,
    pub num_keep_alive_rcvd: u64,
    pub num_unknown_rcvd: u64,
}

/// A read-only projection of a [Session]'s identity, state, and
/// statistics, cheap to clone and safe to hand to a logging call site or
/// an external monitor without exposing any way to mutate the session.
///
/// Supplements the distilled core with the PCEP-MIB-style introspection
/// the original implementation's session/peer/entity info structures
/// provided (RFC 7420).
#[derive(Clone, Debug)]
pub struct SessionInfo {
    pub local_id: String,
    pub peer_id: String,
    pub state: SessionState,
    pub state_entered_at: Instant,
    pub stats: SessionStatsSnapshot,
}

/// Per-connection protocol automaton.
///
/// `state` is an [Atomic] so [Session::info] can be read from outside the
/// event-loop thread (e.g. by a monitoring surface) without a lock;
/// every transition is still driven exclusively from
/// [Session::handle_event], called only by the owning event loop.
pub struct Session {
    local_id: String,
    peer_id: String,
    config: SessionConfig,
    state: Atomic<SessionState>,
    state_entered_at: std::sync::Mutex<Instant>,
    local_ok: AtomicBool,
    remote_ok: AtomicBool,
    hold_time_remaining: AtomicU64,
    since_last_keep_alive_sent: AtomicU64,
    stats: SessionStats,
}

impl Session {
    /// Creates a session already past the two implicit transitions
    /// `IDLE -> TCP_PENDING -> OPEN_WAIT` (there is no actual waiting
    /// involved: by construction the TCP connection already exists), and
    /// returns the action to send the local Open message.
    pub fn new(config: SessionConfig, local_id: String, peer_id: String) -> (Self, Vec<Action>) {
        let session = Session {
            local_id,
            peer_id,
            config,
            state: Atomic::new(SessionState::OpenWait),
            state_entered_at: std::sync::Mutex::new(Instant::now()),
            local_ok: AtomicBool::new(false),
            remote_ok: AtomicBool::new(false),
            hold_time_remaining: AtomicU64::new(0),
            since_last_keep_alive_sent: AtomicU64::new(0),
            stats: SessionStats::default(),
        };
        session.stats.record_sent(MessageType::Open as u8);
        (session, vec![Action::Send(wire::OPEN_MESSAGE.to_vec())])
    }

    pub fn state(&self) -> SessionState {
        self.state.load(Ordering::Acquire)
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            local_id: self.local_id.clone(),
            peer_id: self.peer_id.clone(),
            state: self.state(),
            state_entered_at: *self.state_entered_at.lock().unwrap(),
            stats: self.stats.snapshot(),
        }
    }

    fn transition_to(&self, next: SessionState) {
        self.state.store(next, Ordering::Release);
        *self.state_entered_at.lock().unwrap() = Instant::now();
    }

    /// Advances the state machine by one event and returns the actions the
    /// event loop must carry out (sending bytes, closing the connection).
    /// Once [SessionState::Closed] is reached this always returns an empty
    /// action list; the loop is expected to have already exited.
    pub fn handle_event(&self, event: SessionEvent) -> Vec<Action> {
        if self.state() == SessionState::Closed {
            return vec![];
        }

        match event {
            SessionEvent::PeerClosed | SessionEvent::SocketError | SessionEvent::Shutdown => {
                self.transition_to(SessionState::Closed);
                vec![Action::Close]
            }
            SessionEvent::MessageReceived(header) => self.on_message(header),
            SessionEvent::Tick(elapsed) => self.on_tick(elapsed),
        }
    }

    fn on_message(&self, header: Header) -> Vec<Action> {
        self.stats.record_received(header.message_type);

        match self.state() {
            SessionState::Idle | SessionState::TcpPending | SessionState::Closed => {
                // A message this early is a protocol violation: nothing
                // has been negotiated yet.
                self.transition_to(SessionState::Closed);
                vec![Action::Close]
            }

            SessionState::OpenWait => {
                if header.message_type == MessageType::Open as u8 && header.length == 12 {
                    self.remote_ok.store(true, Ordering::Relaxed);
                    self.hold_time_remaining.store(
                        self.config.dead_timer.as_secs(),
                        Ordering::Relaxed,
                    );
                    self.stats.record_sent(MessageType::Keepalive as u8);
                    let mut actions = vec![Action::Send(wire::KEEPALIVE_MESSAGE.to_vec())];
                    if self.local_ok.load(Ordering::Relaxed) {
                        self.transition_to(SessionState::SessionUp);
                    } else {
                        self.transition_to(SessionState::KeepWait);
                    }
                    actions
                } else {
                    self.stats.record_sent(MessageType::Notification as u8);
                    self.transition_to(SessionState::Closed);
                    vec![
                        Action::Send(wire::notification_message(1, 1)),
                        Action::Close,
                    ]
                }
            }

            SessionState::KeepWait => {
                if header.message_type == MessageType::Keepalive as u8 {
                    self.local_ok.store(true, Ordering::Relaxed);
                    self.transition_to(SessionState::SessionUp);
                }
                vec![]
            }

            SessionState::SessionUp => {
                if header.message_type == MessageType::Close as u8 {
                    self.transition_to(SessionState::Closed);
                    return vec![Action::Close];
                }
                if header.message_type == MessageType::Keepalive as u8 {
                    self.hold_time_remaining
                        .store(self.config.dead_timer.as_secs(), Ordering::Relaxed);
                }
                vec![]
            }
        }
    }

    fn on_tick(&self, elapsed: u32) -> Vec<Action> {
        match self.state() {
            SessionState::OpenWait => {
                if elapsed as u64 >= self.config.open_wait_timer.as_secs() {
                    self.transition_to(SessionState::Closed);
                    return vec![Action::Close];
                }
                vec![]
            }

            SessionState::KeepWait => {
                if elapsed as u64 >= self.config.keep_wait_timer.as_secs() {
                    self.transition_to(SessionState::Closed);
                    return vec![Action::Close];
                }
                vec![]
            }

            SessionState::SessionUp => {
                let remaining = self.hold_time_remaining.load(Ordering::Relaxed);
                let remaining = remaining.saturating_sub(elapsed as u64);
                self.hold_time_remaining.store(remaining, Ordering::Relaxed);
                if remaining == 0 {
                    self.transition_to(SessionState::Closed);
                    return vec![
                        Action::Send(wire::CLOSE_MESSAGE.to_vec()),
                        Action::Close,
                    ];
                }

                let since_keep_alive = self
                    .since_last_keep_alive_sent
                    .fetch_add(elapsed as u64, Ordering::Relaxed)
                    + elapsed as u64;
                if since_keep_alive >= self.config.keep_alive_timer.as_secs() {
                    self.since_last_keep_alive_sent.store(0, Ordering::Relaxed);
                    self.stats.record_sent(MessageType::Keepalive as u8);
                    return vec![Action::Send(wire::KEEPALIVE_MESSAGE.to_vec())];
                }
                vec![]
            }

            _ => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Header;

    fn open_header(length: u16) -> Header {
        Header {
            version: 1,
            flags: 0,
            message_type: MessageType::Open as u8,
            length,
        }
    }

    fn keepalive_header() -> Header {
        Header {
            version: 1,
            flags: 0,
            message_type: MessageType::Keepalive as u8,
            length: 4,
        }
    }

    #[test]
    fn handshake_reaches_session_up_after_peer_keepalive() {
        let (session, actions) = Session::new(SessionConfig::default(), "local".into(), "peer".into());
        assert_eq!(session.state(), SessionState::OpenWait);
        assert!(matches!(actions[0], Action::Send(_)));

        session.handle_event(SessionEvent::MessageReceived(open_header(12)));
        assert_eq!(session.state(), SessionState::KeepWait);

        session.handle_event(SessionEvent::MessageReceived(keepalive_header()));
        assert_eq!(session.state(), SessionState::SessionUp);
    }

    #[test]
    fn malformed_open_length_sends_notification_and_closes() {
        let (session, _) = Session::new(SessionConfig::default(), "local".into(), "peer".into());
        let actions = session.handle_event(SessionEvent::MessageReceived(open_header(20)));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(actions[0], Action::Send(_)));
        assert!(matches!(actions[1], Action::Close));
    }

    #[test]
    fn dead_timer_closes_session_up_without_keepalives() {
        let mut config = SessionConfig::default();
        config.dead_timer = Duration::from_secs(4);
        let (session, _) = Session::new(config, "local".into(), "peer".into());
        session.handle_event(SessionEvent::MessageReceived(open_header(12)));
        session.handle_event(SessionEvent::MessageReceived(keepalive_header()));
        assert_eq!(session.state(), SessionState::SessionUp);

        let mut actions = vec![];
        for _ in 0..5 {
            actions = session.handle_event(SessionEvent::Tick(1));
        }
        assert_eq!(session.state(), SessionState::Closed);
        assert!(matches!(actions[0], Action::Send(_)));
        assert!(matches!(actions[1], Action::Close));
    }

    #[test]
    fn closed_is_a_monotonic_sink() {
        let (session, _) = Session::new(SessionConfig::default(), "local".into(), "peer".into());
        session.handle_event(SessionEvent::Shutdown);
        assert_eq!(session.state(), SessionState::Closed);

        for event in [
            SessionEvent::Tick(1),
            SessionEvent::MessageReceived(keepalive_header()),
            SessionEvent::PeerClosed,
        ] {
            let actions = session.handle_event(event);
            assert!(actions.is_empty());
            assert_eq!(session.state(), SessionState::Closed);
        }
    }

    #[test]
    fn statistics_never_decrease() {
        let (session, _) = Session::new(SessionConfig::default(), "local".into(), "peer".into());
        session.handle_event(SessionEvent::MessageReceived(open_header(12)));
        session.handle_event(SessionEvent::MessageReceived(keepalive_header()));
        let before = session.info().stats;
        session.handle_event(SessionEvent::Tick(1));
        session.handle_event(SessionEvent::MessageReceived(keepalive_header()));
        let after = session.info().stats;
        assert!(after.num_keep_alive_rcvd >= before.num_keep_alive_rcvd);
        assert!(after.num_pc_req_sent >= before.num_pc_req_sent);
    }

    #[test]
    fn socket_error_closes_session_from_any_state() {
        let (session, _) = Session::new(SessionConfig::default(), "local".into(), "peer".into());
        session.handle_event(SessionEvent::SocketError);
        assert_eq!(session.state(), SessionState::Closed);
    }
}
