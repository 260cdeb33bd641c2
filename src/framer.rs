//! # FRAMER
//!
//! Turns an arbitrary sequence of byte chunks into a sequence of complete
//! [Message]s, one byte at a time. Chunk boundaries never affect the
//! result: feeding the same bytes in one [write](Framer::write) call or a
//! hundred produces the same emitted messages in the same order.
//!
//! The framer never surfaces a framing error. An invalid version, an
//! out-of-range type, or a too-short length simply cost the resync window
//! between the bad byte and the next plausible header start; the caller is
//! never told.

use std::collections::VecDeque;

use crate::header::{Header, HEADER_LEN, TYPE_MAX, TYPE_MIN, VERSION};

/// A complete, framed PCEP message: the header plus whatever body bytes
/// its length declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub header: Header,
    pub body: Vec<u8>,
}

impl Message {
    /// Reassembles the full wire bytes of this message.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.body.len());
        bytes.extend_from_slice(&self.header.encode());
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HuntState {
    VerFlags,
    Type,
    Len,
    Body,
}

/// The streaming PCEP message reassembler (§4.2 of the session design).
///
/// Owns at most one in-progress message buffer and a FIFO of messages
/// already framed but not yet read out.
pub struct Framer {
    state: HuntState,
    version: u8,
    flags: u8,
    message_type: u8,
    length_bytes: [u8; 2],
    length_count: u8,
    body: Vec<u8>,
    length: u16,
    queue: VecDeque<Message>,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Framer {
            state: HuntState::VerFlags,
            version: 0,
            flags: 0,
            message_type: 0,
            length_bytes: [0; 2],
            length_count: 0,
            body: Vec::new(),
            length: 0,
            queue: VecDeque::new(),
        }
    }

    /// Feeds a chunk of bytes into the framer, advancing the FSM one byte
    /// at a time and appending any completed messages to the read queue.
    pub fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.push_byte(byte);
        }
    }

    /// Pops the oldest complete message, if any. Does not otherwise
    /// disturb the queue or the in-progress parse.
    pub fn read(&mut self) -> Option<Message> {
        self.queue.pop_front()
    }

    /// Unconditionally returns to the initial hunting state and discards
    /// any in-progress message. Already-emitted messages in the read queue
    /// are untouched.
    pub fn reset(&mut self) {
        self.state = HuntState::VerFlags;
        self.length_count = 0;
        self.body.clear();
    }

    fn push_byte(&mut self, byte: u8) {
        match self.state {
            HuntState::VerFlags => {
                let version = (byte & 0b1110_0000) >> 5;
                if version != VERSION {
                    self.reset();
                    return;
                }
                self.version = version;
                self.flags = byte & 0b0001_1111;
                self.state = HuntState::Type;
            }

            HuntState::Type => {
                if byte <= TYPE_MIN || byte >= TYPE_MAX {
                    self.reset();
                    return;
                }
                self.message_type = byte;
                self.length_count = 0;
                self.state = HuntState::Len;
            }

            HuntState::Len => {
                self.length_bytes[self.length_count as usize] = byte;
                self.length_count += 1;
                if self.length_count < 2 {
                    return;
                }
                let length = u16::from_be_bytes(self.length_bytes);
                if (length as usize) < HEADER_LEN {
                    self.reset();
                    return;
                }
                self.length = length;
                self.body = Vec::with_capacity(length as usize - HEADER_LEN);
                if self.body.capacity() == 0 {
                    // Keepalive: a zero-length body completes the message on
                    // this very byte, without ever visiting HuntState::Body.
                    self.emit();
                } else {
                    self.state = HuntState::Body;
                }
            }

            HuntState::Body => {
                self.body.push(byte);
                if self.body.len() == self.length as usize - HEADER_LEN {
                    self.emit();
                }
            }
        }
    }

    fn emit(&mut self) {
        let header = Header {
            version: self.version,
            flags: self.flags,
            message_type: self.message_type,
            length: self.length,
        };
        self.queue.push_back(Message {
            header,
            body: std::mem::take(&mut self.body),
        });
        self.state = HuntState::VerFlags;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPEN: [u8; 12] = [0x20, 0x01, 0x00, 0x0C, 0x01, 0x10, 0x00, 0x08, 0x20, 0x00, 0x00, 0x00];
    const KEEPALIVE: [u8; 4] = [0x20, 0x02, 0x00, 0x04];

    #[test]
    fn one_chunk_emits_one_open_message() {
        let mut framer = Framer::new();
        framer.write(&OPEN);
        let message = framer.read().expect("message");
        assert_eq!(message.header.length, 12);
        assert_eq!(message.header.message_type, 1);
        assert!(framer.read().is_none());
    }

    #[test]
    fn byte_at_a_time_emits_on_the_last_byte_only() {
        let mut framer = Framer::new();
        for &byte in &OPEN[..OPEN.len() - 1] {
            framer.write(&[byte]);
            assert!(framer.read().is_none(), "emitted before the message was complete");
        }
        framer.write(&[OPEN[OPEN.len() - 1]]);
        assert!(framer.read().is_some());
    }

    #[test]
    fn chunk_boundary_invariance() {
        let stream: Vec<u8> = OPEN.iter().chain(KEEPALIVE.iter()).copied().collect();
        let whole = {
            let mut framer = Framer::new();
            framer.write(&stream);
            let mut out = vec![];
            while let Some(m) = framer.read() {
                out.push(m);
            }
            out
        };
        for chunk_size in 1..=stream.len() {
            let mut framer = Framer::new();
            for chunk in stream.chunks(chunk_size) {
                framer.write(chunk);
            }
            let mut out = vec![];
            while let Some(m) = framer.read() {
                out.push(m);
            }
            assert_eq!(out, whole, "mismatch at chunk_size={chunk_size}");
        }
    }

    #[test]
    fn keepalive_emits_immediately_on_fourth_byte_never_later() {
        let mut framer = Framer::new();
        framer.write(&KEEPALIVE[..3]);
        assert!(framer.read().is_none());
        framer.write(&KEEPALIVE[3..]);
        let message = framer.read().expect("keepalive");
        assert_eq!(message.header.length, 4);
        assert!(message.body.is_empty());
    }

    #[test]
    fn invalid_version_resyncs_without_surfacing_an_error() {
        let mut stream = vec![0xFF, 0xFF];
        stream.extend_from_slice(&OPEN);
        let mut framer = Framer::new();
        framer.write(&stream);
        let message = framer.read().expect("message after resync");
        assert_eq!(message.header.message_type, 1);
        assert!(framer.read().is_none());
    }

    #[test]
    fn length_below_header_size_resets_without_emission() {
        let mut framer = Framer::new();
        framer.write(&[0x20, 0x01, 0x00, 0x02]);
        assert!(framer.read().is_none());
        // The framer is hunting again; feed a clean message to confirm it.
        framer.write(&KEEPALIVE);
        assert!(framer.read().is_some());
    }

    #[test]
    fn reset_drops_in_progress_message_but_keeps_the_read_queue() {
        let mut framer = Framer::new();
        framer.write(&KEEPALIVE);
        framer.write(&OPEN[..6]); // header plus two body bytes, never completed
        framer.reset();
        let message = framer.read().expect("the keepalive emitted earlier survives reset");
        assert_eq!(message.header.message_type, 2);
        assert!(framer.read().is_none());
        // Resumes hunting cleanly after the reset.
        framer.write(&OPEN);
        assert!(framer.read().is_some());
    }

    #[test]
    fn invalid_type_resyncs() {
        let mut stream = vec![0x20, 0x00]; // ver ok, type==TYPE_MIN is invalid
        stream.extend_from_slice(&KEEPALIVE);
        let mut framer = Framer::new();
        framer.write(&stream);
        let message = framer.read().expect("message after resync");
        assert_eq!(message.header.message_type, 2);
    }
}
