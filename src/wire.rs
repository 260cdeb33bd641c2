//! Canned wire bytes for the three header-only messages the session state
//! machine emits on its own initiative (Open, Keepalive, Close).
//!
//! PCEP object/TLV encoding is out of scope for this crate (see
//! [crate::session]), so these are not built field-by-field from a richer
//! model — they are the same literal bytes a PCC's open handshake and
//! graceful close send on the wire, reused verbatim.

/// `OPEN`, length 12: common header plus a single minimal OPEN object
/// (version 1, keepalive 32s, deadtimer 0, SID 0).
pub const OPEN_MESSAGE: [u8; 12] = [
    0x20, 0x01, 0x00, 0x0C, 0x01, 0x10, 0x00, 0x08, 0x20, 0x00, 0x00, 0x00,
];

/// `KEEPALIVE`, length 4: header only, no body.
pub const KEEPALIVE_MESSAGE: [u8; 4] = [0x20, 0x02, 0x00, 0x04];

/// `CLOSE`, length 12: common header plus a single minimal CLOSE object
/// (reason 0: "no explanation provided").
pub const CLOSE_MESSAGE: [u8; 12] = [
    0x20, 0x07, 0x00, 0x0C, 0x0F, 0x10, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00,
];

/// Builds a `NOTIFICATION`, length 8: header plus a 4-byte placeholder body
/// carrying `(notification_type, notification_value)`. Real PCEP
/// notification objects carry more structure than this; the body format is
/// out of scope here, so only enough is encoded to make the two values the
/// state machine cares about ([crate::session]'s `OPEN_WAIT` mismatch path)
/// visible on the wire and in logs.
pub fn notification_message(notification_type: u8, notification_value: u8) -> Vec<u8> {
    vec![
        0x20, 0x05, 0x00, 0x08, notification_type, notification_value, 0x00, 0x00,
    ]
}
