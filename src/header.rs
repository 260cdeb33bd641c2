//! # MESSAGE HEADER CODEC
//!
//! Parses and serializes the 4-byte PCEP common header (RFC 5440 §6.1) and
//! gives it a human-readable form for logging.
//!
//! A [Header] decodes unconditionally: any 4 bytes produce one, and
//! semantic validation of `version`/`message_type`/`length` is left to the
//! [Framer](crate::framer::Framer), which is the only place those fields
//! decide what happens next.

use std::fmt;

/// Size in bytes of the PCEP common header.
pub const HEADER_LEN: usize = 4;

/// The only version this implementation accepts as valid.
pub const VERSION: u8 = 1;

/// Lower exclusive bound on a valid PCEP message type.
pub const TYPE_MIN: u8 = 0;

/// Upper exclusive bound on a valid PCEP message type.
pub const TYPE_MAX: u8 = 8;

const VERSION_MASK: u8 = 0b1110_0000;
const VERSION_SHIFT: u32 = 5;
const FLAGS_MASK: u8 = 0b0001_1111;

/// The 4-byte header common to every PCEP message.
///
/// `message_type` is stored as the raw wire byte rather than an enum: the
/// codec's job is to decode syntactically, not to judge whether the value
/// is one PCEP knows about. Use [MessageType::try_from] to classify it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub flags: u8,
    pub message_type: u8,
    pub length: u16,
}

impl Header {
    /// Decodes a header from its wire bytes. Always succeeds: out-of-range
    /// `version`, `message_type`, or `length` values are preserved as-is.
    pub fn decode(bytes: [u8; HEADER_LEN]) -> Header {
        Header {
            version: (bytes[0] & VERSION_MASK) >> VERSION_SHIFT,
            flags: bytes[0] & FLAGS_MASK,
            message_type: bytes[1],
            length: u16::from_be_bytes([bytes[2], bytes[3]]),
        }
    }

    /// Serializes the header back to its 4 wire bytes.
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let length = self.length.to_be_bytes();
        [
            (self.version << VERSION_SHIFT) | (self.flags & FLAGS_MASK),
            self.message_type,
            length[0],
            length[1],
        ]
    }

    pub fn is_version_valid(&self) -> bool {
        self.version == VERSION
    }

    pub fn is_type_valid(&self) -> bool {
        self.message_type > TYPE_MIN && self.message_type < TYPE_MAX
    }
}

impl fmt::Display for Header {
    /// `ver: N, flags: 0xXX, type: NAME, len: N`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = MessageType::try_from(self.message_type)
            .map(|t| t.name())
            .unwrap_or("UNKNOWN");
        write!(
            f,
            "ver: {}, flags: {:#04x}, type: {}, len: {}",
            self.version, self.flags, name, self.length
        )
    }
}

/// The seven message types PCEP defines at the header level. Bodies are
/// out of scope for this crate; only enough of each type is known here to
/// drive the session state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Open = 1,
    Keepalive = 2,
    PcRequest = 3,
    PcReply = 4,
    Notification = 5,
    Error = 6,
    Close = 7,
}

impl MessageType {
    pub fn name(self) -> &'static str {
        match self {
            MessageType::Open => "OPEN",
            MessageType::Keepalive => "KEEPALIVE",
            MessageType::PcRequest => "PCREQ",
            MessageType::PcReply => "PCREP",
            MessageType::Notification => "NOTIFY",
            MessageType::Error => "ERROR",
            MessageType::Close => "CLOSE",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::Open),
            2 => Ok(MessageType::Keepalive),
            3 => Ok(MessageType::PcRequest),
            4 => Ok(MessageType::PcReply),
            5 => Ok(MessageType::Notification),
            6 => Ok(MessageType::Error),
            7 => Ok(MessageType::Close),
            _ => Err(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_valid_header() {
        for message_type in 1u8..=7 {
            for length in [4u16, 12, 65535] {
                let header = Header {
                    version: 1,
                    flags: 0x00,
                    message_type,
                    length,
                };
                assert_eq!(Header::decode(header.encode()), header);
            }
        }
    }

    #[test]
    fn decode_never_fails_on_garbage() {
        let header = Header::decode([0xFF, 0xFF, 0x00, 0x02]);
        assert_eq!(header.version, 0b111);
        assert!(!header.is_version_valid());
        assert!(!header.is_type_valid());
    }

    #[test]
    fn flags_are_preserved_independent_of_version_bits() {
        let bytes = [0b001_10101, 0x01, 0x00, 0x0C];
        let header = Header::decode(bytes);
        assert_eq!(header.version, 1);
        assert_eq!(header.flags, 0b10101);
        assert_eq!(header.encode(), bytes);
    }

    #[test]
    fn format_falls_back_to_unknown_for_out_of_range_type() {
        let header = Header {
            version: 1,
            flags: 0,
            message_type: 42,
            length: 4,
        };
        assert!(header.to_string().contains("UNKNOWN"));
    }

    #[test]
    fn format_matches_reference_layout() {
        let header = Header {
            version: 1,
            flags: 0,
            message_type: 2,
            length: 4,
        };
        assert_eq!(header.to_string(), "ver: 1, flags: 0x00, type: KEEPALIVE, len: 4");
    }
}
