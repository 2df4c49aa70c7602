//! On-the-wire packet layout.
//!
//! ```text
//! byte 0: cmd
//! byte 1: len      (total length including this header; >= 3)
//! byte 2: channel  (or a reserved control id)
//! byte 3..len-1: payload
//! ```

use alloc::vec::Vec;

/// Minimum total length of any packet (a 3-byte header with an empty payload).
pub const MIN_PACKET_LEN: u8 = 3;

/// Reserved command byte used purely to resynchronize the framer (see
/// [`crate::framer::Framer`]). It never carries a payload and is mirrored
/// back verbatim by the receiver.
pub const FS_SYNC: u8 = 0x00;

/// Reserved channel id for packets that carry a pure command with no bound
/// channel (`TERM`, `SETOPT`, `RESET`, directory-independent `ASSIGN`, ...).
pub const FSFD_CMD: u8 = 0xff;

/// Reserved channel id used for `SETOPT` option-replay packets.
pub const FSFD_SETOPT: u8 = 0xfe;

/// Operation codes carried in [`Packet::cmd`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    /// A log line from the firmware side, forwarded to the server's logger.
    Term = 1,
    /// Apply a named runtime option.
    SetOpt = 2,
    /// Ask the server to replay every `SETOPT` it was configured with.
    Reset = 3,
    OpenRd = 4,
    OpenWr = 5,
    OpenAp = 6,
    OpenRw = 7,
    /// Open-or-truncate; not reachable from the bus command parser directly
    /// (there is no CBM access-mode byte for it) but used internally by
    /// providers that implement "overwrite" semantics for `@0:NAME,W`.
    OpenOw = 8,
    /// Open a directory read.
    OpenDr = 9,
    Read = 10,
    Write = 11,
    /// Like `Write`, but marks the final chunk of a file (EOI on the bus).
    Eof = 12,
    Close = 13,
    /// SCRATCH: delete one or more files matching a pattern.
    Delete = 14,
    Rename = 15,
    Chdir = 16,
    Mkdir = 17,
    Rmdir = 18,
    Assign = 19,
    /// Direct block access (U1/U2/B-A/B-F framing).
    Block = 20,
    /// A reply to any of the above, carried back to the firmware side.
    Reply = 22,
}

impl Command {
    /// Parses a command byte, returning `None` for anything not in the
    /// protocol's vocabulary. `FS_SYNC` is deliberately excluded: it is
    /// handled by the framer and never reaches a `Command`.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            1 => Self::Term,
            2 => Self::SetOpt,
            3 => Self::Reset,
            4 => Self::OpenRd,
            5 => Self::OpenWr,
            6 => Self::OpenAp,
            7 => Self::OpenRw,
            8 => Self::OpenOw,
            9 => Self::OpenDr,
            10 => Self::Read,
            11 => Self::Write,
            12 => Self::Eof,
            13 => Self::Close,
            14 => Self::Delete,
            15 => Self::Rename,
            16 => Self::Chdir,
            17 => Self::Mkdir,
            18 => Self::Rmdir,
            19 => Self::Assign,
            20 => Self::Block,
            22 => Self::Reply,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A fully decoded packet: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub cmd: u8,
    pub channel: u8,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Builds a new packet. `payload.len()` must fit in a `u8` once the
    /// 3-byte header is added; callers in this workspace never exceed the
    /// small buffer sizes used by the protocol, so this is an assertion
    /// rather than a recoverable error.
    #[must_use]
    pub fn new(cmd: Command, channel: u8, payload: Vec<u8>) -> Self {
        assert!(
            payload.len() + usize::from(MIN_PACKET_LEN) <= 0xff,
            "packet payload too large to frame"
        );
        Self {
            cmd: cmd.as_byte(),
            channel,
            payload,
        }
    }

    /// Builds a reply packet carrying a single error-code byte.
    #[must_use]
    pub fn reply(channel: u8, error_code: u8) -> Self {
        Self {
            cmd: Command::Reply.as_byte(),
            channel,
            payload: alloc::vec![error_code],
        }
    }

    #[must_use]
    pub fn command(&self) -> Option<Command> {
        Command::from_byte(self.cmd)
    }

    /// Total on-the-wire length, including the 3-byte header.
    #[must_use]
    pub fn wire_len(&self) -> u8 {
        u8::try_from(self.payload.len() + usize::from(MIN_PACKET_LEN))
            .expect("validated at construction")
    }

    /// Serializes this packet to its wire representation.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.payload.len() + usize::from(MIN_PACKET_LEN));
        out.push(self.cmd);
        out.push(self.wire_len());
        out.push(self.channel);
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode() {
        let packet = Packet::new(Command::Write, 3, alloc::vec![1, 2, 3, 4]);
        let bytes = packet.encode();
        assert_eq!(bytes, alloc::vec![Command::Write.as_byte(), 7, 3, 1, 2, 3, 4]);
    }

    #[test]
    fn reply_carries_single_error_byte() {
        let packet = Packet::reply(5, 62);
        assert_eq!(packet.encode(), alloc::vec![Command::Reply.as_byte(), 4, 5, 62]);
    }

    #[test]
    fn command_from_byte_rejects_sync() {
        assert_eq!(Command::from_byte(FS_SYNC), None);
    }
}
