//! Packet reassembly over a byte stream, with sync-byte resynchronization.
//!
//! The bus link has no framing of its own below this layer: bytes can be
//! dropped or duplicated by a flaky serial connection, so both sides
//! prepend each packet with a length byte and fall back to a single
//! reserved sync byte ([`crate::packet::FS_SYNC`]) whenever the stream
//! looks malformed. `Framer` owns no transport; callers push bytes in with
//! [`Framer::feed`] and drain events with [`Framer::poll`] until it reports
//! [`FramerEvent::NeedMore`].

use alloc::vec::Vec;

use crate::packet::{Packet, FS_SYNC, MIN_PACKET_LEN};

/// Above this many stale bytes, `poll` compacts the buffer eagerly instead
/// of waiting for it to drain completely. Keeps a long-lived connection's
/// buffer from growing without bound even if packets never quite land on
/// the end of it.
const COMPACT_THRESHOLD: usize = 256;

/// What happened on the last call to [`Framer::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramerEvent {
    /// A complete packet was decoded.
    Packet(Packet),
    /// A sync byte was seen and consumed; the caller should write a single
    /// `FS_SYNC` byte back out to the peer.
    Sync,
    /// The buffer doesn't hold a complete packet yet; feed more bytes.
    NeedMore,
}

/// Reassembles packets out of an arbitrarily-chunked byte stream.
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
    rdp: usize,
}

impl Framer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            rdp: 0,
        }
    }

    /// Appends newly-received bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len() - self.rdp
    }

    /// Decodes the next packet or sync event out of the buffer.
    ///
    /// Call this in a loop after every [`Framer::feed`] until it returns
    /// [`FramerEvent::NeedMore`].
    pub fn poll(&mut self) -> FramerEvent {
        loop {
            if self.pending() >= 2 && self.rdp >= COMPACT_THRESHOLD {
                self.compact();
            }
            if self.pending() < 2 {
                self.compact();
                return FramerEvent::NeedMore;
            }

            let cmd = self.buf[self.rdp];
            if cmd == FS_SYNC {
                self.rdp += 1;
                return FramerEvent::Sync;
            }

            let len = self.buf[self.rdp + 1];
            if len < MIN_PACKET_LEN {
                // Not a plausible header; the stream is out of sync.
                // Advance one byte at a time looking for the next sync
                // byte or a header that parses.
                self.rdp += 1;
                continue;
            }

            let len = usize::from(len);
            if self.pending() < len {
                return FramerEvent::NeedMore;
            }

            let channel = self.buf[self.rdp + 2];
            let payload = self.buf[self.rdp + 3..self.rdp + len].to_vec();
            self.rdp += len;
            return FramerEvent::Packet(Packet {
                cmd,
                channel,
                payload,
            });
        }
    }

    /// Drops already-consumed bytes from the front of the buffer.
    fn compact(&mut self) {
        if self.rdp == 0 {
            return;
        }
        self.buf.drain(0..self.rdp);
        self.rdp = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::Command;

    #[test]
    fn reassembles_a_packet_split_across_feeds() {
        let packet = Packet::new(Command::Write, 2, alloc::vec![9, 8, 7]);
        let bytes = packet.encode();

        let mut framer = Framer::new();
        framer.feed(&bytes[..2]);
        assert_eq!(framer.poll(), FramerEvent::NeedMore);
        framer.feed(&bytes[2..]);
        assert_eq!(framer.poll(), FramerEvent::Packet(packet));
        assert_eq!(framer.poll(), FramerEvent::NeedMore);
    }

    #[test]
    fn mirrors_sync_bytes_one_at_a_time() {
        let mut framer = Framer::new();
        framer.feed(&[FS_SYNC, FS_SYNC]);
        assert_eq!(framer.poll(), FramerEvent::Sync);
        assert_eq!(framer.poll(), FramerEvent::Sync);
        assert_eq!(framer.poll(), FramerEvent::NeedMore);
    }

    #[test]
    fn resyncs_after_garbage_by_scanning_byte_at_a_time() {
        let packet = Packet::new(Command::Term, 0xff, Vec::new());
        let bytes = packet.encode();

        let mut framer = Framer::new();
        framer.feed(&[0x41, 0x00, 0x01]); // "header" with an impossible length
        framer.feed(&bytes);
        assert_eq!(framer.poll(), FramerEvent::Packet(packet));
    }

    #[test]
    fn two_packets_back_to_back_both_decode() {
        let a = Packet::new(Command::Read, 1, alloc::vec![1]);
        let b = Packet::new(Command::Read, 2, alloc::vec![2]);
        let mut framer = Framer::new();
        framer.feed(&a.encode());
        framer.feed(&b.encode());
        assert_eq!(framer.poll(), FramerEvent::Packet(a));
        assert_eq!(framer.poll(), FramerEvent::Packet(b));
        assert_eq!(framer.poll(), FramerEvent::NeedMore);
    }
}
