//! Channel table (C2): per-channel double-buffered preload pipeline.
//!
//! Grounded in `original_source/firmware/bus.c`'s channel handling (`prepare`,
//! `channel_put`, `channel_receive`) and the channel state described in
//! `spec.md` §3 "Channel". A channel is the addressable pipe for one
//! (device, secondary) pair, offset so IEEE and IEC buses never collide.

/// Access mode a channel was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
    /// Non-blocking variant: `refill` must not suspend waiting for data.
    NonBlocking,
}

/// A double buffer: one half being delivered to the bus, the other being
/// refilled from the endpoint. `front` is always the one currently being
/// read from or written to.
#[derive(Debug, Default, Clone)]
struct DoubleBuffer {
    front: Vec<u8>,
    front_pos: usize,
    back: Vec<u8>,
}

impl DoubleBuffer {
    fn current_byte(&self) -> Option<u8> {
        self.front.get(self.front_pos).copied()
    }

    fn is_front_exhausted(&self) -> bool {
        self.front_pos >= self.front.len()
    }

    fn swap(&mut self) {
        core::mem::swap(&mut self.front, &mut self.back);
        self.front_pos = 0;
        self.back.clear();
    }
}

/// One open channel.
#[derive(Debug, Clone)]
pub struct Channel {
    pub mode: ChannelMode,
    /// The endpoint (drive) this channel is bound to.
    pub drive: u8,
    buffer: DoubleBuffer,
    eof: bool,
    has_more: bool,
    preloaded: bool,
}

impl Channel {
    fn new(mode: ChannelMode, drive: u8) -> Self {
        Self {
            mode,
            drive,
            buffer: DoubleBuffer::default(),
            eof: false,
            has_more: true,
            preloaded: false,
        }
    }

    /// Appends a byte to the channel's back buffer, for write-direction
    /// channels. `with_eoi` marks this as the final byte of the transfer.
    pub fn put(&mut self, byte: u8, with_eoi: bool) {
        self.buffer.back.push(byte);
        if with_eoi {
            self.has_more = false;
        }
    }

    /// Ensures the front buffer has at least one byte available, pulling
    /// from `source` if necessary. Idempotent.
    pub fn preload<F: FnOnce() -> (Vec<u8>, bool)>(&mut self, source: F) {
        if self.preloaded {
            return;
        }
        if self.buffer.front.is_empty() {
            let (data, has_more) = source();
            self.buffer.front = data;
            self.buffer.front_pos = 0;
            self.has_more = has_more;
        }
        self.preloaded = true;
    }

    #[must_use]
    pub fn current_byte(&self) -> Option<u8> {
        self.buffer.current_byte()
    }

    #[must_use]
    pub fn current_is_eof(&self) -> bool {
        self.eof
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// Advances the read cursor. Returns `false` if the front buffer is now
    /// empty (caller should check [`Channel::has_more`] and call
    /// [`Channel::refill`]).
    pub fn next(&mut self) -> bool {
        if self.buffer.is_front_exhausted() {
            return false;
        }
        self.buffer.front_pos += 1;
        if self.buffer.is_front_exhausted() && !self.has_more {
            self.eof = true;
        }
        !self.buffer.is_front_exhausted()
    }

    /// Swaps in the back buffer as the new front, pulling fresh data via
    /// `source` for the next back buffer.
    pub fn refill<F: FnOnce() -> (Vec<u8>, bool)>(&mut self, source: F) {
        self.buffer.swap();
        if self.buffer.front.is_empty() {
            let (data, has_more) = source();
            self.buffer.front = data;
            self.has_more = has_more;
        }
        if self.buffer.front.is_empty() && !self.has_more {
            self.eof = true;
        }
    }
}

/// Secondary addresses with protocol meaning, independent of drive.
pub const SECONDARY_LOAD: u8 = 0;
pub const SECONDARY_COMMAND: u8 = 15;

/// Table of all currently-open channels, keyed by (device, secondary)
/// folded into a single id by the bus layer (secondary + bus offset).
#[derive(Debug, Default)]
pub struct ChannelTable {
    channels: std::collections::BTreeMap<u8, Channel>,
}

impl ChannelTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, channel_id: u8, mode: ChannelMode, drive: u8) {
        self.channels.insert(channel_id, Channel::new(mode, drive));
    }

    pub fn close(&mut self, channel_id: u8) {
        self.channels.remove(&channel_id);
    }

    /// Closes every channel whose id falls in `[low, high]`, used by the
    /// secondary-15 "close all" convention.
    pub fn close_range(&mut self, low: u8, high: u8) {
        self.channels.retain(|id, _| !(*id >= low && *id <= high));
    }

    #[must_use]
    pub fn find(&self, channel_id: u8) -> Option<&Channel> {
        self.channels.get(&channel_id)
    }

    pub fn find_mut(&mut self, channel_id: u8) -> Option<&mut Channel> {
        self.channels.get_mut(&channel_id)
    }

    /// Applies the auto-close rule: the load channel and status channel
    /// close themselves once their front buffer is exhausted and no more
    /// data is expected.
    pub fn apply_auto_close(&mut self, channel_id: u8) {
        let secondary = channel_id % 16;
        if secondary != SECONDARY_LOAD && secondary != SECONDARY_COMMAND {
            return;
        }
        let should_close = self
            .channels
            .get(&channel_id)
            .is_some_and(|c| c.buffer.is_front_exhausted() && !c.has_more);
        if should_close {
            self.channels.remove(&channel_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preload_is_idempotent() {
        let mut channel = Channel::new(ChannelMode::ReadOnly, 0);
        let mut calls = 0;
        channel.preload(|| {
            calls += 1;
            (vec![1, 2, 3], false)
        });
        channel.preload(|| {
            calls += 1;
            (vec![9], false)
        });
        assert_eq!(calls, 1);
        assert_eq!(channel.current_byte(), Some(1));
    }

    #[test]
    fn next_reports_exhaustion_then_refill_swaps_buffers() {
        let mut channel = Channel::new(ChannelMode::ReadOnly, 0);
        channel.preload(|| (vec![1, 2], true));
        assert!(channel.next()); // now at byte 2
        assert!(!channel.next()); // front exhausted

        channel.refill(|| (vec![3, 4], false));
        assert_eq!(channel.current_byte(), Some(3));
    }

    #[test]
    fn eof_is_set_once_final_byte_consumed_with_no_more_data() {
        let mut channel = Channel::new(ChannelMode::ReadOnly, 0);
        channel.preload(|| (vec![42], false));
        assert!(!channel.current_is_eof());
        channel.next();
        assert!(channel.current_is_eof());
    }

    #[test]
    fn close_range_removes_only_channels_in_bounds() {
        let mut table = ChannelTable::new();
        table.open(0, ChannelMode::ReadOnly, 0);
        table.open(5, ChannelMode::ReadOnly, 0);
        table.open(15, ChannelMode::ReadOnly, 0);
        table.close_range(0, 10);
        assert!(table.find(0).is_none());
        assert!(table.find(5).is_none());
        assert!(table.find(15).is_some());
    }
}
