//! Bus impedance layer (C5): the IEEE-488/IEC attention-byte state machine.
//!
//! Grounded in `original_source/firmware/bus.c` (`bus_attention`,
//! `bus_sendbyte`, `bus_receivebyte`) and `spec.md` §4.5. This module only
//! consumes the higher-level `attention(byte)`/data-byte interface named in
//! `spec.md` §1 — it never touches CLK/DATA/ATN timing.

use crate::channel::ChannelTable;

/// Bit set in the returned status word when the latched device does not
/// match this bus's configured address.
pub const STATUS_DEVICE_NOT_PRESENT: u8 = 0x80;
/// Bit set when the channel just read signaled EOF.
pub const STATUS_EOF: u8 = 0x40;
/// Set when an OPEN could not be matched to a live channel.
pub const STATUS_OPEN_ERROR: u8 = 0x02;
/// Set when a data byte targeted a channel that doesn't exist.
pub const STATUS_CHANNEL_ERROR: u8 = 0x83;

/// Fixed capacity of the command buffer; overflow is silently dropped per
/// `spec.md` §4.5 ("Data-byte behavior").
pub const COMMAND_BUFFER_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SecondaryKind {
    None,
    /// Latched via a DATA secondary (`0x60..=0x6F`).
    Data,
    /// Latched via an OPEN secondary (`0xF0..=0xFF`), secondary != 15.
    Open,
    /// Latched via an OPEN secondary == 15 (the command channel).
    Command,
}

/// Receives a fully-assembled command-channel payload or OPEN filename on
/// UNLISTEN. Implemented by the layer above that owns the pending-open
/// tracker and packet dispatch (C6/C8); kept as a trait so this module
/// never depends on the packet protocol directly.
pub trait CommandSink {
    fn execute_command(&mut self, payload: &[u8]);
    fn open_channel(&mut self, channel: u8, name: &[u8]);
    /// A channel was closed locally by the CLOSE attention class. The sink
    /// should tell the server side to free whatever endpoint resource it
    /// has bound to `channel`, if any.
    fn close_channel(&mut self, channel: u8);
}

/// The attention-byte state machine for one bus (IEEE-488 or IEC).
#[derive(Debug)]
pub struct BusState {
    /// This device's configured primary address (0-30).
    address: u8,
    /// Added to the latched secondary to form a channel table id, so IEEE
    /// and IEC buses sharing one channel table never collide.
    bus_offset: u8,
    current_device: u8,
    current_secondary: u8,
    secondary_kind: SecondaryKind,
    listening: bool,
    talking: bool,
    command_buffer: Vec<u8>,
    /// Status flags contributed by the most recent data/receive operation
    /// (`STATUS_EOF`/`STATUS_OPEN_ERROR`/`STATUS_CHANNEL_ERROR`), folded
    /// into the next [`BusState::status`] word alongside device presence.
    last_flags: u8,
}

impl BusState {
    #[must_use]
    pub fn new(address: u8, bus_offset: u8) -> Self {
        Self {
            address,
            bus_offset,
            current_device: 0,
            current_secondary: 0,
            secondary_kind: SecondaryKind::None,
            listening: false,
            talking: false,
            command_buffer: Vec::new(),
            last_flags: 0,
        }
    }

    #[must_use]
    pub fn current_device(&self) -> u8 {
        self.current_device
    }

    #[must_use]
    pub fn current_secondary(&self) -> u8 {
        self.current_secondary
    }

    fn device_matches(&self) -> bool {
        self.current_device == self.address
    }

    fn channel_id(&self) -> u8 {
        self.bus_offset + self.current_secondary
    }

    /// Dispatches one attention-asserted byte, returning the 16-bit status
    /// word (bus flags in the low byte, current device in the high byte).
    pub fn attention(
        &mut self,
        byte: u8,
        channels: &mut ChannelTable,
        sink: &mut impl CommandSink,
    ) -> u16 {
        self.last_flags = 0;
        match byte {
            0x3F => self.unlisten(channels, sink),
            0x5F => self.untalk(),
            b if b & 0xF0 == 0xE0 => self.close_class(b & 0x0F, channels, sink),
            0x20..=0x3E => self.listen(byte & 0x1F),
            0x40..=0x5E => self.talk(byte & 0x1F),
            0x60..=0x6F => self.data_secondary(byte & 0x0F, channels),
            0xF0..=0xFF => self.open_secondary(byte & 0x0F),
            _ => {}
        }
        self.status()
    }

    fn unlisten(&mut self, channels: &mut ChannelTable, sink: &mut impl CommandSink) {
        if self.device_matches() {
            match self.secondary_kind {
                SecondaryKind::Command => sink.execute_command(&self.command_buffer),
                SecondaryKind::Open => {
                    let channel = self.channel_id();
                    let name = core::mem::take(&mut self.command_buffer);
                    sink.open_channel(channel, &name);
                }
                SecondaryKind::None | SecondaryKind::Data => {}
            }
        }
        let _ = channels;
        self.command_buffer.clear();
        self.current_device = 0;
        self.current_secondary = 0;
        self.secondary_kind = SecondaryKind::None;
        self.listening = false;
    }

    fn untalk(&mut self) {
        self.current_device = 0;
        self.current_secondary = 0;
        self.secondary_kind = SecondaryKind::None;
        self.talking = false;
    }

    fn close_class(&mut self, secondary: u8, channels: &mut ChannelTable, sink: &mut impl CommandSink) {
        if !self.device_matches() {
            return;
        }
        self.current_secondary = secondary;
        if secondary == 15 {
            for id in self.bus_offset..=self.bus_offset + 15 {
                sink.close_channel(id);
            }
            channels.close_range(self.bus_offset, self.bus_offset + 15);
        } else {
            let id = self.bus_offset + secondary;
            sink.close_channel(id);
            channels.close(id);
        }
    }

    fn listen(&mut self, device: u8) {
        self.current_device = device;
        self.listening = device == self.address;
        self.talking = false;
    }

    fn talk(&mut self, device: u8) {
        self.current_device = device;
        self.talking = device == self.address;
        self.listening = false;
    }

    fn data_secondary(&mut self, secondary: u8, channels: &mut ChannelTable) {
        self.current_secondary = secondary;
        self.secondary_kind = SecondaryKind::Data;
        self.last_flags = 0;
        if self.talking {
            let id = self.channel_id();
            match channels.find_mut(id) {
                Some(channel) => channel.preload(|| (Vec::new(), false)),
                None => self.last_flags |= STATUS_OPEN_ERROR,
            }
        }
    }

    fn open_secondary(&mut self, secondary: u8) {
        self.current_secondary = secondary;
        self.secondary_kind = if secondary == 15 {
            SecondaryKind::Command
        } else {
            SecondaryKind::Open
        };
        self.command_buffer.clear();
    }

    /// Dispatches one data byte (ATN not asserted), returning the same
    /// 16-bit status word [`BusState::attention`] does, with
    /// `STATUS_CHANNEL_ERROR` set if the latched secondary names no live
    /// channel.
    pub fn data(&mut self, byte: u8, with_eoi: bool, channels: &mut ChannelTable) -> u16 {
        self.last_flags = 0;
        if matches!(self.secondary_kind, SecondaryKind::Open | SecondaryKind::Command) {
            if self.command_buffer.len() < COMMAND_BUFFER_CAPACITY {
                self.command_buffer.push(byte);
            }
            return self.status();
        }
        if self.listening {
            let id = self.channel_id();
            match channels.find_mut(id) {
                Some(channel) => channel.put(byte, with_eoi),
                None => self.last_flags |= STATUS_CHANNEL_ERROR,
            }
        }
        self.status()
    }

    /// Reads the current byte off the channel this bus is talking on,
    /// advancing its cursor and applying the §4.2 auto-close rule. Returns
    /// `None` in the first slot if not talking or the channel doesn't
    /// exist; the status word carries `STATUS_EOF` once the byte just
    /// delivered was the last one expected.
    pub fn receive(&mut self, channels: &mut ChannelTable) -> (Option<u8>, u16) {
        self.last_flags = 0;
        if !self.talking {
            return (None, self.status());
        }
        let id = self.channel_id();
        let Some(channel) = channels.find_mut(id) else {
            self.last_flags |= STATUS_CHANNEL_ERROR;
            return (None, self.status());
        };
        let Some(byte) = channel.current_byte() else {
            return (None, self.status());
        };
        channel.next();
        if channel.current_is_eof() {
            self.last_flags |= STATUS_EOF;
        }
        channels.apply_auto_close(id);
        (Some(byte), self.status())
    }

    fn status(&self) -> u16 {
        let mut flags = self.last_flags;
        if !self.device_matches() {
            flags |= STATUS_DEVICE_NOT_PRESENT;
        }
        (u16::from(self.current_device) << 8) | u16::from(flags)
    }
}
