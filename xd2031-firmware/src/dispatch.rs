//! Command dispatch (C5/C6 glue): turns parsed command-line input into
//! outgoing packets, and turns the bus's synchronous `CommandSink` calls
//! into blocking request/response pairs against the async packet link.
//!
//! Grounded in `spec.md` §4.5's "Command execution on UNLISTEN" paragraph
//! and §9's design note "Synthetic synchronous RPC over async packets":
//! the original's `cmd_handler` spin-waits on a `cmd_done` flag set from a
//! serial ISR. Here that is replaced by [`Transport::recv`] as the single
//! blocking/yield point, with [`PendingOpenTracker`] doing the channel-to-
//! reply correlation exactly as in `original_source/firmware/file.c`'s
//! `file_submit_call`.

use std::cell::RefCell;
use std::rc::Rc;

use log::warn;
use xd2031_proto::{CbmError, Command, Packet, FSFD_CMD, FSFD_SETOPT};

use crate::channel::{ChannelMode, ChannelTable};
use crate::cmdline::{self, Access, Drive, NameCommand, ParseError, ParsedName};
use crate::config::RuntimeConfig;
use crate::pending::PendingOpenTracker;
use crate::status::ErrorStatus;

/// A reliable duplex packet link. `send` transmits one packet; `recv`
/// blocks until the next packet arrives, doing whatever periodic work
/// (LEDs, other bus servicing) the caller needs while it waits. This is
/// the one suspension point in command handling — the replacement for the
/// original's spin-with-tick loop.
pub trait Transport {
    fn send(&mut self, packet: Packet);
    fn recv(&mut self) -> Packet;
}

/// Implements [`crate::bus::CommandSink`] by translating parsed command
/// lines into packets, and blocking on a reply via [`PendingOpenTracker`].
/// Owns the channel table through a shared handle so the same table can
/// also be threaded into [`crate::bus::BusState::attention`] by the
/// top-level driver.
pub struct CommandDispatcher<T: Transport> {
    transport: T,
    channels: Rc<RefCell<ChannelTable>>,
    pending: PendingOpenTracker,
    config: RuntimeConfig,
    status: ErrorStatus,
}

impl<T: Transport> CommandDispatcher<T> {
    #[must_use]
    pub fn new(transport: T, channels: Rc<RefCell<ChannelTable>>) -> Self {
        Self {
            transport,
            channels,
            pending: PendingOpenTracker::new(),
            config: RuntimeConfig::new(),
            status: ErrorStatus::new(),
        }
    }

    #[must_use]
    pub fn status(&self) -> &ErrorStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut ErrorStatus {
        &mut self.status
    }

    #[must_use]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Sends `RESET` and drains every `SETOPT` packet the server replays in
    /// response, applying each to `self.config` in the order received.
    /// There is no explicit end-of-replay marker on the wire; the caller
    /// passes `expected` (the option count it configured the link with) so
    /// this can stop once every option has come back.
    pub fn reset(&mut self, expected: usize) {
        self.transport.send(Packet::new(Command::Reset, FSFD_CMD, Vec::new()));
        let mut seen = 0;
        while seen < expected {
            let packet = self.transport.recv();
            if packet.command() == Some(Command::SetOpt) && packet.channel == FSFD_SETOPT {
                self.config.record_option(packet.payload);
                seen += 1;
            } else {
                self.route_unsolicited(packet);
            }
        }
    }

    /// Submits `packet` for `channel`, blocking on `Transport::recv` (and
    /// routing anything that arrives which isn't the reply we're waiting
    /// for) until the matching reply shows up. Returns the reply payload.
    fn request(&mut self, channel: u8, packet: Packet) -> Vec<u8> {
        let index = match self.pending.submit(channel, packet.encode()) {
            Ok(index) => index,
            Err(_) => {
                self.status.set(CbmError::NoChannel);
                return Vec::new();
            }
        };
        self.transport.send(packet);
        loop {
            if self.pending.is_done(index) {
                return self.pending.take(index);
            }
            let reply = self.transport.recv();
            self.route(reply);
        }
    }

    /// Matches one inbound packet either to the pending slot it completes,
    /// or (for unsolicited SETOPT replay arriving mid-command, per §9's
    /// re-entrancy note) applies it directly without disturbing the
    /// in-flight request.
    fn route(&mut self, packet: Packet) {
        if packet.command() == Some(Command::SetOpt) && packet.channel == FSFD_SETOPT {
            self.config.record_option(packet.payload);
            return;
        }
        self.pending.complete(packet.channel, packet.payload);
    }

    fn route_unsolicited(&mut self, packet: Packet) {
        match packet.command() {
            Some(Command::SetOpt) if packet.channel == FSFD_SETOPT => {
                self.config.record_option(packet.payload);
            }
            _ => warn!("dropping unexpected packet (cmd {}) outside any pending request", packet.cmd),
        }
    }

    fn resolve_drive(&self, drive: Drive) -> u8 {
        match drive {
            Drive::Numbered(n) => n,
            Drive::Default => self.config.last_drive(),
        }
    }

    fn remember_drive(&mut self, drive: Drive) {
        if let Drive::Numbered(n) = drive {
            self.config.set_last_drive(n);
        }
    }

    fn open_command_for(parsed: &ParsedName) -> Command {
        if parsed.command == NameCommand::Dir {
            return Command::OpenDr;
        }
        match parsed.access {
            Some(Access::Read) | None => Command::OpenRd,
            Some(Access::Write) if parsed.overwrite => Command::OpenOw,
            Some(Access::Write) => Command::OpenWr,
            Some(Access::Append) => Command::OpenAp,
            Some(Access::ReadWrite) => Command::OpenRw,
        }
    }

    fn channel_mode_for(parsed: &ParsedName) -> ChannelMode {
        if parsed.command == NameCommand::Dir {
            return ChannelMode::ReadOnly;
        }
        match parsed.access {
            Some(Access::Read) | None => ChannelMode::ReadOnly,
            Some(Access::Write) | Some(Access::Append) => ChannelMode::WriteOnly,
            Some(Access::ReadWrite) => ChannelMode::ReadWrite,
        }
    }

    /// Handles an OPEN secondary's accumulated filename: parse it, submit
    /// the matching `OPEN_*` packet, and on success bind the channel in the
    /// shared channel table so subsequent DATA bytes route correctly.
    fn do_open(&mut self, channel: u8, name: &[u8]) {
        let parsed = match cmdline::parse_open_name(name) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.status.set(parse_error_code(e));
                return;
            }
        };

        let drive = self.resolve_drive(parsed.drive);
        let cmd = Self::open_command_for(&parsed);
        let mut payload = Vec::with_capacity(parsed.name.len() + 1);
        payload.push(drive);
        payload.extend_from_slice(&parsed.name);

        let reply = self.request(channel, Packet::new(cmd, channel, payload));
        let Some(&code) = reply.first() else {
            self.status.set(CbmError::DriveNotReady);
            return;
        };
        match CbmError::from_code(code) {
            Some(CbmError::Ok) => {
                self.channels.borrow_mut().open(channel, Self::channel_mode_for(&parsed), drive);
                self.remember_drive(parsed.drive);
                self.status.set(CbmError::Ok);
            }
            Some(other) => self.status.set(other),
            None => self.status.set(CbmError::Fault),
        }
    }

    /// Handles a command-channel payload that names an operation other
    /// than OPEN (RENAME/SCRATCH/CD/MKDIR/RMDIR/ASSIGN/INITIALIZE/DIR).
    fn do_command(&mut self, parsed: ParsedName) {
        let drive = self.resolve_drive(parsed.drive);
        let result = match parsed.command {
            NameCommand::Initialize => {
                // No physical disk to re-read on the reference provider.
                Some(CbmError::Ok)
            }
            NameCommand::Dir => {
                // Directory listings are only served through an OPEN'd
                // channel (see `do_open`); a bare "$" on the command
                // channel has nothing to stream into, so it is a no-op.
                Some(CbmError::Ok)
            }
            NameCommand::Scratch => {
                let patterns = join_patterns(&parsed);
                let payload = with_drive(drive, &patterns);
                let reply = self.request(FSFD_CMD, Packet::new(Command::Delete, FSFD_CMD, payload));
                reply.first().copied().and_then(CbmError::from_code)
            }
            NameCommand::Rename => {
                let Some(sep) = parsed.name.iter().position(|&b| b == b'=') else {
                    return self.status.set(CbmError::SyntaxUnknown);
                };
                let (to, from) = (&parsed.name[..sep], &parsed.name[sep + 1..]);
                let mut payload = vec![drive];
                payload.extend_from_slice(to);
                payload.push(0);
                payload.extend_from_slice(from);
                let reply = self.request(FSFD_CMD, Packet::new(Command::Rename, FSFD_CMD, payload));
                reply.first().copied().and_then(CbmError::from_code)
            }
            NameCommand::Cd => {
                let payload = with_drive(drive, &parsed.name);
                let reply = self.request(FSFD_CMD, Packet::new(Command::Chdir, FSFD_CMD, payload));
                reply.first().copied().and_then(CbmError::from_code)
            }
            NameCommand::Mkdir => {
                let payload = with_drive(drive, &parsed.name);
                let reply = self.request(FSFD_CMD, Packet::new(Command::Mkdir, FSFD_CMD, payload));
                reply.first().copied().and_then(CbmError::from_code)
            }
            NameCommand::Rmdir => {
                let payload = with_drive(drive, &parsed.name);
                let reply = self.request(FSFD_CMD, Packet::new(Command::Rmdir, FSFD_CMD, payload));
                reply.first().copied().and_then(CbmError::from_code)
            }
            NameCommand::Assign => {
                let mut spec = drive.to_string().into_bytes();
                spec.push(b':');
                spec.extend_from_slice(&parsed.name);
                let reply = self.request(FSFD_CMD, Packet::new(Command::Assign, FSFD_CMD, spec));
                reply.first().copied().and_then(CbmError::from_code)
            }
            NameCommand::Open => unreachable!("parse_command never yields NameCommand::Open"),
        };
        self.status.set(result.unwrap_or(CbmError::Fault));
    }
}

impl<T: Transport> crate::bus::CommandSink for CommandDispatcher<T> {
    fn execute_command(&mut self, payload: &[u8]) {
        match cmdline::parse_command(payload) {
            Ok(parsed) => self.do_command(parsed),
            Err(e) => self.status.set(parse_error_code(e)),
        }
    }

    fn open_channel(&mut self, channel: u8, name: &[u8]) {
        self.do_open(channel, name);
    }

    fn close_channel(&mut self, channel: u8) {
        self.request(channel, Packet::new(Command::Close, channel, Vec::new()));
    }
}

fn with_drive(drive: u8, rest: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(rest.len() + 1);
    payload.push(drive);
    payload.extend_from_slice(rest);
    payload
}

/// Reconstructs the comma-separated pattern list `parse_body` split apart:
/// the name field plus every trailing option field it could not classify
/// as a type/access byte.
fn join_patterns(parsed: &ParsedName) -> Vec<u8> {
    let mut out = parsed.name.clone();
    for option in &parsed.options {
        out.push(b',');
        out.extend_from_slice(option);
    }
    out
}

fn parse_error_code(e: ParseError) -> CbmError {
    match e {
        ParseError::SyntaxUnknown => CbmError::SyntaxUnknown,
        ParseError::FileTypeMismatch => CbmError::FileTypeMismatch,
        ParseError::FileNotFound => CbmError::FileNotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::CommandSink;
    use std::collections::VecDeque;

    /// A deterministic in-memory transport: replies are queued up front and
    /// handed back in order, independent of what was sent.
    struct FakeTransport {
        sent: Vec<Packet>,
        replies: VecDeque<Packet>,
    }

    impl FakeTransport {
        fn new(replies: Vec<Packet>) -> Self {
            Self {
                sent: Vec::new(),
                replies: replies.into(),
            }
        }
    }

    impl Transport for FakeTransport {
        fn send(&mut self, packet: Packet) {
            self.sent.push(packet);
        }
        fn recv(&mut self) -> Packet {
            self.replies.pop_front().expect("fake transport exhausted")
        }
    }

    fn dispatcher(replies: Vec<Packet>) -> CommandDispatcher<FakeTransport> {
        CommandDispatcher::new(FakeTransport::new(replies), Rc::new(RefCell::new(ChannelTable::new())))
    }

    #[test]
    fn successful_open_binds_the_channel() {
        let mut d = dispatcher(vec![Packet::reply(3, CbmError::Ok.code())]);
        d.open_channel(3, b"HELLO");
        assert_eq!(d.status().code(), CbmError::Ok);
        assert!(d.channels.borrow().find(3).is_some());
        assert_eq!(d.transport.sent.len(), 1);
        assert_eq!(d.transport.sent[0].cmd, Command::OpenRd.as_byte());
    }

    #[test]
    fn failed_open_surfaces_the_error_and_does_not_bind() {
        let mut d = dispatcher(vec![Packet::reply(3, CbmError::FileNotFound.code())]);
        d.open_channel(3, b"NOPE");
        assert_eq!(d.status().code(), CbmError::FileNotFound);
        assert!(d.channels.borrow().find(3).is_none());
    }

    #[test]
    fn write_access_with_overwrite_marker_sends_open_ow() {
        let mut d = dispatcher(vec![Packet::reply(5, CbmError::Ok.code())]);
        d.open_channel(5, b"@0:TARGET,P,W");
        assert_eq!(d.transport.sent[0].cmd, Command::OpenOw.as_byte());
    }

    #[test]
    fn scratch_rebuilds_comma_joined_pattern_list() {
        let mut d = dispatcher(vec![Packet::new(Command::Reply, FSFD_CMD, vec![CbmError::Scratched.code(), 2])]);
        d.execute_command(b"S0:A,B");
        assert_eq!(d.status().code(), CbmError::Scratched);
        assert_eq!(d.transport.sent[0].payload, b"0A,B".to_vec());
    }

    #[test]
    fn rename_splits_on_equals_and_prefixes_drive() {
        let mut d = dispatcher(vec![Packet::reply(FSFD_CMD, CbmError::Ok.code())]);
        d.execute_command(b"R0:NEW=OLD");
        assert_eq!(d.transport.sent[0].cmd, Command::Rename.as_byte());
        assert_eq!(d.transport.sent[0].payload, b"0NEW\0OLD".to_vec());
    }

    #[test]
    fn assign_reconstructs_drive_colon_spec() {
        let mut d = dispatcher(vec![Packet::reply(FSFD_CMD, CbmError::Ok.code())]);
        d.execute_command(b"A2:fs=/tmp/root");
        assert_eq!(d.transport.sent[0].payload, b"2:fs=/tmp/root".to_vec());
    }

    #[test]
    fn initialize_is_a_local_no_op() {
        let mut d = dispatcher(Vec::new());
        d.execute_command(b"I");
        assert_eq!(d.status().code(), CbmError::Ok);
        assert!(d.transport.sent.is_empty());
    }

    #[test]
    fn close_channel_sends_a_close_packet() {
        let mut d = dispatcher(vec![Packet::reply(7, CbmError::Ok.code())]);
        d.close_channel(7);
        assert_eq!(d.transport.sent[0].cmd, Command::Close.as_byte());
    }

    #[test]
    fn unsolicited_setopt_is_applied_without_disturbing_the_pending_request() {
        let mut d = dispatcher(vec![
            Packet::new(Command::SetOpt, FSFD_SETOPT, b"8:X1".to_vec()),
            Packet::reply(3, CbmError::Ok.code()),
        ]);
        d.open_channel(3, b"HELLO");
        assert_eq!(d.status().code(), CbmError::Ok);
        assert_eq!(d.config().options(), &[b"8:X1".to_vec()]);
    }

    #[test]
    fn reset_drains_every_replayed_setopt() {
        let mut d = dispatcher(vec![
            Packet::new(Command::SetOpt, FSFD_SETOPT, b"8:X1".to_vec()),
            Packet::new(Command::SetOpt, FSFD_SETOPT, b"9:X2".to_vec()),
        ]);
        d.reset(2);
        assert_eq!(d.config().options(), &[b"8:X1".to_vec(), b"9:X2".to_vec()]);
        assert_eq!(d.transport.sent[0].cmd, Command::Reset.as_byte());
    }
}
