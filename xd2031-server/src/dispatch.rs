//! Server packet dispatcher (C8): framer output in, reply packets out.
//!
//! Grounded in `original_source/pcserver/fscmd.c`'s `do_cmd`/`write_packet`
//! and `chantable`/`chan_to_endpoint`/`set_chan`/`free_chan` (channel to
//! drive binding), generalized from that file's single giant `switch` into
//! one method per operation group, per `spec.md` §4.8's dispatch table.

use std::collections::HashMap;

use log::{info, warn};
use xd2031_proto::{CbmError, Command, Packet, FSFD_SETOPT};

use crate::config::RuntimeConfig;
use crate::provider::OpenKind;
use crate::registry::ProviderRegistry;

/// Upper bound on how many bytes a single `READ` reply carries, leaving
/// room for the 3-byte packet header within a `u8` wire length.
pub const MAX_READ_CHUNK: usize = 252;

/// Ties the provider registry and runtime config together into the single
/// per-connection state machine that answers every incoming packet.
pub struct Dispatcher {
    registry: ProviderRegistry,
    config: RuntimeConfig,
    /// Channel id -> drive it was opened against, so later READ/WRITE/
    /// CLOSE packets (which carry no drive number of their own) can find
    /// the right provider.
    channel_drive: HashMap<u8, u8>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(registry: ProviderRegistry, config: RuntimeConfig) -> Self {
        Self {
            registry,
            config,
            channel_drive: HashMap::new(),
        }
    }

    /// Processes one incoming packet, returning zero or more reply
    /// packets to send back (`TERM` produces none; `RESET` may produce
    /// several `SETOPT` replays; everything else produces exactly one).
    pub fn dispatch(&mut self, packet: &Packet) -> Vec<Packet> {
        let Some(cmd) = packet.command() else {
            warn!("dropping packet with unrecognized cmd byte {}", packet.cmd);
            return Vec::new();
        };

        match cmd {
            Command::Term => {
                self.handle_term(&packet.payload);
                Vec::new()
            }
            Command::SetOpt => vec![self.handle_setopt(packet)],
            Command::Reset => self.handle_reset(),
            Command::OpenRd
            | Command::OpenWr
            | Command::OpenAp
            | Command::OpenRw
            | Command::OpenOw
            | Command::OpenDr => vec![self.handle_open(cmd, packet)],
            Command::Read => vec![self.handle_read(packet)],
            Command::Write | Command::Eof => vec![self.handle_write(cmd, packet)],
            Command::Close => vec![self.handle_close(packet)],
            Command::Delete => vec![self.handle_delete(packet)],
            Command::Rename => vec![self.handle_rename(packet)],
            Command::Chdir | Command::Mkdir | Command::Rmdir => vec![self.handle_dirop(cmd, packet)],
            Command::Assign => vec![self.handle_assign(packet)],
            Command::Block => vec![self.handle_block(packet)],
            Command::Reply => {
                warn!("server received a Reply packet meant for the firmware side; ignoring");
                Vec::new()
            }
        }
    }

    fn handle_term(&self, payload: &[u8]) {
        let message = payload.split(|&b| b == 0).next().unwrap_or(payload);
        info!("firmware: {}", String::from_utf8_lossy(message));
    }

    fn handle_setopt(&mut self, packet: &Packet) -> Packet {
        let spec = decode_str(&packet.payload);
        self.config.record_xcmd(spec);
        Packet::reply(packet.channel, CbmError::Ok.code())
    }

    /// `RESET` itself gets no reply; every configured option is replayed
    /// as its own `SETOPT` packet on the reserved option-replay channel,
    /// in the order the options were originally recorded.
    fn handle_reset(&self) -> Vec<Packet> {
        self.config
            .xcmds()
            .iter()
            .map(|opt| Packet::new(Command::SetOpt, FSFD_SETOPT, opt.clone().into_bytes()))
            .collect()
    }

    fn handle_open(&mut self, cmd: Command, packet: &Packet) -> Packet {
        let Some((&drive, name)) = packet.payload.split_first() else {
            return Packet::reply(packet.channel, CbmError::SyntaxUnknown.code());
        };
        let kind = match cmd {
            Command::OpenRd => OpenKind::Rd,
            Command::OpenWr => OpenKind::Wr,
            Command::OpenAp => OpenKind::Ap,
            Command::OpenRw => OpenKind::Rw,
            Command::OpenOw => OpenKind::Ow,
            Command::OpenDr => OpenKind::Dr,
            _ => unreachable!("handle_open only called for OPEN_* commands"),
        };
        let provider = self.registry.get_mut(drive);
        match provider.open(packet.channel, kind, name) {
            Ok(()) => {
                self.channel_drive.insert(packet.channel, drive);
                Packet::reply(packet.channel, CbmError::Ok.code())
            }
            Err(e) => Packet::reply(packet.channel, e.code()),
        }
    }

    fn handle_read(&mut self, packet: &Packet) -> Packet {
        let Some(&drive) = self.channel_drive.get(&packet.channel) else {
            return Packet::reply(packet.channel, CbmError::FileNotOpen.code());
        };
        match self.registry.get_mut(drive).read(packet.channel, MAX_READ_CHUNK) {
            Ok((data, eof)) => {
                let reply_cmd = if eof { Command::Eof } else { Command::Write };
                Packet::new(reply_cmd, packet.channel, data)
            }
            Err(e) => Packet::reply(packet.channel, e.code()),
        }
    }

    fn handle_write(&mut self, cmd: Command, packet: &Packet) -> Packet {
        let Some(&drive) = self.channel_drive.get(&packet.channel) else {
            return Packet::reply(packet.channel, CbmError::FileNotOpen.code());
        };
        let is_eof = cmd == Command::Eof;
        match self.registry.get_mut(drive).write(packet.channel, &packet.payload, is_eof) {
            Ok(()) => {
                if is_eof {
                    self.channel_drive.remove(&packet.channel);
                }
                Packet::reply(packet.channel, CbmError::Ok.code())
            }
            Err(e) => {
                // A short write already closed the provider's own file
                // handle (`LocalFsProvider::write`); drop our binding too.
                self.channel_drive.remove(&packet.channel);
                Packet::reply(packet.channel, e.code())
            }
        }
    }

    fn handle_close(&mut self, packet: &Packet) -> Packet {
        if let Some(drive) = self.channel_drive.remove(&packet.channel) {
            self.registry.get_mut(drive).close(packet.channel);
        }
        Packet::reply(packet.channel, CbmError::Ok.code())
    }

    fn handle_delete(&mut self, packet: &Packet) -> Packet {
        let Some((&drive, patterns)) = packet.payload.split_first() else {
            return Packet::reply(packet.channel, CbmError::SyntaxUnknown.code());
        };
        match self.registry.get_mut(drive).scratch(patterns) {
            Ok(count) => Packet::new(Command::Reply, packet.channel, vec![CbmError::Scratched.code(), count as u8]),
            Err(e) => Packet::reply(packet.channel, e.code()),
        }
    }

    fn handle_rename(&mut self, packet: &Packet) -> Packet {
        let Some((&drive, rest)) = packet.payload.split_first() else {
            return Packet::reply(packet.channel, CbmError::SyntaxUnknown.code());
        };
        let Some(sep) = rest.iter().position(|&b| b == 0) else {
            return Packet::reply(packet.channel, CbmError::SyntaxUnknown.code());
        };
        let (to, from) = (&rest[..sep], &rest[sep + 1..]);
        match self.registry.get_mut(drive).rename(to, from) {
            Ok(()) => Packet::reply(packet.channel, CbmError::Ok.code()),
            Err(e) => Packet::reply(packet.channel, e.code()),
        }
    }

    fn handle_dirop(&mut self, cmd: Command, packet: &Packet) -> Packet {
        let Some((&drive, path)) = packet.payload.split_first() else {
            return Packet::reply(packet.channel, CbmError::SyntaxUnknown.code());
        };
        let provider = self.registry.get_mut(drive);
        let result = match cmd {
            Command::Chdir => provider.chdir(path),
            Command::Mkdir => provider.mkdir(path),
            Command::Rmdir => provider.rmdir(path),
            _ => unreachable!("handle_dirop only called for CHDIR/MKDIR/RMDIR"),
        };
        match result {
            Ok(()) => Packet::reply(packet.channel, CbmError::Ok.code()),
            Err(e) => Packet::reply(packet.channel, e.code()),
        }
    }

    fn handle_assign(&mut self, packet: &Packet) -> Packet {
        let spec = decode_str(&packet.payload);
        match self.registry.assign(&spec) {
            Ok(()) => Packet::reply(packet.channel, CbmError::Ok.code()),
            Err(e) => {
                warn!("ASSIGN {spec:?} failed: {e}");
                Packet::reply(packet.channel, CbmError::SyntaxUnknown.code())
            }
        }
    }

    fn handle_block(&mut self, packet: &Packet) -> Packet {
        let Some(&drive) = self.channel_drive.get(&packet.channel) else {
            return Packet::reply(packet.channel, CbmError::FileNotOpen.code());
        };
        match self.registry.get_mut(drive).block(packet.channel, &packet.payload) {
            Ok(data) => {
                let mut payload = Vec::with_capacity(data.len() + 1);
                payload.push(CbmError::Ok.code());
                payload.extend(data);
                Packet::new(Command::Reply, packet.channel, payload)
            }
            Err(e) => Packet::reply(packet.channel, e.code()),
        }
    }
}

fn decode_str(payload: &[u8]) -> String {
    let bytes = payload.split(|&b| b == 0).next().unwrap_or(payload);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn dispatcher_over(dir: &std::path::Path) -> Dispatcher {
        let registry = ProviderRegistry::new(Box::new(crate::fs_provider::LocalFsProvider::new(0, dir).unwrap()));
        Dispatcher::new(registry, RuntimeConfig::new())
    }

    fn only(mut replies: Vec<Packet>) -> Packet {
        assert_eq!(replies.len(), 1);
        replies.pop().unwrap()
    }

    #[test]
    fn write_then_read_round_trips_through_dispatch() {
        let dir = tempdir().unwrap();
        let mut d = dispatcher_over(dir.path());

        let mut open_payload = vec![0u8];
        open_payload.extend_from_slice(b"X");
        let reply = only(d.dispatch(&Packet::new(Command::OpenWr, 3, open_payload)));
        assert_eq!(reply.payload, vec![CbmError::Ok.code()]);

        let reply = only(d.dispatch(&Packet::new(Command::Eof, 3, b"hi".to_vec())));
        assert_eq!(reply.cmd, Command::Reply.as_byte());
        assert_eq!(reply.payload, vec![CbmError::Ok.code()]);

        let mut open_payload = vec![0u8];
        open_payload.extend_from_slice(b"X");
        only(d.dispatch(&Packet::new(Command::OpenRd, 4, open_payload)));
        let reply = only(d.dispatch(&Packet::new(Command::Read, 4, Vec::new())));
        assert_eq!(reply.cmd, Command::Eof.as_byte());
        assert_eq!(reply.payload, b"hi");
    }

    #[test]
    fn read_on_unopened_channel_is_file_not_open() {
        let dir = tempdir().unwrap();
        let mut d = dispatcher_over(dir.path());
        let reply = only(d.dispatch(&Packet::new(Command::Read, 9, Vec::new())));
        assert_eq!(reply.payload, vec![CbmError::FileNotOpen.code()]);
    }

    #[test]
    fn delete_of_missing_name_reports_zero_matches() {
        let dir = tempdir().unwrap();
        let mut d = dispatcher_over(dir.path());
        let mut payload = vec![0u8];
        payload.extend_from_slice(b"NOPE");
        let reply = only(d.dispatch(&Packet::new(Command::Delete, 0xff, payload)));
        assert_eq!(reply.payload, vec![CbmError::Scratched.code(), 0]);
    }

    #[test]
    fn reset_replays_recorded_setopts_in_order() {
        let dir = tempdir().unwrap();
        let mut d = dispatcher_over(dir.path());
        only(d.dispatch(&Packet::new(Command::SetOpt, 0xff, b"8:X1".to_vec())));
        only(d.dispatch(&Packet::new(Command::SetOpt, 0xff, b"9:X2".to_vec())));

        let replies = d.dispatch(&Packet::new(Command::Reset, 0xff, Vec::new()));
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].payload, b"8:X1");
        assert_eq!(replies[1].payload, b"9:X2");
    }

    #[test]
    fn assign_then_open_reaches_new_drive() {
        let base = tempdir().unwrap();
        let new_drive_dir = tempdir().unwrap();
        let mut d = dispatcher_over(base.path());

        let spec = format!("2:fs={}", new_drive_dir.path().display());
        let reply = only(d.dispatch(&Packet::new(Command::Assign, 0xff, spec.into_bytes())));
        assert_eq!(reply.payload, vec![CbmError::Ok.code()]);

        let mut open_payload = vec![2u8];
        open_payload.extend_from_slice(b"NEWFILE");
        let reply = only(d.dispatch(&Packet::new(Command::OpenWr, 1, open_payload)));
        assert_eq!(reply.payload, vec![CbmError::Ok.code()]);
        assert!(new_drive_dir.path().join("NEWFILE").exists());
    }
}
