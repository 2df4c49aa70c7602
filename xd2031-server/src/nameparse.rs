//! Minimal suffix parsing of the name string carried in an `OPEN_*` packet
//! payload.
//!
//! The firmware side's command-line parser (`xd2031_firmware::cmdline`)
//! only consumes the `,type,access,option` suffix to pick which `FS_OPEN_*`
//! opcode to send and to validate the bus-visible request; it forwards the
//! whole name string unparsed in the packet payload (see
//! `original_source/pcserver/fscmd.c`'s `do_cmd`, which hands `buf +
//! FSP_DATA + 1` straight to the provider). The provider still needs the
//! file type and REL record length out of that suffix, so this is a small,
//! independent re-parse of the same grammar (`spec.md` §4.4), grounded the
//! same way but living on this side of the wire.

/// CBM file type suffix, as relevant to the local filesystem provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Seq,
    Prg,
    Usr,
    Rel,
}

/// The name plus whatever suffix fields followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenName {
    /// Bare name (or wildcard pattern for a directory open), with the
    /// `,type,...` suffix stripped.
    pub name: Vec<u8>,
    pub file_type: Option<FileType>,
    pub record_len: Option<u16>,
}

/// Parses `name[,type][,access][,option]*` into its bare name and type/
/// record-length suffix. Unlike the firmware parser this never rejects an
/// access byte or option token — the provider doesn't care, since the
/// opcode already encodes the requested access.
#[must_use]
pub fn parse(raw: &[u8]) -> OpenName {
    let raw = raw.split(|&b| b == 0).next().unwrap_or(raw);
    let mut fields = raw.split(|&b| b == b',');
    let name = fields.next().unwrap_or(&[]).to_vec();

    let mut file_type = None;
    let mut record_len = None;
    for field in fields {
        if field.is_empty() {
            continue;
        }
        match field[0] {
            b'S' if file_type.is_none() => file_type = Some(FileType::Seq),
            b'P' if file_type.is_none() => file_type = Some(FileType::Prg),
            b'U' if file_type.is_none() => file_type = Some(FileType::Usr),
            b'L' if file_type.is_none() => {
                file_type = Some(FileType::Rel);
                if let Ok(s) = core::str::from_utf8(&field[1..]) {
                    record_len = s.trim().parse::<u16>().ok();
                }
            }
            _ => {}
        }
    }

    OpenName {
        name,
        file_type,
        record_len,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_has_no_suffix() {
        let parsed = parse(b"HELLO");
        assert_eq!(parsed.name, b"HELLO");
        assert_eq!(parsed.file_type, None);
    }

    #[test]
    fn rel_suffix_carries_record_length() {
        let parsed = parse(b"DATA,L,100");
        assert_eq!(parsed.name, b"DATA");
        assert_eq!(parsed.file_type, Some(FileType::Rel));
        assert_eq!(parsed.record_len, Some(100));
    }

    #[test]
    fn rel_suffix_without_comma_before_length_also_parses() {
        let parsed = parse(b"DATA,L100");
        assert_eq!(parsed.record_len, Some(100));
    }

    #[test]
    fn trailing_nul_is_ignored() {
        let parsed = parse(b"HELLO\0");
        assert_eq!(parsed.name, b"HELLO");
    }
}
