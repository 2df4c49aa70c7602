//! Command-line parser (C4): turns an OPEN name or command-channel payload
//! into a [`ParsedName`].
//!
//! Grounded in `spec.md` §4.4 and `original_source/firmware/cmd.c`'s
//! `command_find`/`command_execute` dispatch, which supplies the full
//! pass-through command set (RENAME/SCRATCH/CD/MKDIR/RMDIR/ASSIGN plus the
//! reference-provider no-op INITIALIZE — see `SPEC_FULL.md` §4.4).

/// Drive selector parsed out of a name's `drivespec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// No drive specified; resolved later from runtime config.
    Default,
    Numbered(u8),
}

/// A command-channel command, or `None` for a plain OPEN name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameCommand {
    Open,
    Dir,
    Scratch,
    Rename,
    Cd,
    Mkdir,
    Rmdir,
    Assign,
    /// No-op on the reference local-filesystem provider: there is no
    /// physical disk to re-read.
    Initialize,
}

/// CBM file type byte (`typespec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Seq,
    Prg,
    Usr,
    Rel,
}

/// Access mode byte (`accessspec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    Append,
    /// `X`: read/write.
    ReadWrite,
}

/// Parse error surfaced as a CBM status code, not a Rust error: parsing
/// never panics or fails outside the protocol's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    SyntaxUnknown,
    FileTypeMismatch,
    /// REL without a positive record length.
    FileNotFound,
}

/// The fully decoded form of an OPEN name or command-channel payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub drive: Drive,
    /// Overwrite requested via `@n:` drivespec prefix.
    pub overwrite: bool,
    pub command: NameCommand,
    pub name: Vec<u8>,
    pub file_type: Option<FileType>,
    pub access: Option<Access>,
    pub record_len: Option<u16>,
    pub options: Vec<Vec<u8>>,
}

/// Parses a nul-terminated (or plain) OPEN name.
pub fn parse_open_name(payload: &[u8]) -> Result<ParsedName, ParseError> {
    let payload = strip_nul(payload);
    parse_body(payload, NameCommand::Open)
}

/// Parses a command-channel payload, matching the command prefix first.
/// `RM` is tried before `R` so RMDIR is never mistaken for RENAME.
pub fn parse_command(payload: &[u8]) -> Result<ParsedName, ParseError> {
    let payload = strip_nul(payload);
    if let Some(rest) = payload.strip_prefix(b"I") {
        return parse_body(rest, NameCommand::Initialize);
    }
    if let Some(rest) = payload.strip_prefix(b"$") {
        return parse_body(rest, NameCommand::Dir);
    }
    if let Some(rest) = payload.strip_prefix(b"RM") {
        return parse_body(rest, NameCommand::Rmdir);
    }
    if let Some(rest) = payload.strip_prefix(b"R") {
        return parse_body(rest, NameCommand::Rename);
    }
    if let Some(rest) = payload.strip_prefix(b"S") {
        return parse_body(rest, NameCommand::Scratch);
    }
    if let Some(rest) = payload.strip_prefix(b"CD").or_else(|| payload.strip_prefix(b"CH")) {
        return parse_body(rest, NameCommand::Cd);
    }
    if let Some(rest) = payload.strip_prefix(b"M") {
        return parse_body(rest, NameCommand::Mkdir);
    }
    if let Some(rest) = payload.strip_prefix(b"A") {
        return parse_body(rest, NameCommand::Assign);
    }
    Err(ParseError::SyntaxUnknown)
}

fn strip_nul(payload: &[u8]) -> &[u8] {
    payload.split(|&b| b == 0).next().unwrap_or(payload)
}

fn parse_body(body: &[u8], command: NameCommand) -> Result<ParsedName, ParseError> {
    let mut fields = body.split(|&b| b == b',');
    let first = fields.next().unwrap_or(&[]);

    let (drive, overwrite, name_and_pattern) = split_drivespec(first);

    let command = if command == NameCommand::Open && name_and_pattern.first() == Some(&b'$') {
        NameCommand::Dir
    } else {
        command
    };

    let name = if command == NameCommand::Dir {
        name_and_pattern.strip_prefix(b"$").unwrap_or(name_and_pattern).to_vec()
    } else {
        name_and_pattern.to_vec()
    };

    let mut file_type = None;
    let mut record_len = None;
    let mut access = None;
    let mut options = Vec::new();

    for field in fields {
        if field.is_empty() {
            continue;
        }
        match field[0] {
            b'S' if file_type.is_none() && record_len.is_none() => file_type = Some(FileType::Seq),
            b'P' if file_type.is_none() => file_type = Some(FileType::Prg),
            b'U' if file_type.is_none() => file_type = Some(FileType::Usr),
            b'L' if file_type.is_none() => {
                file_type = Some(FileType::Rel);
                let len_bytes = &field[1..];
                let len_str = core::str::from_utf8(len_bytes).map_err(|_| ParseError::SyntaxUnknown)?;
                record_len = len_str.trim().parse::<u16>().ok();
            }
            b'R' if access.is_none() && field.len() == 1 => access = Some(Access::Read),
            b'W' if access.is_none() && field.len() == 1 => access = Some(Access::Write),
            b'A' if access.is_none() && field.len() == 1 => access = Some(Access::Append),
            b'X' if access.is_none() && field.len() == 1 => access = Some(Access::ReadWrite),
            _ => options.push(field.to_vec()),
        }
    }

    if matches!(file_type, Some(FileType::Rel)) && record_len.is_none() {
        return Err(ParseError::FileNotFound);
    }
    if command == NameCommand::Dir && access == Some(Access::Write) {
        return Err(ParseError::FileTypeMismatch);
    }

    Ok(ParsedName {
        drive,
        overwrite,
        command,
        name,
        file_type,
        access,
        record_len,
        options,
    })
}

/// Splits a leading `drivespec ':'` (optionally prefixed `@` for
/// overwrite) off the front of `body`, returning `(drive, overwrite,
/// remainder)`.
fn split_drivespec(body: &[u8]) -> (Drive, bool, &[u8]) {
    let mut rest = body;
    let overwrite = rest.first() == Some(&b'@');
    if overwrite {
        rest = &rest[1..];
    }
    if let Some(colon) = rest.iter().position(|&b| b == b':') {
        let spec = &rest[..colon];
        if let Ok(digits) = core::str::from_utf8(spec) {
            if let Ok(n) = digits.parse::<u8>() {
                return (Drive::Numbered(n), overwrite, &rest[colon + 1..]);
            }
        }
        if spec.is_empty() {
            return (Drive::Default, overwrite, &rest[colon + 1..]);
        }
    }
    (Drive::Default, overwrite, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_name_defaults_to_default_drive_and_open() {
        let parsed = parse_open_name(b"HELLO").unwrap();
        assert_eq!(parsed.drive, Drive::Default);
        assert_eq!(parsed.command, NameCommand::Open);
        assert_eq!(parsed.name, b"HELLO");
    }

    #[test]
    fn drivespec_with_overwrite_marker() {
        let parsed = parse_open_name(b"@0:HELLO,P,W").unwrap();
        assert_eq!(parsed.drive, Drive::Numbered(0));
        assert!(parsed.overwrite);
        assert_eq!(parsed.file_type, Some(FileType::Prg));
        assert_eq!(parsed.access, Some(Access::Write));
    }

    #[test]
    fn directory_open_is_reclassified_as_dir_command() {
        let parsed = parse_open_name(b"$").unwrap();
        assert_eq!(parsed.command, NameCommand::Dir);
    }

    #[test]
    fn directory_with_write_access_is_rejected() {
        assert_eq!(
            parse_open_name(b"$,W").unwrap_err(),
            ParseError::FileTypeMismatch
        );
    }

    #[test]
    fn rel_without_record_length_is_file_not_found() {
        assert_eq!(parse_open_name(b"DATA,L").unwrap_err(), ParseError::FileNotFound);
    }

    #[test]
    fn rel_with_record_length_parses_len() {
        let parsed = parse_open_name(b"DATA,L100").unwrap();
        assert_eq!(parsed.record_len, Some(100));
    }

    #[test]
    fn rmdir_is_matched_before_rename() {
        let parsed = parse_command(b"RM:OLDDIR").unwrap();
        assert_eq!(parsed.command, NameCommand::Rmdir);
    }

    #[test]
    fn rename_prefix_still_works() {
        let parsed = parse_command(b"R:NEW=OLD").unwrap();
        assert_eq!(parsed.command, NameCommand::Rename);
        assert_eq!(parsed.name, b"NEW=OLD");
    }

    #[test]
    fn cd_accepts_either_prefix_spelling() {
        assert_eq!(parse_command(b"CD:SUBDIR").unwrap().command, NameCommand::Cd);
        assert_eq!(parse_command(b"CH:SUBDIR").unwrap().command, NameCommand::Cd);
    }

    #[test]
    fn unknown_prefix_is_syntax_error() {
        assert_eq!(parse_command(b"Z:NOPE").unwrap_err(), ParseError::SyntaxUnknown);
    }
}
