//! Local filesystem provider (C9): the reference implementation of
//! [`crate::provider::Provider`].
//!
//! Grounded in `original_source/pcserver/fs_provider.c` (endpoint creation
//! via `fsp_new`, `open_file`/`open_dr`, `read_file`/`write_file`,
//! `fs_delete`/`fs_rename`/`fs_cd`/`fs_mkdir`/`fs_rmdir`, and
//! `path_under_base`'s containment check) and
//! `original_source/pcserver/handler/fs_provider.c` (`expand_relfile` for
//! REL-file record expansion, and the direct block buffer). Directory
//! synthesis follows `spec.md` §4.9 and §4.11 and builds records with
//! `xd2031_proto::dirent`; wildcard filtering uses
//! `xd2031_proto::wildcard`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};
use log::{debug, warn};
use xd2031_proto::dirent::{DirEntry, FileType, ATTR_LOCKED};
use xd2031_proto::wildcard::{self, Mode as WildcardMode};
use xd2031_proto::CbmError;

use crate::nameparse::{self, FileType as SuffixType};
use crate::provider::{OpenKind, Provider, ReadResult};

/// Fixed size of a direct-channel block buffer (`spec.md` §4.9).
const DIRECT_BLOCK_SIZE: usize = 256;

/// Reported in the directory tail's "blocks free" field when the host
/// filesystem's free space can't be queried. The original hardware
/// reported real 256-byte block counts off a physical disk; there is no
/// equivalent quantity here, so this is a placeholder the same way the
/// reference firmware's `FS_DOSVERSION` reply is a fixed string.
const FALLBACK_BLOCKS_FREE: u32 = 664;

/// One open channel's server-side state.
#[derive(Debug)]
enum Handle {
    File(File),
    Rel { file: File, record_len: u16 },
    Dir(DirState),
    Block { buf: Box<[u8; DIRECT_BLOCK_SIZE]>, pos: usize },
}

#[derive(Debug)]
struct DirState {
    entries: Vec<DirEntry>,
    /// `0` = header still pending, `1..=entries.len()-1` = that many rows
    /// already emitted, `entries.len()` = only the tail remains.
    cursor: usize,
}

/// A drive assignment rooted at an absolute, canonical path on the host
/// filesystem.
#[derive(Debug)]
pub struct LocalFsProvider {
    drive: u8,
    base_path: PathBuf,
    cur_path: PathBuf,
    wildcard_mode: WildcardMode,
    channels: HashMap<u8, Handle>,
}

impl LocalFsProvider {
    /// Creates a fresh endpoint rooted at `path` (canonicalized on entry).
    pub fn new(drive: u8, path: impl AsRef<Path>) -> Result<Self, CbmError> {
        let base = canonicalize(path.as_ref())?;
        Ok(Self {
            drive,
            cur_path: base.clone(),
            base_path: base,
            wildcard_mode: WildcardMode::Standard,
            channels: HashMap::new(),
        })
    }

    /// Creates a child endpoint rooted at `parent_cur`/`subpath`, enforcing
    /// the same containment the parent itself honors (`spec.md` §4.7).
    pub fn new_child(drive: u8, parent_base: &Path, parent_cur: &Path, subpath: &[u8]) -> Result<Self, CbmError> {
        let joined = parent_cur.join(bytes_to_relpath(subpath)?);
        let canon = canonicalize(&joined)?;
        if !within(&canon, parent_base) {
            return Err(CbmError::NoPermission);
        }
        Ok(Self {
            drive,
            cur_path: canon.clone(),
            base_path: canon,
            wildcard_mode: WildcardMode::Standard,
            channels: HashMap::new(),
        })
    }

    #[must_use]
    pub fn with_advanced_wildcards(mut self, advanced: bool) -> Self {
        self.wildcard_mode = if advanced { WildcardMode::Advanced } else { WildcardMode::Standard };
        self
    }

    /// Resolves `name` (a single path segment; no directory separators) to
    /// a path inside the current directory, verifying that an *existing*
    /// target stays within the base path.
    fn resolve_existing(&self, name: &[u8]) -> Result<PathBuf, CbmError> {
        let joined = self.cur_path.join(bytes_to_relpath(name)?);
        let canon = canonicalize(&joined)?;
        self.check_contained(&canon)
    }

    /// Resolves `name` for a file that may not exist yet: canonicalizes
    /// the parent directory (which must exist) and re-attaches the
    /// filename, so the containment check still runs against a real path.
    fn resolve_for_create(&self, name: &[u8]) -> Result<PathBuf, CbmError> {
        let joined = self.cur_path.join(bytes_to_relpath(name)?);
        let parent = joined.parent().unwrap_or(&self.cur_path);
        let canon_parent = canonicalize(parent)?;
        self.check_contained(&canon_parent)?;
        let filename = joined.file_name().ok_or(CbmError::SyntaxInval)?;
        Ok(canon_parent.join(filename))
    }

    fn check_contained(&self, path: &Path) -> Result<PathBuf, CbmError> {
        if within(path, &self.base_path) {
            Ok(path.to_path_buf())
        } else {
            warn!("path {path:?} escaped base {:?}", self.base_path);
            Err(CbmError::NoPermission)
        }
    }

    fn open_file(&mut self, channel: u8, kind: OpenKind, name: &[u8]) -> Result<(), CbmError> {
        let parsed = nameparse::parse(name);
        if parsed.file_type == Some(SuffixType::Rel) {
            return self.open_rel(channel, kind, &parsed);
        }

        let (path, open_result) = match kind {
            OpenKind::Rd => {
                let path = self.resolve_existing(&parsed.name)?;
                (path.clone(), File::open(&path))
            }
            OpenKind::Wr => {
                let path = self.resolve_for_create(&parsed.name)?;
                if path.exists() {
                    return Err(CbmError::FileExists);
                }
                (path.clone(), OpenOptions::new().write(true).create_new(true).open(&path))
            }
            OpenKind::Ow => {
                let path = self.resolve_for_create(&parsed.name)?;
                (path.clone(), OpenOptions::new().write(true).create(true).truncate(true).open(&path))
            }
            OpenKind::Ap => {
                let path = self.resolve_existing(&parsed.name)?;
                let file = OpenOptions::new().append(true).open(&path);
                (path.clone(), file.and_then(|mut f| f.seek(SeekFrom::End(0)).map(|_| f)))
            }
            OpenKind::Rw => {
                let path = self.resolve_for_create(&parsed.name)?;
                (path.clone(), OpenOptions::new().read(true).write(true).create(true).open(&path))
            }
            OpenKind::Dr => unreachable!("directory opens are routed through open_dir"),
        };

        let file = open_result.map_err(|e| errno_to_error(&e))?;
        debug!("opened {path:?} on channel {channel} as {kind:?}");
        self.channels.insert(channel, Handle::File(file));
        Ok(())
    }

    fn open_rel(&mut self, channel: u8, kind: OpenKind, parsed: &nameparse::OpenName) -> Result<(), CbmError> {
        let Some(record_len) = parsed.record_len.filter(|&l| l > 0) else {
            return Err(CbmError::FileNotFound);
        };
        let exists_path = self.resolve_existing(&parsed.name);
        let path = match (kind, exists_path) {
            (OpenKind::Rd | OpenKind::Ap, Err(e)) => return Err(e),
            (OpenKind::Rd | OpenKind::Ap, Ok(p)) => p,
            (_, Ok(p)) => p,
            (_, Err(_)) => self.resolve_for_create(&parsed.name)?,
        };
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| errno_to_error(&e))?;
        self.channels.insert(channel, Handle::Rel { file, record_len });
        Ok(())
    }

    fn open_directory(&mut self, channel: u8, pattern_name: &[u8]) -> Result<(), CbmError> {
        let parsed = nameparse::parse(pattern_name);
        let pattern = strip_dollar_prefix(&parsed.name);
        let entries = self.synthesize_directory(pattern)?;
        self.channels.insert(channel, Handle::Dir(DirState { entries, cursor: 0 }));
        Ok(())
    }

    fn synthesize_directory(&self, pattern: &[u8]) -> Result<Vec<DirEntry>, CbmError> {
        let dirname = self
            .cur_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut entries = vec![DirEntry::header(self.drive, dirname.as_bytes())];

        let mut rows = Vec::new();
        let read_dir = fs::read_dir(&self.cur_path).map_err(|e| errno_to_error(&e))?;
        for dirent in read_dir.flatten() {
            let name = dirent.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if !pattern.is_empty() && !wildcard::matches(pattern, name.as_bytes(), self.wildcard_mode) {
                continue;
            }
            let Ok(metadata) = dirent.metadata() else { continue };
            let is_dir = metadata.is_dir();
            let size = u32::try_from(metadata.len()).unwrap_or(u32::MAX);
            let timestamp = mtime_fields(&metadata);
            let attr = if metadata.permissions().readonly() { ATTR_LOCKED } else { 0 };
            let file_type = guess_file_type(&name);
            debug!("dir entry {name:?} type {file_type} size {size}");
            rows.push((name, size, timestamp, is_dir, file_type, attr));
        }
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        entries.extend(rows.into_iter().map(|(name, size, ts, is_dir, file_type, attr)| {
            DirEntry::entry(name.as_bytes(), size, ts, is_dir, file_type, attr)
        }));
        entries.push(DirEntry::tail(free_blocks(&self.cur_path)));
        Ok(entries)
    }
}

impl Provider for LocalFsProvider {
    fn open(&mut self, channel: u8, kind: OpenKind, name: &[u8]) -> Result<(), CbmError> {
        if kind == OpenKind::Dr {
            return self.open_directory(channel, name);
        }
        if kind == OpenKind::Rw && name.first() == Some(&b'#') {
            self.channels.insert(
                channel,
                Handle::Block {
                    buf: Box::new([0u8; DIRECT_BLOCK_SIZE]),
                    pos: 0,
                },
            );
            return Ok(());
        }
        self.open_file(channel, kind, name)
    }

    fn read(&mut self, channel: u8, max_len: usize) -> Result<ReadResult, CbmError> {
        match self.channels.get_mut(&channel).ok_or(CbmError::FileNotOpen)? {
            Handle::File(file) | Handle::Rel { file, .. } => {
                let mut buf = vec![0u8; max_len];
                let n = file.read(&mut buf).map_err(|e| errno_to_error(&e))?;
                buf.truncate(n);
                let eof = n < max_len || is_at_eof(file)?;
                Ok((buf, eof))
            }
            Handle::Dir(state) => {
                if state.cursor >= state.entries.len() {
                    return Ok((Vec::new(), true));
                }
                let record = state.entries[state.cursor].encode();
                state.cursor += 1;
                let eof = state.cursor >= state.entries.len();
                Ok((record, eof))
            }
            Handle::Block { buf, pos } => {
                let remaining = DIRECT_BLOCK_SIZE - *pos;
                let n = remaining.min(max_len);
                let data = buf[*pos..*pos + n].to_vec();
                *pos += n;
                Ok((data, *pos >= DIRECT_BLOCK_SIZE))
            }
        }
    }

    fn write(&mut self, channel: u8, data: &[u8], is_eof: bool) -> Result<(), CbmError> {
        let close_after = is_eof;
        let result = match self.channels.get_mut(&channel).ok_or(CbmError::FileNotOpen)? {
            Handle::File(file) => write_all_checked(file, data),
            Handle::Rel { file, record_len } => {
                let record_len = *record_len;
                let pos = file.stream_position().map_err(|e| errno_to_error(&e))?;
                expand_rel_file(file, record_len, pos, data.len() as u64)?;
                file.seek(SeekFrom::Start(pos)).map_err(|e| errno_to_error(&e))?;
                write_all_checked(file, data)
            }
            Handle::Block { buf, pos } => {
                let n = data.len().min(DIRECT_BLOCK_SIZE.saturating_sub(*pos));
                buf[*pos..*pos + n].copy_from_slice(&data[..n]);
                *pos += n;
                Ok(())
            }
        };
        if close_after || result.is_err() {
            self.channels.remove(&channel);
        }
        result
    }

    fn close(&mut self, channel: u8) {
        self.channels.remove(&channel);
    }

    fn scratch(&mut self, patterns: &[u8]) -> Result<u32, CbmError> {
        let mut deleted = 0u32;
        for pattern in patterns.split(|&b| b == b',') {
            if pattern.is_empty() {
                continue;
            }
            let read_dir = fs::read_dir(&self.cur_path).map_err(|e| errno_to_error(&e))?;
            for dirent in read_dir.flatten() {
                let name = dirent.file_name();
                let name_bytes = name.to_string_lossy();
                if !wildcard::matches(pattern, name_bytes.as_bytes(), self.wildcard_mode) {
                    continue;
                }
                let Ok(metadata) = dirent.metadata() else { continue };
                if metadata.is_dir() || metadata.permissions().readonly() {
                    continue;
                }
                if fs::remove_file(dirent.path()).is_ok() {
                    deleted += 1;
                }
            }
        }
        Ok(deleted.min(99))
    }

    fn rename(&mut self, to: &[u8], from: &[u8]) -> Result<(), CbmError> {
        if to.contains(&b'/') || to.contains(&b'\\') {
            return Err(CbmError::SyntaxDirSeparator);
        }
        let from_path = self.resolve_existing(from)?;
        let to_path = self.resolve_for_create(to)?;
        if to_path.exists() {
            return Err(CbmError::FileExists);
        }
        fs::rename(&from_path, &to_path).map_err(|e| errno_to_error(&e))
    }

    fn chdir(&mut self, path: &[u8]) -> Result<(), CbmError> {
        let joined = self.cur_path.join(bytes_to_relpath(path)?);
        let canon = canonicalize(&joined)?;
        if !canon.is_dir() {
            return Err(CbmError::FileTypeMismatch);
        }
        self.cur_path = self.check_contained(&canon)?;
        Ok(())
    }

    fn mkdir(&mut self, path: &[u8]) -> Result<(), CbmError> {
        let target = self.resolve_for_create(path)?;
        if target.exists() {
            return Err(CbmError::FileExists);
        }
        fs::create_dir(&target).map_err(|e| errno_to_error(&e))
    }

    fn rmdir(&mut self, path: &[u8]) -> Result<(), CbmError> {
        let target = self.resolve_existing(path)?;
        if !target.is_dir() {
            return Err(CbmError::FileTypeMismatch);
        }
        fs::remove_dir(&target).map_err(|e| errno_to_error(&e))
    }

    fn block(&mut self, channel: u8, payload: &[u8]) -> Result<Vec<u8>, CbmError> {
        let Some(Handle::Block { buf, pos }) = self.channels.get_mut(&channel) else {
            return Err(CbmError::NoBlock);
        };
        match payload.first() {
            // U1: read a (synthetic) block into the buffer and rewind the cursor.
            Some(b'1') => {
                buf.fill(0);
                *pos = 0;
                Ok(Vec::new())
            }
            // U2: the buffer has already been written by `write`; nothing further to flush.
            Some(b'2') => Ok(Vec::new()),
            // B-A / B-F: block allocate/free. No real block allocation table exists
            // on this provider, so both are acknowledged unconditionally.
            Some(b'A') | Some(b'F') => Ok(Vec::new()),
            _ => Err(CbmError::SyntaxUnknown),
        }
    }

    fn position(&mut self, channel: u8, record: u32) -> Result<(), CbmError> {
        let Some(Handle::Rel { file, record_len }) = self.channels.get_mut(&channel) else {
            return Err(CbmError::FileTypeMismatch);
        };
        let record_len = *record_len;
        let target_end = u64::from(record + 1) * u64::from(record_len);
        expand_to(file, record_len, target_end)?;
        file.seek(SeekFrom::Start(u64::from(record) * u64::from(record_len)))
            .map_err(|e| errno_to_error(&e))?;
        Ok(())
    }

    fn open_file_count(&self) -> usize {
        self.channels.len()
    }

    fn derive_child(&self, subpath: &[u8]) -> Result<Box<dyn Provider>, CbmError> {
        Ok(Box::new(LocalFsProvider::new_child(
            self.drive,
            &self.base_path,
            &self.cur_path,
            subpath,
        )?))
    }
}

/// Writes `data` and reports a short write as [`CbmError::WriteError`].
fn write_all_checked(file: &mut File, data: &[u8]) -> Result<(), CbmError> {
    file.write_all(data).map_err(|e| {
        if e.kind() == std::io::ErrorKind::WriteZero {
            CbmError::WriteError
        } else {
            errno_to_error(&e)
        }
    })
}

/// Peeks one byte past the last read to tell genuine EOF apart from a read
/// that happened to fill the caller's buffer exactly, mirroring the
/// `fgetc`/`ungetc` kludge in `original_source/pcserver/fs_provider.c`'s
/// `read_file`.
fn is_at_eof(file: &mut File) -> Result<bool, CbmError> {
    let mut probe = [0u8; 1];
    let n = file.read(&mut probe).map_err(|e| errno_to_error(&e))?;
    if n == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Current(-1)).map_err(|e| errno_to_error(&e))?;
    Ok(false)
}

/// Pads `file` up to the next full record boundary and then appends whole
/// filler records (`0xFF` followed by zeros) until it is at least
/// `write_pos + write_len` bytes long (`spec.md` §4.9, scenario 6). Called
/// before every REL write that might land past the current end of file.
fn expand_rel_file(file: &mut File, record_len: u16, write_pos: u64, write_len: u64) -> Result<(), CbmError> {
    let needed_end = write_pos + write_len;
    let cur_size = file.metadata().map_err(|e| errno_to_error(&e))?.len();
    if cur_size >= needed_end {
        return Ok(());
    }
    expand_to(file, record_len, needed_end)
}

fn expand_to(file: &mut File, record_len: u16, target_end: u64) -> Result<(), CbmError> {
    let record_len = u64::from(record_len);
    let mut cur_size = file.metadata().map_err(|e| errno_to_error(&e))?.len();
    if cur_size >= target_end {
        return Ok(());
    }
    file.seek(SeekFrom::End(0)).map_err(|e| errno_to_error(&e))?;

    let rem = cur_size % record_len;
    if rem != 0 {
        let pad = vec![0u8; (record_len - rem) as usize];
        file.write_all(&pad).map_err(|e| errno_to_error(&e))?;
        cur_size += pad.len() as u64;
    }
    while cur_size < target_end {
        let mut filler = vec![0u8; record_len as usize];
        filler[0] = 0xFF;
        file.write_all(&filler).map_err(|e| errno_to_error(&e))?;
        cur_size += record_len;
    }
    Ok(())
}

/// Strips a leading `$` (and an optional `:` after it) from a directory
/// open's name, so `"$"` and `"$:*"` both reduce to the wildcard pattern
/// that follows — an empty pattern matches every entry.
fn strip_dollar_prefix(name: &[u8]) -> &[u8] {
    let Some(rest) = name.strip_prefix(b"$") else {
        return name;
    };
    rest.strip_prefix(b":").unwrap_or(rest)
}

fn canonicalize(path: &Path) -> Result<PathBuf, CbmError> {
    fs::canonicalize(path).map_err(|_| CbmError::FileNotFound)
}

/// Returns whether `path` is `base` or a descendant of it, the containment
/// rule required by every provider operation that takes a user path
/// (`spec.md` §4.9 "Name containment").
fn within(path: &Path, base: &Path) -> bool {
    path == base || path.starts_with(base)
}

fn bytes_to_relpath(name: &[u8]) -> Result<PathBuf, CbmError> {
    let text = std::str::from_utf8(name).map_err(|_| CbmError::SyntaxInval)?;
    Ok(PathBuf::from(text))
}

fn mtime_fields(metadata: &fs::Metadata) -> (u8, u8, u8, u8, u8) {
    let modified = metadata.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
    let dt: DateTime<Local> = modified.into();
    (
        (dt.year() % 100).max(0) as u8,
        dt.month() as u8,
        dt.day() as u8,
        dt.hour() as u8,
        dt.minute() as u8,
    )
}

/// Maps a host filename's extension to the CBM type shown in a directory
/// listing, defaulting to `Prg` when the extension is absent or
/// unrecognized (`spec.md` §4.9 "type mapped from OS file type with
/// unknown defaulting to PRG" — the host filesystem carries no CBM type
/// metadata of its own, so the conventional `.seq`/`.usr`/`.rel` suffix is
/// the only signal available).
fn guess_file_type(name: &str) -> FileType {
    match name.rsplit('.').next() {
        Some(ext) if ext.eq_ignore_ascii_case("seq") => FileType::Seq,
        Some(ext) if ext.eq_ignore_ascii_case("usr") => FileType::Usr,
        Some(ext) if ext.eq_ignore_ascii_case("rel") => FileType::Rel,
        _ => FileType::Prg,
    }
}

fn free_blocks(path: &Path) -> u32 {
    let _ = path;
    FALLBACK_BLOCKS_FREE
}

/// Translates a host OS error into a CBM status code, grounded in
/// `original_source/pcserver/fs_provider.c`'s `errno_to_error` (`spec.md`
/// §4.9's supplemented errno mapping).
fn errno_to_error(err: &std::io::Error) -> CbmError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::NotFound => CbmError::FileNotFound,
        ErrorKind::PermissionDenied => CbmError::NoPermission,
        ErrorKind::AlreadyExists => CbmError::FileExists,
        ErrorKind::WriteZero => CbmError::WriteError,
        // Linux errno numbers not covered by `ErrorKind` yet on stable.
        _ => match err.raw_os_error() {
            Some(36) => CbmError::SyntaxTooLong, // ENAMETOOLONG
            Some(28) => CbmError::DiskFull,      // ENOSPC
            Some(30) => CbmError::WriteProtect,  // EROFS
            Some(39) => CbmError::DirError,      // ENOTEMPTY
            Some(24) => CbmError::NoChannel,     // EMFILE
            _ => CbmError::Fault,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn provider() -> (tempfile::TempDir, LocalFsProvider) {
        let dir = tempdir().unwrap();
        let provider = LocalFsProvider::new(0, dir.path()).unwrap();
        (dir, provider)
    }

    #[test]
    fn write_then_read_round_trips_exact_bytes() {
        let (_dir, mut p) = provider();
        p.open(1, OpenKind::Wr, b"X").unwrap();
        p.write(1, &[0x01, 0x08, 0x00], true).unwrap();
        p.close(1);

        p.open(2, OpenKind::Rd, b"X").unwrap();
        let (data, eof) = p.read(2, 64).unwrap();
        assert_eq!(data, vec![0x01, 0x08, 0x00]);
        assert!(eof);
    }

    #[test]
    fn wr_on_existing_file_is_file_exists() {
        let (_dir, mut p) = provider();
        p.open(1, OpenKind::Wr, b"X").unwrap();
        p.write(1, b"hi", true).unwrap();
        assert_eq!(p.open(2, OpenKind::Wr, b"X").unwrap_err(), CbmError::FileExists);
    }

    #[test]
    fn rd_on_missing_file_is_file_not_found() {
        let (_dir, mut p) = provider();
        assert_eq!(p.open(1, OpenKind::Rd, b"NOPE").unwrap_err(), CbmError::FileNotFound);
    }

    /// P4: a successful CHDIR leaves the canonical current path under base.
    #[test]
    fn property_p4_chdir_stays_under_base() {
        let (dir, mut p) = provider();
        fs::create_dir(dir.path().join("SUB")).unwrap();
        p.chdir(b"SUB").unwrap();
        assert!(p.cur_path.starts_with(&p.base_path));
    }

    /// Scenario 5: CD to `../..` must fail with NO_PERMISSION and not move
    /// the current path.
    #[test]
    fn chdir_outside_base_is_rejected() {
        let (_dir, mut p) = provider();
        let before = p.cur_path.clone();
        let err = p.chdir(b"../..").unwrap_err();
        assert_eq!(err, CbmError::NoPermission);
        assert_eq!(p.cur_path, before);
    }

    #[test]
    fn scratch_of_missing_name_reports_zero_matches() {
        let (_dir, mut p) = provider();
        assert_eq!(p.scratch(b"NOPE").unwrap(), 0);
    }

    #[test]
    fn scratch_deletes_matching_files_and_counts_them() {
        let (dir, mut p) = provider();
        fs::write(dir.path().join("A"), b"x").unwrap();
        fs::write(dir.path().join("B"), b"x").unwrap();
        assert_eq!(p.scratch(b"*").unwrap(), 2);
        assert!(!dir.path().join("A").exists());
    }

    #[test]
    fn directory_of_empty_dir_yields_header_then_tail() {
        let (_dir, mut p) = provider();
        p.open(1, OpenKind::Dr, b"$").unwrap();
        let (first, eof1) = p.read(1, 64).unwrap();
        assert!(!eof1);
        assert_eq!(first[9], xd2031_proto::dirent::DirMode::Nam as u8);
        let (second, eof2) = p.read(1, 64).unwrap();
        assert!(eof2);
        assert_eq!(second[9], xd2031_proto::dirent::DirMode::Fre as u8);
    }

    /// P6 / scenario 6: writing record 2 of a length-100 REL file expands
    /// the file to 300 bytes with the documented filler pattern.
    #[test]
    fn rel_write_expands_file_with_filler_pattern() {
        let (_dir, mut p) = provider();
        p.open(1, OpenKind::Rw, b"DATA,L,100").unwrap();
        p.position(1, 2).unwrap();
        p.write(1, &[b'A'; 50], false).unwrap();

        let path = p.base_path.join("DATA");
        let bytes = fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 300);
        assert_eq!(bytes[0], 0xFF);
        assert_eq!(&bytes[1..100], vec![0u8; 99].as_slice());
        assert_eq!(bytes[100], 0xFF);
        assert_eq!(bytes[200..250], vec![b'A'; 50].as_slice());
        assert_eq!(&bytes[250..300], vec![0u8; 50].as_slice());
    }

    #[test]
    fn rel_without_record_length_is_file_not_found() {
        let (_dir, mut p) = provider();
        assert_eq!(p.open(1, OpenKind::Rw, b"DATA,L").unwrap_err(), CbmError::FileNotFound);
    }

    #[test]
    fn rename_rejects_target_with_separator() {
        let (dir, mut p) = provider();
        fs::write(dir.path().join("OLD"), b"x").unwrap();
        assert_eq!(p.rename(b"SUB/NEW", b"OLD").unwrap_err(), CbmError::SyntaxDirSeparator);
    }

    #[test]
    fn rename_moves_file() {
        let (dir, mut p) = provider();
        fs::write(dir.path().join("OLD"), b"x").unwrap();
        p.rename(b"NEW", b"OLD").unwrap();
        assert!(dir.path().join("NEW").exists());
        assert!(!dir.path().join("OLD").exists());
    }

    #[test]
    fn direct_block_channel_round_trips_through_buffer() {
        let (_dir, mut p) = provider();
        p.open(1, OpenKind::Rw, b"#").unwrap();
        p.write(1, b"hello", false).unwrap();
        let (data, eof) = p.read(1, 5).unwrap();
        assert_eq!(data, b"hello");
        assert!(!eof);
    }
}
