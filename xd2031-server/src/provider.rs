//! The provider interface (C9 redesign note in `spec.md` §9): a single
//! trait replacing the original's per-provider function-pointer table
//! (`provider_t` in `original_source/firmware/provider.h`). Only one
//! concrete implementation — [`crate::fs_provider::LocalFsProvider`] — is
//! built here; FTP/HTTP/FAT/disk-image providers are out of scope (`spec.md`
//! §1) but would implement the same trait.

use xd2031_proto::CbmError;

/// Which `FS_OPEN_*` variant a channel was opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenKind {
    Rd,
    Wr,
    Ap,
    Rw,
    /// Open-or-truncate (`@0:NAME,W` overwrite semantics).
    Ow,
    /// Directory read.
    Dr,
}

/// Outcome of a `read` call: bytes returned plus whether the channel has
/// hit EOF.
pub type ReadResult = (Vec<u8>, bool);

/// A pluggable backend rooted at one drive assignment. Implements every
/// provider-side operation named in `spec.md` §4.8's dispatch table.
pub trait Provider: std::fmt::Debug {
    /// Opens `channel` against `name` under `kind`. On success the channel
    /// is bound to this provider instance until [`Provider::close`].
    fn open(&mut self, channel: u8, kind: OpenKind, name: &[u8]) -> Result<(), CbmError>;

    /// Reads up to `max_len` bytes from `channel`. Returns `(data, eof)`;
    /// `data.len() < max_len` does not by itself imply EOF.
    fn read(&mut self, channel: u8, max_len: usize) -> Result<ReadResult, CbmError>;

    /// Writes `data` to `channel`. `is_eof` marks the final chunk of a
    /// transfer (the bus-side EOI).
    fn write(&mut self, channel: u8, data: &[u8], is_eof: bool) -> Result<(), CbmError>;

    /// Closes `channel`, releasing any OS-level handle.
    fn close(&mut self, channel: u8);

    /// SCRATCH: deletes every file matching any of the comma-separated
    /// patterns in `patterns`. Returns the number of files removed.
    fn scratch(&mut self, patterns: &[u8]) -> Result<u32, CbmError>;

    /// RENAME: `payload` is `to\0from` per `spec.md` §4.8.
    fn rename(&mut self, to: &[u8], from: &[u8]) -> Result<(), CbmError>;

    fn chdir(&mut self, path: &[u8]) -> Result<(), CbmError>;
    fn mkdir(&mut self, path: &[u8]) -> Result<(), CbmError>;
    fn rmdir(&mut self, path: &[u8]) -> Result<(), CbmError>;

    /// Direct block access (U1/U2/B-A/B-F framing), routed to whatever
    /// channel already holds a direct-buffer handle.
    fn block(&mut self, channel: u8, payload: &[u8]) -> Result<Vec<u8>, CbmError>;

    /// Positions an open REL file's channel at 0-indexed `record`,
    /// expanding the file with deterministic filler (`spec.md` §4.9) if it
    /// doesn't yet reach that far. Exposed as its own operation rather than
    /// folded into [`Provider::block`]'s byte stream, since unlike
    /// U1/U2/B-A/B-F it addresses a channel's own record length rather
    /// than a raw track/sector pair.
    fn position(&mut self, channel: u8, record: u32) -> Result<(), CbmError>;

    /// Number of channels currently open against this provider instance;
    /// used by the endpoint lifecycle rule (destroy when zero files AND
    /// zero references remain).
    fn open_file_count(&self) -> usize;

    /// Derives a child endpoint rooted at `subpath` relative to this
    /// endpoint's current path, for `ASSIGN drive:=existing-drive/subpath`
    /// (`spec.md` §4.7). Must enforce the same containment rule as a
    /// fresh assign.
    fn derive_child(&self, subpath: &[u8]) -> Result<Box<dyn Provider>, CbmError>;
}
