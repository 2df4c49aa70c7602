//! Directory-entry record layout.
//!
//! Every row a directory listing sends back over the wire — the header,
//! each file or subdirectory, and the trailing "blocks free" line — shares
//! this fixed field layout:
//!
//! ```text
//! FS_DIR_LEN   4 bytes, little-endian size (or header drive / tail free count)
//! FS_DIR_YEAR  1 byte
//! FS_DIR_MONTH 1 byte
//! FS_DIR_DAY   1 byte
//! FS_DIR_HOUR  1 byte
//! FS_DIR_MIN   1 byte
//! FS_DIR_MODE  1 byte: NAM | FIL | DIR | FRE
//! FS_DIR_ATTR  1 byte bitmask
//! FS_DIR_NAME  zero-terminated name
//! ```

use alloc::vec::Vec;

/// `FS_DIR_ATTR` bit for a locked (write-protected) file.
pub const ATTR_LOCKED: u8 = 0x01;
/// `FS_DIR_ATTR` bit for a file that was not closed cleanly (splat file).
pub const ATTR_SPLAT: u8 = 0x02;
/// Bit position where a row's [`FileType`] is packed into `FS_DIR_ATTR`,
/// alongside the `LOCKED`/`SPLAT` flag bits.
const ATTR_TYPE_SHIFT: u32 = 4;
/// Mask covering the packed [`FileType`] bits within `FS_DIR_ATTR`.
pub const ATTR_TYPE_MASK: u8 = 0x03 << ATTR_TYPE_SHIFT;

/// `FS_DIR_MODE` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DirMode {
    /// Directory listing header: drive number and directory name.
    Nam = 1,
    /// A regular file row.
    Fil = 2,
    /// A subdirectory row.
    Dir = 3,
    /// Trailing "blocks free" row.
    Fre = 4,
}

/// CBM file type, as shown in a directory listing. Unknown extensions fall
/// back to `Prg` (`spec.md` §4.9 "type mapped from OS file type with
/// unknown defaulting to PRG").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    Prg = 0,
    Seq = 1,
    Usr = 2,
    Rel = 3,
}

impl FileType {
    #[must_use]
    pub const fn letter(self) -> u8 {
        match self {
            Self::Prg => b'P',
            Self::Seq => b'S',
            Self::Usr => b'U',
            Self::Rel => b'L',
        }
    }

    /// This type's encoding within `FS_DIR_ATTR`, packed above the
    /// `LOCKED`/`SPLAT` flag bits.
    #[must_use]
    pub const fn attr_bits(self) -> u8 {
        (self as u8) << ATTR_TYPE_SHIFT
    }
}

impl core::fmt::Display for FileType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.letter() as char)
    }
}

/// A single decoded or to-be-encoded directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File size in bytes for `Fil`/`Dir`; drive number for `Nam`; blocks
    /// free for `Fre`.
    pub size: u32,
    pub year: u8,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub mode: DirMode,
    pub attr: u8,
    /// CBM file type for a `Fil` row; meaningless for `Nam`/`Dir`/`Fre`
    /// rows but always present so [`DirEntry::encode`] has a value to
    /// pack.
    pub file_type: FileType,
    /// Name truncated to 16 bytes if longer, per the on-the-wire limit;
    /// callers are expected to have already substituted a short name where
    /// the host filesystem supplies one.
    pub name: Vec<u8>,
}

/// Maximum name length before truncation, matching the 16-character CBM
/// filename field.
pub const MAX_NAME_LEN: usize = 16;

impl DirEntry {
    /// Builds the header row for drive `drive`, named `dirname`.
    #[must_use]
    pub fn header(drive: u8, dirname: &[u8]) -> Self {
        Self {
            size: u32::from(drive),
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            min: 0,
            mode: DirMode::Nam,
            attr: 0,
            file_type: FileType::Prg,
            name: truncate_name(dirname),
        }
    }

    /// Builds a file or subdirectory row. `file_type` is meaningless for
    /// directory rows but still recorded, so the caller picks it once
    /// regardless of `is_dir`.
    #[must_use]
    pub fn entry(
        name: &[u8],
        size: u32,
        timestamp: (u8, u8, u8, u8, u8),
        is_dir: bool,
        file_type: FileType,
        attr: u8,
    ) -> Self {
        let (year, month, day, hour, min) = timestamp;
        Self {
            size,
            year,
            month,
            day,
            hour,
            min,
            mode: if is_dir { DirMode::Dir } else { DirMode::Fil },
            attr,
            file_type,
            name: truncate_name(name),
        }
    }

    /// Builds the trailing "blocks free" row.
    #[must_use]
    pub fn tail(blocks_free: u32) -> Self {
        Self {
            size: blocks_free,
            year: 0,
            month: 0,
            day: 0,
            hour: 0,
            min: 0,
            mode: DirMode::Fre,
            attr: 0,
            file_type: FileType::Prg,
            name: Vec::new(),
        }
    }

    /// Encodes this record to its wire representation. `FS_DIR_ATTR`
    /// carries both the `LOCKED`/`SPLAT` flag bits and, for `Fil` rows,
    /// the packed [`FileType`].
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(12 + self.name.len() + 1);
        out.extend_from_slice(&self.size.to_le_bytes());
        out.push(self.year);
        out.push(self.month);
        out.push(self.day);
        out.push(self.hour);
        out.push(self.min);
        out.push(self.mode as u8);
        let attr = if self.mode == DirMode::Fil {
            self.attr | self.file_type.attr_bits()
        } else {
            self.attr
        };
        out.push(attr);
        out.extend_from_slice(&self.name);
        out.push(0);
        out
    }
}

fn truncate_name(name: &[u8]) -> Vec<u8> {
    if name.len() > MAX_NAME_LEN {
        name[..MAX_NAME_LEN].to_vec()
    } else {
        name.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_row_carries_drive_number_in_size_field() {
        let header = DirEntry::header(3, b"HOME");
        assert_eq!(header.size, 3);
        assert_eq!(header.mode, DirMode::Nam);
    }

    #[test]
    fn tail_row_has_no_name() {
        let tail = DirEntry::tail(664);
        assert!(tail.name.is_empty());
        assert_eq!(tail.mode, DirMode::Fre);
    }

    #[test]
    fn long_names_are_truncated_to_sixteen_bytes() {
        let entry = DirEntry::entry(
            b"A-NAME-LONGER-THAN-SIXTEEN-BYTES",
            0,
            (26, 1, 1, 0, 0),
            false,
            FileType::Prg,
            0,
        );
        assert_eq!(entry.name.len(), MAX_NAME_LEN);
    }

    #[test]
    fn encode_layout_matches_fixed_header() {
        let entry = DirEntry::entry(b"TEST", 256, (26, 3, 4, 12, 30), false, FileType::Prg, ATTR_LOCKED);
        let bytes = entry.encode();
        assert_eq!(&bytes[0..4], &256u32.to_le_bytes());
        assert_eq!(bytes[4], 26);
        assert_eq!(bytes[9], DirMode::Fil as u8);
        assert_eq!(bytes[10], ATTR_LOCKED);
        assert_eq!(&bytes[11..15], b"TEST");
        assert_eq!(*bytes.last().unwrap(), 0);
    }

    #[test]
    fn file_type_is_packed_into_the_attr_byte() {
        let entry = DirEntry::entry(b"DATA", 10, (26, 1, 1, 0, 0), false, FileType::Rel, ATTR_LOCKED);
        let bytes = entry.encode();
        assert_eq!(bytes[10], ATTR_LOCKED | ATTR_TYPE_MASK);
    }

    #[test]
    fn directory_rows_do_not_pack_a_file_type() {
        let entry = DirEntry::entry(b"SUB", 0, (26, 1, 1, 0, 0), true, FileType::Rel, 0);
        let bytes = entry.encode();
        assert_eq!(bytes[10], 0);
    }
}
