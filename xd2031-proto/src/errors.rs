//! Commodore DOS status-channel error codes.
//!
//! These are on-the-wire *data*, not Rust errors: a provider returns one as
//! the first payload byte of a reply packet, and the firmware side formats
//! it as `"NN,MESSAGE,TT,SS"` for the status channel (see
//! [`crate::errors::CbmError::format_status`]).
//!
//! Numeric values for `Ok` through `DriveNotReady` are taken from the
//! original firmware's `errormsg.h`. The handful of codes the local
//! filesystem provider needs that weren't in the distilled header
//! (`NoPermission`, `WriteError`, `SyntaxDirSeparator`, `SyntaxInval`,
//! `RecordNotPresent`, `Fault`) are assigned unused slots in the same 0-99
//! space.

extern crate alloc;

use core::fmt;

/// A Commodore DOS status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CbmError {
    Ok = 0,
    Scratched = 1,
    PartitionSelected = 2,
    Status = 3,
    LongVersion = 9,
    ReadNoHeader = 20,
    ReadNoSync = 21,
    ReadNoData = 22,
    ReadChecksum = 23,
    WriteVerify = 25,
    WriteProtect = 26,
    ReadHeaderChecksum = 27,
    DiskIdMismatch = 29,
    SyntaxUnknown = 30,
    SyntaxUnable = 31,
    SyntaxTooLong = 32,
    SyntaxJoker = 33,
    SyntaxNoName = 34,
    FileNotFound39 = 39,
    RecordMissing = 50,
    RecordOverflow = 51,
    FileTooLarge = 52,
    RecordNotPresent = 53,
    WriteFileOpen = 60,
    FileNotOpen = 61,
    FileNotFound = 62,
    FileExists = 63,
    FileTypeMismatch = 64,
    NoBlock = 65,
    IllegalTsCommand = 66,
    IllegalTsLink = 67,
    NoChannel = 70,
    DirError = 71,
    DiskFull = 72,
    DosVersion = 73,
    DriveNotReady = 74,
    NoPermission = 75,
    WriteError = 76,
    PartitionIllegal = 77,
    BufferTooSmall = 78,
    ImageInvalid = 79,
    SyntaxDirSeparator = 80,
    SyntaxInval = 81,
    Fault = 90,
    ClockUnstable = 99,
}

impl CbmError {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Short message text used in the "NN,MESSAGE,TT,SS" status string.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Scratched => "FILES SCRATCHED",
            Self::PartitionSelected => "PARTITION SELECTED",
            Self::Status => "STATUS",
            Self::LongVersion => "XD-2031",
            Self::ReadNoHeader => "READ ERROR",
            Self::ReadNoSync => "READ ERROR",
            Self::ReadNoData => "READ ERROR",
            Self::ReadChecksum => "READ ERROR",
            Self::WriteVerify => "WRITE ERROR",
            Self::WriteProtect => "WRITE PROTECT ON",
            Self::ReadHeaderChecksum => "READ ERROR",
            Self::DiskIdMismatch => "DISK ID MISMATCH",
            Self::SyntaxUnknown => "SYNTAX ERROR",
            Self::SyntaxUnable => "SYNTAX ERROR",
            Self::SyntaxTooLong => "SYNTAX ERROR",
            Self::SyntaxJoker => "SYNTAX ERROR",
            Self::SyntaxNoName => "SYNTAX ERROR",
            Self::FileNotFound39 => "FILE NOT FOUND",
            Self::RecordMissing => "RECORD NOT PRESENT",
            Self::RecordOverflow => "RECORD OVERFLOW",
            Self::FileTooLarge => "FILE TOO LARGE",
            Self::RecordNotPresent => "RECORD NOT PRESENT",
            Self::WriteFileOpen => "WRITE FILE OPEN",
            Self::FileNotOpen => "FILE NOT OPEN",
            Self::FileNotFound => "FILE NOT FOUND",
            Self::FileExists => "FILE EXISTS",
            Self::FileTypeMismatch => "FILE TYPE MISMATCH",
            Self::NoBlock => "NO BLOCK",
            Self::IllegalTsCommand => "ILLEGAL TRACK OR SECTOR",
            Self::IllegalTsLink => "ILLEGAL TRACK OR SECTOR",
            Self::NoChannel => "NO CHANNEL",
            Self::DirError => "DIR ERROR",
            Self::DiskFull => "DISK FULL",
            Self::DosVersion => "XD-2031 FS V1.0",
            Self::DriveNotReady => "DRIVE NOT READY",
            Self::NoPermission => "NO PERMISSION",
            Self::WriteError => "WRITE ERROR",
            Self::PartitionIllegal => "PARTITION ILLEGAL",
            Self::BufferTooSmall => "BUFFER TOO SMALL",
            Self::ImageInvalid => "IMAGE INVALID",
            Self::SyntaxDirSeparator => "NO DIR SEPARATOR ALLOWED",
            Self::SyntaxInval => "SYNTAX ERROR",
            Self::Fault => "FAULT",
            Self::ClockUnstable => "CLOCK UNSTABLE",
        }
    }

    /// Parses a raw status byte back into a `CbmError`, if it is one this
    /// crate knows about.
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => Self::Ok,
            1 => Self::Scratched,
            2 => Self::PartitionSelected,
            3 => Self::Status,
            9 => Self::LongVersion,
            20 => Self::ReadNoHeader,
            21 => Self::ReadNoSync,
            22 => Self::ReadNoData,
            23 => Self::ReadChecksum,
            25 => Self::WriteVerify,
            26 => Self::WriteProtect,
            27 => Self::ReadHeaderChecksum,
            29 => Self::DiskIdMismatch,
            30 => Self::SyntaxUnknown,
            31 => Self::SyntaxUnable,
            32 => Self::SyntaxTooLong,
            33 => Self::SyntaxJoker,
            34 => Self::SyntaxNoName,
            39 => Self::FileNotFound39,
            50 => Self::RecordMissing,
            51 => Self::RecordOverflow,
            52 => Self::FileTooLarge,
            53 => Self::RecordNotPresent,
            60 => Self::WriteFileOpen,
            61 => Self::FileNotOpen,
            62 => Self::FileNotFound,
            63 => Self::FileExists,
            64 => Self::FileTypeMismatch,
            65 => Self::NoBlock,
            66 => Self::IllegalTsCommand,
            67 => Self::IllegalTsLink,
            70 => Self::NoChannel,
            71 => Self::DirError,
            72 => Self::DiskFull,
            73 => Self::DosVersion,
            74 => Self::DriveNotReady,
            75 => Self::NoPermission,
            76 => Self::WriteError,
            77 => Self::PartitionIllegal,
            78 => Self::BufferTooSmall,
            79 => Self::ImageInvalid,
            80 => Self::SyntaxDirSeparator,
            81 => Self::SyntaxInval,
            90 => Self::Fault,
            99 => Self::ClockUnstable,
            _ => return None,
        })
    }

    /// Formats the status-channel string `"NN,MESSAGE,TT,SS"`, zero
    /// padding the numeric fields to two digits as the original CBM DOS
    /// status channel does.
    #[must_use]
    pub fn format_status(self, track: u8, sector: u8) -> alloc::string::String {
        use alloc::string::String;
        use core::fmt::Write as _;
        let mut out = String::new();
        let _ = write!(out, "{:02},{},{track:02},{sector:02}", self.code(), self.message());
        out
    }
}

impl fmt::Display for CbmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02},{}", self.code(), self.message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_status_matches_cbm_convention() {
        assert_eq!(CbmError::Ok.format_status(0, 0), "00,OK,00,00");
    }

    #[test]
    fn round_trips_through_code() {
        for err in [CbmError::FileNotFound, CbmError::DriveNotReady, CbmError::Scratched] {
            assert_eq!(CbmError::from_code(err.code()), Some(err));
        }
    }
}
