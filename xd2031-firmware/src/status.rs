//! Error/status buffer (C3): the device-wide status channel state.
//!
//! Grounded in `spec.md` §4.3 and the status-channel handling in
//! `original_source/firmware/bus.c`. Holds the last numeric error code and
//! formats it on demand as `"NN,MESSAGE,TT,SS\0"`; reading the status
//! channel consumes that string byte by byte and resets to `OK` once the
//! terminator is reached.

use xd2031_proto::CbmError;

/// Status-channel state: last error plus a read cursor into its formatted
/// representation.
#[derive(Debug)]
pub struct ErrorStatus {
    code: CbmError,
    track: u8,
    sector: u8,
    formatted: Vec<u8>,
    read_pos: usize,
}

impl Default for ErrorStatus {
    fn default() -> Self {
        let mut status = Self {
            code: CbmError::Ok,
            track: 0,
            sector: 0,
            formatted: Vec::new(),
            read_pos: 0,
        };
        status.regenerate();
        status
    }
}

impl ErrorStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, code: CbmError) {
        self.set_ts(code, 0, 0);
    }

    pub fn set_ts(&mut self, code: CbmError, track: u8, sector: u8) {
        self.code = code;
        self.track = track;
        self.sector = sector;
        self.regenerate();
    }

    #[must_use]
    pub fn code(&self) -> CbmError {
        self.code
    }

    fn regenerate(&mut self) {
        let mut bytes = self.code.format_status(self.track, self.sector).into_bytes();
        bytes.push(0);
        self.formatted = bytes;
        self.read_pos = 0;
    }

    /// Reads the next byte of the status string. Returns `(byte, eof)`.
    /// When the byte about to be read is the terminating zero, `eof` is
    /// `true` and the error is reset to `OK` so the next status read
    /// starts fresh with `"00,OK,00,00"`.
    pub fn read_next_byte(&mut self) -> (u8, bool) {
        let byte = self.formatted[self.read_pos];
        let is_terminator = byte == 0;
        if is_terminator {
            self.set(CbmError::Ok);
            (0, true)
        } else {
            self.read_pos += 1;
            (byte, false)
        }
    }
}
