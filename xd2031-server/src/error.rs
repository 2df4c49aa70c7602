//! Programming-level errors on the server side.
//!
//! As on the firmware side (`xd2031_firmware::error::FirmwareError`), these
//! are distinct from the [`xd2031_proto::CbmError`] codes that travel in
//! packet payloads as data. A `ServerError` means the Rust code itself
//! failed (a bad CLI argument, a transport that couldn't be opened).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("malformed ASSIGN spec {0:?}")]
    BadAssignSpec(String),

    #[error("drive number {0} is out of range (0-9)")]
    DriveOutOfRange(u8),

    #[error("could not open transport device {0:?}: {1}")]
    TransportOpen(String, #[source] std::io::Error),

    #[error("transport I/O error: {0}")]
    Transport(#[from] std::io::Error),
}
