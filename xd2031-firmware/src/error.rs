//! Programming-level errors on the firmware side.
//!
//! These are distinct from the CBM numeric error codes in
//! [`xd2031_proto::CbmError`], which are on-the-wire data returned to the
//! host computer. A `FirmwareError` means something went wrong in the Rust
//! code itself rather than on the bus (currently: an exhausted slot table).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FirmwareError {
    #[error("pending-open slot table exhausted")]
    NoFreeSlot,
}
