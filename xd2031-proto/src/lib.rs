//! Wire protocol shared by the firmware and server sides of XD-2031.
//!
//! This crate only describes bytes on the wire: packet framing, the
//! command/error vocabulary, directory-entry records, and wildcard
//! matching. It performs no I/O; callers feed it bytes and pull packets (or
//! vice versa).
#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

pub mod dirent;
pub mod errors;
pub mod framer;
pub mod packet;
pub mod wildcard;

pub use errors::CbmError;
pub use packet::{Command, Packet, FSFD_CMD, FSFD_SETOPT, FS_SYNC};
