//! Firmware-side core of XD-2031: the bus impedance layer, channel table,
//! error/status buffer, command-line parser, and pending-open tracker.
//!
//! This crate never touches a real UART or GPIO pin. It consumes the two
//! external interfaces named in the system overview — an
//! `attention(byte)`/`send_byte`/`receive_byte` bus interface and a
//! reliable byte-stream transport for packets — purely as traits, so the
//! same logic can be driven from host-side tests or, with a different
//! binary crate providing the hardware glue, from real firmware.

pub mod bus;
pub mod channel;
pub mod cmdline;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pending;
pub mod status;

pub use bus::BusState;
pub use channel::{Channel, ChannelMode, ChannelTable};
pub use config::RuntimeConfig;
pub use dispatch::{CommandDispatcher, Transport};
pub use error::FirmwareError;
pub use pending::PendingOpenTracker;
pub use status::ErrorStatus;
