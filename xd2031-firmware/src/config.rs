//! Runtime configuration state carried by the firmware side.
//!
//! Grounded in `original_source/firmware/rtconfig.c`: the device remembers
//! the last drive it was told to use (so a name with no `drivespec`
//! resolves to something sensible) and every `SETOPT` string it has ever
//! been told to apply, so the whole set can be replayed verbatim after a
//! `RESET` reply (see `cmd_sendxcmd` in
//! `original_source/pcserver/fscmd.c`).

/// Device-side runtime configuration.
#[derive(Debug, Default, Clone)]
pub struct RuntimeConfig {
    last_drive: u8,
    options: Vec<Vec<u8>>,
}

impl RuntimeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_drive(&self) -> u8 {
        self.last_drive
    }

    pub fn set_last_drive(&mut self, drive: u8) {
        self.last_drive = drive;
    }

    /// Registers an option string to be replayed on the next RESET.
    pub fn record_option(&mut self, option: Vec<u8>) {
        self.options.push(option);
    }

    /// Options to replay, in the order they were registered.
    #[must_use]
    pub fn options(&self) -> &[Vec<u8>] {
        &self.options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_replay_in_registration_order() {
        let mut config = RuntimeConfig::new();
        config.record_option(b"0:fs:/tmp/a".to_vec());
        config.record_option(b"1:fs:/tmp/b".to_vec());
        assert_eq!(
            config.options(),
            &[b"0:fs:/tmp/a".to_vec(), b"1:fs:/tmp/b".to_vec()]
        );
    }

    #[test]
    fn last_drive_defaults_to_zero() {
        assert_eq!(RuntimeConfig::new().last_drive(), 0);
    }
}
