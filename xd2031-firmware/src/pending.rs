//! Pending-open tracker (C6): correlates in-flight OPEN/command packets
//! with the callback that resumes the bus state machine once the server
//! replies.
//!
//! Grounded in `spec.md` §4.6 and `original_source/firmware/file.c`'s
//! `file_submit_call`/`_file_open_callback`. The design note in `spec.md`
//! §9 ("Volatile ISR handshake") asks for a single-writer/single-reader
//! atomic cell in place of the original's raw `cmd_done` flag; each slot
//! carries its own [`core::sync::atomic::AtomicBool`] so the serial-ISR
//! callback (the writer) and the cooperative wait loop (the reader) never
//! touch a shared global.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::FirmwareError;

/// Fixed capacity of the slot pool. The original firmware sizes this to
/// the number of channels it can have open in-flight at once; there is no
/// protocol reason to grow it at runtime.
pub const SLOT_COUNT: usize = 8;

/// One pending OPEN or command-channel request awaiting a server reply.
pub struct Slot {
    pub channel: u8,
    pub tx: Vec<u8>,
    pub rx: Vec<u8>,
    done: AtomicBool,
    occupied: bool,
}

impl Slot {
    fn empty() -> Self {
        Self {
            channel: 0,
            tx: Vec::new(),
            rx: Vec::new(),
            done: AtomicBool::new(false),
            occupied: false,
        }
    }
}

/// Bounded pool of [`Slot`]s. `submit` is called from the main-line bus
/// code; `complete` is called from whatever delivers server replies (a
/// serial ISR on real hardware, a plain function call in this host-testable
/// model).
pub struct PendingOpenTracker {
    slots: [Slot; SLOT_COUNT],
}

impl Default for PendingOpenTracker {
    fn default() -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::empty()),
        }
    }
}

impl PendingOpenTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds a free slot and reserves it for `channel`, returning its
    /// index. `Err(NoFreeSlot)` means the caller must close the channel and
    /// surface `NO_CHANNEL` on the status channel.
    pub fn submit(&mut self, channel: u8, tx: Vec<u8>) -> Result<usize, FirmwareError> {
        let index = self
            .slots
            .iter()
            .position(|s| !s.occupied)
            .ok_or(FirmwareError::NoFreeSlot)?;
        let slot = &mut self.slots[index];
        slot.channel = channel;
        slot.tx = tx;
        slot.rx.clear();
        slot.done.store(false, Ordering::Release);
        slot.occupied = true;
        Ok(index)
    }

    /// Called by the reply-delivery side: matches by channel, stores the
    /// response payload, and marks the slot done.
    pub fn complete(&mut self, channel: u8, rx: Vec<u8>) {
        if let Some(slot) = self
            .slots
            .iter_mut()
            .find(|s| s.occupied && s.channel == channel)
        {
            slot.rx = rx;
            slot.done.store(true, Ordering::Release);
        }
    }

    /// Polls whether the slot at `index` has a reply ready.
    #[must_use]
    pub fn is_done(&self, index: usize) -> bool {
        self.slots[index].done.load(Ordering::Acquire)
    }

    /// Consumes the slot at `index`, freeing it and returning the reply
    /// payload. Panics if the slot was not done; callers must check
    /// [`PendingOpenTracker::is_done`] first.
    pub fn take(&mut self, index: usize) -> Vec<u8> {
        assert!(self.is_done(index), "slot not yet completed");
        let slot = &mut self.slots[index];
        slot.occupied = false;
        core::mem::take(&mut slot.rx)
    }

    /// Number of slots currently in use; used by P3 to check the pool
    /// returns to its initial size once every open has completed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.slots.iter().filter(|s| s.occupied).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_then_complete_then_take_frees_the_slot() {
        let mut tracker = PendingOpenTracker::new();
        assert_eq!(tracker.in_flight(), 0);

        let index = tracker.submit(3, vec![1, 2, 3]).unwrap();
        assert_eq!(tracker.in_flight(), 1);
        assert!(!tracker.is_done(index));

        tracker.complete(3, vec![0]);
        assert!(tracker.is_done(index));

        let reply = tracker.take(index);
        assert_eq!(reply, vec![0]);
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn pool_is_exhausted_once_all_slots_are_occupied() {
        let mut tracker = PendingOpenTracker::new();
        for channel in 0..SLOT_COUNT as u8 {
            tracker.submit(channel, Vec::new()).unwrap();
        }
        assert!(matches!(
            tracker.submit(99, Vec::new()),
            Err(FirmwareError::NoFreeSlot)
        ));
    }

    /// P3: every OPEN reply frees exactly one slot; the pool returns to its
    /// initial size once no opens are in flight.
    #[test]
    fn property_p3_pool_returns_to_initial_size() {
        let mut tracker = PendingOpenTracker::new();
        for round in 0..5 {
            let index = tracker.submit(round, Vec::new()).unwrap();
            tracker.complete(round, vec![0]);
            tracker.take(index);
        }
        assert_eq!(tracker.in_flight(), 0);
    }
}
