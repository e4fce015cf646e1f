//! The interrupt-to-main-loop event mailbox.
//!
//! DIO interrupt handlers must not touch the SPI bus: a register read takes
//! far longer than is safe with other interrupts suspended, and it could
//! interleave with a transaction already in flight on the main loop. The
//! handlers therefore only record *that* an event fired into a single
//! atomic slot and return; the main loop drains the slot and performs the
//! actual register reads synchronously.
//!
//! The slot is depth 1 by design: a second event posted before the first
//! is drained overwrites it. Under normal operation the main loop drains
//! faster than radio events can occur (the dominant event, receive-done,
//! cannot recur before the state machine leaves its receive state), but
//! overwrites are counted so the assumption stays observable.

use core::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

use crate::frame::DownlinkFrame;

/// A latched mailbox slot for downlink frames parsed by the network side.
///
/// The UDP receive task `signal`s a parsed frame; the main loop
/// `try_take`s it and hands it to the modem. Like the event latch this is
/// publish-latest: a new downlink replaces an untaken one.
pub type DownlinkMailbox = Signal<CriticalSectionRawMutex, DownlinkFrame>;

/// The hardware events a DIO line can report.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RadioEvent {
    /// A packet reception completed (DIO0 in receive mode).
    RxDone = 1,
    /// The receive operation timed out (DIO1 in receive mode).
    RxTimeout = 2,
    /// Channel activity detection finished (DIO0 in CAD mode).
    CadDone = 3,
    /// A transmission completed (DIO0 in transmit mode).
    TxDone = 4,
}

const EMPTY: u8 = 0;

/// A single-producer/single-consumer, depth-1 event mailbox.
///
/// `post` is safe to call from interrupt context; it performs one atomic
/// swap and never blocks. `take` is called from the main loop only.
pub struct EventLatch {
    slot: AtomicU8,
    overwrites: AtomicU32,
}

impl EventLatch {
    /// Creates an empty latch. Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            slot: AtomicU8::new(EMPTY),
            overwrites: AtomicU32::new(0),
        }
    }

    /// Publishes an event, overwriting an undrained one.
    pub fn post(&self, event: RadioEvent) {
        let prev = self.slot.swap(event as u8, Ordering::Release);
        if prev != EMPTY {
            self.overwrites.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Takes and clears the pending event, if any.
    pub fn take(&self) -> Option<RadioEvent> {
        match self.slot.swap(EMPTY, Ordering::Acquire) {
            1 => Some(RadioEvent::RxDone),
            2 => Some(RadioEvent::RxTimeout),
            3 => Some(RadioEvent::CadDone),
            4 => Some(RadioEvent::TxDone),
            _ => None,
        }
    }

    /// Returns `true` if an event is waiting to be drained.
    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Relaxed) != EMPTY
    }

    /// The number of events that were overwritten before being drained.
    pub fn overwrites(&self) -> u32 {
        self.overwrites.load(Ordering::Relaxed)
    }
}

impl Default for EventLatch {
    fn default() -> Self {
        Self::new()
    }
}
