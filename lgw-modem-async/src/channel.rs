//! The channel table and the hop schedule.

use embassy_time::{Duration, Instant};

/// The EU868 channel plan: ten carriers in the 863–870 MHz band.
///
/// Index 0 is the primary channel; the first three are the ones every
/// LoRaWAN-compliant device supports. The last entry is the 10%-duty-cycle
/// downlink channel.
pub const CHANNELS_EU868: [u32; 10] = [
    868_100_000,
    868_300_000,
    868_500_000,
    867_100_000,
    867_300_000,
    867_500_000,
    867_700_000,
    867_900_000,
    868_800_000,
    869_525_000,
];

/// The requested channel index does not exist in the table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InvalidChannel(
    /// The rejected index.
    pub u8,
);

/// A static table of candidate carrier frequencies with one active entry.
pub struct ChannelTable {
    freqs: &'static [u32],
    active: usize,
}

impl ChannelTable {
    /// Creates a table over the given frequencies, starting on index 0.
    ///
    /// The table must not be empty.
    pub fn new(freqs: &'static [u32]) -> Self {
        debug_assert!(!freqs.is_empty());
        Self { freqs, active: 0 }
    }

    /// The EU868 plan.
    pub fn eu868() -> Self {
        Self::new(&CHANNELS_EU868)
    }

    /// Returns the active channel index.
    pub fn active_index(&self) -> u8 {
        self.active as u8
    }

    /// Returns the active carrier frequency in Hz.
    pub fn active_hz(&self) -> u32 {
        self.freqs[self.active]
    }

    /// Returns the number of channels in the table.
    pub fn len(&self) -> usize {
        self.freqs.len()
    }

    /// Returns `true` if the table is empty. It never is; this exists for
    /// the conventional `len`/`is_empty` pairing.
    pub fn is_empty(&self) -> bool {
        self.freqs.is_empty()
    }

    /// Selects a channel by index.
    pub fn set_active(&mut self, index: u8) -> Result<(), InvalidChannel> {
        if (index as usize) < self.freqs.len() {
            self.active = index as usize;
            Ok(())
        } else {
            Err(InvalidChannel(index))
        }
    }

    /// Advances to the next channel, wrapping at the end of the table, and
    /// returns the new active frequency.
    pub fn advance(&mut self) -> u32 {
        self.active = (self.active + 1) % self.freqs.len();
        self.freqs[self.active]
    }
}

/// Elapsed-time bookkeeping for the channel hopper.
pub struct HopSchedule {
    period: Duration,
    last: Instant,
}

impl HopSchedule {
    /// Creates a schedule that first fires `period` after `now`.
    pub fn new(period: Duration, now: Instant) -> Self {
        Self { period, last: now }
    }

    /// Returns `true` once the hop period has elapsed.
    pub fn due(&self, now: Instant) -> bool {
        now - self.last >= self.period
    }

    /// Restarts the period from `now` after a hop.
    pub fn mark(&mut self, now: Instant) {
        self.last = now;
    }
}
