//! Reception history and running gateway counters.
//!
//! Mutated exclusively from the main processing context, so no locking is
//! needed beyond the single-threaded ordering the modem already provides.

use heapless::HistoryBuffer;
use sx1276_async::op::SpreadFactor;

use crate::frame::UplinkFrame;

/// How many recent receptions the history ring keeps.
pub const STAT_HISTORY: usize = 16;

/// One entry in the reception history.
#[derive(Copy, Clone, Debug)]
pub struct StatEntry {
    /// Reception time in milliseconds since boot.
    pub tmst_ms: u64,
    /// The device address carried in the frame, 0 if too short to hold one.
    pub device_addr: u32,
    /// The channel table index the frame arrived on.
    pub channel: u8,
    /// The spreading factor.
    pub spread_factor: SpreadFactor,
    /// Corrected RSSI in dBm.
    pub rssi: i16,
}

/// Running counters for the lifetime of the process.
///
/// Everything here is monotonically increasing and resets only at
/// power-on.
#[derive(Copy, Clone, Debug, Default)]
pub struct Counters {
    /// Receptions per spreading factor, SF6 at index 0 through SF12.
    pub per_sf: [u32; 7],
    /// Successful radio initializations.
    pub boots: u16,
    /// Forced re-initializations (stuck radio, management reset).
    pub resets: u16,
    /// Receive-done events observed, including CRC failures.
    pub rx_received: u32,
    /// Receptions with a valid CRC.
    pub rx_ok: u32,
    /// Frames handed to the network side.
    pub rx_forwarded: u32,
    /// Frames discarded for a CRC failure.
    pub rx_crc_errors: u32,
    /// Receive windows that closed without a frame.
    pub rx_timeouts: u32,
    /// Frames dropped because the uplink slot was still occupied.
    pub rx_dropped: u32,
    /// Uplink datagrams acknowledged by the server.
    pub upstream_acks: u32,
    /// Downlink frames accepted for transmission.
    pub tx_queued: u32,
    /// Transmissions that completed.
    pub tx_done: u32,
}

impl Counters {
    /// Returns the reception count for one spreading factor.
    pub fn sf_count(&self, sf: SpreadFactor) -> u32 {
        self.per_sf[(sf as u8 - 6) as usize]
    }

    fn count_sf(&mut self, sf: SpreadFactor) {
        self.per_sf[(sf as u8 - 6) as usize] += 1;
    }
}

/// The statistics collector: a bounded history of recent receptions plus
/// the aggregate counters.
#[derive(Default)]
pub struct Stats {
    history: HistoryBuffer<StatEntry, STAT_HISTORY>,
    /// The running counters.
    pub counters: Counters,
}

impl Stats {
    /// Creates an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a valid reception: appends to the ring (evicting the oldest
    /// entry once full) and bumps the per-SF counter.
    pub fn record(&mut self, frame: &UplinkFrame, tmst_ms: u64) {
        self.history.write(StatEntry {
            tmst_ms,
            device_addr: frame.device_addr().unwrap_or(0),
            channel: frame.channel,
            spread_factor: frame.spread_factor,
            rssi: frame.rssi,
        });
        self.counters.count_sf(frame.spread_factor);
    }

    /// Iterates the history from the oldest entry to the most recent.
    pub fn history(&self) -> impl Iterator<Item = &StatEntry> {
        self.history.oldest_ordered()
    }

    /// How many entries the history currently holds.
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
