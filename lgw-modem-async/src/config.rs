//! Runtime configuration for the gateway modem.
//!
//! What a gateway firmware would otherwise select at compile time (CAD on
//! or off, hopping, the board layout) is a plain field here, resolved once
//! at startup.

use embassy_time::Duration;
use sx1276_async::op::{Bandwidth, CodingRate, SpreadFactor, SYNC_WORD_PUBLIC};

use crate::boards::BoardProfile;

/// An RSSI activity gate: the detection threshold and the settle time the
/// synthesizer needs before the reading can be trusted.
///
/// Under-waiting here is a known source of false activity readings; the
/// settle time is deliberately nonzero.
#[derive(Copy, Clone, Debug)]
pub struct RssiGate {
    /// Corrected RSSI above which the channel counts as active, in dBm.
    pub limit_dbm: i16,
    /// Settle time after a frequency/mode write, in microseconds.
    pub settle_us: u32,
}

/// Configuration for the gateway modem.
#[derive(Clone, Debug)]
pub struct ModemConfig {
    /// Use channel activity detection between receive windows.
    pub cad: bool,
    /// Cycle the active channel on a schedule.
    pub hop: bool,
    /// The hop period, measured against elapsed time.
    pub hop_period: Duration,
    /// The spreading factor to listen on.
    pub spread_factor: SpreadFactor,
    /// Bandwidth; single-channel gateways use 125 kHz.
    pub bandwidth: Bandwidth,
    /// Forward error correction coding rate.
    pub coding_rate: CodingRate,
    /// LoRa sync word.
    pub sync_word: u8,
    /// Default transmit power in dBm (a downlink may override it).
    pub tx_power_dbm: i8,
    /// RSSI gate used during normal scanning.
    pub rssi_scan: RssiGate,
    /// RSSI gate used right after a transmission, when the receiver chain
    /// needs a different margin.
    pub rssi_post_tx: RssiGate,
    /// How long CAD may run without a detection before the channel cycles.
    pub cad_deadline: Duration,
    /// How long a receive window may stay open without a frame.
    pub rx_deadline: Duration,
    /// Hard upper bound on waiting for transmit-done; exceeding it is a
    /// stuck-radio fault.
    pub tx_deadline: Duration,
    /// How many failed init attempts are tolerated before the fault is
    /// surfaced.
    pub init_retries: u8,
    /// The board pin layout.
    pub board: BoardProfile,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            cad: true,
            hop: false,
            hop_period: Duration::from_millis(500),
            spread_factor: SpreadFactor::SF7,
            bandwidth: Bandwidth::Bw125,
            coding_rate: CodingRate::Cr4_5,
            sync_word: SYNC_WORD_PUBLIC,
            tx_power_dbm: 14,
            rssi_scan: RssiGate {
                limit_dbm: -120,
                settle_us: 15,
            },
            rssi_post_tx: RssiGate {
                limit_dbm: -123,
                settle_us: 10,
            },
            cad_deadline: Duration::from_millis(100),
            rx_deadline: Duration::from_secs(4),
            tx_deadline: Duration::from_secs(3),
            init_retries: 5,
            board: BoardProfile::Hallard,
        }
    }
}
