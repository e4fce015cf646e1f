//! Wrapper for modem configuration parameters.

use super::op::*;

/// Configuration parameters used to initialize the SX1276 modem.
pub struct Config {
    /// The carrier frequency in Hz (e.g. `868_100_000` for 868.1 MHz).
    pub freq_hz: u32,
    /// The spreading factor to listen on.
    pub spread_factor: SpreadFactor,
    /// The bandwidth. Gateways use 125 kHz.
    pub bandwidth: Bandwidth,
    /// The forward error correction coding rate.
    pub coding_rate: CodingRate,
    /// The LoRa sync word. Use [`SYNC_WORD_PUBLIC`] for LoRaWAN networks.
    pub sync_word: u8,
    /// Whether the payload CRC check is enabled while receiving.
    pub crc_on: bool,
    /// Power amplifier selection and output power for transmission.
    pub pa_config: PaConfig,
    /// Maximum accepted receive payload length in bytes.
    pub max_payload_len: u8,
    /// Standard payload length programmed into the `PayloadLength` register.
    pub payload_len: u8,
    /// The set of interrupts to leave unmasked.
    pub irq_mask: IrqMask,
    /// The initial DIO pin mapping.
    pub dio_mapping: DioMapping,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            freq_hz: 868_100_000,
            spread_factor: SpreadFactor::SF7,
            bandwidth: Bandwidth::Bw125,
            coding_rate: CodingRate::Cr4_5,
            sync_word: SYNC_WORD_PUBLIC,
            crc_on: true,
            pa_config: PaConfig::default(),
            max_payload_len: 0x80,
            payload_len: 0x40,
            irq_mask: IrqMask::all(),
            dio_mapping: DioMapping::rx(),
        }
    }
}
