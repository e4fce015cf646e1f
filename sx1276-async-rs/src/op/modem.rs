//! Modem configuration values: spreading factor, bandwidth, coding rate,
//! power amplifier and LNA settings.

/// LoRa spreading factor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum SpreadFactor {
    /// Spreading Factor 6 (implicit header only).
    SF6 = 6,
    /// Spreading Factor 7.
    SF7 = 7,
    /// Spreading Factor 8.
    SF8 = 8,
    /// Spreading Factor 9.
    SF9 = 9,
    /// Spreading Factor 10.
    SF10 = 10,
    /// Spreading Factor 11.
    SF11 = 11,
    /// Spreading Factor 12.
    SF12 = 12,
}

impl SpreadFactor {
    /// Converts a raw spreading factor number, rejecting values outside
    /// 6..=12. Use this for untrusted input.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            6 => Some(Self::SF6),
            7 => Some(Self::SF7),
            8 => Some(Self::SF8),
            9 => Some(Self::SF9),
            10 => Some(Self::SF10),
            11 => Some(Self::SF11),
            12 => Some(Self::SF12),
            _ => None,
        }
    }

    /// Returns `true` when the factor mandates the low data rate
    /// optimization (symbol time above 16 ms at 125 kHz).
    pub const fn needs_low_data_rate_optimize(self) -> bool {
        matches!(self, Self::SF11 | Self::SF12)
    }
}

impl From<u8> for SpreadFactor {
    fn from(value: u8) -> Self {
        match Self::from_u8(value) {
            Some(sf) => sf,
            None => panic!("Invalid LoRa spread factor"),
        }
    }
}

/// LoRa bandwidth, as the upper nibble of `ModemConfig1`.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bandwidth {
    /// 125 kHz
    Bw125 = 0x70,
    /// 250 kHz
    Bw250 = 0x80,
    /// 500 kHz
    Bw500 = 0x90,
}

impl Bandwidth {
    /// The bandwidth in kHz, as used in the `datr` wire encoding.
    pub const fn khz(self) -> u16 {
        match self {
            Self::Bw125 => 125,
            Self::Bw250 => 250,
            Self::Bw500 => 500,
        }
    }
}

/// LoRa forward error correction coding rate.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CodingRate {
    /// 4/5
    Cr4_5 = 0x02,
    /// 4/6
    Cr4_6 = 0x04,
    /// 4/7
    Cr4_7 = 0x06,
    /// 4/8
    Cr4_8 = 0x08,
}

/// A builder for the `ModemConfig1` register value.
#[derive(Copy, Clone)]
pub struct ModemConfig1 {
    bandwidth: Bandwidth,
    coding_rate: CodingRate,
    implicit_header: bool,
}

impl Default for ModemConfig1 {
    fn default() -> Self {
        Self {
            bandwidth: Bandwidth::Bw125,
            coding_rate: CodingRate::Cr4_5,
            implicit_header: false,
        }
    }
}

impl ModemConfig1 {
    /// Sets the bandwidth.
    pub const fn set_bandwidth(mut self, bandwidth: Bandwidth) -> Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Sets the coding rate.
    pub const fn set_coding_rate(mut self, coding_rate: CodingRate) -> Self {
        self.coding_rate = coding_rate;
        self
    }

    /// Selects implicit (fixed length) header mode.
    pub const fn set_implicit_header(mut self, implicit: bool) -> Self {
        self.implicit_header = implicit;
        self
    }
}

impl From<ModemConfig1> for u8 {
    fn from(val: ModemConfig1) -> Self {
        val.bandwidth as u8 | val.coding_rate as u8 | val.implicit_header as u8
    }
}

/// A builder for the `ModemConfig2` register value.
#[derive(Copy, Clone)]
pub struct ModemConfig2 {
    spread_factor: SpreadFactor,
    crc_on: bool,
    symb_timeout_msb: u8,
}

impl Default for ModemConfig2 {
    fn default() -> Self {
        Self {
            spread_factor: SpreadFactor::SF7,
            crc_on: true,
            symb_timeout_msb: 0,
        }
    }
}

impl ModemConfig2 {
    /// Sets the spreading factor.
    pub const fn set_spread_factor(mut self, spread_factor: SpreadFactor) -> Self {
        self.spread_factor = spread_factor;
        self
    }

    /// Enables or disables the payload CRC check.
    pub const fn set_crc_on(mut self, crc_on: bool) -> Self {
        self.crc_on = crc_on;
        self
    }

    /// Sets the two most significant bits of the RX symbol timeout.
    pub const fn set_symb_timeout_msb(mut self, msb: u8) -> Self {
        self.symb_timeout_msb = msb;
        self
    }
}

impl From<ModemConfig2> for u8 {
    fn from(val: ModemConfig2) -> Self {
        ((val.spread_factor as u8) << 4) | ((val.crc_on as u8) << 2) | (val.symb_timeout_msb & 0x03)
    }
}

/// A builder for the `ModemConfig3` register value.
#[derive(Copy, Clone, Default)]
pub struct ModemConfig3 {
    low_data_rate_optimize: bool,
    agc_auto: bool,
}

impl ModemConfig3 {
    /// Enables the mandatory low data rate optimization for SF11/SF12.
    pub const fn set_low_data_rate_optimize(mut self, on: bool) -> Self {
        self.low_data_rate_optimize = on;
        self
    }

    /// Lets the AGC set the LNA gain instead of the `Lna` register.
    pub const fn set_agc_auto(mut self, on: bool) -> Self {
        self.agc_auto = on;
        self
    }
}

impl From<ModemConfig3> for u8 {
    fn from(val: ModemConfig3) -> Self {
        ((val.low_data_rate_optimize as u8) << 3) | ((val.agc_auto as u8) << 2)
    }
}

/// A builder for the `PaConfig` register value.
///
/// Gateways drive the PA_BOOST output; the RFO pin is not wired on the
/// common RFM95 modules.
#[derive(Copy, Clone)]
pub struct PaConfig {
    boost: bool,
    power_dbm: i8,
}

impl Default for PaConfig {
    fn default() -> Self {
        Self {
            boost: true,
            power_dbm: 14,
        }
    }
}

impl PaConfig {
    /// Selects the PA_BOOST output.
    pub const fn set_boost(mut self, boost: bool) -> Self {
        self.boost = boost;
        self
    }

    /// Sets the output power in dBm. On PA_BOOST the usable range is
    /// 2..=17 dBm; values are clamped.
    pub const fn set_power_dbm(mut self, power_dbm: i8) -> Self {
        self.power_dbm = power_dbm;
        self
    }
}

impl From<PaConfig> for u8 {
    fn from(val: PaConfig) -> Self {
        let power = if val.power_dbm < 2 {
            2
        } else if val.power_dbm > 17 {
            17
        } else {
            val.power_dbm
        };
        ((val.boost as u8) << 7) | 0x70 | ((power - 2) as u8 & 0x0F)
    }
}

/// Maximum LNA gain with boost on the HF input, used while listening.
pub const LNA_MAX_GAIN: u8 = 0x23;

/// LNA off.
pub const LNA_OFF_GAIN: u8 = 0x00;

/// The LoRaWAN public network sync word.
pub const SYNC_WORD_PUBLIC: u8 = 0x34;

/// RSSI offset for the HF port; subtract from the raw packet RSSI readout.
pub const RSSI_OFFSET_HF: i16 = 157;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modem_config1_composes_bandwidth_and_coding_rate() {
        let mc1 = ModemConfig1::default()
            .set_bandwidth(Bandwidth::Bw125)
            .set_coding_rate(CodingRate::Cr4_5);
        assert_eq!(u8::from(mc1), 0x72);
    }

    #[test]
    fn modem_config2_places_spread_factor_in_upper_nibble() {
        let mc2 = ModemConfig2::default()
            .set_spread_factor(SpreadFactor::SF12)
            .set_crc_on(true);
        assert_eq!(u8::from(mc2), 0xC4);
    }

    #[test]
    fn spread_factor_rejects_out_of_range_values() {
        assert_eq!(SpreadFactor::from_u8(5), None);
        assert_eq!(SpreadFactor::from_u8(13), None);
        assert_eq!(SpreadFactor::from_u8(9), Some(SpreadFactor::SF9));
    }

    #[test]
    fn pa_config_clamps_power_to_boost_range() {
        assert_eq!(u8::from(PaConfig::default().set_power_dbm(14)), 0xFC);
        assert_eq!(u8::from(PaConfig::default().set_power_dbm(30)), 0xFF);
        assert_eq!(u8::from(PaConfig::default().set_power_dbm(-3)), 0xF0);
    }
}
