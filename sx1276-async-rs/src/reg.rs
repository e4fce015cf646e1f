//! SX1276 register addresses (LoRa page).

/// The registers of the SX1276 used in LoRa mode.
///
/// Addresses follow the SX1276 datasheet; registers 0x02..=0x05 are
/// FSK-only and not listed.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    /// FIFO read/write access.
    Fifo = 0x00,
    /// Operating mode and LoRa/FSK selection.
    OpMode = 0x01,
    /// Carrier frequency, most significant byte.
    FrfMsb = 0x06,
    /// Carrier frequency, middle byte.
    FrfMid = 0x07,
    /// Carrier frequency, least significant byte.
    FrfLsb = 0x08,
    /// Power amplifier selection and output power.
    PaConfig = 0x09,
    /// Power amplifier ramp time.
    PaRamp = 0x0A,
    /// Low noise amplifier settings.
    Lna = 0x0C,
    /// SPI pointer into the FIFO.
    FifoAddrPtr = 0x0D,
    /// Base address of the TX portion of the FIFO.
    FifoTxBaseAddr = 0x0E,
    /// Base address of the RX portion of the FIFO.
    FifoRxBaseAddr = 0x0F,
    /// Start address of the last packet received.
    FifoRxCurrentAddr = 0x10,
    /// Interrupt mask (a set bit disables the interrupt).
    IrqFlagsMask = 0x11,
    /// Interrupt flags (write 1 to clear).
    IrqFlags = 0x12,
    /// Number of payload bytes of the last packet received.
    RxNbBytes = 0x13,
    /// SNR of the last packet received.
    PktSnrValue = 0x19,
    /// RSSI of the last packet received.
    PktRssiValue = 0x1A,
    /// Current RSSI.
    RssiValue = 0x1B,
    /// FHSS start channel and CRC-on-payload indication.
    HopChannel = 0x1C,
    /// Bandwidth, coding rate and header mode.
    ModemConfig1 = 0x1D,
    /// Spreading factor, CRC and symbol timeout MSB.
    ModemConfig2 = 0x1E,
    /// Symbol timeout LSB.
    SymbTimeoutLsb = 0x1F,
    /// Payload length (TX, or RX in implicit header mode).
    PayloadLength = 0x22,
    /// Maximum accepted RX payload length.
    MaxPayloadLength = 0x23,
    /// Symbol periods between frequency hops.
    HopPeriod = 0x24,
    /// Low data rate optimization and AGC.
    ModemConfig3 = 0x26,
    /// Wideband RSSI measurement (entropy source).
    RssiWideband = 0x2C,
    /// IQ polarity setup.
    InvertIq = 0x33,
    /// CAD/SF6 detection threshold.
    DetectionThreshold = 0x37,
    /// LoRa sync word.
    SyncWord = 0x39,
    /// DIO0..DIO3 function mapping.
    DioMapping1 = 0x40,
    /// DIO4..DIO5 function mapping and clock out.
    DioMapping2 = 0x41,
    /// Chip version.
    Version = 0x42,
    /// High power PA control (+20 dBm on PA_BOOST).
    PaDac = 0x4D,
}

impl Register {
    /// Returns the raw register address.
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

/// The value the version register reads back on an SX1276/RFM95.
pub const VERSION_SX1276: u8 = 0x12;
