//! Interrupt (IRQ) flag and mask structures.

/// A bitmask for individual interrupt flags.
///
/// These are the bits of both the `IrqFlags` and `IrqFlagsMask` registers.
#[repr(u8)]
#[derive(Copy, Clone)]
pub enum IrqMaskBit {
    /// No interrupt.
    None = 0x00,
    /// Receive operation timed out.
    RxTimeout = 0x80,
    /// Receive operation done.
    RxDone = 0x40,
    /// Payload CRC error.
    CrcError = 0x20,
    /// Valid header received.
    ValidHeader = 0x10,
    /// Transmit operation done.
    TxDone = 0x08,
    /// Channel Activity Detection done.
    CadDone = 0x04,
    /// Frequency hop channel change.
    FhssChange = 0x02,
    /// Channel activity detected.
    CadDetected = 0x01,
    /// All interrupts.
    All = 0xFF,
}

/// A builder for creating an interrupt mask.
#[derive(Copy, Clone)]
pub struct IrqMask {
    inner: u8,
}

impl IrqMask {
    /// Creates a new, empty `IrqMask`.
    pub const fn none() -> Self {
        Self {
            inner: IrqMaskBit::None as u8,
        }
    }

    /// Creates a new `IrqMask` with all interrupts selected.
    pub const fn all() -> Self {
        Self {
            inner: IrqMaskBit::All as u8,
        }
    }

    /// Adds an interrupt flag to the mask.
    pub const fn combine(self, bit: IrqMaskBit) -> Self {
        let inner = self.inner | bit as u8;
        Self { inner }
    }
}

impl From<IrqMask> for u8 {
    fn from(val: IrqMask) -> Self {
        val.inner
    }
}

impl From<u8> for IrqMask {
    fn from(mask: u8) -> Self {
        Self { inner: mask }
    }
}

impl Default for IrqMask {
    fn default() -> Self {
        Self::none()
    }
}

/// The interrupt flags read from the `IrqFlags` register.
#[derive(Copy, Clone)]
pub struct IrqFlags {
    inner: u8,
}

impl From<u8> for IrqFlags {
    fn from(flags: u8) -> Self {
        Self { inner: flags }
    }
}

impl From<IrqFlags> for u8 {
    fn from(val: IrqFlags) -> Self {
        val.inner
    }
}

impl core::fmt::Debug for IrqFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IrqFlags")
            .field("rx_timeout", &self.rx_timeout())
            .field("rx_done", &self.rx_done())
            .field("crc_error", &self.crc_error())
            .field("valid_header", &self.valid_header())
            .field("tx_done", &self.tx_done())
            .field("cad_done", &self.cad_done())
            .field("fhss_change", &self.fhss_change())
            .field("cad_detected", &self.cad_detected())
            .finish()
    }
}

impl IrqFlags {
    /// Returns `true` if the `RxTimeout` interrupt is active.
    pub fn rx_timeout(self) -> bool {
        (self.inner & IrqMaskBit::RxTimeout as u8) > 0
    }

    /// Returns `true` if the `RxDone` interrupt is active.
    pub fn rx_done(self) -> bool {
        (self.inner & IrqMaskBit::RxDone as u8) > 0
    }

    /// Returns `true` if the `CrcError` interrupt is active.
    pub fn crc_error(self) -> bool {
        (self.inner & IrqMaskBit::CrcError as u8) > 0
    }

    /// Returns `true` if the `ValidHeader` interrupt is active.
    pub fn valid_header(self) -> bool {
        (self.inner & IrqMaskBit::ValidHeader as u8) > 0
    }

    /// Returns `true` if the `TxDone` interrupt is active.
    pub fn tx_done(self) -> bool {
        (self.inner & IrqMaskBit::TxDone as u8) > 0
    }

    /// Returns `true` if the `CadDone` interrupt is active.
    pub fn cad_done(self) -> bool {
        (self.inner & IrqMaskBit::CadDone as u8) > 0
    }

    /// Returns `true` if the `FhssChange` interrupt is active.
    pub fn fhss_change(self) -> bool {
        (self.inner & IrqMaskBit::FhssChange as u8) > 0
    }

    /// Returns `true` if the `CadDetected` interrupt is active.
    pub fn cad_detected(self) -> bool {
        (self.inner & IrqMaskBit::CadDetected as u8) > 0
    }
}
