//! DIO pin function mappings.
//!
//! The meaning of the DIO lines depends on the current operating mode; the
//! mapping must be reprogrammed when switching between receive, transmit
//! and CAD.

/// DIO0 function selection (bits 7..6 of `DioMapping1`).
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum Dio0 {
    /// Rises on receive done.
    RxDone = 0x00,
    /// Rises on transmit done.
    TxDone = 0x40,
    /// Rises on CAD done.
    CadDone = 0x80,
    /// Not connected.
    None = 0xC0,
}

/// DIO1 function selection (bits 5..4 of `DioMapping1`).
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum Dio1 {
    /// Rises on receive timeout.
    RxTimeout = 0x00,
    /// Rises on frequency hop channel change.
    FhssChange = 0x10,
    /// Rises on channel activity detected.
    CadDetected = 0x20,
    /// Not connected.
    None = 0x30,
}

/// DIO2 function selection (bits 3..2 of `DioMapping1`).
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum Dio2 {
    /// Rises on frequency hop channel change.
    FhssChange = 0x00,
    /// Not connected.
    None = 0x0C,
}

/// DIO3 function selection (bits 1..0 of `DioMapping1`).
#[repr(u8)]
#[derive(Copy, Clone, Debug)]
pub enum Dio3 {
    /// Rises on CAD done.
    CadDone = 0x00,
    /// Not connected.
    None = 0x03,
}

/// A builder for the `DioMapping1` register value.
#[derive(Copy, Clone, Debug)]
pub struct DioMapping {
    dio0: Dio0,
    dio1: Dio1,
    dio2: Dio2,
    dio3: Dio3,
}

impl DioMapping {
    /// The mapping used while listening: DIO0 receive done, DIO1 receive
    /// timeout.
    pub const fn rx() -> Self {
        Self {
            dio0: Dio0::RxDone,
            dio1: Dio1::RxTimeout,
            dio2: Dio2::FhssChange,
            dio3: Dio3::None,
        }
    }

    /// The mapping used while transmitting: DIO0 transmit done.
    pub const fn tx() -> Self {
        Self {
            dio0: Dio0::TxDone,
            dio1: Dio1::None,
            dio2: Dio2::None,
            dio3: Dio3::None,
        }
    }

    /// The mapping used during channel activity detection: DIO0 CAD done,
    /// DIO1 CAD detected.
    pub const fn cad() -> Self {
        Self {
            dio0: Dio0::CadDone,
            dio1: Dio1::CadDetected,
            dio2: Dio2::None,
            dio3: Dio3::None,
        }
    }

    /// Replaces the DIO0 function.
    pub const fn set_dio0(mut self, dio0: Dio0) -> Self {
        self.dio0 = dio0;
        self
    }

    /// Replaces the DIO1 function.
    pub const fn set_dio1(mut self, dio1: Dio1) -> Self {
        self.dio1 = dio1;
        self
    }

    /// Replaces the DIO2 function.
    pub const fn set_dio2(mut self, dio2: Dio2) -> Self {
        self.dio2 = dio2;
        self
    }
}

impl From<DioMapping> for u8 {
    fn from(val: DioMapping) -> Self {
        val.dio0 as u8 | val.dio1 as u8 | val.dio2 as u8 | val.dio3 as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_mappings_compose_expected_register_values() {
        assert_eq!(u8::from(DioMapping::rx()), 0x03);
        assert_eq!(u8::from(DioMapping::tx()), 0x7F);
        assert_eq!(u8::from(DioMapping::cad()), 0xAF);
    }
}
