//! Uplink and downlink frame buffers.
//!
//! Exactly one frame exists in each direction at a time. The uplink buffer
//! is filled when a receive-done event is drained and handed to the
//! protocol codec; the downlink buffer is filled by the codec and owned by
//! the modem until the transmission completes. There is no queue in either
//! direction.

use heapless::Vec;
use sx1276_async::op::SpreadFactor;

/// The largest payload the gateway accepts or transmits, in bytes.
pub const MAX_PAYLOAD: usize = 128;

/// A received radio frame on its way to the network server.
#[derive(Clone, Debug)]
pub struct UplinkFrame {
    /// The raw payload bytes.
    pub payload: Vec<u8, MAX_PAYLOAD>,
    /// Corrected received signal strength in dBm.
    pub rssi: i16,
    /// Signal-to-noise ratio in dB.
    pub snr: i8,
    /// The spreading factor the frame was received on.
    pub spread_factor: SpreadFactor,
    /// Whether the payload CRC checked out.
    pub crc_ok: bool,
    /// The channel table index the frame was received on.
    pub channel: u8,
    /// The carrier frequency in Hz.
    pub freq_hz: u32,
    /// Microsecond reception timestamp (wrapping 32-bit counter).
    pub tmst_us: u32,
}

impl UplinkFrame {
    /// Extracts the LoRaWAN device address, if the payload is long enough
    /// to carry one (MHDR followed by a little-endian DevAddr).
    pub fn device_addr(&self) -> Option<u32> {
        let bytes = self.payload.get(1..5)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

/// A downlink frame parsed from the network server, waiting to be
/// transmitted.
#[derive(Clone, Debug)]
pub struct DownlinkFrame {
    /// The raw payload bytes.
    pub payload: Vec<u8, MAX_PAYLOAD>,
    /// Target transmit timestamp on the wrapping microsecond counter, or
    /// `None` to transmit immediately.
    pub tmst_us: Option<u32>,
    /// The spreading factor to transmit with.
    pub spread_factor: SpreadFactor,
    /// Transmit power in dBm.
    pub power_dbm: i8,
    /// The carrier frequency in Hz.
    pub freq_hz: u32,
    /// Whether to append a payload CRC.
    pub crc_on: bool,
    /// Whether to transmit with inverted IQ polarity.
    pub invert_iq: bool,
}

impl DownlinkFrame {
    /// Returns `true` once the target timestamp has been reached.
    ///
    /// The comparison wraps, matching the 32-bit microsecond counter the
    /// network protocol carries timestamps on.
    pub fn due(&self, now_us: u32) -> bool {
        match self.tmst_us {
            None => true,
            Some(tmst) => (now_us.wrapping_sub(tmst) as i32) >= 0,
        }
    }
}

/// The single uplink buffer slot.
///
/// A reception arriving while the previous frame is still undrained is
/// rejected, never overwritten mid-use.
#[derive(Default)]
pub struct UplinkSlot {
    inner: Option<UplinkFrame>,
}

impl UplinkSlot {
    /// Creates an empty slot.
    pub const fn new() -> Self {
        Self { inner: None }
    }

    /// Publishes a frame into the slot. If the slot is occupied the new
    /// frame is handed back for the caller to drop and count.
    pub fn publish(&mut self, frame: UplinkFrame) -> Result<(), UplinkFrame> {
        if self.inner.is_some() {
            return Err(frame);
        }
        self.inner = Some(frame);
        Ok(())
    }

    /// Takes the pending frame out of the slot, freeing it.
    pub fn take(&mut self) -> Option<UplinkFrame> {
        self.inner.take()
    }

    /// Returns `true` while a frame is waiting to be drained.
    pub fn is_occupied(&self) -> bool {
        self.inner.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize) -> UplinkFrame {
        let mut payload = Vec::new();
        payload.resize(len, 0xA5).unwrap();
        UplinkFrame {
            payload,
            rssi: -90,
            snr: 7,
            spread_factor: SpreadFactor::SF7,
            crc_ok: true,
            channel: 0,
            freq_hz: 868_100_000,
            tmst_us: 0,
        }
    }

    #[test]
    fn slot_rejects_a_second_frame_until_drained() {
        let mut slot = UplinkSlot::new();
        assert!(slot.publish(frame(10)).is_ok());
        let rejected = slot.publish(frame(20)).unwrap_err();
        assert_eq!(rejected.payload.len(), 20);
        // The first frame survives untouched.
        assert_eq!(slot.take().unwrap().payload.len(), 10);
        assert!(slot.publish(frame(20)).is_ok());
    }

    #[test]
    fn device_addr_reads_little_endian_after_mhdr() {
        let mut up = frame(0);
        up.payload
            .extend_from_slice(&[0x40, 0x11, 0x22, 0x33, 0x44, 0x00])
            .unwrap();
        assert_eq!(up.device_addr(), Some(0x4433_2211));
        up.payload.truncate(4);
        assert_eq!(up.device_addr(), None);
    }

    #[test]
    fn downlink_due_wraps_around_the_counter() {
        let mut down = DownlinkFrame {
            payload: Vec::new(),
            tmst_us: Some(100),
            spread_factor: SpreadFactor::SF9,
            power_dbm: 14,
            freq_hz: 869_525_000,
            crc_on: false,
            invert_iq: true,
        };
        assert!(!down.due(50));
        assert!(down.due(100));
        assert!(down.due(150));
        // Close to the wrap point the future is still the future.
        down.tmst_us = Some(u32::MAX - 10);
        assert!(!down.due(u32::MAX - 20));
        assert!(down.due(5));

        down.tmst_us = None;
        assert!(down.due(0));
    }
}
