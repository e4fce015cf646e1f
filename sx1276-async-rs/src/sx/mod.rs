//! The core implementation of the SX1276 driver.

pub mod err;

use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::Operation;
use embedded_hal_async::spi::SpiDevice;

use crate::conf::Config;
use crate::op::*;
use crate::reg::*;

pub use self::err::{PinError, SpiError, SxError};

/// Write access flag, OR-ed into the register address byte.
const WNR_WRITE: u8 = 0x80;

/// `InvertIq` register value for the standard (uplink) polarity.
const INVERT_IQ_OFF: u8 = 0x27;

/// `InvertIq` register value for inverted (downlink) polarity.
const INVERT_IQ_ON: u8 = 0x66;

/// Default `PaDac` value (+20 dBm boost disabled).
const PA_DAC_DEFAULT: u8 = 0x84;

/// RX symbol timeout LSB programmed at init.
const SYMB_TIMEOUT_LSB: u8 = 0x08;

/// FIFO base addresses: the whole 256-byte FIFO is usable by whichever
/// direction is active, so both halves start at the same split the
/// reference gateways use.
const FIFO_TX_BASE: u8 = 0x80;
const FIFO_RX_BASE: u8 = 0x00;

/// Calculates the 24-bit `Frf` register value for a carrier frequency in
/// Hz, against the 32 MHz crystal: `Frf = freq * 2^19 / 32e6`.
pub fn calc_frf(freq_hz: u32) -> u32 {
    (((freq_hz as u64) << 19) / 32_000_000) as u32
}

/// Decodes a 24-bit `Frf` register value back into a frequency in Hz.
pub fn frf_to_hz(frf: u32) -> u32 {
    (((frf as u64) * 32_000_000) >> 19) as u32
}

/// A wrapper around a Semtech SX1276/RFM95 LoRa modem.
///
/// The driver owns the SPI device and the reset pin. Every register access
/// is a single [`SpiDevice`] transaction: the bus is exclusively held and
/// chip-select is asserted for the duration, and released on every exit
/// path including errors.
pub struct SX1276<TSPI, TNRST> {
    spi: TSPI,
    nrst_pin: TNRST,
}

impl<TSPI, TNRST, TSPIERR, TPINERR> SX1276<TSPI, TNRST>
where
    TPINERR: core::fmt::Debug,
    TSPI: SpiDevice<Error = TSPIERR>,
    TNRST: OutputPin<Error = TPINERR>,
{
    /// Creates a new `SX1276` driver instance.
    ///
    /// # Arguments
    ///
    /// * `spi` - An asynchronous SPI peripheral with chip-select handling.
    /// * `nrst_pin` - The active-low reset output pin.
    pub fn new(spi: TSPI, nrst_pin: TNRST) -> Self {
        Self { spi, nrst_pin }
    }

    /// Resets the chip by pulling the NRESET pin low.
    pub async fn reset(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.nrst_pin.set_low().map_err(PinError::Output)?;
        // The pin must be held low for at least 100 µs, and the chip needs
        // 5 ms afterwards before it accepts bus traffic.
        self.spi
            .transaction(&mut [Operation::DelayNs(200_000)])
            .await
            .map_err(SpiError::Write)?;
        self.nrst_pin.set_high().map_err(PinError::Output)?;
        self.spi
            .transaction(&mut [Operation::DelayNs(5_000_000)])
            .await
            .map_err(SpiError::Write)
            .map_err(Into::into)
    }

    /// Reads a single register.
    pub async fn read_register(
        &mut self,
        register: Register,
    ) -> Result<u8, SxError<TSPIERR, TPINERR>> {
        let addr = [register.addr() & !WNR_WRITE];
        let mut value = [0u8];
        let mut ops = [Operation::Write(&addr), Operation::Read(&mut value)];
        self.spi
            .transaction(&mut ops)
            .await
            .map_err(SpiError::Transfer)?;
        log::trace!("sx1276::read_register {register:?} -> {:#04x}", value[0]);
        Ok(value[0])
    }

    /// Writes a single register.
    pub async fn write_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        log::trace!("sx1276::write_register {register:?} <- {value:#04x}");
        self.spi
            .write(&[register.addr() | WNR_WRITE, value])
            .await
            .map_err(SpiError::Write)
            .map_err(Into::into)
    }

    /// Burst-reads the FIFO into `buffer`.
    ///
    /// The FIFO pointer must have been positioned with
    /// [`set_fifo_addr_ptr`](Self::set_fifo_addr_ptr) first.
    pub async fn read_fifo(
        &mut self,
        buffer: &mut [u8],
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let addr = [Register::Fifo.addr() & !WNR_WRITE];
        let mut ops = [Operation::Write(&addr), Operation::Read(buffer)];
        self.spi
            .transaction(&mut ops)
            .await
            .map_err(SpiError::Transfer)
            .map_err(Into::into)
    }

    /// Burst-writes `data` into the FIFO at the current pointer.
    pub async fn write_fifo(&mut self, data: &[u8]) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let addr = [Register::Fifo.addr() | WNR_WRITE];
        let mut ops = [Operation::Write(&addr), Operation::Write(data)];
        self.spi
            .transaction(&mut ops)
            .await
            .map_err(SpiError::Write)
            .map_err(Into::into)
    }

    /// Waits in-transaction for the given number of microseconds.
    ///
    /// Used after frequency or mode writes: RSSI and CAD readings taken
    /// before the synthesizer has settled report noise as activity.
    pub async fn settle(&mut self, micros: u32) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.spi
            .transaction(&mut [Operation::DelayNs(micros.saturating_mul(1000))])
            .await
            .map_err(SpiError::Write)
            .map_err(Into::into)
    }

    /// Reads the chip version register.
    pub async fn version(&mut self) -> Result<u8, SxError<TSPIERR, TPINERR>> {
        self.read_register(Register::Version).await
    }

    /// Initializes and configures the SX1276 modem.
    ///
    /// Probes the version register first and refuses to continue on a
    /// mismatch; the caller decides whether to retry. Leaves the chip in
    /// standby.
    pub async fn init(&mut self, conf: &Config) -> Result<(), SxError<TSPIERR, TPINERR>> {
        log::trace!("sx1276::init start");

        let version = self.version().await?;
        if version != VERSION_SX1276 {
            return Err(SxError::Version { read: version });
        }
        log::trace!("sx1276::init version {version:#04x}");

        // The LoRa flag is only writable from sleep.
        self.set_mode(Mode::Sleep).await?;
        self.settle(100).await?;
        log::trace!("sx1276::init sleep + lora mode set");

        self.set_frequency(conf.freq_hz).await?;
        log::trace!("sx1276::init frequency set to {} Hz", conf.freq_hz);

        self.set_modem_config(
            conf.spread_factor,
            conf.bandwidth,
            conf.coding_rate,
            conf.crc_on,
        )
        .await?;
        self.write_register(Register::SymbTimeoutLsb, SYMB_TIMEOUT_LSB)
            .await?;
        log::trace!("sx1276::init modem config set");

        self.write_register(Register::SyncWord, conf.sync_word).await?;
        self.write_register(Register::MaxPayloadLength, conf.max_payload_len)
            .await?;
        self.write_register(Register::PayloadLength, conf.payload_len)
            .await?;
        self.write_register(Register::Lna, LNA_MAX_GAIN).await?;
        log::trace!("sx1276::init sync word and payload limits set");

        self.write_register(Register::FifoTxBaseAddr, FIFO_TX_BASE)
            .await?;
        self.write_register(Register::FifoRxBaseAddr, FIFO_RX_BASE)
            .await?;
        self.set_fifo_addr_ptr(FIFO_RX_BASE).await?;
        log::trace!("sx1276::init fifo base addresses set");

        self.write_register(Register::PaConfig, conf.pa_config.into())
            .await?;
        self.write_register(Register::PaDac, PA_DAC_DEFAULT).await?;
        log::trace!("sx1276::init pa config set");

        self.set_irq_mask(conf.irq_mask).await?;
        self.clear_irq_flags(IrqMask::all()).await?;
        self.set_dio_mapping(conf.dio_mapping).await?;
        log::trace!("sx1276::init irq and dio mapping set");

        self.set_mode(Mode::Standby).await?;
        log::trace!("sx1276::init done");
        Ok(())
    }

    /// Puts the modem in the given operating mode (LoRa flag kept set).
    pub async fn set_mode(&mut self, mode: Mode) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::OpMode, mode.opmode()).await
    }

    /// Reads the current operating mode.
    pub async fn mode(&mut self) -> Result<Mode, SxError<TSPIERR, TPINERR>> {
        Ok(self.read_register(Register::OpMode).await?.into())
    }

    /// Programs the three carrier frequency registers.
    pub async fn set_frequency(&mut self, freq_hz: u32) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let frf = calc_frf(freq_hz);
        self.write_register(Register::FrfMsb, (frf >> 16) as u8).await?;
        self.write_register(Register::FrfMid, (frf >> 8) as u8).await?;
        self.write_register(Register::FrfLsb, frf as u8).await
    }

    /// Reads the programmed carrier frequency back, in Hz.
    pub async fn frequency(&mut self) -> Result<u32, SxError<TSPIERR, TPINERR>> {
        let msb = self.read_register(Register::FrfMsb).await? as u32;
        let mid = self.read_register(Register::FrfMid).await? as u32;
        let lsb = self.read_register(Register::FrfLsb).await? as u32;
        Ok(frf_to_hz((msb << 16) | (mid << 8) | lsb))
    }

    /// Programs modem config registers 1..3 in one go.
    pub async fn set_modem_config(
        &mut self,
        spread_factor: SpreadFactor,
        bandwidth: Bandwidth,
        coding_rate: CodingRate,
        crc_on: bool,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let mc1 = ModemConfig1::default()
            .set_bandwidth(bandwidth)
            .set_coding_rate(coding_rate);
        let mc2 = ModemConfig2::default()
            .set_spread_factor(spread_factor)
            .set_crc_on(crc_on);
        let mc3 = ModemConfig3::default()
            .set_agc_auto(true)
            .set_low_data_rate_optimize(spread_factor.needs_low_data_rate_optimize());
        self.write_register(Register::ModemConfig1, mc1.into()).await?;
        self.write_register(Register::ModemConfig2, mc2.into()).await?;
        self.write_register(Register::ModemConfig3, mc3.into()).await
    }

    /// Changes the spreading factor, preserving the other `ModemConfig2`
    /// bits and keeping the low data rate optimization consistent.
    pub async fn set_spread_factor(
        &mut self,
        spread_factor: SpreadFactor,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let mc2 = self.read_register(Register::ModemConfig2).await?;
        let mc2 = (mc2 & 0x0F) | ((spread_factor as u8) << 4);
        self.write_register(Register::ModemConfig2, mc2).await?;
        let mc3 = ModemConfig3::default()
            .set_agc_auto(true)
            .set_low_data_rate_optimize(spread_factor.needs_low_data_rate_optimize());
        self.write_register(Register::ModemConfig3, mc3.into()).await
    }

    /// Sets the IQ polarity. Downlinks are sent inverted so that nodes do
    /// not receive each other.
    pub async fn set_invert_iq(&mut self, invert: bool) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let value = if invert { INVERT_IQ_ON } else { INVERT_IQ_OFF };
        self.write_register(Register::InvertIq, value).await
    }

    /// Programs the power amplifier for transmission.
    pub async fn set_pa_config(
        &mut self,
        pa_config: PaConfig,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::PaConfig, pa_config.into()).await
    }

    /// Programs the TX payload length register.
    pub async fn set_payload_length(&mut self, len: u8) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::PayloadLength, len).await
    }

    /// Positions the FIFO pointer.
    pub async fn set_fifo_addr_ptr(&mut self, addr: u8) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::FifoAddrPtr, addr).await
    }

    /// Reads the start address of the last received packet.
    pub async fn fifo_rx_current_addr(&mut self) -> Result<u8, SxError<TSPIERR, TPINERR>> {
        self.read_register(Register::FifoRxCurrentAddr).await
    }

    /// Reads the payload length of the last received packet.
    pub async fn rx_nb_bytes(&mut self) -> Result<u8, SxError<TSPIERR, TPINERR>> {
        self.read_register(Register::RxNbBytes).await
    }

    /// Returns the base address the TX half of the FIFO was programmed to.
    pub fn fifo_tx_base(&self) -> u8 {
        FIFO_TX_BASE
    }

    /// Reads the interrupt flags register.
    pub async fn irq_flags(&mut self) -> Result<IrqFlags, SxError<TSPIERR, TPINERR>> {
        Ok(self.read_register(Register::IrqFlags).await?.into())
    }

    /// Clears the selected interrupt flags (write-1-to-clear).
    pub async fn clear_irq_flags(
        &mut self,
        mask: IrqMask,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::IrqFlags, mask.into()).await
    }

    /// Unmasks the selected interrupts. The register semantics are
    /// inverted (a set bit disables), so the complement is written.
    pub async fn set_irq_mask(&mut self, enabled: IrqMask) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::IrqFlagsMask, !u8::from(enabled))
            .await
    }

    /// Programs the DIO pin function mapping.
    pub async fn set_dio_mapping(
        &mut self,
        mapping: DioMapping,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::DioMapping1, mapping.into()).await
    }

    /// Reads the RSSI of the last received packet, corrected for the HF
    /// front end.
    pub async fn packet_rssi(&mut self) -> Result<i16, SxError<TSPIERR, TPINERR>> {
        let raw = self.read_register(Register::PktRssiValue).await?;
        Ok(raw as i16 - RSSI_OFFSET_HF)
    }

    /// Reads the SNR of the last received packet, in dB.
    pub async fn packet_snr(&mut self) -> Result<i8, SxError<TSPIERR, TPINERR>> {
        let raw = self.read_register(Register::PktSnrValue).await?;
        Ok((raw as i8) / 4)
    }

    /// Reads the current RSSI, corrected for the HF front end.
    pub async fn current_rssi(&mut self) -> Result<i16, SxError<TSPIERR, TPINERR>> {
        let raw = self.read_register(Register::RssiValue).await?;
        Ok(raw as i16 - RSSI_OFFSET_HF)
    }

    /// Programs the number of symbol periods between frequency hops.
    /// Zero disables hardware hopping.
    pub async fn set_hop_period(&mut self, period: u8) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.write_register(Register::HopPeriod, period).await
    }

    /// Reads the FHSS hop channel register.
    pub async fn hop_channel(&mut self) -> Result<u8, SxError<TSPIERR, TPINERR>> {
        self.read_register(Register::HopChannel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frf_encodes_the_classic_868_1_value() {
        // 868.1 MHz encodes to 0xD90666 on a 32 MHz crystal.
        assert_eq!(calc_frf(868_100_000), 0x00D9_0666);
    }

    #[test]
    fn frf_round_trips_within_one_step() {
        // One Frf step is 32e6 / 2^19 ≈ 61 Hz.
        for freq in [868_100_000u32, 867_500_000, 869_525_000] {
            let decoded = frf_to_hz(calc_frf(freq));
            assert!(freq.abs_diff(decoded) <= 61, "{freq} -> {decoded}");
        }
    }
}
