//! The modem state machine.
//!
//! Drives the SX1276 through its receive / channel-activity-detection /
//! transmit cycle from a single-threaded cooperative main loop. Hardware
//! events reach the machine only through the [`EventLatch`]; every SPI
//! transaction happens inside [`Modem::service`], never in interrupt
//! context.
//!
//! Every wait state carries a deadline measured from entry. A state that
//! outlives its deadline is forced back to scanning (or, for a stuck
//! transmitter, all the way through re-initialization) so the radio can
//! never hang the main loop.

use core::fmt::{self, Debug};

use embassy_time::Instant;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::SpiDevice;
use sx1276_async::conf::Config as RadioConfig;
use sx1276_async::op::{DioMapping, IrqMask, Mode, PaConfig, SpreadFactor};
use sx1276_async::{SxError, SX1276};

use crate::channel::{ChannelTable, HopSchedule, InvalidChannel};
use crate::config::ModemConfig;
use crate::event::{EventLatch, RadioEvent};
use crate::frame::{DownlinkFrame, UplinkFrame, UplinkSlot, MAX_PAYLOAD};
use crate::stats::Stats;

/// The operating states of the modem.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModemState {
    /// Probing and programming the radio.
    Init,
    /// Between activities; the next `service` pass arms CAD or receive.
    Scan,
    /// Channel activity detection in progress.
    Cad,
    /// Listening for (or in the middle of) a reception.
    Receiving,
    /// Programming and triggering a transmission.
    Transmitting,
    /// Waiting for the transmit-done signal.
    TxDone,
}

/// The radio could not be brought up within the configured retry budget.
///
/// This is the only fault the modem surfaces; everything else recovers
/// locally. The gateway cannot proceed without a working radio.
pub struct HardwareFault<TSPIERR, TPINERR> {
    /// How many init attempts were made.
    pub attempts: u8,
    /// The error the final attempt failed with.
    pub last_error: SxError<TSPIERR, TPINERR>,
}

impl<TSPIERR: Debug, TPINERR: Debug> Debug for HardwareFault<TSPIERR, TPINERR> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HardwareFault {{ attempts: {}, last_error: {:?} }}",
            self.attempts, self.last_error
        )
    }
}

/// The modem: the radio driver plus all gateway-side state.
///
/// Owned by the main loop. The only data shared with interrupt context is
/// the event latch.
pub struct Modem<TSPI, TNRST> {
    radio: SX1276<TSPI, TNRST>,
    config: ModemConfig,
    channels: ChannelTable,
    hop: HopSchedule,
    latch: &'static EventLatch,
    state: ModemState,
    entered_at: Instant,
    uplink: UplinkSlot,
    downlink: Option<DownlinkFrame>,
    stats: Stats,
    init_attempts: u8,
    post_tx: bool,
}

impl<TSPI, TNRST, TSPIERR, TPINERR> Modem<TSPI, TNRST>
where
    TSPIERR: Debug,
    TPINERR: Debug,
    TSPI: SpiDevice<Error = TSPIERR>,
    TNRST: OutputPin<Error = TPINERR>,
{
    /// Creates a modem over the given radio, starting in `Init`.
    ///
    /// `latch` is the slot the board's DIO interrupt handlers post into.
    pub fn new(
        radio: SX1276<TSPI, TNRST>,
        config: ModemConfig,
        channels: ChannelTable,
        latch: &'static EventLatch,
        now: Instant,
    ) -> Self {
        let hop = HopSchedule::new(config.hop_period, now);
        Self {
            radio,
            config,
            channels,
            hop,
            latch,
            state: ModemState::Init,
            entered_at: now,
            uplink: UplinkSlot::new(),
            downlink: None,
            stats: Stats::new(),
            init_attempts: 0,
            post_tx: false,
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> ModemState {
        self.state
    }

    /// Returns the statistics collector.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Returns the statistics collector for main-context mutation (e.g.
    /// counting server acknowledgements).
    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// Returns the channel table.
    pub fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Returns `true` while a downlink is queued or in flight.
    pub fn downlink_pending(&self) -> bool {
        self.downlink.is_some()
    }

    /// One pass of the main processing cycle.
    ///
    /// Drains the pending event, enforces state deadlines, starts a due
    /// transmission, hops the channel on schedule and re-arms scanning.
    /// A completed reception lands in the uplink slot; the network side
    /// collects it with [`take_uplink`](Self::take_uplink).
    ///
    /// Transient bus errors are logged and swallowed; the triggering read
    /// is simply redone on a later cycle. Only an exhausted init retry
    /// budget is surfaced.
    pub async fn service(
        &mut self,
        now: Instant,
    ) -> Result<(), HardwareFault<TSPIERR, TPINERR>> {
        if matches!(self.state, ModemState::Init) {
            self.run_init(now).await?;
        } else if let Err(err) = self.run_cycle(now).await {
            log::warn!("modem: bus error, retrying next cycle: {err:?}");
        }
        Ok(())
    }

    /// Drains the uplink slot, freeing it for the next reception.
    ///
    /// A reception completing while the slot is still occupied is dropped
    /// and counted, never overwritten mid-use.
    pub fn take_uplink(&mut self) -> Option<UplinkFrame> {
        self.uplink.take()
    }

    /// Returns `true` while a received frame is waiting to be drained.
    pub fn uplink_pending(&self) -> bool {
        self.uplink.is_occupied()
    }

    /// Accepts a downlink frame for transmission.
    ///
    /// At most one downlink exists at a time; a second frame queued before
    /// the first is released is handed back. Transmission starts on a
    /// `service` pass once the target timestamp is due, and only preempts
    /// passive scanning, never an in-progress reception.
    pub fn queue_downlink(&mut self, frame: DownlinkFrame) -> Result<(), DownlinkFrame> {
        if self.downlink.is_some() {
            return Err(frame);
        }
        log::debug!(
            "modem: downlink queued, {} bytes at {:?}",
            frame.payload.len(),
            frame.tmst_us
        );
        self.stats.counters.tx_queued += 1;
        self.downlink = Some(frame);
        Ok(())
    }

    /// Changes the listening spreading factor without a radio reset.
    ///
    /// Falls back to full re-initialization if the live reprogram fails.
    pub async fn apply_spread_factor(&mut self, sf: SpreadFactor, now: Instant) {
        log::info!("modem: spreading factor change to {sf:?}");
        self.config.spread_factor = sf;
        if matches!(self.state, ModemState::Init) {
            return;
        }
        let result = self.reprogram_sf().await;
        self.resume_or_reinit(result, now);
    }

    /// Changes the active channel without a radio reset.
    ///
    /// Falls back to full re-initialization if the live reprogram fails.
    pub async fn apply_channel(
        &mut self,
        index: u8,
        now: Instant,
    ) -> Result<(), InvalidChannel> {
        self.channels.set_active(index)?;
        log::info!(
            "modem: channel change to {} ({} Hz)",
            index,
            self.channels.active_hz()
        );
        if matches!(self.state, ModemState::Init) {
            return Ok(());
        }
        let result = self.reprogram_frequency().await;
        self.resume_or_reinit(result, now);
        Ok(())
    }

    /// Forces a full reset through `Init` (remote management reset).
    pub fn force_reinit(&mut self, now: Instant) {
        log::info!("modem: reset requested");
        self.stats.counters.resets += 1;
        self.init_attempts = 0;
        self.state = ModemState::Init;
        self.entered_at = now;
    }

    async fn run_init(
        &mut self,
        now: Instant,
    ) -> Result<(), HardwareFault<TSPIERR, TPINERR>> {
        let conf = self.radio_config();
        let result = match self.radio.reset().await {
            Ok(()) => self.radio.init(&conf).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                self.init_attempts = 0;
                self.stats.counters.boots += 1;
                self.state = ModemState::Scan;
                self.entered_at = now;
                log::info!(
                    "modem: radio up on {} Hz, {:?}",
                    self.channels.active_hz(),
                    self.config.spread_factor
                );
                Ok(())
            }
            Err(err) => {
                self.init_attempts += 1;
                if self.init_attempts >= self.config.init_retries {
                    log::error!(
                        "modem: radio init failed after {} attempts: {err:?}",
                        self.init_attempts
                    );
                    Err(HardwareFault {
                        attempts: self.init_attempts,
                        last_error: err,
                    })
                } else {
                    log::warn!(
                        "modem: init attempt {}/{} failed: {err:?}",
                        self.init_attempts,
                        self.config.init_retries
                    );
                    Ok(())
                }
            }
        }
    }

    async fn run_cycle(&mut self, now: Instant) -> Result<(), SxError<TSPIERR, TPINERR>> {
        if let Some(event) = self.latch.take() {
            self.handle_event(event, now).await?;
        }
        self.check_deadlines(now).await?;
        self.maybe_transmit(now).await?;
        self.maybe_hop(now).await?;
        if matches!(self.state, ModemState::Scan) {
            self.start_scan(now).await?;
        }
        Ok(())
    }

    /// Classifies and processes a drained event.
    ///
    /// The latch value says which DIO line fired; the flags register is
    /// authoritative for what actually happened, so it is read first and
    /// the event is dispatched on flags plus current state.
    async fn handle_event(
        &mut self,
        event: RadioEvent,
        now: Instant,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let flags = self.radio.irq_flags().await?;
        log::trace!("modem: event {event:?} flags {flags:?} in {:?}", self.state);
        match self.state {
            ModemState::Cad => {
                if flags.cad_detected() {
                    log::debug!("modem: channel activity on {}", self.channels.active_index());
                    self.radio.clear_irq_flags(IrqMask::all()).await?;
                    self.enter_receiving(now).await?;
                    return Ok(());
                }
                if flags.cad_done() {
                    // Nothing on air; re-arm on the same channel until the
                    // CAD deadline cycles it.
                    self.radio.clear_irq_flags(IrqMask::all()).await?;
                    self.radio.set_mode(Mode::Cad).await?;
                    return Ok(());
                }
            }
            ModemState::Receiving => {
                if flags.rx_done() {
                    self.finish_reception(flags.crc_error(), now).await?;
                    return Ok(());
                }
                if flags.rx_timeout() {
                    self.stats.counters.rx_timeouts += 1;
                    self.radio.clear_irq_flags(IrqMask::all()).await?;
                    self.to_scan(now);
                    return Ok(());
                }
            }
            ModemState::TxDone => {
                if flags.tx_done() {
                    self.finish_transmission(now).await?;
                    return Ok(());
                }
            }
            _ => {}
        }
        log::debug!("modem: stray event {event:?} in {:?}", self.state);
        self.radio.clear_irq_flags(IrqMask::all()).await
    }

    async fn finish_reception(
        &mut self,
        crc_error: bool,
        now: Instant,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.stats.counters.rx_received += 1;
        if crc_error {
            // Discarded before it ever reaches the codec.
            self.stats.counters.rx_crc_errors += 1;
            log::warn!("modem: payload crc error, frame discarded");
            self.radio.clear_irq_flags(IrqMask::all()).await?;
            self.to_scan(now);
            return Ok(());
        }

        let len = (self.radio.rx_nb_bytes().await? as usize).min(MAX_PAYLOAD);
        let current = self.radio.fifo_rx_current_addr().await?;
        self.radio.set_fifo_addr_ptr(current).await?;
        let mut buf = [0u8; MAX_PAYLOAD];
        self.radio.read_fifo(&mut buf[..len]).await?;
        let rssi = self.radio.packet_rssi().await?;
        let snr = self.radio.packet_snr().await?;
        self.radio.clear_irq_flags(IrqMask::all()).await?;

        let frame = UplinkFrame {
            payload: heapless::Vec::from_slice(&buf[..len]).unwrap_or_default(),
            rssi,
            snr,
            spread_factor: self.config.spread_factor,
            crc_ok: true,
            channel: self.channels.active_index(),
            freq_hz: self.channels.active_hz(),
            tmst_us: wall_us(now),
        };
        self.stats.counters.rx_ok += 1;
        self.stats.record(&frame, now.as_millis());
        log::debug!(
            "modem: received {} bytes, rssi {} dBm, snr {} dB",
            len,
            rssi,
            snr
        );

        match self.uplink.publish(frame) {
            Ok(()) => self.stats.counters.rx_forwarded += 1,
            Err(dropped) => {
                self.stats.counters.rx_dropped += 1;
                log::warn!(
                    "modem: uplink slot occupied, dropping {} byte frame",
                    dropped.payload.len()
                );
            }
        }
        self.to_scan(now);
        Ok(())
    }

    async fn finish_transmission(
        &mut self,
        now: Instant,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.radio.clear_irq_flags(IrqMask::all()).await?;
        self.downlink = None;
        self.stats.counters.tx_done += 1;
        log::debug!("modem: transmission complete");
        self.restore_rx_config().await?;
        self.to_scan(now);
        Ok(())
    }

    async fn check_deadlines(
        &mut self,
        now: Instant,
    ) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let elapsed = now - self.entered_at;
        match self.state {
            ModemState::Cad if elapsed >= self.config.cad_deadline => {
                if self.config.hop {
                    self.hop_now(now).await?;
                }
                self.to_scan(now);
            }
            ModemState::Receiving if elapsed >= self.config.rx_deadline => {
                self.stats.counters.rx_timeouts += 1;
                self.radio.set_mode(Mode::Standby).await?;
                self.to_scan(now);
            }
            ModemState::TxDone if elapsed >= self.config.tx_deadline => {
                log::warn!("modem: transmit-done wait exceeded, resetting radio");
                self.downlink = None;
                self.force_reinit(now);
            }
            _ => {}
        }
        Ok(())
    }

    async fn maybe_transmit(&mut self, now: Instant) -> Result<(), SxError<TSPIERR, TPINERR>> {
        if !matches!(self.state, ModemState::Scan | ModemState::Cad) {
            return Ok(());
        }
        let due = self
            .downlink
            .as_ref()
            .is_some_and(|frame| frame.due(wall_us(now)));
        if due {
            self.start_tx(now).await?;
        }
        Ok(())
    }

    async fn maybe_hop(&mut self, now: Instant) -> Result<(), SxError<TSPIERR, TPINERR>> {
        if !self.config.hop || !self.hop.due(now) {
            return Ok(());
        }
        match self.state {
            ModemState::Scan | ModemState::Cad => {
                self.hop_now(now).await?;
                self.to_scan(now);
            }
            ModemState::Receiving => {
                // Deferred while a frame is actually in flight; the hop
                // stays due and happens right after the reception ends.
                let flags = self.radio.irq_flags().await?;
                if !flags.valid_header() {
                    self.hop_now(now).await?;
                    self.to_scan(now);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn hop_now(&mut self, now: Instant) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let hz = self.channels.advance();
        self.radio.set_mode(Mode::Standby).await?;
        self.radio.set_frequency(hz).await?;
        self.hop.mark(now);
        log::trace!(
            "modem: hopped to channel {} ({hz} Hz)",
            self.channels.active_index()
        );
        Ok(())
    }

    async fn start_scan(&mut self, now: Instant) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let gate = if self.post_tx {
            self.config.rssi_post_tx
        } else {
            self.config.rssi_scan
        };
        self.post_tx = false;
        self.radio.set_mode(Mode::Standby).await?;
        if !self.config.cad {
            return self.enter_receiving(now).await;
        }

        self.radio.set_dio_mapping(DioMapping::cad()).await?;
        self.radio.clear_irq_flags(IrqMask::all()).await?;
        self.radio.set_mode(Mode::Cad).await?;
        self.state = ModemState::Cad;
        self.entered_at = now;

        // The synthesizer needs its settle time before the energy reading
        // means anything.
        self.radio.settle(gate.settle_us).await?;
        let rssi = self.radio.current_rssi().await?;
        if rssi >= gate.limit_dbm {
            log::debug!("modem: {rssi} dBm on channel, listening immediately");
            self.enter_receiving(now).await?;
        }
        Ok(())
    }

    async fn enter_receiving(&mut self, now: Instant) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.radio.set_dio_mapping(DioMapping::rx()).await?;
        self.radio.set_mode(Mode::RxContinuous).await?;
        self.state = ModemState::Receiving;
        self.entered_at = now;
        Ok(())
    }

    async fn start_tx(&mut self, now: Instant) -> Result<(), SxError<TSPIERR, TPINERR>> {
        let Some(frame) = self.downlink.clone() else {
            return Ok(());
        };
        self.state = ModemState::Transmitting;
        log::debug!(
            "modem: transmitting {} bytes on {} Hz, {:?}",
            frame.payload.len(),
            frame.freq_hz,
            frame.spread_factor
        );

        self.radio.set_mode(Mode::Standby).await?;
        self.radio.set_dio_mapping(DioMapping::tx()).await?;
        self.radio.set_frequency(frame.freq_hz).await?;
        self.radio
            .set_modem_config(
                frame.spread_factor,
                self.config.bandwidth,
                self.config.coding_rate,
                frame.crc_on,
            )
            .await?;
        self.radio
            .set_pa_config(PaConfig::default().set_power_dbm(frame.power_dbm))
            .await?;
        self.radio.set_invert_iq(frame.invert_iq).await?;
        self.radio.set_payload_length(frame.payload.len() as u8).await?;
        let tx_base = self.radio.fifo_tx_base();
        self.radio.set_fifo_addr_ptr(tx_base).await?;
        self.radio.write_fifo(&frame.payload).await?;
        self.radio.clear_irq_flags(IrqMask::all()).await?;
        self.radio.set_mode(Mode::Tx).await?;

        self.state = ModemState::TxDone;
        self.entered_at = now;
        self.post_tx = true;
        Ok(())
    }

    /// Puts the listening configuration back after a transmission changed
    /// frequency, spreading factor and IQ polarity.
    async fn restore_rx_config(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.radio.set_mode(Mode::Standby).await?;
        self.radio.set_frequency(self.channels.active_hz()).await?;
        self.radio
            .set_modem_config(
                self.config.spread_factor,
                self.config.bandwidth,
                self.config.coding_rate,
                true,
            )
            .await?;
        self.radio.set_invert_iq(false).await?;
        self.radio
            .set_pa_config(PaConfig::default().set_power_dbm(self.config.tx_power_dbm))
            .await
    }

    async fn reprogram_sf(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.radio.set_mode(Mode::Standby).await?;
        self.radio.set_spread_factor(self.config.spread_factor).await
    }

    async fn reprogram_frequency(&mut self) -> Result<(), SxError<TSPIERR, TPINERR>> {
        self.radio.set_mode(Mode::Standby).await?;
        self.radio.set_frequency(self.channels.active_hz()).await
    }

    fn resume_or_reinit(&mut self, result: Result<(), SxError<TSPIERR, TPINERR>>, now: Instant) {
        match result {
            Ok(()) => self.to_scan(now),
            Err(err) => {
                log::warn!("modem: live reconfiguration failed, re-initializing: {err:?}");
                self.force_reinit(now);
            }
        }
    }

    fn to_scan(&mut self, now: Instant) {
        self.state = ModemState::Scan;
        self.entered_at = now;
    }

    fn radio_config(&self) -> RadioConfig {
        RadioConfig {
            freq_hz: self.channels.active_hz(),
            spread_factor: self.config.spread_factor,
            bandwidth: self.config.bandwidth,
            coding_rate: self.config.coding_rate,
            sync_word: self.config.sync_word,
            crc_on: true,
            pa_config: PaConfig::default().set_power_dbm(self.config.tx_power_dbm),
            max_payload_len: MAX_PAYLOAD as u8,
            payload_len: 0x40,
            irq_mask: IrqMask::all(),
            dio_mapping: DioMapping::rx(),
        }
    }
}

/// Projects an instant onto the wrapping 32-bit microsecond counter the
/// wire protocol carries timestamps on.
pub fn wall_us(now: Instant) -> u32 {
    now.as_micros() as u32
}
