//! State machine scenarios against a scripted fake SX1276.
//!
//! The fake implements the SPI register framing the driver speaks (address
//! byte with the MSB as the write flag, burst FIFO access through the
//! pointer register) over a plain register file, so the full
//! init/CAD/receive/transmit cycle runs on the host with synthetic time.

use core::cell::RefCell;
use core::convert::Infallible;
use std::rc::Rc;

use embassy_futures::block_on;
use embassy_time::{Duration, Instant};
use embedded_hal::digital::OutputPin;
use embedded_hal_async::spi::{ErrorType, Operation, SpiDevice};
use heapless::Vec;

use lgw_modem_async::channel::ChannelTable;
use lgw_modem_async::config::ModemConfig;
use lgw_modem_async::event::{DownlinkMailbox, EventLatch, RadioEvent};
use lgw_modem_async::frame::DownlinkFrame;
use lgw_modem_async::modem::{Modem, ModemState};
use sx1276_async::op::SpreadFactor;
use sx1276_async::reg::Register;
use sx1276_async::{calc_frf, SX1276};

const REG_FIFO: usize = Register::Fifo as usize;
const REG_FIFO_ADDR_PTR: usize = Register::FifoAddrPtr as usize;
const REG_IRQ_FLAGS: usize = Register::IrqFlags as usize;

struct FakeChip {
    regs: [u8; 0x80],
    fifo: [u8; 256],
}

impl FakeChip {
    fn new() -> Self {
        let mut regs = [0u8; 0x80];
        regs[Register::Version as usize] = 0x12;
        Self {
            regs,
            fifo: [0u8; 256],
        }
    }

    fn write_reg(&mut self, addr: u8, value: u8) {
        match addr as usize {
            // Write 1 to clear.
            REG_IRQ_FLAGS => self.regs[REG_IRQ_FLAGS] &= !value,
            REG_FIFO => {
                let ptr = self.regs[REG_FIFO_ADDR_PTR];
                self.fifo[ptr as usize] = value;
                self.regs[REG_FIFO_ADDR_PTR] = ptr.wrapping_add(1);
            }
            other => self.regs[other] = value,
        }
    }

    fn read_reg(&mut self, addr: u8) -> u8 {
        match addr as usize {
            REG_FIFO => {
                let ptr = self.regs[REG_FIFO_ADDR_PTR];
                let value = self.fifo[ptr as usize];
                self.regs[REG_FIFO_ADDR_PTR] = ptr.wrapping_add(1);
                value
            }
            other => self.regs[other],
        }
    }

    fn frf(&self) -> u32 {
        ((self.regs[Register::FrfMsb as usize] as u32) << 16)
            | ((self.regs[Register::FrfMid as usize] as u32) << 8)
            | self.regs[Register::FrfLsb as usize] as u32
    }

    fn load_rx(&mut self, payload: &[u8], raw_rssi: u8, raw_snr: u8) {
        self.regs[Register::RxNbBytes as usize] = payload.len() as u8;
        self.regs[Register::FifoRxCurrentAddr as usize] = 0;
        self.fifo[..payload.len()].copy_from_slice(payload);
        self.regs[Register::PktRssiValue as usize] = raw_rssi;
        self.regs[Register::PktSnrValue as usize] = raw_snr;
        self.regs[REG_IRQ_FLAGS] = 0x40; // RxDone
    }
}

#[derive(Clone)]
struct MockSpi {
    chip: Rc<RefCell<FakeChip>>,
}

impl ErrorType for MockSpi {
    type Error = Infallible;
}

impl SpiDevice<u8> for MockSpi {
    async fn transaction(
        &mut self,
        operations: &mut [Operation<'_, u8>],
    ) -> Result<(), Self::Error> {
        let mut chip = self.chip.borrow_mut();
        let mut target: Option<(u8, bool)> = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(buf) => {
                    for &byte in buf.iter() {
                        match target {
                            None => target = Some((byte & 0x7F, byte & 0x80 != 0)),
                            Some((reg, true)) => chip.write_reg(reg, byte),
                            Some((_, false)) => {}
                        }
                    }
                }
                Operation::Read(buf) => {
                    if let Some((reg, false)) = target {
                        for slot in buf.iter_mut() {
                            *slot = chip.read_reg(reg);
                        }
                    }
                }
                Operation::DelayNs(_) => {}
                _ => {}
            }
        }
        Ok(())
    }
}

struct MockPin;

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

static THREE_CHANNELS: [u32; 3] = [868_100_000, 868_300_000, 868_500_000];

struct Bench {
    chip: Rc<RefCell<FakeChip>>,
    modem: Modem<MockSpi, MockPin>,
    latch: &'static EventLatch,
}

fn bench(config: ModemConfig, table: ChannelTable) -> Bench {
    let chip = Rc::new(RefCell::new(FakeChip::new()));
    let latch: &'static EventLatch = Box::leak(Box::new(EventLatch::new()));
    let radio = SX1276::new(MockSpi { chip: chip.clone() }, MockPin);
    let modem = Modem::new(radio, config, table, latch, Instant::from_millis(0));
    Bench { chip, modem, latch }
}

fn downlink(payload: &[u8], tmst_us: Option<u32>) -> DownlinkFrame {
    DownlinkFrame {
        payload: Vec::from_slice(payload).unwrap(),
        tmst_us,
        spread_factor: SpreadFactor::SF9,
        power_dbm: 14,
        freq_hz: 869_525_000,
        crc_on: false,
        invert_iq: true,
    }
}

#[test]
fn init_programs_the_radio_and_reaches_scan() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();

    assert_eq!(b.modem.state(), ModemState::Scan);
    assert_eq!(b.modem.stats().counters.boots, 1);
    let chip = b.chip.borrow();
    assert_eq!(chip.frf(), calc_frf(868_100_000));
    assert_eq!(chip.regs[Register::SyncWord as usize], 0x34);
    assert_eq!(chip.regs[Register::MaxPayloadLength as usize], 0x80);
}

#[test]
fn init_retries_on_version_mismatch_then_surfaces_the_fault() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    b.chip.borrow_mut().regs[Register::Version as usize] = 0x00;

    let retries = b.modem.config().init_retries;
    for attempt in 1..retries {
        assert!(
            block_on(b.modem.service(Instant::from_millis(attempt as u64))).is_ok(),
            "attempt {attempt} should still be retried"
        );
        assert_eq!(b.modem.state(), ModemState::Init);
    }
    let fault = block_on(b.modem.service(Instant::from_millis(retries as u64))).unwrap_err();
    assert_eq!(fault.attempts, retries);
}

#[test]
fn cad_scan_arms_after_init() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.state(), ModemState::Cad);
    // CAD mode was requested from the chip.
    assert_eq!(b.chip.borrow().regs[Register::OpMode as usize], 0x87);
}

#[test]
fn receive_done_publishes_a_frame_and_returns_to_scanning() {
    let mut config = ModemConfig::default();
    config.cad = false;
    let mut b = bench(config, ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.state(), ModemState::Receiving);

    let payload = [0x42u8; 20];
    // Raw 60 is -97 dBm corrected; raw 24 is 6 dB.
    b.chip.borrow_mut().load_rx(&payload, 60, 24);
    b.latch.post(RadioEvent::RxDone);
    block_on(b.modem.service(Instant::from_millis(2))).unwrap();

    let frame = b.modem.take_uplink().expect("frame should be published");
    assert_eq!(frame.payload.len(), 20);
    assert_eq!(frame.payload.as_slice(), &payload);
    assert!(frame.crc_ok);
    assert_eq!(frame.rssi, -97);
    assert_eq!(frame.snr, 6);
    assert_eq!(frame.spread_factor, SpreadFactor::SF7);
    // Back in the scan cycle, listening again.
    assert_eq!(b.modem.state(), ModemState::Receiving);
    assert_eq!(b.modem.stats().counters.rx_ok, 1);
    assert_eq!(b.modem.stats().counters.rx_forwarded, 1);
}

#[test]
fn crc_failure_discards_the_frame_before_the_codec() {
    let mut config = ModemConfig::default();
    config.cad = false;
    let mut b = bench(config, ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();

    b.chip.borrow_mut().load_rx(&[0x11; 8], 60, 24);
    b.chip.borrow_mut().regs[REG_IRQ_FLAGS] = 0x60; // RxDone | CrcError
    b.latch.post(RadioEvent::RxDone);
    block_on(b.modem.service(Instant::from_millis(2))).unwrap();

    assert!(b.modem.take_uplink().is_none());
    assert_eq!(b.modem.stats().counters.rx_crc_errors, 1);
    assert_eq!(b.modem.stats().counters.rx_ok, 0);
}

#[test]
fn second_reception_is_dropped_while_the_slot_is_occupied() {
    let mut config = ModemConfig::default();
    config.cad = false;
    let mut b = bench(config, ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();

    b.chip.borrow_mut().load_rx(&[0xAA; 10], 60, 24);
    b.latch.post(RadioEvent::RxDone);
    block_on(b.modem.service(Instant::from_millis(2))).unwrap();
    assert!(b.modem.uplink_pending());

    // A second frame lands before the network side drained the first.
    b.chip.borrow_mut().load_rx(&[0xBB; 30], 60, 24);
    b.latch.post(RadioEvent::RxDone);
    block_on(b.modem.service(Instant::from_millis(3))).unwrap();

    // The first frame survives untouched; the second was counted as lost.
    let frame = b.modem.take_uplink().unwrap();
    assert_eq!(frame.payload.as_slice(), &[0xAA; 10]);
    assert_eq!(b.modem.stats().counters.rx_dropped, 1);
    assert!(b.modem.take_uplink().is_none());
}

#[test]
fn downlink_transmits_from_scan_and_releases_on_tx_done() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();

    let now_us = 1_000; // service(1ms) projects to 1000 µs
    b.modem
        .queue_downlink(downlink(&[0x10; 10], Some(now_us)))
        .unwrap();
    assert!(b.modem.downlink_pending());

    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.state(), ModemState::TxDone);
    {
        let chip = b.chip.borrow();
        // The transmit parameters landed in the chip: downlink frequency,
        // inverted IQ, payload in the TX half of the FIFO.
        assert_eq!(chip.frf(), calc_frf(869_525_000));
        assert_eq!(chip.regs[Register::InvertIq as usize], 0x66);
        assert_eq!(chip.regs[Register::PayloadLength as usize], 10);
        assert_eq!(&chip.fifo[0x80..0x8A], &[0x10; 10]);
        assert_eq!(chip.regs[Register::OpMode as usize], 0x83);
    }

    b.chip.borrow_mut().regs[REG_IRQ_FLAGS] = 0x08; // TxDone
    b.latch.post(RadioEvent::TxDone);
    block_on(b.modem.service(Instant::from_millis(2))).unwrap();

    assert!(!b.modem.downlink_pending());
    assert_eq!(b.modem.stats().counters.tx_done, 1);
    // Listening configuration restored and the scan cycle re-armed.
    assert_eq!(b.modem.state(), ModemState::Cad);
    assert_eq!(b.chip.borrow().frf(), calc_frf(868_100_000));
}

#[test]
fn downlink_waits_for_its_target_timestamp() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();

    b.modem
        .queue_downlink(downlink(&[0x22; 4], Some(5_000_000)))
        .unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    // Not due yet: still scanning, frame still queued.
    assert_eq!(b.modem.state(), ModemState::Cad);
    assert!(b.modem.downlink_pending());

    block_on(b.modem.service(Instant::from_secs(5))).unwrap();
    assert_eq!(b.modem.state(), ModemState::TxDone);
}

#[test]
fn a_second_downlink_is_rejected_while_one_is_pending() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    b.modem.queue_downlink(downlink(&[1], None)).unwrap();
    let rejected = b.modem.queue_downlink(downlink(&[2, 2], None)).unwrap_err();
    assert_eq!(rejected.payload.len(), 2);
}

#[test]
fn stuck_transmitter_forces_a_reset_through_init() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    b.modem.queue_downlink(downlink(&[0x33; 6], None)).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.state(), ModemState::TxDone);

    // No transmit-done signal within the hard bound.
    let deadline = b.modem.config().tx_deadline;
    block_on(b.modem.service(Instant::from_millis(1) + deadline)).unwrap();
    assert_eq!(b.modem.state(), ModemState::Init);
    assert_eq!(b.modem.stats().counters.resets, 1);
    assert!(!b.modem.downlink_pending());
}

#[test]
fn cad_deadline_with_hopping_advances_exactly_one_channel() {
    let mut config = ModemConfig::default();
    config.hop = true;
    config.hop_period = Duration::from_secs(3600);
    let mut b = bench(config, ChannelTable::new(&THREE_CHANNELS));
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.state(), ModemState::Cad);
    assert_eq!(b.modem.channels().active_index(), 0);

    // No activity before the CAD deadline.
    let deadline = b.modem.config().cad_deadline;
    block_on(b.modem.service(Instant::from_millis(1) + deadline)).unwrap();
    assert_eq!(b.modem.channels().active_index(), 1);
    assert_eq!(b.chip.borrow().frf(), calc_frf(868_300_000));
    // Re-armed on the new channel.
    assert_eq!(b.modem.state(), ModemState::Cad);

    // Two more rounds wrap back to channel 0.
    let later = Instant::from_millis(1) + deadline + deadline;
    block_on(b.modem.service(later)).unwrap();
    block_on(b.modem.service(later + deadline)).unwrap();
    assert_eq!(b.modem.channels().active_index(), 0);
}

#[test]
fn cad_detected_switches_to_receiving() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.state(), ModemState::Cad);

    b.chip.borrow_mut().regs[REG_IRQ_FLAGS] = 0x05; // CadDone | CadDetected
    b.latch.post(RadioEvent::CadDone);
    block_on(b.modem.service(Instant::from_millis(2))).unwrap();
    assert_eq!(b.modem.state(), ModemState::Receiving);
    assert_eq!(b.chip.borrow().regs[Register::OpMode as usize], 0x85);
}

#[test]
fn receive_deadline_recovers_to_scanning() {
    let mut config = ModemConfig::default();
    config.cad = false;
    let mut b = bench(config, ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.state(), ModemState::Receiving);

    let deadline = b.modem.config().rx_deadline;
    block_on(b.modem.service(Instant::from_millis(1) + deadline)).unwrap();
    assert_eq!(b.modem.stats().counters.rx_timeouts, 1);
    // Re-armed straight back into listening.
    assert_eq!(b.modem.state(), ModemState::Receiving);
}

#[test]
fn management_spread_factor_change_applies_without_reset() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    block_on(b.modem.service(Instant::from_millis(1))).unwrap();

    block_on(b.modem.apply_spread_factor(SpreadFactor::SF12, Instant::from_millis(2)));
    assert_eq!(b.modem.config().spread_factor, SpreadFactor::SF12);
    // SF12 sits in the upper nibble of ModemConfig2.
    assert_eq!(b.chip.borrow().regs[Register::ModemConfig2 as usize] >> 4, 12);
    // No re-init happened.
    assert_eq!(b.modem.stats().counters.boots, 1);
    assert_eq!(b.modem.stats().counters.resets, 0);
}

#[test]
fn management_channel_change_reprograms_the_frequency() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();

    block_on(b.modem.apply_channel(9, Instant::from_millis(1))).unwrap();
    assert_eq!(b.modem.channels().active_index(), 9);
    assert_eq!(b.chip.borrow().frf(), calc_frf(869_525_000));

    assert!(block_on(b.modem.apply_channel(10, Instant::from_millis(2))).is_err());
    assert_eq!(b.modem.channels().active_index(), 9);
}

#[test]
fn downlink_mailbox_hands_the_latest_frame_to_the_modem() {
    // The network task signals parsed frames; the main loop takes the
    // latest and queues it. A newer downlink replaces an untaken one.
    let mailbox = DownlinkMailbox::new();
    mailbox.signal(downlink(&[1], None));
    mailbox.signal(downlink(&[2, 2], None));

    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();

    let frame = mailbox.try_take().expect("a frame was signalled");
    assert_eq!(frame.payload.len(), 2);
    b.modem.queue_downlink(frame).unwrap();
    assert!(mailbox.try_take().is_none());
    assert!(b.modem.downlink_pending());
}

#[test]
fn management_reset_goes_back_through_init() {
    let mut b = bench(ModemConfig::default(), ChannelTable::eu868());
    block_on(b.modem.service(Instant::from_millis(0))).unwrap();
    b.modem.force_reinit(Instant::from_millis(1));
    assert_eq!(b.modem.state(), ModemState::Init);
    assert_eq!(b.modem.stats().counters.resets, 1);

    block_on(b.modem.service(Instant::from_millis(2))).unwrap();
    assert_eq!(b.modem.state(), ModemState::Scan);
    assert_eq!(b.modem.stats().counters.boots, 2);
}
