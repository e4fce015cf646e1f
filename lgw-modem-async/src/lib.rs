//! The core of an asynchronous, `no_std` single-channel LoRa gateway.
//!
//! This crate drives an SX1276 transceiver (via the `sx1276_async` driver)
//! through its receive, channel-activity-detection and transmit cycle, and
//! hands payloads between the hardware interrupt context and the main
//! processing loop without ever touching the SPI bus from an interrupt.
//!
//! The split is strict:
//!
//! * DIO interrupt handlers call [`event::EventLatch::post`] and return.
//!   The latch is a single atomic slot; a second event posted before the
//!   first is drained overwrites it.
//! * The main loop calls [`modem::Modem::service`] once per iteration with
//!   the current time. `service` drains the latch, reads the interrupt
//!   flags register over SPI, runs the state machine, and publishes a
//!   completed reception into the single uplink slot, which the network
//!   side drains with [`modem::Modem::take_uplink`].
//!
//! Downlinks parsed from the network are queued with
//! [`modem::Modem::queue_downlink`] and transmitted as soon as their target
//! timestamp is due and the modem is not in the middle of a reception.
//!
//! All timing is parameterized on `embassy_time::Instant` values passed in
//! by the caller, so the state machine can be exercised on the host with
//! synthetic time.

#![no_std]
#![deny(missing_docs)]

pub mod boards;
pub mod channel;
pub mod config;
pub mod event;
pub mod frame;
pub mod modem;
pub mod stats;
