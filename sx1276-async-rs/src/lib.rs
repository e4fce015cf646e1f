//! An asynchronous, `no_std` driver for the Semtech SX1276/RFM95 LoRa transceiver.
//!
//! This crate provides a low-level async driver for the SX1276 family of LoRa
//! chips. It is built upon `embedded-hal-async` traits and exposes the
//! register map the chip actually speaks: single-byte register reads and
//! writes plus burst FIFO transfers, each performed as one exclusive SPI
//! transaction with chip-select handled by the [`SpiDevice`] implementation.
//!
//! The main entry point is the `SX1276` struct, which takes an async SPI
//! peripheral and the reset pin. DIO interrupt lines are deliberately not
//! owned by the driver: a gateway wires those to its own latch and drains
//! them from its main loop.
//!
//! # Usage
//!
//! See the `lgw-modem-async` crate for how a single-channel gateway drives
//! this driver through its receive/CAD/transmit cycle.
//!
//! [`SpiDevice`]: embedded_hal_async::spi::SpiDevice

#![no_std]

pub mod conf;
pub mod op;
pub mod reg;

mod sx;
pub use sx::*;
