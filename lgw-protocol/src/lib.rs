//! The gateway wire-protocol codec (Semtech UDP forwarder framing).
//!
//! Every datagram starts with a fixed header: protocol version, a
//! pseudo-random 2-byte token and a 1-byte packet type. Uplink-direction
//! datagrams additionally carry the 8-byte gateway EUI. The body is JSON:
//! an `rxpk` array for received frames, a `stat` object for the periodic
//! status report, a `txpk` object for downlink instructions.
//!
//! Encoding builds into fixed-capacity `heapless` buffers; decoding
//! validates the version and type bytes before interpreting anything else
//! and reports (never panics on) malformed input. An unrecognized type is
//! an error for the caller to log and drop, not a fatal condition.
//!
//! Besides the standard forwarder types, two management types let the
//! network side retune the gateway remotely: a reset, a spreading-factor
//! change and a channel change, each carried as a single operand byte.

#![no_std]

pub mod datagram;
pub mod downlink;
mod json;
pub mod token;
pub mod uplink;

pub use datagram::{Datagram, GatewayEui, PacketKind, ProtocolError, Token, PROTOCOL_VERSION};
