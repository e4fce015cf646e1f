//! Datagram framing: header layout, packet types and the decoder.

use sx1276_async::op::SpreadFactor;

use crate::downlink;
use lgw_modem_async::frame::DownlinkFrame;

/// The protocol version carried in byte 0 of every datagram.
pub const PROTOCOL_VERSION: u8 = 0x01;

/// Offset of the JSON body in datagrams arriving from the server.
pub const SERVER_HEADER_LEN: usize = 4;

/// Offset of the JSON body in datagrams leaving the gateway (header plus
/// gateway EUI).
pub const GATEWAY_HEADER_LEN: usize = 12;

/// The packet type discriminator, byte 3 of the header.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PacketKind {
    /// Uplink frames or status, gateway to server.
    PushData = 0x00,
    /// Server acknowledgement of a `PushData`.
    PushAck = 0x01,
    /// Keepalive/registration, gateway to server.
    PullData = 0x02,
    /// Downlink instruction, server to gateway.
    PullResp = 0x03,
    /// Server acknowledgement of a `PullData`.
    PullAck = 0x04,
    /// Transmit confirmation, gateway to server.
    TxAck = 0x05,
    /// Management: reset the gateway radio.
    MgtReset = 0x15,
    /// Management: change the listening spreading factor.
    MgtSetSf = 0x16,
    /// Management: change the active channel.
    MgtSetFreq = 0x17,
}

impl PacketKind {
    /// Converts the raw type byte, rejecting unknown values.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::PushData),
            0x01 => Some(Self::PushAck),
            0x02 => Some(Self::PullData),
            0x03 => Some(Self::PullResp),
            0x04 => Some(Self::PullAck),
            0x05 => Some(Self::TxAck),
            0x15 => Some(Self::MgtReset),
            0x16 => Some(Self::MgtSetSf),
            0x17 => Some(Self::MgtSetFreq),
            _ => None,
        }
    }
}

/// The 2-byte random token correlating requests with acknowledgements.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Token(pub u16);

impl Token {
    /// The header bytes for this token.
    pub const fn to_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// Reads a token out of header bytes 1..3.
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self(u16::from_be_bytes(bytes))
    }
}

/// The 8-byte gateway identifier derived from the interface MAC address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GatewayEui(pub [u8; 8]);

impl GatewayEui {
    /// Expands a 6-byte MAC into the conventional EUI-64 form with `FFFF`
    /// spliced into the middle.
    pub const fn from_mac(mac: [u8; 6]) -> Self {
        Self([
            mac[0], mac[1], mac[2], 0xFF, 0xFF, mac[3], mac[4], mac[5],
        ])
    }
}

/// Why a datagram could not be decoded (or encoded).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Shorter than the fixed header.
    TooShort,
    /// Unsupported protocol version byte.
    Version(u8),
    /// Unrecognized packet type byte.
    UnknownType(u8),
    /// A known type the gateway does not consume (e.g. `PushData` arriving
    /// from the network).
    Unhandled(PacketKind),
    /// A JSON field was missing or malformed; carries the field name.
    Json(&'static str),
    /// The base64 payload did not decode.
    Base64,
    /// The payload exceeds the frame buffer capacity.
    PayloadTooLong,
    /// An encode overflowed its fixed-capacity buffer.
    BufferFull,
}

/// A decoded datagram, from the gateway's point of view.
#[derive(Clone, Debug)]
pub enum Datagram {
    /// The server acknowledged an uplink.
    PushAck(Token),
    /// The server acknowledged a keepalive.
    PullAck(Token),
    /// A downlink instruction.
    PullResp {
        /// The token to echo in the `TxAck`.
        token: Token,
        /// The frame to transmit.
        frame: DownlinkFrame,
    },
    /// Management: force a radio reset.
    Reset,
    /// Management: change the listening spreading factor.
    SetSpreadFactor(SpreadFactor),
    /// Management: change the active channel index.
    SetChannel(u8),
}

/// Decodes a datagram received from the network server.
///
/// Validates the version and type bytes before touching the body. Errors
/// are for the caller to log and drop; no state changes on failure.
pub fn parse(buf: &[u8]) -> Result<Datagram, ProtocolError> {
    if buf.len() < SERVER_HEADER_LEN {
        return Err(ProtocolError::TooShort);
    }
    if buf[0] != PROTOCOL_VERSION {
        return Err(ProtocolError::Version(buf[0]));
    }
    let token = Token::from_bytes([buf[1], buf[2]]);
    let kind = PacketKind::from_u8(buf[3]).ok_or(ProtocolError::UnknownType(buf[3]))?;

    match kind {
        PacketKind::PushAck => Ok(Datagram::PushAck(token)),
        PacketKind::PullAck => Ok(Datagram::PullAck(token)),
        PacketKind::PullResp => {
            let frame = downlink::parse_txpk(&buf[SERVER_HEADER_LEN..])?;
            Ok(Datagram::PullResp { token, frame })
        }
        PacketKind::MgtReset => Ok(Datagram::Reset),
        PacketKind::MgtSetSf => {
            let raw = *buf.get(SERVER_HEADER_LEN).ok_or(ProtocolError::TooShort)?;
            let sf = SpreadFactor::from_u8(raw).ok_or(ProtocolError::Json("sf"))?;
            Ok(Datagram::SetSpreadFactor(sf))
        }
        PacketKind::MgtSetFreq => {
            let index = *buf.get(SERVER_HEADER_LEN).ok_or(ProtocolError::TooShort)?;
            Ok(Datagram::SetChannel(index))
        }
        other => Err(ProtocolError::Unhandled(other)),
    }
}
