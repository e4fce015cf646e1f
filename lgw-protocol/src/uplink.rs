//! Uplink-direction encoding: `PushData` (rxpk and stat), `PullData` and
//! `TxAck`.

use core::fmt::Write as _;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use heapless::{String, Vec};
use sx1276_async::op::Bandwidth;

use lgw_modem_async::frame::UplinkFrame;
use lgw_modem_async::stats::Counters;

use crate::datagram::{GatewayEui, PacketKind, ProtocolError, Token, PROTOCOL_VERSION};

/// The largest datagram the gateway emits.
pub const MAX_DATAGRAM: usize = 512;

/// Capacity of the JSON body builder.
const JSON_CAP: usize = 448;

/// Base64 of a full 128-byte payload is 172 characters.
const B64_CAP: usize = 176;

fn header(
    kind: PacketKind,
    token: Token,
    eui: GatewayEui,
) -> Result<Vec<u8, MAX_DATAGRAM>, ProtocolError> {
    let mut out = Vec::new();
    let t = token.to_bytes();
    out.extend_from_slice(&[PROTOCOL_VERSION, t[0], t[1], kind as u8])
        .map_err(|_| ProtocolError::BufferFull)?;
    out.extend_from_slice(&eui.0)
        .map_err(|_| ProtocolError::BufferFull)?;
    Ok(out)
}

/// Encodes a received frame as a `PushData` datagram with an `rxpk` body.
///
/// `bandwidth` is the gateway's listening bandwidth; it completes the
/// `datr` string next to the frame's spreading factor.
pub fn encode_push_data(
    eui: GatewayEui,
    token: Token,
    frame: &UplinkFrame,
    bandwidth: Bandwidth,
) -> Result<Vec<u8, MAX_DATAGRAM>, ProtocolError> {
    let mut out = header(PacketKind::PushData, token, eui)?;

    let mut data64 = [0u8; B64_CAP];
    let len = STANDARD
        .encode_slice(&frame.payload, &mut data64)
        .map_err(|_| ProtocolError::BufferFull)?;
    let data = core::str::from_utf8(&data64[..len]).unwrap_or_default();

    let mut json: String<JSON_CAP> = String::new();
    write!(
        json,
        "{{\"rxpk\":[{{\"tmst\":{},\"chan\":{},\"rfch\":0,\"freq\":{}.{:06},\
         \"stat\":{},\"modu\":\"LORA\",\"datr\":\"SF{}BW{}\",\"codr\":\"4/5\",\
         \"lsnr\":{},\"rssi\":{},\"size\":{},\"data\":\"{}\"}}]}}",
        frame.tmst_us,
        frame.channel,
        frame.freq_hz / 1_000_000,
        frame.freq_hz % 1_000_000,
        if frame.crc_ok { 1 } else { -1 },
        frame.spread_factor as u8,
        bandwidth.khz(),
        frame.snr,
        frame.rssi,
        frame.payload.len(),
        data,
    )
    .map_err(|_| ProtocolError::BufferFull)?;

    out.extend_from_slice(json.as_bytes())
        .map_err(|_| ProtocolError::BufferFull)?;
    Ok(out)
}

/// Encodes the periodic gateway status report as a `PushData` datagram
/// with a `stat` body.
pub fn encode_stat(
    eui: GatewayEui,
    token: Token,
    counters: &Counters,
) -> Result<Vec<u8, MAX_DATAGRAM>, ProtocolError> {
    let mut out = header(PacketKind::PushData, token, eui)?;

    // Acknowledgement ratio in tenths of a percent.
    let ackr_tenths = if counters.rx_forwarded > 0 {
        (counters.upstream_acks as u64 * 1000 / counters.rx_forwarded as u64) as u32
    } else {
        0
    };

    let mut json: String<JSON_CAP> = String::new();
    write!(
        json,
        "{{\"stat\":{{\"rxnb\":{},\"rxok\":{},\"rxfw\":{},\"ackr\":{}.{},\
         \"dwnb\":{},\"txnb\":{}}}}}",
        counters.rx_received,
        counters.rx_ok,
        counters.rx_forwarded,
        ackr_tenths / 10,
        ackr_tenths % 10,
        counters.tx_queued,
        counters.tx_done,
    )
    .map_err(|_| ProtocolError::BufferFull)?;

    out.extend_from_slice(json.as_bytes())
        .map_err(|_| ProtocolError::BufferFull)?;
    Ok(out)
}

/// Encodes the `PullData` keepalive that registers the gateway for
/// downlink traffic.
pub fn encode_pull_data(
    eui: GatewayEui,
    token: Token,
) -> Result<Vec<u8, MAX_DATAGRAM>, ProtocolError> {
    header(PacketKind::PullData, token, eui)
}

/// Encodes the `TxAck` confirming a completed downlink transmission.
/// Echoes the token of the `PullResp` it answers.
pub fn encode_tx_ack(
    eui: GatewayEui,
    token: Token,
) -> Result<Vec<u8, MAX_DATAGRAM>, ProtocolError> {
    header(PacketKind::TxAck, token, eui)
}
