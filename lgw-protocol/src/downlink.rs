//! Downlink (`txpk`) decoding.

use base64::engine::general_purpose::STANDARD;
use base64::{DecodeSliceError, Engine as _};
use heapless::Vec;
use sx1276_async::op::SpreadFactor;

use lgw_modem_async::frame::{DownlinkFrame, MAX_PAYLOAD};

use crate::datagram::ProtocolError;
use crate::json;

/// Default transmit power when the server omits `powe`, in dBm.
const DEFAULT_POWER_DBM: i8 = 14;

/// Parses the `txpk` JSON body of a `PullResp` into a [`DownlinkFrame`].
///
/// Required fields: `freq`, `datr` and `data`. `imme:true` (or an absent
/// `tmst`) requests immediate transmission. Downlinks are IQ-inverted
/// unless `ipol` says otherwise, and carry no payload CRC when `ncrc` is
/// set.
pub fn parse_txpk(body: &[u8]) -> Result<DownlinkFrame, ProtocolError> {
    let json = core::str::from_utf8(body).map_err(|_| ProtocolError::Json("txpk"))?;
    if json::raw_field(json, "txpk").is_none() {
        return Err(ProtocolError::Json("txpk"));
    }

    let imme = json::bool_field(json, "imme").unwrap_or(false);
    let tmst_us = if imme {
        None
    } else {
        json::u32_field(json, "tmst")
    };

    let freq_mhz = json::f64_field(json, "freq").ok_or(ProtocolError::Json("freq"))?;
    let freq_hz = (freq_mhz * 1e6 + 0.5) as u32;

    let datr = json::str_field(json, "datr").ok_or(ProtocolError::Json("datr"))?;
    let spread_factor = parse_datr(datr).ok_or(ProtocolError::Json("datr"))?;

    let power_dbm = json::i32_field(json, "powe")
        .map(|p| p as i8)
        .unwrap_or(DEFAULT_POWER_DBM);
    let invert_iq = json::bool_field(json, "ipol").unwrap_or(true);
    let crc_on = !json::bool_field(json, "ncrc").unwrap_or(false);

    let data = json::str_field(json, "data").ok_or(ProtocolError::Json("data"))?;
    let mut buf = [0u8; MAX_PAYLOAD];
    let len = STANDARD
        .decode_slice(data.as_bytes(), &mut buf)
        .map_err(|err| match err {
            DecodeSliceError::OutputSliceTooSmall => ProtocolError::PayloadTooLong,
            DecodeSliceError::DecodeError(_) => ProtocolError::Base64,
        })?;

    if let Some(size) = json::u32_field(json, "size") {
        if size as usize != len {
            log::warn!("txpk size field {size} disagrees with {len} decoded bytes");
        }
    }

    Ok(DownlinkFrame {
        payload: Vec::from_slice(&buf[..len]).unwrap_or_default(),
        tmst_us,
        spread_factor,
        power_dbm,
        freq_hz,
        crc_on,
        invert_iq,
    })
}

/// Parses a `datr` string such as `SF9BW125` into its spreading factor.
pub fn parse_datr(datr: &str) -> Option<SpreadFactor> {
    let rest = datr.strip_prefix("SF")?;
    let bw = rest.find("BW")?;
    let sf: u8 = rest[..bw].parse().ok()?;
    let _khz: u16 = rest[bw + 2..].parse().ok()?;
    SpreadFactor::from_u8(sf)
}
