//! The publisher's binary formats.
//!
//! A quote record is 32 bytes:
//!
//! | bytes  | content                                         |
//! |--------|-------------------------------------------------|
//! | 0..8   | big-endian u64 microseconds since the Unix epoch |
//! | 8..11  | ASCII code of the currency sold                 |
//! | 11..14 | ASCII code of the currency bought               |
//! | 14..22 | little-endian IEEE-754 f64 rate                 |
//! | 22..32 | unused                                          |
//!
//! A datagram carries zero or more records back to back.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use common::types::CURRENCY_CODE_LEN;
use common::{CommonError, Currency, Quote};
use std::net::SocketAddrV4;
use tracing::warn;

pub const RECORD_SIZE: usize = 32;
const PADDING_LEN: usize = 10;

/// Size of the subscription message sent to the publisher.
pub const SUBSCRIPTION_SIZE: usize = 6;

/// Decodes a single 32-byte record.
pub fn decode_record(record: &[u8]) -> Result<Quote, CommonError> {
    if record.len() != RECORD_SIZE {
        return Err(CommonError::ParseError(format!(
            "record is {} bytes, expected {}",
            record.len(),
            RECORD_SIZE
        )));
    }
    let mut buf = record;

    let micros = buf.get_u64();
    let timestamp = i64::try_from(micros)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_micros)
        .ok_or_else(|| CommonError::ParseError(format!("timestamp {} out of range", micros)))?;

    let from = Currency::from_bytes(&buf[..CURRENCY_CODE_LEN])?;
    buf.advance(CURRENCY_CODE_LEN);
    let to = Currency::from_bytes(&buf[..CURRENCY_CODE_LEN])?;
    buf.advance(CURRENCY_CODE_LEN);

    let rate = buf.get_f64_le();
    Quote::new(timestamp, from, to, rate)
}

/// Encodes a quote as a 32-byte record with zeroed padding.
pub fn encode_record(quote: &Quote) -> Result<Bytes, CommonError> {
    let micros = u64::try_from(quote.timestamp.timestamp_micros()).map_err(|_| {
        CommonError::InvalidQuote(format!("timestamp {} precedes the epoch", quote.timestamp))
    })?;

    let mut buf = BytesMut::with_capacity(RECORD_SIZE);
    buf.put_u64(micros);
    buf.put_slice(&quote.from.code());
    buf.put_slice(&quote.to.code());
    buf.put_f64_le(quote.rate);
    buf.put_bytes(0, PADDING_LEN);
    Ok(buf.freeze())
}

/// The quotes found in one datagram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedDatagram {
    /// Successfully decoded quotes in payload order.
    pub quotes: Vec<Quote>,
    /// Full-size records that failed to decode.
    pub malformed: usize,
    /// Bytes after the last complete record.
    pub trailing_bytes: usize,
}

/// Splits a payload into records and decodes each one.
///
/// Undecodable records and a trailing partial record are logged and skipped.
pub fn decode_datagram(payload: &[u8]) -> DecodedDatagram {
    let records = payload.chunks_exact(RECORD_SIZE);
    let trailing_bytes = records.remainder().len();
    let mut decoded = DecodedDatagram {
        trailing_bytes,
        ..DecodedDatagram::default()
    };

    for (index, record) in records.enumerate() {
        match decode_record(record) {
            Ok(quote) => decoded.quotes.push(quote),
            Err(e) => {
                warn!(index, error = %e, "Skipping malformed quote record");
                decoded.malformed += 1;
            }
        }
    }
    if trailing_bytes > 0 {
        warn!(trailing_bytes, "Ignoring partial record at end of datagram");
    }
    decoded
}

/// The subscription message: IPv4 octets followed by the big-endian port.
pub fn serialize_address(addr: SocketAddrV4) -> [u8; SUBSCRIPTION_SIZE] {
    let mut out = [0u8; SUBSCRIPTION_SIZE];
    out[..4].copy_from_slice(&addr.ip().octets());
    out[4..].copy_from_slice(&addr.port().to_be_bytes());
    out
}
