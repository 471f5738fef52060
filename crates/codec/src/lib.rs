//! Lossy, delta-compressed printable-ASCII codec for coordinate sequences.
//!
//! Coordinates are rounded to 1e-5 degrees (about 1.1 m at the equator),
//! encoded per axis as a delta from the previous value of the same axis,
//! zig-zag transformed and emitted as a base-32 varint with the continuation
//! bit `0x20` and a `+63` bias into the printable band. There are no
//! delimiters between coordinates; the empty string encodes the empty
//! sequence.
//!
//! Decoding assumes already-normalized text. Storage layers that quote
//! backslashes must undo that before handing text to [`decode`] (see the
//! store adapter).

use std::{error, fmt, result};

use model::Coordinate;

const PRECISION: f64 = 1e5;
const CONTINUATION_BIT: u8 = 0x20;
const BIAS: u8 = 63;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The text ended while a value still had its continuation bit set, or
    /// a latitude arrived without its longitude.
    UnterminatedSequence,
    /// A byte outside the banded alphabet (`63..=126`).
    InvalidCharacter { byte: u8, position: usize },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnterminatedSequence => {
                write!(f, "encoded polyline ends mid-value")
            }
            Self::InvalidCharacter { byte, position } => write!(
                f,
                "invalid byte 0x{:02x} at position {} in encoded polyline",
                byte, position
            ),
        }
    }
}

impl error::Error for CodecError {}

pub type Result<T> = result::Result<T, CodecError>;

/// Appends one signed scaled value to `out` as zig-zag base-32 varint text.
pub fn encode_value(value: i64, out: &mut String) {
    // Zig-zag: non-negative values become even, negative odd, magnitude kept.
    let mut v = ((value << 1) ^ (value >> 63)) as u64;
    while v >= CONTINUATION_BIT as u64 {
        let chunk = (v as u8 & 0x1f) | CONTINUATION_BIT;
        out.push((chunk + BIAS) as char);
        v >>= 5;
    }
    out.push((v as u8 + BIAS) as char);
}

/// Reads one signed scaled value starting at `*position`, advancing
/// `*position` past it.
pub fn decode_value(bytes: &[u8], position: &mut usize) -> Result<i64> {
    let mut accumulated: u64 = 0;
    let mut shift = 0;
    loop {
        let byte = match bytes.get(*position) {
            Some(byte) => *byte,
            None => return Err(CodecError::UnterminatedSequence),
        };
        if !(BIAS..=126).contains(&byte) {
            return Err(CodecError::InvalidCharacter {
                byte,
                position: *position,
            });
        }
        // A value longer than 64 bits can not come from the encoder; treat
        // the byte extending it as garbage rather than overflowing the shift.
        if shift >= 64 {
            return Err(CodecError::InvalidCharacter {
                byte,
                position: *position,
            });
        }
        *position += 1;
        let chunk = byte - BIAS;
        accumulated |= ((chunk & 0x1f) as u64) << shift;
        shift += 5;
        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }
    // Reverse zig-zag.
    Ok(((accumulated >> 1) as i64) ^ -((accumulated & 1) as i64))
}

/// Encodes an ordered coordinate sequence into the compressed text form.
pub fn encode(points: &[Coordinate]) -> String {
    let mut out = String::new();
    let (mut previous_latitude, mut previous_longitude) = (0_i64, 0_i64);
    for point in points {
        let latitude = scale(point.latitude);
        let longitude = scale(point.longitude);
        encode_value(latitude - previous_latitude, &mut out);
        encode_value(longitude - previous_longitude, &mut out);
        previous_latitude = latitude;
        previous_longitude = longitude;
    }
    out
}

/// Decodes compressed text back into a coordinate sequence. Each coordinate
/// matches the originally encoded one to within the 0.5e-5 degree rounding
/// error; the original floating point input is not reproduced bit-exactly.
pub fn decode(text: &str) -> Result<Vec<Coordinate>> {
    let bytes = text.as_bytes();
    let mut points = Vec::new();
    let mut position = 0;
    let (mut latitude, mut longitude) = (0_i64, 0_i64);
    while position < bytes.len() {
        latitude += decode_value(bytes, &mut position)?;
        longitude += decode_value(bytes, &mut position)?;
        points.push(Coordinate::new(
            latitude as f64 / PRECISION,
            longitude as f64 / PRECISION,
        ));
    }
    Ok(points)
}

fn scale(degrees: f64) -> i64 {
    (degrees * PRECISION).round() as i64
}
