//! Base64 VLQ codec used by the `mappings` field of a source map.
//!
//! Each base64 digit carries 5 value bits and a continuation bit (0x20). The
//! assembled value keeps the sign in its lowest bit. Values are 32-bit signed,
//! the range source map tooling emits.

const BASE64_DIGITS: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const CONTINUATION_BIT: u8 = 0x20;
const VALUE_MASK: u8 = 0x1f;
const VALUE_BITS: u32 = 5;

/// Shift of the last digit an `i32` can need (7 digits, 35 bits).
const MAX_SHIFT: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VlqError {
    #[error("unexpected end of VLQ at position {0}")]
    Truncated(usize),

    #[error("invalid VLQ character {ch:?} at position {pos}")]
    InvalidCharacter { ch: char, pos: usize },

    #[error("VLQ value starting at position {0} overflows")]
    Overflow(usize),
}

fn digit_value(byte: u8) -> Option<u8> {
    match byte {
        b'A'..=b'Z' => Some(byte - b'A'),
        b'a'..=b'z' => Some(byte - b'a' + 26),
        b'0'..=b'9' => Some(byte - b'0' + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decode every value packed in one segment.
pub fn decode(segment: &str) -> Result<Vec<i32>, VlqError> {
    let bytes = segment.as_bytes();
    let mut values = Vec::with_capacity(5);
    let mut pos = 0;

    while pos < bytes.len() {
        let start = pos;
        let mut shift = 0u32;
        let mut value: i64 = 0;

        loop {
            let byte = *bytes.get(pos).ok_or(VlqError::Truncated(pos))?;
            let digit = digit_value(byte).ok_or_else(|| VlqError::InvalidCharacter {
                ch: segment[pos..].chars().next().unwrap_or(byte as char),
                pos,
            })?;
            pos += 1;

            if shift > MAX_SHIFT {
                return Err(VlqError::Overflow(start));
            }
            value |= i64::from(digit & VALUE_MASK) << shift;
            shift += VALUE_BITS;

            if digit & CONTINUATION_BIT == 0 {
                break;
            }
        }

        let magnitude = value >> 1;
        let signed = if value & 1 == 1 {
            -magnitude
        } else {
            magnitude
        };
        values.push(i32::try_from(signed).map_err(|_| VlqError::Overflow(start))?);
    }

    Ok(values)
}

/// Encode values into one segment. Inverse of [`decode`].
pub fn encode(values: &[i32]) -> String {
    let mut out = String::with_capacity(values.len() * 2);
    for &value in values {
        let magnitude = u64::from(value.unsigned_abs()) << 1;
        let mut vlq = if value < 0 { magnitude | 1 } else { magnitude };
        loop {
            let mut digit = (vlq & u64::from(VALUE_MASK)) as u8;
            vlq >>= VALUE_BITS;
            if vlq > 0 {
                digit |= CONTINUATION_BIT;
            }
            out.push(BASE64_DIGITS[digit as usize] as char);
            if vlq == 0 {
                break;
            }
        }
    }
    out
}
