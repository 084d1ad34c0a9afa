//! Register payload decoding.
//!
//! Modbus devices disagree about how multi-word quantities are laid out, so
//! the codec supports the common byte-order conventions (big-endian ABCD,
//! word-swapped CDAB, byte-swapped BADC) for integers and IEEE-754 floats.
//! All functions here are pure; the poller owns scaling and error context.

use serde::{Deserialize, Serialize};

/// Interpretation of a register payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Unsigned 8-bit (low byte of the last word)
    U8,
    /// Unsigned 16-bit, big-endian
    U16,
    /// Signed 16-bit, big-endian
    S16,
    /// Unsigned 32-bit, big-endian (ABCD)
    U32,
    /// Signed 32-bit, big-endian (ABCD)
    S32,
    /// Unsigned 32-bit, word-swapped (CDAB)
    U32Le,
    /// Signed 32-bit, word-swapped (CDAB)
    S32Le,
    /// Unsigned 64-bit, big-endian
    U64Be,
    /// Signed 64-bit, big-endian
    S64Be,
    /// 32-bit float, big-endian (ABCD)
    F32Be,
    /// 32-bit float, word-swapped (CDAB)
    F32Le,
    /// 32-bit float, words swapped before big-endian interpretation (CDAB)
    F32Cdab,
    /// 32-bit float, bytes swapped within each word (BADC)
    F32Badc,
    /// 64-bit float, big-endian
    F64Be,
    /// UTF-8 string; not exportable as a gauge
    Utf8,
}

/// Decode a raw register payload as a float according to the data type.
///
/// Returns `None` for non-numeric types (`utf8`), which the poller treats
/// as "nothing to export" rather than a failure. Payloads shorter than the
/// type's width decode to zero; field devices occasionally return truncated
/// frames and existing deployments rely on the zero showing up as a series.
pub fn decode(datatype: DataType, raw: &[u8]) -> Option<f64> {
    let value = match datatype {
        DataType::U8 => u8_low(raw) as f64,
        DataType::U16 => u16_be(raw) as f64,
        DataType::S16 => u16_be(raw) as i16 as f64,
        DataType::U32 => u32_be(raw) as f64,
        DataType::S32 => u32_be(raw) as i32 as f64,
        DataType::U32Le => u32_wordswap(raw) as f64,
        DataType::S32Le => u32_wordswap(raw) as i32 as f64,
        DataType::U64Be => u64_be(raw) as f64,
        DataType::S64Be => u64_be(raw) as i64 as f64,
        DataType::F32Be => f32::from_bits(u32_be(raw)) as f64,
        DataType::F32Le => f32::from_bits(u32_wordswap(raw)) as f64,
        DataType::F32Cdab => {
            if raw.len() < 4 {
                0.0
            } else {
                let abcd = [raw[2], raw[3], raw[0], raw[1]];
                f32::from_bits(u32_be(&abcd)) as f64
            }
        }
        DataType::F32Badc => {
            if raw.len() < 4 {
                0.0
            } else {
                let abcd = [raw[1], raw[0], raw[3], raw[2]];
                f32::from_bits(u32_be(&abcd)) as f64
            }
        }
        DataType::F64Be => f64::from_bits(u64_be(raw)),
        DataType::Utf8 => return None,
    };
    Some(value)
}

/// Low byte of the payload (the last byte on the wire).
fn u8_low(b: &[u8]) -> u8 {
    b.last().copied().unwrap_or(0)
}

fn u16_be(b: &[u8]) -> u16 {
    if b.len() < 2 {
        return 0;
    }
    u16::from_be_bytes([b[0], b[1]])
}

fn u32_be(b: &[u8]) -> u32 {
    if b.len() < 4 {
        return 0;
    }
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// 32-bit value with the 16-bit words swapped: low word first on the wire.
fn u32_wordswap(b: &[u8]) -> u32 {
    if b.len() < 4 {
        return 0;
    }
    let low = u16_be(&b[0..2]) as u32;
    let high = u16_be(&b[2..4]) as u32;
    (high << 16) | low
}

fn u64_be(b: &[u8]) -> u64 {
    if b.len() < 8 {
        return 0;
    }
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}
