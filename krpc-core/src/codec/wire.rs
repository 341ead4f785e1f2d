//! Wire primitives: varints, zig-zag, fixed-width floats and length-prefixed bytes.
//!
//! Decoders take a `&mut &[u8]` cursor and advance it past what they consumed.
use super::CodecError;

/// Longest varint that fits in 64 bits.
const MAX_VARINT_LEN: usize = 10;

pub fn encode_varint(value: u64, buf: &mut Vec<u8>) {
    prost::encoding::encode_varint(value, buf);
}

pub fn decode_varint(buf: &mut &[u8]) -> Result<u64, CodecError> {
    let terminated = buf
        .iter()
        .take(MAX_VARINT_LEN)
        .any(|byte| byte & 0x80 == 0);
    if !terminated && buf.len() < MAX_VARINT_LEN {
        return Err(CodecError::Truncated);
    }
    prost::encoding::decode_varint(buf).map_err(|_| CodecError::MalformedVarint)
}

pub fn zigzag_encode32(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

pub fn zigzag_decode32(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

pub fn zigzag_encode64(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

pub fn zigzag_decode64(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// NaN is always written in its canonical quiet form.
pub fn encode_double(value: f64, buf: &mut Vec<u8>) {
    let value = if value.is_nan() { f64::NAN } else { value };
    buf.extend_from_slice(&value.to_le_bytes());
}

pub fn encode_float(value: f32, buf: &mut Vec<u8>) {
    let value = if value.is_nan() { f32::NAN } else { value };
    buf.extend_from_slice(&value.to_le_bytes());
}

/// Reads a little-endian double.
///
/// Patterns with every exponent bit set are classified by hand: only a zero mantissa
/// is an infinity, anything else is NaN.
pub fn decode_double(buf: &mut &[u8]) -> Result<f64, CodecError> {
    let bytes: [u8; 8] = take(buf, 8)?
        .try_into()
        .map_err(|_| CodecError::Truncated)?;

    if matches!(bytes[7], 0x7f | 0xff) && bytes[6] >= 0xf0 {
        if bytes[..7] != [0, 0, 0, 0, 0, 0, 0xf0] {
            return Ok(f64::NAN);
        }
        return Ok(if bytes[7] == 0xff {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    Ok(f64::from_le_bytes(bytes))
}

/// Reads a little-endian float, with the same NaN/infinity handling as [`decode_double`].
pub fn decode_float(buf: &mut &[u8]) -> Result<f32, CodecError> {
    let bytes: [u8; 4] = take(buf, 4)?
        .try_into()
        .map_err(|_| CodecError::Truncated)?;

    if matches!(bytes[3], 0x7f | 0xff) && bytes[2] >= 0x80 {
        if bytes[..3] != [0, 0, 0x80] {
            return Ok(f32::NAN);
        }
        return Ok(if bytes[3] == 0xff {
            f32::NEG_INFINITY
        } else {
            f32::INFINITY
        });
    }
    Ok(f32::from_le_bytes(bytes))
}

pub fn encode_length_delimited(data: &[u8], buf: &mut Vec<u8>) {
    encode_varint(data.len() as u64, buf);
    buf.extend_from_slice(data);
}

pub fn decode_length_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], CodecError> {
    let size = decode_varint(buf)?;
    let remaining = buf.len();
    let len = usize::try_from(size)
        .ok()
        .filter(|len| *len <= remaining)
        .ok_or(CodecError::SizeExceedsBuffer { size, remaining })?;
    take(buf, len)
}

/// Formats a 16 byte GUID as `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`.
///
/// The first three groups are stored little-endian and are printed byte-reversed; the
/// last two are printed as stored.
pub fn decode_guid(data: &[u8]) -> Result<String, CodecError> {
    let bytes: &[u8; 16] = data
        .try_into()
        .map_err(|_| CodecError::InvalidGuid(data.len()))?;

    let reversed = |range: std::ops::Range<usize>| {
        let mut group = bytes[range].to_vec();
        group.reverse();
        hex::encode(group)
    };

    Ok(format!(
        "{}-{}-{}-{}-{}",
        reversed(0..4),
        reversed(4..6),
        reversed(6..8),
        hex::encode(&bytes[8..10]),
        hex::encode(&bytes[10..16]),
    ))
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8], CodecError> {
    if buf.len() < len {
        return Err(CodecError::Truncated);
    }
    let (head, tail) = buf.split_at(len);
    *buf = tail;
    Ok(head)
}
