//! Byte-level encoding primitives shared by all token layers.
//!
//! Base64 is always URL-safe without padding. Integers use a big-endian
//! minimal-width encoding: leading zero bytes are stripped, and zero itself
//! encodes as a single zero byte.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::error::Error;

/// Every byte that can appear in URL-safe base64 output, plus `=`.
/// Separator bytes must not be drawn from this set.
pub const BASE64_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_=";

/// Encode bytes as URL-safe unpadded base64.
#[must_use]
pub fn b64_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode URL-safe unpadded base64.
pub fn b64_decode(data: &[u8]) -> Result<Vec<u8>, Error> {
    URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|e| Error::bad_payload(format!("could not base64 decode: {e}")))
}

/// Encode an integer as big-endian bytes with leading zeros stripped.
/// Zero encodes as a single zero byte.
#[must_use]
pub fn int_to_bytes(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    bytes[first..].to_vec()
}

/// Decode a big-endian minimal-width integer. Returns `None` for inputs
/// wider than 8 bytes.
#[must_use]
pub fn bytes_to_int(data: &[u8]) -> Option<i64> {
    if data.is_empty() || data.len() > 8 {
        return None;
    }
    let mut padded = [0u8; 8];
    padded[8 - data.len()..].copy_from_slice(data);
    Some(i64::from_be_bytes(padded))
}

/// Split on the last occurrence of `sep`, returning the bytes before and
/// after it. The payload half may itself contain the separator.
#[must_use]
pub fn rsplit_once<'a>(data: &'a [u8], sep: &[u8]) -> Option<(&'a [u8], &'a [u8])> {
    if sep.is_empty() || data.len() < sep.len() {
        return None;
    }
    let at = data
        .windows(sep.len())
        .rposition(|window| window == sep)?;
    Some((&data[..at], &data[at + sep.len()..]))
}
