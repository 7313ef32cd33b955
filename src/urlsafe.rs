//! Compact URL-safe payload framing: optional zlib compression + base64.
//!
//! Compression is only kept when it actually wins (smaller than the raw
//! payload by at least one byte); a leading `.` marks a compressed body so
//! the decoder knows to inflate after base64.

use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib;

use crate::encoding::{b64_decode, b64_encode};
use crate::error::Error;

/// Marker prefixed to base64 bodies that hold compressed data.
const COMPRESSED_MARKER: u8 = b'.';

const COMPRESSION_LEVEL: u8 = 6;

/// Frame payload bytes for embedding in a URL-safe token.
#[must_use]
pub fn encode_payload(data: &[u8]) -> Vec<u8> {
    let compressed = compress_to_vec_zlib(data, COMPRESSION_LEVEL);
    if compressed.len() < data.len() {
        let mut out = Vec::with_capacity(1 + compressed.len() * 4 / 3 + 4);
        out.push(COMPRESSED_MARKER);
        out.extend_from_slice(b64_encode(&compressed).as_bytes());
        out
    } else {
        b64_encode(data).into_bytes()
    }
}

/// Reverse [`encode_payload`], yielding the original payload bytes.
pub fn decode_payload(data: &[u8]) -> Result<Vec<u8>, Error> {
    let (body, compressed) = match data.split_first() {
        Some((&COMPRESSED_MARKER, rest)) => (rest, true),
        _ => (data, false),
    };
    let decoded = b64_decode(body)?;
    if compressed {
        decompress_to_vec_zlib(&decoded)
            .map_err(|_| Error::bad_payload("could not decompress payload"))
    } else {
        Ok(decoded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_small_payload_stays_uncompressed() {
        let encoded = encode_payload(b"{\"a\":1}");
        assert_ne!(encoded[0], COMPRESSED_MARKER);
        assert_eq!(decode_payload(&encoded).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn test_repetitive_payload_compresses() {
        let data = vec![b'z'; 1024];
        let encoded = encode_payload(&data);
        assert_eq!(encoded[0], COMPRESSED_MARKER);
        // compact even after base64 expansion
        assert!(encoded.len() < data.len());
        assert_eq!(decode_payload(&encoded).unwrap(), data);
    }

    #[test]
    fn test_incompressible_payload_roundtrip() {
        // a pseudo-random byte spread that zlib cannot shrink
        let data: Vec<u8> = (0u32..256)
            .map(|i| (i.wrapping_mul(2654435761) >> 13) as u8)
            .collect();
        let encoded = encode_payload(&data);
        assert_eq!(decode_payload(&encoded).unwrap(), data);
    }

    #[test]
    fn test_empty_payload_roundtrip() {
        let encoded = encode_payload(b"");
        assert_eq!(decode_payload(&encoded).unwrap(), b"");
    }

    #[test]
    fn test_output_is_urlsafe() {
        let data = vec![0xffu8; 300];
        let encoded = encode_payload(&data);
        assert!(encoded
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.'));
    }

    #[test]
    fn test_bad_base64_is_bad_payload() {
        let err = decode_payload(b"!!not-base64!!").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadPayload);
    }

    #[test]
    fn test_marked_but_uncompressed_body_is_bad_payload() {
        // valid base64 after the marker, but not a zlib stream
        let mut forged = vec![COMPRESSED_MARKER];
        forged.extend_from_slice(b64_encode(b"plain bytes").as_bytes());
        let err = decode_payload(&forged).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadPayload);
    }
}
