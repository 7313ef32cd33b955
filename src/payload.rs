//! Payload codec boundary.
//!
//! The serializer treats the payload format as an external collaborator: any
//! codec that can dump a value to bytes and load it back can sit behind a
//! [`PayloadCodec`]. The default is JSON.

use serde_json::Value;

use crate::error::Error;

/// Structured-data codec used to frame payloads before signing.
pub trait PayloadCodec: Send + Sync {
    /// Encode `value` to bytes.
    fn dump(&self, value: &Value) -> Result<Vec<u8>, Error>;

    /// Decode bytes back into a value.
    fn load(&self, data: &[u8]) -> Result<Value, Error>;
}

/// The default codec: compact JSON via serde_json.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn dump(&self, value: &Value) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(value)
            .map_err(|e| Error::bad_payload(format!("could not serialize payload: {e}")))
    }

    fn load(&self, data: &[u8]) -> Result<Value, Error> {
        serde_json::from_slice(data)
            .map_err(|e| Error::bad_payload(format!("could not deserialize payload: {e}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_roundtrip() {
        let codec = JsonCodec;
        let value = json!({"user": "alice", "scopes": ["read", "write"], "n": 42});
        let bytes = codec.dump(&value).unwrap();
        assert_eq!(codec.load(&bytes).unwrap(), value);
    }

    #[test]
    fn test_json_load_rejects_garbage() {
        let err = JsonCodec.load(b"{not json").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BadPayload);
    }
}
